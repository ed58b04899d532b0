//! The `notify` subcommand: mail subscribers a digest of matching
//! declarations already in the store.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use tenderwatch_lib::{
    load_subscribers, render_digest, validation, Db, Mailer, NotifyFilter, DIGEST_SUBJECT,
};

/// Arguments for the `notify` subcommand.
#[derive(Args)]
pub struct NotifyArgs {
    /// SQLite database path
    #[arg(long, default_value = "tenderwatch.db")]
    pub db: PathBuf,

    /// Include declarations published on or after this date (YYYYMMDD,
    /// default today)
    #[arg(short = 's', long)]
    pub date_start: Option<String>,

    /// Subscriber configuration JSON
    #[arg(short = 'n', long)]
    pub config: PathBuf,

    /// SMTP relay host (or TENDERWATCH_SMTP_HOST)
    #[arg(long)]
    pub smtp_host: Option<String>,

    /// SMTP username, also the sender address (or TENDERWATCH_SMTP_USER)
    #[arg(long)]
    pub smtp_user: Option<String>,

    /// SMTP password (or TENDERWATCH_SMTP_PASSWORD)
    #[arg(long)]
    pub smtp_password: Option<String>,

    /// Print digests to stdout instead of sending mail
    #[arg(long)]
    pub dry_run: bool,
}

fn setting(flag: &Option<String>, env_key: &str) -> Result<String> {
    flag.clone()
        .or_else(|| std::env::var(env_key).ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("missing SMTP setting: pass the flag or set {}", env_key))
}

pub fn run(args: &NotifyArgs) -> Result<()> {
    let start = match &args.date_start {
        Some(text) => validation::parse_compact_date(text)?,
        None => chrono::Local::now().date_naive(),
    };

    let subscribers = load_subscribers(&args.config)?;
    let db = Db::open(&args.db)?;
    db.init()?;

    let mailer = if args.dry_run {
        None
    } else {
        let host = setting(&args.smtp_host, "TENDERWATCH_SMTP_HOST")?;
        let user = setting(&args.smtp_user, "TENDERWATCH_SMTP_USER")?;
        let password = setting(&args.smtp_password, "TENDERWATCH_SMTP_PASSWORD")?;
        Some(Mailer::new(&host, &user, &password)?)
    };

    for subscriber in &subscribers {
        let filter = NotifyFilter {
            start_date: start,
            org_keywords: &subscriber.keyword_org,
            subject_keywords: &subscriber.keyword_subject,
            min_budget: subscriber.min_budget,
        };
        let rows = db.select_matching(&filter)?;
        if rows.is_empty() {
            eprintln!("No matches for {}", subscriber.email.join(", "));
            continue;
        }

        let digest = render_digest(&rows);
        match &mailer {
            Some(mailer) => {
                mailer.send(&subscriber.email, DIGEST_SUBJECT, &digest)?;
                eprintln!(
                    "Sent {} declarations to {}",
                    rows.len(),
                    subscriber.email.join(", ")
                );
            }
            None => {
                println!("--- digest for {} ---", subscriber.email.join(", "));
                print!("{}", digest);
            }
        }
    }

    Ok(())
}
