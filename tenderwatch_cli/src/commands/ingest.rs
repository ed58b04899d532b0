//! The `ingest` subcommand: scrape declarations for a date range into SQLite.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tenderwatch_lib::{ingest, validation, Db, IngestConfig, PortalClient, RunLogs};

/// Arguments for the `ingest` subcommand.
#[derive(Args)]
pub struct IngestArgs {
    /// SQLite database path
    #[arg(long, default_value = "tenderwatch.db")]
    pub db: PathBuf,

    /// First declaration date to query (YYYYMMDD, default today)
    #[arg(short = 's', long)]
    pub date_start: Option<String>,

    /// Last declaration date to query (YYYYMMDD, default today)
    #[arg(short = 'e', long)]
    pub date_end: Option<String>,

    /// Only declarations from organizations whose name contains this keyword
    #[arg(short = 'o', long, default_value = "")]
    pub org_name: String,

    /// Only declarations whose subject contains this keyword
    #[arg(short = 'j', long, default_value = "")]
    pub subject: String,

    /// Filename prefix for the per-run error logs
    #[arg(short = 'f', long, default_value = "error")]
    pub err_prefix: String,

    /// Maximum calendar days per portal query
    #[arg(long, default_value = "89")]
    pub max_span_days: i64,

    /// Delay between chunk queries in milliseconds
    #[arg(long, default_value = "1000")]
    pub chunk_delay_ms: u64,
}

pub async fn run(args: &IngestArgs) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let start = match &args.date_start {
        Some(text) => validation::parse_compact_date(text)?,
        None => today,
    };
    let end = match &args.date_end {
        Some(text) => validation::parse_compact_date(text)?,
        None => today,
    };
    validation::validate_range(start, end)?;

    let mut db = Db::open(&args.db)?;
    db.init()?;

    let portal = match std::env::var("TENDERWATCH_BASE_URL") {
        Ok(url) => PortalClient::with_base_url(&url),
        Err(_) => PortalClient::new(),
    };

    let mut logs = RunLogs::create(&args.err_prefix)?;
    let mut config = IngestConfig::new(start, end);
    config.org_filter = validation::sanitize_keyword(&args.org_name)?;
    config.subject_filter = validation::sanitize_keyword(&args.subject)?;
    config.max_span_days = args.max_span_days;
    config.chunk_delay = Duration::from_millis(args.chunk_delay_ms);

    eprintln!(
        "Ingesting declarations from {} to {} into {}",
        start,
        end,
        args.db.display()
    );

    let report = ingest::run(&portal, &mut db, &mut logs, &config).await?;

    eprintln!(
        "Ingest complete: {} records written, {} of {} chunks skipped, {} pages skipped",
        report.records_written, report.chunks_skipped, report.chunks_total, report.pages_skipped
    );
    if report.chunks_skipped > 0 || report.pages_skipped > 0 || report.records_failed > 0 {
        eprintln!(
            "See {}.query.log / {}.page.log / {}.load.err for the skipped work",
            args.err_prefix, args.err_prefix, args.err_prefix
        );
    }
    Ok(())
}
