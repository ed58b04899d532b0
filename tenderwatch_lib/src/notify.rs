//! Subscriber digests.
//!
//! Reads already-ingested rows per subscriber filter, renders a plain-text
//! digest, and mails it over authenticated SMTP. Subscriber filters come
//! from a JSON file: an array of `{ "email": [..], "keyword_org": [..],
//! "keyword_subject": [..], "min_budget": .. }` entries, the keyword and
//! budget fields optional.

use std::path::Path;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Deserialize;

use crate::db::StoredDeclaration;

/// Subject line of every digest mail.
pub const DIGEST_SUBJECT: &str = "政府採購網標案公告通知";

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("cannot read subscriber config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid subscriber config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("cannot build mail: {0}")]
    Mail(#[from] lettre::error::Error),
    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// One subscriber entry from the notification config.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Subscriber {
    pub email: Vec<String>,
    #[serde(default)]
    pub keyword_org: Vec<String>,
    #[serde(default)]
    pub keyword_subject: Vec<String>,
    #[serde(default)]
    pub min_budget: Option<i64>,
}

pub fn load_subscribers(path: impl AsRef<Path>) -> Result<Vec<Subscriber>, NotifyError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Renders matching declarations as one labeled block per case.
pub fn render_digest(rows: &[StoredDeclaration]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!("標案案號：{}\n", row.id));
        out.push_str(&format!("機關名稱：{}\n", row.org_name));
        out.push_str(&format!("標案名稱：{}\n", row.subject));
        out.push_str(&format!("招標方式：{}\n", row.method));
        out.push_str(&format!("採購性質：{}\n", row.category));
        out.push_str(&format!(
            "公告日期：{}\n",
            row.declare_date.as_deref().unwrap_or("-")
        ));
        out.push_str(&format!(
            "截止投標日期：{}\n",
            row.deadline.as_deref().unwrap_or("-")
        ));
        match row.budget {
            Some(budget) => out.push_str(&format!("預算金額：{}\n", budget)),
            None => out.push_str("預算金額：-\n"),
        }
        out.push_str(&format!("標案網址：{}\n\n", row.url));
    }
    out
}

/// SMTP sender with basic authentication. The authenticated user is also
/// the envelope sender.
pub struct Mailer {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl Mailer {
    pub fn new(host: &str, username: &str, password: &str) -> Result<Self, NotifyError> {
        let transport = SmtpTransport::relay(host)?
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();
        Ok(Self {
            transport,
            sender: username.parse()?,
        })
    }

    pub fn send(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), NotifyError> {
        let mut builder = Message::builder().from(self.sender.clone()).subject(subject);
        for recipient in recipients {
            builder = builder.to(recipient.parse()?);
        }
        let message = builder.body(body.to_string())?;
        tracing::info!(recipients = recipients.len(), "sending notification mail");
        self.transport.send(&message)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_config_defaults_optional_fields() {
        let json = r#"[
            {"email": ["a@example.com"], "keyword_org": ["衛生"]},
            {"email": ["b@example.com", "c@example.com"],
             "keyword_subject": ["資安"], "min_budget": 1000000}
        ]"#;
        let subscribers: Vec<Subscriber> = serde_json::from_str(json).unwrap();
        assert_eq!(subscribers.len(), 2);
        assert_eq!(subscribers[0].keyword_subject, Vec::<String>::new());
        assert_eq!(subscribers[0].min_budget, None);
        assert_eq!(subscribers[1].email.len(), 2);
        assert_eq!(subscribers[1].min_budget, Some(1_000_000));
    }

    #[test]
    fn digest_lists_every_field_per_case() {
        let rows = vec![StoredDeclaration {
            id: "113A0001".into(),
            org_name: "機關甲".into(),
            subject: "113A0001 測試案".into(),
            method: "公開招標".into(),
            category: "工程".into(),
            declare_date: Some("2024-05-20".into()),
            deadline: None,
            budget: Some(500_000),
            url: "http://web.pcc.gov.tw/tps/pss/tpam/main.do?pkid=1".into(),
        }];
        let digest = render_digest(&rows);
        assert!(digest.contains("標案案號：113A0001\n"));
        assert!(digest.contains("公告日期：2024-05-20\n"));
        assert!(digest.contains("截止投標日期：-\n"));
        assert!(digest.contains("預算金額：500000\n"));
        assert!(digest.ends_with("\n\n"));
    }

    #[test]
    fn empty_result_renders_empty_digest() {
        assert_eq!(render_digest(&[]), "");
    }
}
