//! The ingestion driver.
//!
//! Walks the requested date range chunk by chunk and each chunk page by
//! page, strictly sequentially. Failures are contained at their own level:
//! a failed summary search skips the chunk, a failed page fetch or an
//! unrecognizable listing skips the page, a malformed row skips the row.
//! Each skip lands in a per-run error artifact so an operator can rerun the
//! missed work; nothing is retried automatically.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;

use crate::chunk::{chunk_range, DateChunk, DEFAULT_MAX_SPAN_DAYS};
use crate::db::Db;
use crate::error::IngestError;
use crate::extract::{extract_declarations, Declaration, ExtractError, HtmlListing};
use crate::portal::{PortalClient, PortalError, SearchSession, PAGE_SIZE};

/// Parameters for one ingestion run. The courtesy constants (chunk span,
/// inter-chunk delay) are fields rather than hard-coded so operators can
/// tune them without a rebuild.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Organization-name filter forwarded to the portal, empty for none.
    pub org_filter: String,
    /// Subject keyword filter forwarded to the portal, empty for none.
    pub subject_filter: String,
    pub max_span_days: i64,
    /// Pause between chunks, keeping the request rate below what the portal
    /// treats as abusive traffic.
    pub chunk_delay: Duration,
}

impl IngestConfig {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            org_filter: String::new(),
            subject_filter: String::new(),
            max_span_days: DEFAULT_MAX_SPAN_DAYS,
            chunk_delay: Duration::from_secs(1),
        }
    }
}

/// The per-run error artifacts: skipped chunks (`<prefix>.query.log`, one
/// tab-separated start/end per line), skipped pages (`<prefix>.page.log`,
/// one page URL per line), and rejected writes (`<prefix>.load.err`).
/// Created by the caller and scoped to one run, so tests get isolated logs.
pub struct RunLogs {
    range_log: File,
    page_log: File,
    load_log: File,
}

impl RunLogs {
    pub fn create(prefix: impl Into<PathBuf>) -> std::io::Result<Self> {
        let prefix = prefix.into();
        let open = |suffix: &str| {
            let mut path = prefix.clone().into_os_string();
            path.push(suffix);
            OpenOptions::new().create(true).append(true).open(path)
        };
        Ok(Self {
            range_log: open(".query.log")?,
            page_log: open(".page.log")?,
            load_log: open(".load.err")?,
        })
    }

    fn skipped_chunk(&mut self, chunk: &DateChunk) -> std::io::Result<()> {
        writeln!(self.range_log, "{}\t{}", chunk.start, chunk.end)
    }

    fn skipped_page(&mut self, page_url: &str) -> std::io::Result<()> {
        writeln!(self.page_log, "{}", page_url)
    }

    fn failed_write(&mut self, id: &str, err: &rusqlite::Error) -> std::io::Result<()> {
        writeln!(self.load_log, "{}\t{}", id, err)
    }
}

/// Counters for the end-of-run summary. Not persisted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub chunks_total: usize,
    pub chunks_skipped: usize,
    pub pages_skipped: usize,
    pub records_written: usize,
    pub records_failed: usize,
}

#[derive(thiserror::Error, Debug)]
enum PageError {
    #[error(transparent)]
    Portal(#[from] PortalError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Runs one ingestion pass over `[config.start, config.end]`.
///
/// Fails fast on an inverted range or a storage/log failure; everything the
/// portal can do wrong is absorbed into the skip logs.
pub async fn run(
    portal: &PortalClient,
    db: &mut Db,
    logs: &mut RunLogs,
    config: &IngestConfig,
) -> Result<IngestReport, IngestError> {
    let chunks = chunk_range(config.start, config.end, config.max_span_days)?;
    let mut report = IngestReport {
        chunks_total: chunks.len(),
        ..Default::default()
    };

    for (index, chunk) in chunks.iter().enumerate() {
        tracing::info!(start = %chunk.start, end = %chunk.end, "searching for declarations");

        let session = match portal
            .search(chunk, &config.org_filter, &config.subject_filter)
            .await
        {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(start = %chunk.start, end = %chunk.end, %err, "chunk skipped");
                logs.skipped_chunk(chunk)?;
                report.chunks_skipped += 1;
                continue;
            }
        };
        tracing::info!(count = session.record_count(), "declarations in range");

        let mut records = Vec::new();
        for page in 1..=session.page_count() {
            tracing::info!(
                "retrieving declarations ({} / {})",
                (page * PAGE_SIZE).min(session.record_count()),
                session.record_count()
            );
            match fetch_and_extract(&session, page, portal.base_url()).await {
                Ok((mut page_records, row_errors)) => {
                    for err in row_errors {
                        tracing::warn!(page, %err, "row skipped");
                    }
                    records.append(&mut page_records);
                }
                Err(err) => {
                    tracing::warn!(page, %err, "page skipped");
                    logs.skipped_page(&session.page_url(page))?;
                    report.pages_skipped += 1;
                }
            }
        }

        // One commit per chunk: everything parsed from this chunk becomes
        // durable together.
        let write = db.upsert_declarations(&records)?;
        report.records_written += write.written;
        report.records_failed += write.failed.len();
        for (id, err) in &write.failed {
            logs.failed_write(id, err)?;
        }

        if index + 1 < chunks.len() && !config.chunk_delay.is_zero() {
            tokio::time::sleep(config.chunk_delay).await;
        }
    }

    tracing::info!(
        written = report.records_written,
        chunks_skipped = report.chunks_skipped,
        pages_skipped = report.pages_skipped,
        "ingestion run finished"
    );
    Ok(report)
}

async fn fetch_and_extract(
    session: &SearchSession,
    page: i64,
    base_url: &str,
) -> Result<(Vec<Declaration>, Vec<ExtractError>), PageError> {
    let html = session.fetch_page(page).await?;
    let doc = HtmlListing::parse(&html);
    Ok(extract_declarations(&doc, base_url)?)
}
