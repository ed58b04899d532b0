//! Ingestion library for Taiwan government e-procurement declarations.
//!
//! Harvests newly published tender declarations from the paginated portal
//! search, normalizes them, and upserts them into SQLite keyed by case
//! number; a thin notification layer reads the same table to mail
//! subscriber digests.

pub mod calendar;
pub mod chunk;
pub mod db;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod notify;
pub mod portal;
pub mod validation;

pub use calendar::{from_roc, to_roc, RocInstant};
pub use chunk::{chunk_range, DateChunk, DEFAULT_MAX_SPAN_DAYS};
pub use db::{ChunkWriteReport, Db, DbError, NotifyFilter, StoredDeclaration};
pub use error::IngestError;
pub use extract::{extract_declarations, Declaration, ExtractError, HtmlListing, ListingDocument, ListingRow};
pub use ingest::{IngestConfig, IngestReport, RunLogs};
pub use notify::{load_subscribers, render_digest, Mailer, NotifyError, Subscriber, DIGEST_SUBJECT};
pub use portal::{PortalClient, PortalError, SearchSession, PAGE_SIZE, SEARCH_BASE_URL};
