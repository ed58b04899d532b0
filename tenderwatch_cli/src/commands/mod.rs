pub mod ingest;
pub mod notify;
