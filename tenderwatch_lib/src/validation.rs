//! Validation for caller-supplied parameters, applied at the CLI boundary
//! before anything touches the portal or the store.

use chrono::NaiveDate;

use crate::error::IngestError;

pub const MAX_KEYWORD_LENGTH: usize = 100;

/// Parses the compact `YYYYMMDD` date form the CLI accepts.
pub fn parse_compact_date(input: &str) -> Result<NaiveDate, IngestError> {
    NaiveDate::parse_from_str(input.trim(), "%Y%m%d")
        .map_err(|_| IngestError::InvalidInput(format!("invalid date {:?}, expected YYYYMMDD", input)))
}

/// Rejects inverted ranges before the run starts.
pub fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), IngestError> {
    if start > end {
        return Err(IngestError::InvalidRange { start, end });
    }
    Ok(())
}

/// Trims a filter keyword, strips ASCII control characters, and enforces a
/// length cap. The cap counts characters, so CJK keywords get the same
/// allowance as ASCII ones.
pub fn sanitize_keyword(input: &str) -> Result<String, IngestError> {
    let keyword: String = input
        .trim()
        .chars()
        .filter(|c| !c.is_ascii_control())
        .collect();
    if keyword.chars().count() > MAX_KEYWORD_LENGTH {
        return Err(IngestError::InvalidInput(format!(
            "keyword exceeds maximum length of {} characters",
            MAX_KEYWORD_LENGTH
        )));
    }
    Ok(keyword)
}
