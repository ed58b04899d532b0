//! Date-range chunking.
//!
//! The portal rejects queries spanning more than about three months, so a
//! requested range is cut into consecutive sub-ranges before searching.

use chrono::{Duration, NaiveDate};

use crate::error::IngestError;

/// Widest query the portal accepts, in calendar days. 89 rather than 90
/// keeps a chunk inside three months even when one of them is February.
pub const DEFAULT_MAX_SPAN_DAYS: i64 = 89;

/// An inclusive sub-range of the requested declaration date span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateChunk {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateChunk {
    /// Number of calendar days covered, counting both endpoints.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Splits `[start, end]` into chunks of at most `max_span_days` days each.
/// Chunk `i + 1` starts the day after chunk `i` ends, so the chunks are
/// contiguous, non-overlapping, and jointly cover the whole range.
pub fn chunk_range(
    start: NaiveDate,
    end: NaiveDate,
    max_span_days: i64,
) -> Result<Vec<DateChunk>, IngestError> {
    if start > end {
        return Err(IngestError::InvalidRange { start, end });
    }
    if max_span_days < 1 {
        return Err(IngestError::InvalidInput(format!(
            "max span must be at least one day, got {}",
            max_span_days
        )));
    }

    let mut chunks = Vec::new();
    let mut chunk_start = start;
    loop {
        let chunk_end = end.min(chunk_start + Duration::days(max_span_days - 1));
        chunks.push(DateChunk {
            start: chunk_start,
            end: chunk_end,
        });
        if chunk_end == end {
            break;
        }
        chunk_start = chunk_end + Duration::days(1);
    }
    Ok(chunks)
}
