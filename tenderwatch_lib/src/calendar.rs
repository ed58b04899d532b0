//! ROC (Minguo) calendar conversion.
//!
//! The portal expresses every date in the Republic of China era, offset
//! 1911 years from the Gregorian calendar. Queries are sent in ROC form and
//! listing cells are parsed back from it.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Years between the ROC era and the Gregorian calendar.
pub const ROC_YEAR_OFFSET: i32 = 1911;

/// A parsed portal date, with or without a time-of-day component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RocInstant {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl RocInstant {
    /// The calendar date, dropping any time component.
    pub fn date(&self) -> NaiveDate {
        match self {
            RocInstant::Date(d) => *d,
            RocInstant::DateTime(dt) => dt.date(),
        }
    }

    /// Renders the value for a TEXT column (`YYYY-MM-DD` or
    /// `YYYY-MM-DD HH:MM:SS`), so date ordering works lexicographically.
    pub fn to_sql_string(&self) -> String {
        match self {
            RocInstant::Date(d) => d.format("%Y-%m-%d").to_string(),
            RocInstant::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Formats a Gregorian date as a ROC date string, e.g. `113/05/20` with a
/// `/` separator or `1130520` with an empty one.
pub fn to_roc(date: NaiveDate, separator: &str) -> String {
    format!(
        "{}{sep}{:02}{sep}{:02}",
        date.year() - ROC_YEAR_OFFSET,
        date.month(),
        date.day(),
        sep = separator
    )
}

/// Parses a ROC date string of the form `Y/M/D`, optionally followed by
/// whitespace and `H:M`. Returns `None` when the text does not match the
/// pattern or names an impossible date; callers treat that as "field
/// absent", not as an error.
pub fn from_roc(text: &str) -> Option<RocInstant> {
    let re = Regex::new(r"^(?P<y>\d+)/(?P<m>\d+)/(?P<d>\d+)\s*(?:(?P<hh>\d+):(?P<mm>\d+))?").ok()?;
    let caps = re.captures(text.trim())?;

    let year: i32 = caps["y"].parse().ok()?;
    let month: u32 = caps["m"].parse().ok()?;
    let day: u32 = caps["d"].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year + ROC_YEAR_OFFSET, month, day)?;

    match (caps.name("hh"), caps.name("mm")) {
        (Some(hh), Some(mm)) => {
            let hour: u32 = hh.as_str().parse().ok()?;
            let minute: u32 = mm.as_str().parse().ok()?;
            let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
            Some(RocInstant::DateTime(date.and_time(time)))
        }
        _ => Some(RocInstant::Date(date)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn to_roc_with_separator() {
        assert_eq!(to_roc(date(2024, 5, 20), "/"), "113/05/20");
    }

    #[test]
    fn to_roc_without_separator() {
        assert_eq!(to_roc(date(2024, 5, 20), ""), "1130520");
    }

    #[test]
    fn from_roc_date_only() {
        assert_eq!(
            from_roc("113/05/20"),
            Some(RocInstant::Date(date(2024, 5, 20)))
        );
    }

    #[test]
    fn from_roc_with_time() {
        let expected = date(2024, 5, 20).and_hms_opt(14, 30, 0).unwrap();
        assert_eq!(
            from_roc("113/05/20 14:30"),
            Some(RocInstant::DateTime(expected))
        );
    }

    #[test]
    fn from_roc_tolerates_surrounding_whitespace() {
        assert_eq!(
            from_roc("  113/05/20  "),
            Some(RocInstant::Date(date(2024, 5, 20)))
        );
    }

    #[test]
    fn from_roc_rejects_garbage() {
        assert_eq!(from_roc("not-a-date"), None);
        assert_eq!(from_roc(""), None);
        assert_eq!(from_roc("113-05-20"), None);
    }

    #[test]
    fn from_roc_rejects_impossible_dates() {
        assert_eq!(from_roc("113/13/01"), None);
        assert_eq!(from_roc("113/02/30"), None);
        assert_eq!(from_roc("113/05/20 25:00"), None);
    }

    #[test]
    fn round_trip() {
        for ymd in [(2024, 1, 1), (2024, 2, 29), (1991, 12, 31), (2035, 7, 4)] {
            let d = date(ymd.0, ymd.1, ymd.2);
            assert_eq!(from_roc(&to_roc(d, "/")), Some(RocInstant::Date(d)));
        }
    }

    #[test]
    fn sql_strings() {
        assert_eq!(
            RocInstant::Date(date(2024, 5, 20)).to_sql_string(),
            "2024-05-20"
        );
        let dt = date(2024, 5, 20).and_hms_opt(14, 30, 0).unwrap();
        assert_eq!(
            RocInstant::DateTime(dt).to_sql_string(),
            "2024-05-20 14:30:00"
        );
    }
}
