//! Listen model
//!
//! One row of the Deezer export becomes one [`Listen`]. Row layout:
//!
//! | # | field            | used |
//! |---|------------------|------|
//! | 0 | track title      | yes  |
//! | 1 | artist name      | yes  |
//! | 2 | ISRC             | yes  |
//! | 3 | release title    | yes  |
//! | 4 | client IP        | no   |
//! | 5 | listening time   | no   |
//! | 6 | platform         | no   |
//! | 7 | device model     | no   |
//! | 8 | date, local time | yes  |

use chrono::{LocalResult, NaiveDateTime, TimeZone};
use csv::StringRecord;
use thiserror::Error;

/// Format of the export's date column (local time, no offset)
pub const LISTEN_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fields per export row
pub const EXPECTED_FIELDS: usize = 9;

const DATE_FIELD: usize = 8;

/// Why a row could not become a [`Listen`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListenParseError {
    #[error("expected 9 fields, found {found}")]
    FieldCount { found: usize },

    #[error("invalid date '{value}': {reason}")]
    Timestamp { value: String, reason: String },
}

/// One playback event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listen {
    pub track_name: String,
    pub artist_name: String,
    /// May be empty
    pub isrc: String,
    pub release_name: String,
    /// Seconds since the Unix epoch
    pub listened_at: i64,
}

impl Listen {
    /// Build a listen from an export row, reading the date in `tz`
    ///
    /// Rows shorter than nine fields are rejected; trailing extra fields are ignored.
    pub fn from_record<Tz: TimeZone>(
        record: &StringRecord,
        tz: &Tz,
    ) -> Result<Self, ListenParseError> {
        if record.len() < EXPECTED_FIELDS {
            return Err(ListenParseError::FieldCount {
                found: record.len(),
            });
        }

        let field = |i: usize| record.get(i).unwrap_or_default().to_string();

        Ok(Self {
            track_name: field(0),
            artist_name: field(1),
            isrc: field(2),
            release_name: field(3),
            listened_at: parse_listened_at(record.get(DATE_FIELD).unwrap_or_default(), tz)?,
        })
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` local date into epoch seconds
///
/// A time repeated by a DST fall-back resolves to its earlier instant. A time
/// skipped by a DST spring-forward does not exist and is rejected.
pub fn parse_listened_at<Tz: TimeZone>(value: &str, tz: &Tz) -> Result<i64, ListenParseError> {
    let invalid = |reason: String| ListenParseError::Timestamp {
        value: value.to_string(),
        reason,
    };

    let naive = NaiveDateTime::parse_from_str(value.trim(), LISTEN_DATE_FORMAT)
        .map_err(|e| invalid(e.to_string()))?;

    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.timestamp()),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.timestamp()),
        LocalResult::None => Err(invalid("time does not exist in local time zone".to_string())),
    }
}
