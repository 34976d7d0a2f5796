use chrono::Duration;

use crate::CatcherError;

/// Default recording length when none is given on the command line
pub const DEFAULT_DURATION: &str = "00:30:00";

/// Why a duration string was rejected
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("expected 3 fields separated by ':', found {found}")]
    WrongFieldCount { found: usize },

    #[error("field {position} ({field:?}) is not an integer")]
    NonNumericField { position: usize, field: String },

    #[error("duration is too large")]
    OutOfRange,
}

/// Parse an `hh:mm:ss` string into a duration.
///
/// Each field is parsed as a plain integer; fields are not range checked, so
/// `0:90:00` is an hour and a half.
pub fn parse_duration(input: &str) -> Result<Duration, CatcherError> {
    parse_fields(input).map_err(|source| CatcherError::InvalidDurationFormat {
        input: input.to_string(),
        source,
    })
}

fn parse_fields(input: &str) -> Result<Duration, DurationParseError> {
    let fields: Vec<&str> = input.split(':').collect();
    if fields.len() != 3 {
        return Err(DurationParseError::WrongFieldCount {
            found: fields.len(),
        });
    }

    let mut values = [0i64; 3];
    for (position, (field, value)) in fields.iter().zip(values.iter_mut()).enumerate() {
        *value = field
            .trim()
            .parse::<i64>()
            .map_err(|_| DurationParseError::NonNumericField {
                position: position + 1,
                field: field.to_string(),
            })?;
    }

    let [hours, minutes, seconds] = values;
    Duration::try_hours(hours)
        .zip(Duration::try_minutes(minutes))
        .zip(Duration::try_seconds(seconds))
        .and_then(|((h, m), s)| h.checked_add(&m)?.checked_add(&s))
        .ok_or(DurationParseError::OutOfRange)
}
