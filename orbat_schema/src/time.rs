use std::{fmt, str::FromStr};

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A timestamp as it appears in documents: epoch milliseconds or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl Default for TimeValue {
    fn default() -> Self {
        TimeValue::Millis(0)
    }
}

impl From<i64> for TimeValue {
    fn from(value: i64) -> Self {
        TimeValue::Millis(value)
    }
}

impl From<&str> for TimeValue {
    fn from(value: &str) -> Self {
        TimeValue::Text(value.to_string())
    }
}

impl TimeValue {
    pub fn to_millis(&self) -> Result<i64, TimestampError> {
        match self {
            TimeValue::Millis(value) => Ok(*value),
            TimeValue::Fractional(value) if value.is_finite() => Ok(value.round() as i64),
            TimeValue::Fractional(value) => Err(TimestampError::NonFinite(*value)),
            TimeValue::Text(text) => parse_timestamp(text),
        }
    }

    /// Render as RFC 3339 text when the instant is representable, else as a number.
    pub fn from_millis(millis: i64) -> Self {
        match format_timestamp(millis) {
            Some(text) => TimeValue::Text(text),
            None => TimeValue::Millis(millis),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("unrecognised timestamp '{0}'")]
    Unrecognised(String),
    #[error("timestamp {0} is not finite")]
    NonFinite(f64),
}

/// Parse textual timestamps into epoch milliseconds.
///
/// Accepts integers, RFC 3339, naive date-times (read as UTC) and bare dates.
pub fn parse_timestamp(input: &str) -> Result<i64, TimestampError> {
    let trimmed = input.trim();
    if let Ok(millis) = trimmed.parse::<i64>() {
        return Ok(millis);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.timestamp_millis());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp_millis());
        }
    }
    Err(TimestampError::Unrecognised(input.to_string()))
}

pub fn format_timestamp(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|instant| instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Calendar unit used by relative time navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Millisecond => "millisecond",
            TimeUnit::Second => "second",
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
            TimeUnit::Year => "year",
        }
    }

    fn fixed_millis(self) -> Option<i64> {
        match self {
            TimeUnit::Millisecond => Some(1),
            TimeUnit::Second => Some(1_000),
            TimeUnit::Minute => Some(60_000),
            TimeUnit::Hour => Some(3_600_000),
            TimeUnit::Day => Some(86_400_000),
            TimeUnit::Week => Some(604_800_000),
            TimeUnit::Month | TimeUnit::Year => None,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // Single-letter shorthands are case sensitive: "M" is month, "m" is minute.
        match value {
            "ms" => return Ok(TimeUnit::Millisecond),
            "s" => return Ok(TimeUnit::Second),
            "m" => return Ok(TimeUnit::Minute),
            "h" => return Ok(TimeUnit::Hour),
            "d" => return Ok(TimeUnit::Day),
            "w" => return Ok(TimeUnit::Week),
            "M" => return Ok(TimeUnit::Month),
            "y" => return Ok(TimeUnit::Year),
            _ => {}
        }
        let lowered = value.to_ascii_lowercase();
        let singular = lowered.strip_suffix('s').unwrap_or(&lowered);
        match singular {
            "millisecond" => Ok(TimeUnit::Millisecond),
            "second" => Ok(TimeUnit::Second),
            "minute" => Ok(TimeUnit::Minute),
            "hour" => Ok(TimeUnit::Hour),
            "day" => Ok(TimeUnit::Day),
            "week" => Ok(TimeUnit::Week),
            "month" => Ok(TimeUnit::Month),
            "year" => Ok(TimeUnit::Year),
            _ => Err(value.to_string()),
        }
    }
}

/// Shift an epoch-millisecond instant by `amount` units.
///
/// Months and years follow the calendar, clamping to the last day of shorter
/// months. Returns `None` on overflow or when the instant is out of range.
pub fn shift_millis(millis: i64, amount: i64, unit: TimeUnit) -> Option<i64> {
    if let Some(step) = unit.fixed_millis() {
        return amount.checked_mul(step).and_then(|delta| millis.checked_add(delta));
    }
    let months = match unit {
        TimeUnit::Year => amount.checked_mul(12)?,
        _ => amount,
    };
    let instant = DateTime::<Utc>::from_timestamp_millis(millis)?;
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    let shifted = if months >= 0 {
        instant.checked_add_months(magnitude)?
    } else {
        instant.checked_sub_months(magnitude)?
    };
    Some(shifted.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc3339_and_naive_forms() {
        assert_eq!(parse_timestamp("1970-01-01T00:00:01Z"), Ok(1_000));
        assert_eq!(parse_timestamp("1970-01-01T01:00:00+01:00"), Ok(0));
        assert_eq!(parse_timestamp("1970-01-02"), Ok(86_400_000));
        assert_eq!(parse_timestamp("1970-01-01T00:01"), Ok(60_000));
        assert_eq!(parse_timestamp(" 1234 "), Ok(1_234));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_timestamp("next tuesday"),
            Err(TimestampError::Unrecognised(_))
        ));
        assert!(TimeValue::Fractional(f64::NAN).to_millis().is_err());
    }

    #[test]
    fn time_value_accepts_numbers_and_text() {
        let number: TimeValue = serde_json::from_str("1500").expect("number");
        let text: TimeValue = serde_json::from_str("\"1970-01-01T00:00:01.500Z\"").expect("text");
        assert_eq!(number.to_millis(), Ok(1_500));
        assert_eq!(text.to_millis(), Ok(1_500));
        assert_eq!(
            TimeValue::from_millis(1_500),
            TimeValue::Text("1970-01-01T00:00:01.500Z".to_string())
        );
    }

    #[test]
    fn month_shift_clamps_to_month_end() {
        let jan_31 = parse_timestamp("2024-01-31T12:00:00Z").expect("date");
        let feb_29 = parse_timestamp("2024-02-29T12:00:00Z").expect("date");
        assert_eq!(shift_millis(jan_31, 1, TimeUnit::Month), Some(feb_29));
        assert_eq!(shift_millis(feb_29, -1, TimeUnit::Month), parse_timestamp("2024-01-29T12:00:00Z").ok());
        assert_eq!(shift_millis(0, 2, TimeUnit::Hour), Some(7_200_000));
    }

    #[test]
    fn unit_shorthands_are_case_sensitive() {
        assert_eq!("M".parse::<TimeUnit>(), Ok(TimeUnit::Month));
        assert_eq!("m".parse::<TimeUnit>(), Ok(TimeUnit::Minute));
        assert_eq!("Days".parse::<TimeUnit>(), Ok(TimeUnit::Day));
        assert!("fortnight".parse::<TimeUnit>().is_err());
    }
}
