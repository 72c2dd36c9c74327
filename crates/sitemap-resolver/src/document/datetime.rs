//! W3C datetime values with a precision tag.
//!
//! Sitemaps carry `lastmod` in the W3C NOTE-datetime profile of ISO 8601,
//! which allows values truncated to a year, month or day. The parsed
//! timestamp keeps track of how much of it was actually written.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// How much of a [`W3cDateTime`] was specified in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    /// `YYYY`
    Year,
    /// `YYYY-MM`
    Month,
    /// `YYYY-MM-DD`
    Day,
    /// `YYYY-MM-DDThh:mmTZD`
    Minute,
    /// `YYYY-MM-DDThh:mm:ss[.s]TZD`
    Second,
}

/// A calendar timestamp annotated with its [`Precision`].
///
/// Date-only values are anchored at midnight UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct W3cDateTime {
    value: DateTime<FixedOffset>,
    precision: Precision,
}

/// A string that is not a W3C datetime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid W3C datetime {input:?}")]
pub struct DateTimeError {
    input: String,
}

impl DateTimeError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }

    /// The rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl W3cDateTime {
    /// Build a value from an already-known timestamp and precision.
    pub fn new(value: DateTime<FixedOffset>, precision: Precision) -> Self {
        Self { value, precision }
    }

    /// Parse any of the six W3C datetime forms.
    pub fn parse(input: &str) -> Result<Self, DateTimeError> {
        let s = input.trim();
        let err = || DateTimeError::new(input);

        if let Some((date, time)) = s.split_once(['T', 't']) {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| err())?;
            let (time, offset) = split_offset(time).ok_or_else(err)?;
            let colons = time.matches(':').count();
            let (naive_time, precision) = match colons {
                1 => (
                    NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| err())?,
                    Precision::Minute,
                ),
                2 => (
                    NaiveTime::parse_from_str(time, "%H:%M:%S%.f").map_err(|_| err())?,
                    Precision::Second,
                ),
                _ => return Err(err()),
            };
            let value = date
                .and_time(naive_time)
                .and_local_timezone(offset)
                .single()
                .ok_or_else(err)?;
            return Ok(Self { value, precision });
        }

        let (date, precision) = match s.len() {
            4 if s.bytes().all(|b| b.is_ascii_digit()) => {
                let year = s.parse::<i32>().map_err(|_| err())?;
                (NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(err)?, Precision::Year)
            }
            7 => (
                NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").map_err(|_| err())?,
                Precision::Month,
            ),
            10 => (
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| err())?,
                Precision::Day,
            ),
            _ => return Err(err()),
        };
        let value = date.and_time(NaiveTime::MIN).and_utc().fixed_offset();
        Ok(Self { value, precision })
    }

    /// The timestamp, with the offset it was written in.
    pub fn value(&self) -> DateTime<FixedOffset> {
        self.value
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }
}

/// Split `hh:mm[:ss[.s]]TZD` into the time part and its offset.
fn split_offset(time: &str) -> Option<(&str, FixedOffset)> {
    if let Some(rest) = time.strip_suffix(['Z', 'z']) {
        return Some((rest, FixedOffset::east_opt(0)?));
    }
    let idx = time.rfind(['+', '-'])?;
    let (rest, tz) = time.split_at(idx);
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let (hours, minutes) = tz[1..].split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some((rest, FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))?))
}

impl FromStr for W3cDateTime {
    type Err = DateTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for W3cDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = &self.value;
        match self.precision {
            Precision::Year => write!(f, "{}", v.format("%Y")),
            Precision::Month => write!(f, "{}", v.format("%Y-%m")),
            Precision::Day => write!(f, "{}", v.format("%Y-%m-%d")),
            Precision::Minute => write!(f, "{}", v.format("%Y-%m-%dT%H:%M%:z")),
            Precision::Second => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f%:z")),
        }
    }
}

impl Serialize for W3cDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for W3cDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Utc};

    #[test]
    fn test_parse_day_precision() {
        let dt = W3cDateTime::parse("2005-01-01").unwrap();
        assert_eq!(dt.precision(), Precision::Day);
        assert_eq!(
            dt.value(),
            Utc.with_ymd_and_hms(2005, 1, 1, 0, 0, 0).unwrap().fixed_offset()
        );
    }

    #[test]
    fn test_parse_second_precision_with_offset() {
        let dt = W3cDateTime::parse("2004-10-01T18:23:17+00:00").unwrap();
        assert_eq!(dt.precision(), Precision::Second);
        assert_eq!(dt.value().hour(), 18);
        assert_eq!(dt.value().offset().local_minus_utc(), 0);

        let dt = W3cDateTime::parse("2005-05-10T17:33:30+08:00").unwrap();
        assert_eq!(dt.value().offset().local_minus_utc(), 8 * 3600);
        assert_eq!(dt.value().with_timezone(&Utc).hour(), 9);
    }

    #[test]
    fn test_parse_fraction_and_zulu() {
        let dt = W3cDateTime::parse("1997-07-16T19:20:30.45Z").unwrap();
        assert_eq!(dt.precision(), Precision::Second);
        assert_eq!(dt.value().nanosecond(), 450_000_000);
    }

    #[test]
    fn test_parse_coarse_forms() {
        let year = W3cDateTime::parse("1997").unwrap();
        assert_eq!(year.precision(), Precision::Year);
        assert_eq!(year.value().month(), 1);

        let month = W3cDateTime::parse("1997-07").unwrap();
        assert_eq!(month.precision(), Precision::Month);
        assert_eq!(month.value().month(), 7);

        let minute = W3cDateTime::parse("1997-07-16T19:20-05:00").unwrap();
        assert_eq!(minute.precision(), Precision::Minute);
        assert_eq!(minute.value().offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_reject_garbage() {
        for input in ["", "yesterday", "2005-13-01", "2005-01-01T10:00", "05-01-01", "2005-01-01T25:00Z"] {
            assert!(W3cDateTime::parse(input).is_err(), "accepted {input:?}");
        }
        let err = W3cDateTime::parse("last tuesday").unwrap_err();
        assert_eq!(err.input(), "last tuesday");
    }

    #[test]
    fn test_new_formats_to_its_precision() {
        let value = Utc.with_ymd_and_hms(2005, 1, 1, 12, 30, 15).unwrap().fixed_offset();
        assert_eq!(W3cDateTime::new(value, Precision::Day).to_string(), "2005-01-01");
        assert_eq!(W3cDateTime::new(value, Precision::Month).to_string(), "2005-01");
        let minute = W3cDateTime::new(value, Precision::Minute);
        assert_eq!(minute.to_string(), "2005-01-01T12:30+00:00");
        assert_eq!(minute.value(), value);
    }

    #[test]
    fn test_display_keeps_precision() {
        for input in ["1997", "1997-07", "2005-01-01", "1997-07-16T19:20-05:00", "2004-10-01T18:23:17+00:00"] {
            assert_eq!(W3cDateTime::parse(input).unwrap().to_string(), input);
        }
    }
}
