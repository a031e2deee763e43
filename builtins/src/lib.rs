pub mod meta;

use std::string::String as StdString;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use meta::{normalized_value, Error, Whitespace};

// Lexical forms admit ASCII digits only.
lazy_static! {
    static ref DATE: Regex =
        Regex::new(r"^(-?[0-9]{4,})-([0-9]{2})-([0-9]{2})(Z|[+-][0-9]{2}:[0-9]{2})?$").unwrap();
    static ref TIME: Regex = Regex::new(
        r"^([0-9]{2}):([0-9]{2}):([0-9]{2})(?:\.([0-9]+))?(Z|[+-][0-9]{2}:[0-9]{2})?$"
    )
    .unwrap();
    static ref DATE_TIME: Regex = Regex::new(
        r"^(-?[0-9]{4,})-([0-9]{2})-([0-9]{2})T([0-9]{2}):([0-9]{2}):([0-9]{2})(?:\.([0-9]+))?(Z|[+-][0-9]{2}:[0-9]{2})?$"
    )
    .unwrap();
    static ref POSITIVE_INTEGER: Regex = Regex::new(r"^\+?([0-9]+)$").unwrap();
}

/// Timezone offset in seconds east of UTC, `None` if the literal carries no timezone.
fn timezone_offset(tz: Option<&str>) -> Option<i32> {
    let tz = tz?;
    if tz == "Z" {
        return Some(0);
    }
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let hours: i32 = tz[1..3].parse().ok()?;
    let minutes: i32 = tz[4..6].parse().ok()?;
    if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

fn number<T: std::str::FromStr>(captures: &Captures, index: usize) -> Option<T> {
    captures.get(index)?.as_str().parse().ok()
}

/// Fractional seconds as nanoseconds; digits past the ninth are truncated.
fn nanoseconds(fraction: Option<&str>) -> Option<u32> {
    let Some(fraction) = fraction else {
        return Some(0);
    };
    let digits: StdString = fraction.chars().chain(std::iter::repeat('0')).take(9).collect();
    digits.parse().ok()
}

fn calendar_date(captures: &Captures, type_name: &'static str, literal: &str) -> Result<NaiveDate, Error> {
    let year: i32 = number(captures, 1).ok_or_else(|| Error::out_of_range(type_name, literal))?;
    let month: u32 = number(captures, 2).ok_or_else(|| Error::invalid(type_name, literal))?;
    let day: u32 = number(captures, 3).ok_or_else(|| Error::invalid(type_name, literal))?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| Error::out_of_range(type_name, literal))
}

/// Returns the time of day and whether it was the end-of-day value `24:00:00`.
fn clock_time(
    captures: &Captures,
    first: usize,
    type_name: &'static str,
    literal: &str,
) -> Result<(NaiveTime, bool), Error> {
    let hour: u32 = number(captures, first).ok_or_else(|| Error::invalid(type_name, literal))?;
    let minute: u32 = number(captures, first + 1).ok_or_else(|| Error::invalid(type_name, literal))?;
    let second: u32 = number(captures, first + 2).ok_or_else(|| Error::invalid(type_name, literal))?;
    let nanos = nanoseconds(captures.get(first + 3).map(|m| m.as_str()))
        .ok_or_else(|| Error::invalid(type_name, literal))?;

    if hour == 24 {
        return if minute == 0 && second == 0 && nanos == 0 {
            Ok((NaiveTime::MIN, true))
        } else {
            Err(Error::out_of_range(type_name, literal))
        };
    }

    // Leap seconds are not representable.
    if second > 59 {
        return Err(Error::out_of_range(type_name, literal));
    }

    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
        .map(|t| (t, false))
        .ok_or_else(|| Error::out_of_range(type_name, literal))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Date(pub NaiveDate);

impl Date {
    pub const TYPE_NAME: &'static str = "date";

    /// Maps an `xs:date` literal. The optional timezone does not shift the calendar date.
    pub fn from_literal(literal: &str) -> Result<Self, Error> {
        let literal = normalized_value(literal, Whitespace::Collapse);
        let captures = DATE
            .captures(&literal)
            .ok_or_else(|| Error::invalid(Self::TYPE_NAME, &literal))?;
        let tz = captures.get(4).map(|m| m.as_str());
        if tz.is_some() && timezone_offset(tz).is_none() {
            return Err(Error::out_of_range(Self::TYPE_NAME, &literal));
        }
        calendar_date(&captures, Self::TYPE_NAME, &literal).map(Self)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Time(pub NaiveTime);

impl Time {
    pub const TYPE_NAME: &'static str = "time";

    /// Maps an `xs:time` literal, normalized to UTC when a timezone is present.
    pub fn from_literal(literal: &str) -> Result<Self, Error> {
        let literal = normalized_value(literal, Whitespace::Collapse);
        let captures = TIME
            .captures(&literal)
            .ok_or_else(|| Error::invalid(Self::TYPE_NAME, &literal))?;
        let (time, _) = clock_time(&captures, 1, Self::TYPE_NAME, &literal)?;
        let tz = captures.get(5).map(|m| m.as_str());
        let offset = match (tz, timezone_offset(tz)) {
            (None, _) => 0,
            (Some(_), Some(offset)) => offset,
            (Some(_), None) => return Err(Error::out_of_range(Self::TYPE_NAME, &literal)),
        };
        let (utc, _) = time.overflowing_sub_signed(chrono::Duration::seconds(i64::from(offset)));
        Ok(Self(utc))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DateTime(pub chrono::DateTime<Utc>);

impl DateTime {
    pub const TYPE_NAME: &'static str = "dateTime";

    /// Maps an `xs:dateTime` literal. A literal without timezone is read as UTC.
    pub fn from_literal(literal: &str) -> Result<Self, Error> {
        let literal = normalized_value(literal, Whitespace::Collapse);
        let captures = DATE_TIME
            .captures(&literal)
            .ok_or_else(|| Error::invalid(Self::TYPE_NAME, &literal))?;
        let date = calendar_date(&captures, Self::TYPE_NAME, &literal)?;
        let (time, end_of_day) = clock_time(&captures, 4, Self::TYPE_NAME, &literal)?;
        let date = if end_of_day {
            date.succ_opt()
                .ok_or_else(|| Error::out_of_range(Self::TYPE_NAME, &literal))?
        } else {
            date
        };
        let local = NaiveDateTime::new(date, time);

        let tz = captures.get(8).map(|m| m.as_str());
        let value = match tz {
            None => Utc.from_utc_datetime(&local),
            Some(_) => {
                let offset = timezone_offset(tz)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| Error::out_of_range(Self::TYPE_NAME, &literal))?;
                offset
                    .from_local_datetime(&local)
                    .single()
                    .ok_or_else(|| Error::out_of_range(Self::TYPE_NAME, &literal))?
                    .with_timezone(&Utc)
            }
        };
        Ok(Self(value))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PositiveInteger(pub i64);

impl PositiveInteger {
    pub const TYPE_NAME: &'static str = "positiveInteger";

    pub fn from_literal(literal: &str) -> Result<Self, Error> {
        let literal = normalized_value(literal, Whitespace::Collapse);
        let captures = POSITIVE_INTEGER
            .captures(&literal)
            .ok_or_else(|| Error::invalid(Self::TYPE_NAME, &literal))?;
        let digits = captures[1].trim_start_matches('0');
        if digits.is_empty() {
            // all zeros
            return Err(Error::out_of_range(Self::TYPE_NAME, &literal));
        }
        digits
            .parse::<i64>()
            .map(Self)
            .map_err(|_| Error::out_of_range(Self::TYPE_NAME, &literal))
    }
}

// Built-in types defined using native rust types, only used for literal mapping
pub struct String(());

impl String {
    pub const TYPE_NAME: &'static str = "string";

    pub fn from_literal(literal: &str) -> Result<StdString, Error> {
        Ok(literal.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn date_with_and_without_timezone() {
        let plain = Date::from_literal("2002-09-24").unwrap();
        assert_eq!(plain.0, NaiveDate::from_ymd_opt(2002, 9, 24).unwrap());

        let zoned = Date::from_literal(" 2002-09-24-06:00 ").unwrap();
        assert_eq!(zoned, plain);
        assert_eq!(Date::from_literal("2002-09-24Z").unwrap(), plain);
    }

    #[test]
    fn date_rejects_bad_literals() {
        assert!(matches!(
            Date::from_literal("24.09.2002"),
            Err(Error::InvalidLiteral { .. })
        ));
        assert!(matches!(
            Date::from_literal("2002-02-30"),
            Err(Error::OutOfRange { .. })
        ));
        assert!(Date::from_literal("2002-09-24+15:00").is_err());
    }

    #[test]
    fn time_is_normalized_to_utc() {
        let time = Time::from_literal("09:30:10.5+02:00").unwrap().0;
        assert_eq!((time.hour(), time.minute(), time.second()), (7, 30, 10));
        assert_eq!(time.nanosecond(), 500_000_000);

        let wrapped = Time::from_literal("01:00:00+02:00").unwrap().0;
        assert_eq!(wrapped.hour(), 23);
    }

    #[test]
    fn time_end_of_day_is_midnight() {
        assert_eq!(Time::from_literal("24:00:00").unwrap().0, NaiveTime::MIN);
        assert!(Time::from_literal("24:00:01").is_err());
        assert!(Time::from_literal("12:60:00").is_err());
    }

    #[test]
    fn non_ascii_digits_are_invalid() {
        // U+0665 ARABIC-INDIC DIGIT FIVE
        assert!(matches!(
            Time::from_literal("12:00:00.\u{0665}"),
            Err(Error::InvalidLiteral { .. })
        ));
        assert!(Date::from_literal("200\u{0665}-09-24").is_err());
        assert!(DateTime::from_literal("2002-09-24T12:00:0\u{0665}Z").is_err());
        assert!(PositiveInteger::from_literal("\u{0665}").is_err());
    }

    #[test]
    fn unparsable_fraction_is_rejected() {
        assert_eq!(nanoseconds(None), Some(0));
        assert_eq!(nanoseconds(Some("25")), Some(250_000_000));
        assert_eq!(nanoseconds(Some("1234567891")), Some(123_456_789));
        assert_eq!(nanoseconds(Some("\u{0665}")), None);
    }

    #[test]
    fn date_time_defaults_to_utc() {
        let value = DateTime::from_literal("1965-08-01T00:00:00").unwrap().0;
        let zulu = DateTime::from_literal("1965-08-01T00:00:00Z").unwrap().0;
        assert_eq!(value, zulu);
        assert_eq!(value.year(), 1965);
    }

    #[test]
    fn date_time_applies_offset() {
        let value = DateTime::from_literal("2002-05-30T09:00:00-06:00").unwrap().0;
        assert_eq!(value.to_rfc3339(), "2002-05-30T15:00:00+00:00");

        let rollover = DateTime::from_literal("1999-12-31T24:00:00Z").unwrap().0;
        assert_eq!(rollover.to_rfc3339(), "2000-01-01T00:00:00+00:00");
    }

    #[test]
    fn date_time_rejects_date_only() {
        assert!(DateTime::from_literal("1965-08-01").is_err());
    }

    #[test]
    fn positive_integer_bounds() {
        assert_eq!(PositiveInteger::from_literal("+0042").unwrap().0, 42);
        assert_eq!(PositiveInteger::from_literal("\n 7 ").unwrap().0, 7);
        assert!(matches!(
            PositiveInteger::from_literal("0"),
            Err(Error::OutOfRange { .. })
        ));
        assert!(matches!(
            PositiveInteger::from_literal("-3"),
            Err(Error::InvalidLiteral { .. })
        ));
        assert!(PositiveInteger::from_literal("99999999999999999999").is_err());
        assert!(PositiveInteger::from_literal("twelve").is_err());
    }

    #[test]
    fn string_is_verbatim() {
        assert_eq!(String::from_literal("  Dune ").unwrap(), "  Dune ");
    }
}
