//! Wall-clock parsing for rota records.
//!
//! The rota API emits local date-times in a handful of shapes and encodes
//! scheduled times as `HHMM` integers. Everything here is lenient: a value that
//! cannot be understood never aborts a batch. Clock records keep such values as
//! [`WireTime::Malformed`] so the classifier can tell them from a time that was
//! never set and turn them into an `Unknown` status.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const WIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a local wall-clock timestamp.
///
/// RFC 3339 values keep their wall-clock reading and drop the offset.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(parsed) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(parsed);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_local())
}

/// Parses a calendar date, also accepting a full timestamp and keeping its date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|dt| dt.date()))
}

/// A scheduled time of day, stored as minutes past midnight.
///
/// `2400` is accepted as the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    /// Minutes in a day; the largest representable value.
    pub const END_OF_DAY: u16 = 24 * 60;

    /// Decodes an `HHMM` integer such as `930` (09:30) or `1745`.
    pub fn from_hhmm(hhmm: u32) -> Option<Self> {
        let hours = hhmm / 100;
        let minutes = hhmm % 100;
        if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
            return None;
        }
        u16::try_from(hours * 60 + minutes).ok().map(Self)
    }

    /// Builds a clock time from minutes past midnight.
    pub const fn from_minute_of_day(minutes: u16) -> Option<Self> {
        if minutes > Self::END_OF_DAY {
            None
        } else {
            Some(Self(minutes))
        }
    }

    /// Minutes past midnight.
    pub const fn minute_of_day(self) -> u16 {
        self.0
    }

    /// The `HHMM` encoding used on the wire.
    pub const fn hhmm(self) -> u32 {
        (self.0 as u32 / 60) * 100 + self.0 as u32 % 60
    }

    /// The instant this clock time falls on for a given date.
    pub fn on(self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(self.0))
    }

    /// Renders as `9:05 am`.
    pub fn to_meridiem(self) -> String {
        let minutes = self.0 % Self::END_OF_DAY;
        let hours = minutes / 60;
        let suffix = if hours < 12 { "am" } else { "pm" };
        let display_hour = match hours % 12 {
            0 => 12,
            h => h,
        };
        format!("{display_hour}:{:02} {suffix}", minutes % 60)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for ClockTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.hhmm())
    }
}

/// A clock-record time as it arrived on the wire.
///
/// `Absent` is a null or missing field, which for an end time means the
/// record is still running. A present value that does not parse is kept
/// verbatim as `Malformed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum WireTime {
    #[default]
    Absent,
    At(NaiveDateTime),
    Malformed(String),
}

impl WireTime {
    /// The parsed instant, if there is one.
    pub const fn at(&self) -> Option<NaiveDateTime> {
        match self {
            Self::At(at) => Some(*at),
            Self::Absent | Self::Malformed(_) => None,
        }
    }

    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

impl From<NaiveDateTime> for WireTime {
    fn from(at: NaiveDateTime) -> Self {
        Self::At(at)
    }
}

impl From<Option<NaiveDateTime>> for WireTime {
    fn from(at: Option<NaiveDateTime>) -> Self {
        at.map_or(Self::Absent, Self::At)
    }
}

impl Serialize for WireTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Absent => serializer.serialize_none(),
            Self::At(at) => serializer.serialize_str(&at.format(WIRE_FORMAT).to_string()),
            Self::Malformed(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for WireTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(serde_json::Value::Null) => Self::Absent,
            Some(serde_json::Value::String(raw)) if raw.trim().is_empty() => Self::Absent,
            Some(serde_json::Value::String(raw)) => match parse_timestamp(&raw) {
                Some(at) => Self::At(at),
                None => Self::Malformed(raw),
            },
            Some(other) => Self::Malformed(other.to_string()),
        })
    }
}

fn value_as_str(value: Option<&serde_json::Value>) -> Option<&str> {
    value.and_then(serde_json::Value::as_str)
}

/// Serde adapter for optional local timestamps.
pub mod lenient_datetime {
    use super::{Deserialize, Deserializer, NaiveDateTime, Serializer, WIRE_FORMAT};

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(WIRE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(super::value_as_str(value.as_ref()).and_then(super::parse_timestamp))
    }
}

/// Serde adapter for optional calendar dates.
pub mod lenient_date {
    use super::{Deserialize, Deserializer, NaiveDate, Serializer};

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(super::value_as_str(value.as_ref()).and_then(super::parse_date))
    }
}

/// Serde adapter for optional `HHMM` clock times, given as integers or digit strings.
pub mod lenient_clock {
    use super::{ClockTime, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<ClockTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(clock) => serializer.serialize_u32(clock.hhmm()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<ClockTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        let hhmm = match value {
            Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Some(serde_json::Value::String(s)) => {
                let digits: String = s.trim().chars().filter(|c| *c != ':').collect();
                digits.parse::<u32>().ok()
            }
            _ => None,
        };
        Ok(hhmm.and_then(ClockTime::from_hhmm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn parses_common_timestamp_shapes() {
        let expected = dt("2025-01-15 09:04:00");
        assert_eq!(parse_timestamp("2025-01-15 09:04:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15T09:04:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15 09:04"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15T09:04:00.000000Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-01-15T09:04:00+01:00"), Some(expected));
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2025-13-40 09:00:00"), None);
    }

    #[test]
    fn parse_date_accepts_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        assert_eq!(parse_date("2025-01-15"), Some(expected));
        assert_eq!(parse_date("2025-01-15 00:00:00"), Some(expected));
        assert_eq!(parse_date("15/01/2025"), None);
    }

    #[test]
    fn clock_time_decodes_hhmm() {
        assert_eq!(ClockTime::from_hhmm(900).unwrap().minute_of_day(), 540);
        assert_eq!(ClockTime::from_hhmm(1745).unwrap().minute_of_day(), 1065);
        assert_eq!(ClockTime::from_hhmm(0).unwrap().minute_of_day(), 0);
        assert_eq!(ClockTime::from_hhmm(2400).unwrap().minute_of_day(), 1440);
        assert!(ClockTime::from_hhmm(960).is_none());
        assert!(ClockTime::from_hhmm(2401).is_none());
        assert!(ClockTime::from_hhmm(2500).is_none());
    }

    #[test]
    fn clock_time_renders() {
        let clock = ClockTime::from_hhmm(905).unwrap();
        assert_eq!(clock.hhmm(), 905);
        assert_eq!(clock.to_string(), "09:05");
        assert_eq!(clock.to_meridiem(), "9:05 am");
        assert_eq!(ClockTime::from_hhmm(0).unwrap().to_meridiem(), "12:00 am");
        assert_eq!(ClockTime::from_hhmm(1330).unwrap().to_meridiem(), "1:30 pm");
    }

    #[test]
    fn clock_time_on_date() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let clock = ClockTime::from_hhmm(2400).unwrap();
        assert_eq!(clock.on(date), dt("2025-01-16 00:00:00"));
    }

    #[test]
    fn wire_time_separates_missing_from_malformed() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default)]
            at: WireTime,
        }

        let parse = |json: &str| serde_json::from_str::<Holder>(json).unwrap().at;
        assert_eq!(parse("{}"), WireTime::Absent);
        assert_eq!(parse(r#"{"at":null}"#), WireTime::Absent);
        assert_eq!(parse(r#"{"at":""}"#), WireTime::Absent);
        assert_eq!(
            parse(r#"{"at":"2025-01-15 09:04:00"}"#),
            WireTime::At(dt("2025-01-15 09:04:00"))
        );
        assert_eq!(
            parse(r#"{"at":"not-a-time"}"#),
            WireTime::Malformed("not-a-time".to_string())
        );
        assert!(parse(r#"{"at":17}"#).is_malformed());
    }

    #[test]
    fn malformed_wire_time_serializes_verbatim() {
        let raw = WireTime::Malformed("soon".to_string());
        assert_eq!(serde_json::to_string(&raw).unwrap(), r#""soon""#);
        assert_eq!(serde_json::to_string(&WireTime::Absent).unwrap(), "null");
        assert_eq!(raw.at(), None);
    }

    #[test]
    fn lenient_clock_accepts_strings_and_numbers() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, with = "lenient_clock")]
            at: Option<ClockTime>,
        }

        let parse = |json: &str| serde_json::from_str::<Holder>(json).unwrap().at;
        assert_eq!(parse(r#"{"at":900}"#), ClockTime::from_hhmm(900));
        assert_eq!(parse(r#"{"at":"0930"}"#), ClockTime::from_hhmm(930));
        assert_eq!(parse(r#"{"at":"17:45"}"#), ClockTime::from_hhmm(1745));
        assert_eq!(parse(r#"{"at":"late"}"#), None);
        assert_eq!(parse(r#"{"at":-5}"#), None);
        assert_eq!(parse("{}"), None);
    }
}
