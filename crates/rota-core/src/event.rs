//! Exception events: sickness, reduced hours and absence intervals.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::timestamp::WireTime;
use crate::types::{EventId, PersonId, ShiftId, optional_shift_id};

/// Category of an exception event.
///
/// Unrecognized categories are kept verbatim so they still show in the
/// activity log; they never influence classification.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Sick,
    Reduced,
    Absent,
    Other(String),
}

impl Default for EventCategory {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl EventCategory {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sick => "Sick",
            Self::Reduced => "Reduced",
            Self::Absent => "Absent",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "sick" | "sickness" => Self::Sick,
            "reduced" | "reduction" => Self::Reduced,
            "absent" | "absence" => Self::Absent,
            _ => Self::Other(trimmed.to_string()),
        })
    }
}

impl Serialize for EventCategory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        let Ok(category) = s.parse::<Self>();
        Ok(category)
    }
}

/// An exception interval attached to a person and usually to a shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,

    /// The shift this event was raised against, when known.
    #[serde(default, deserialize_with = "optional_shift_id")]
    pub shift_id: Option<ShiftId>,

    #[serde(rename = "hr_id")]
    pub person_id: PersonId,

    #[serde(default)]
    pub category: EventCategory,

    #[serde(default)]
    pub on_time: WireTime,

    /// Absent while the event is ongoing.
    #[serde(default)]
    pub off_time: WireTime,
}

impl Event {
    /// The event interval, with an ongoing event running until `open_end`.
    ///
    /// Returns `None` when either time is unusable or the interval is empty.
    pub fn interval(&self, open_end: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let on = self.on_time.at()?;
        let off = match &self.off_time {
            WireTime::At(off) => *off,
            WireTime::Absent => open_end,
            WireTime::Malformed(_) => return None,
        };
        (off > on).then_some((on, off))
    }

    pub const fn is_ongoing(&self) -> bool {
        self.off_time.is_absent()
    }

    /// A missing start, or a start or end that did not parse.
    pub const fn has_unusable_times(&self) -> bool {
        self.on_time.at().is_none() || self.off_time.is_malformed()
    }
}
