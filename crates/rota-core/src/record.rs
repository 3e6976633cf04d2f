//! Scheduled shifts, clock records and call logs as served by the rota API.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::timestamp::{ClockTime, WireTime};
use crate::types::{PersonId, ShiftId};

/// A scheduled or ad hoc work interval for one person on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    #[serde(rename = "unq_id")]
    pub id: ShiftId,

    #[serde(rename = "hr_id")]
    pub person_id: PersonId,

    /// Display name of the person working the shift.
    #[serde(rename = "agent", default, skip_serializing_if = "Option::is_none")]
    pub person_name: Option<String>,

    #[serde(rename = "shiftdate", default, with = "crate::timestamp::lenient_date")]
    pub date: Option<NaiveDate>,

    #[serde(rename = "shiftstart", default, with = "crate::timestamp::lenient_clock")]
    pub start: Option<ClockTime>,

    #[serde(rename = "shiftend", default, with = "crate::timestamp::lenient_clock")]
    pub end: Option<ClockTime>,

    /// No schedule exists; the shift is purely observed from clock records.
    #[serde(default)]
    pub unallocated: bool,
}

/// The concrete scheduled interval of a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ShiftWindow {
    pub fn minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Whether `[start, end)` intersects this window.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end && end > self.start
    }

    /// Minutes of `[start, end)` that fall inside this window.
    pub fn overlap_minutes(&self, start: NaiveDateTime, end: NaiveDateTime) -> i64 {
        let from = start.max(self.start);
        let to = end.min(self.end);
        (to - from).num_minutes().max(0)
    }
}

impl Shift {
    /// Resolves the scheduled window.
    ///
    /// An end at or before the start means the shift runs past midnight.
    /// Returns `None` when the date or either clock time is missing.
    pub fn window(&self) -> Option<ShiftWindow> {
        let date = self.date?;
        let start = self.start?.on(date);
        let mut end = self.end?.on(date);
        if end <= start {
            end += Duration::days(1);
        }
        Some(ShiftWindow { start, end })
    }
}

/// An observed clock-on/clock-off pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timesheet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,

    #[serde(rename = "hr_id")]
    pub person_id: PersonId,

    /// Kind of clock record (e.g. "Shift", "Break") for display.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub on_time: WireTime,

    /// Absent while the person is still clocked in.
    #[serde(default)]
    pub off_time: WireTime,
}

impl Timesheet {
    /// The worked interval, with an open timesheet running until `now`.
    ///
    /// Returns `None` when either time is unusable.
    pub fn interval(&self, now: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let on = self.on_time.at()?;
        let off = match &self.off_time {
            WireTime::At(off) => *off,
            WireTime::Absent => now,
            WireTime::Malformed(_) => return None,
        };
        Some((on, off.max(on)))
    }

    pub const fn is_open(&self) -> bool {
        self.off_time.is_absent()
    }

    /// A missing clock-on, or a clock-on or clock-off that did not parse.
    pub const fn has_unusable_times(&self) -> bool {
        self.on_time.at().is_none() || self.off_time.is_malformed()
    }
}

/// A telephony record. Carried through to presentation untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    #[serde(rename = "hr_id")]
    pub person_id: PersonId,

    #[serde(default, with = "crate::timestamp::lenient_datetime")]
    pub timestamp: Option<NaiveDateTime>,

    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
