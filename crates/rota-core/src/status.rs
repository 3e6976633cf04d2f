//! Attendance statuses and their display attributes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The attendance verdict for one shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Sick,
    /// Time fields needed for a verdict are missing or malformed.
    Unknown,
    Absent,
    /// Scheduled shift ended without any clock-on.
    Awol,
    Reduced,
    Late,
    Attended,
    /// Walk-in coverage: worked without a scheduled shift.
    Surplus,
    /// Not yet due.
    Upcoming,
}

impl AttendanceStatus {
    /// Statuses offered by the status filter, in label order.
    pub const FILTERABLE: [Self; 7] = [
        Self::Absent,
        Self::Attended,
        Self::Awol,
        Self::Late,
        Self::Reduced,
        Self::Sick,
        Self::Surplus,
    ];

    /// Tie-break rank when several verdicts apply to the same shift; lowest wins.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Sick => 0,
            Self::Unknown => 1,
            Self::Absent => 2,
            Self::Awol => 3,
            Self::Reduced => 4,
            Self::Late => 5,
            Self::Attended => 6,
            Self::Surplus => 7,
            Self::Upcoming => 8,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Sick => "Sick",
            Self::Absent => "Absent",
            Self::Awol => "Awol",
            Self::Reduced => "Reduced",
            Self::Late => "Late",
            Self::Attended => "Attended",
            Self::Surplus => "Surplus",
            Self::Upcoming => "Upcoming",
        }
    }

    pub const fn tone(self) -> StatusTone {
        match self {
            Self::Attended => StatusTone::Positive,
            Self::Late | Self::Reduced => StatusTone::Caution,
            Self::Absent | Self::Awol => StatusTone::Critical,
            Self::Sick => StatusTone::Medical,
            Self::Surplus => StatusTone::Highlight,
            Self::Upcoming | Self::Unknown => StatusTone::Neutral,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for unknown status strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown attendance status: {0}")]
pub struct UnknownStatus(String);

impl FromStr for AttendanceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "sick" => Ok(Self::Sick),
            "absent" => Ok(Self::Absent),
            "awol" => Ok(Self::Awol),
            "reduced" => Ok(Self::Reduced),
            "late" => Ok(Self::Late),
            "attended" => Ok(Self::Attended),
            "surplus" => Ok(Self::Surplus),
            "upcoming" => Ok(Self::Upcoming),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Colour family used to render a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusTone {
    Positive,
    Caution,
    Critical,
    Medical,
    Highlight,
    Neutral,
}

impl StatusTone {
    /// Badge classes for the web front end.
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Positive => "bg-green-50 text-green-700 ring-green-600/20",
            Self::Caution => "bg-yellow-50 text-yellow-800 ring-yellow-600/20",
            Self::Critical => "bg-red-50 text-red-700 ring-red-600/10",
            Self::Medical => "bg-purple-50 text-purple-700 ring-purple-700/10",
            Self::Highlight => "bg-orange-50 text-orange-700 ring-orange-600/20",
            Self::Neutral => "bg-gray-50 text-gray-600 ring-gray-500/10",
        }
    }
}
