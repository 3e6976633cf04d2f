//! Per-person presence: last-active timestamps and profile fields.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::PersonId;

/// Elapsed time up to which a person counts as active.
pub const ACTIVE_WITHIN_SECS: i64 = 150;

/// Elapsed time up to which a person counts as idle.
pub const IDLE_WITHIN_SECS: i64 = 30 * 60;

/// Presence and profile snapshot for one person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonPresence {
    #[serde(rename = "hr_id")]
    pub person_id: PersonId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, with = "crate::timestamp::lenient_datetime")]
    pub last_active_at: Option<NaiveDateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
}

/// Live-indicator state derived from the last-active timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Active,
    Idle,
    /// No live signal.
    Offline,
}

impl Activity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
            Self::Offline => "offline",
        }
    }

    /// Indicator dot classes for the web front end.
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Active => "bg-green-500",
            Self::Idle => "bg-yellow-500",
            Self::Offline => "bg-gray-300",
        }
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies activity from the time since a person was last active.
///
/// Timestamps slightly in the future (clock skew) count as active.
pub fn classify_activity(last_active_at: Option<NaiveDateTime>, now: NaiveDateTime) -> Activity {
    let Some(last) = last_active_at else {
        return Activity::Offline;
    };
    let elapsed = (now - last).num_seconds();
    if elapsed <= ACTIVE_WITHIN_SECS {
        Activity::Active
    } else if elapsed <= IDLE_WITHIN_SECS {
        Activity::Idle
    } else {
        Activity::Offline
    }
}

/// Lookup view over the latest presence snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceRoster {
    people: BTreeMap<PersonId, PersonPresence>,
}

impl PresenceRoster {
    /// Builds a roster; a later record for the same person replaces an earlier one.
    pub fn from_records(records: impl IntoIterator<Item = PersonPresence>) -> Self {
        let people = records
            .into_iter()
            .map(|p| (p.person_id.clone(), p))
            .collect();
        Self { people }
    }

    pub fn get(&self, person: &PersonId) -> Option<&PersonPresence> {
        self.people.get(person)
    }

    pub fn job_title(&self, person: &PersonId) -> Option<&str> {
        self.get(person)?.job_title.as_deref()
    }

    pub fn activity(&self, person: &PersonId, now: NaiveDateTime) -> Activity {
        classify_activity(self.get(person).and_then(|p| p.last_active_at), now)
    }

    /// Distinct, non-empty job titles in sorted order.
    pub fn job_titles(&self) -> Vec<String> {
        self.people
            .values()
            .filter_map(|p| p.job_title.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PersonPresence> {
        self.people.values()
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}
