//! The per-shift detail view: hours summary and a merged activity log.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::aggregate::{BoardRow, DayBoard};
use crate::event::Event;
use crate::record::Timesheet;
use crate::status::AttendanceStatus;
use crate::types::{EventId, PersonId, ShiftId};

/// Formats minutes as `HH:MM`. Negative values clamp to zero.
pub fn format_hours(minutes: i64) -> String {
    let minutes = minutes.max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Formats minutes as `Xh Ym`.
pub fn format_duration(minutes: i64) -> String {
    let minutes = minutes.max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

fn format_clock(at: Option<NaiveDateTime>) -> String {
    at.map_or_else(|| "-".to_string(), |at| at.format("%-I:%M %p").to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySource {
    Timesheet,
    Event,
}

/// One line of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub source: EntrySource,
    pub started: Option<NaiveDateTime>,
    pub ended: Option<NaiveDateTime>,
    /// Event category, or the timesheet type.
    pub category: String,
    /// Set for events; the handle for removal.
    pub event_id: Option<EventId>,
}

impl ActivityEntry {
    fn from_timesheet(sheet: &Timesheet) -> Self {
        Self {
            source: EntrySource::Timesheet,
            started: sheet.on_time.at(),
            ended: sheet.off_time.at(),
            category: sheet
                .kind
                .clone()
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_else(|| "N/A".to_string()),
            event_id: None,
        }
    }

    fn from_event(event: &Event) -> Self {
        let category = event.category.as_str();
        Self {
            source: EntrySource::Event,
            started: event.on_time.at(),
            ended: event.off_time.at(),
            category: if category.is_empty() {
                "N/A".to_string()
            } else {
                category.to_string()
            },
            event_id: Some(event.id.clone()),
        }
    }

    pub const fn removable(&self) -> bool {
        self.event_id.is_some()
    }

    /// Closed entries only.
    pub fn duration_minutes(&self) -> Option<i64> {
        Some((self.ended? - self.started?).num_minutes())
    }

    pub fn started_label(&self) -> String {
        format_clock(self.started)
    }

    pub fn ended_label(&self) -> String {
        format_clock(self.ended)
    }

    pub fn duration_label(&self) -> String {
        self.duration_minutes()
            .map_or_else(|| "-".to_string(), format_duration)
    }
}

/// Everything shown for one selected row.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftDetail {
    pub shift_id: Option<ShiftId>,
    pub person_id: PersonId,
    pub person_name: Option<String>,
    pub status: AttendanceStatus,
    pub scheduled_start: Option<NaiveDateTime>,
    pub scheduled_end: Option<NaiveDateTime>,
    pub actual_start: Option<NaiveDateTime>,
    /// Scheduled time after reductions, `HH:MM`.
    pub scheduled_hours: String,
    /// Clocked time with open timesheets counted up to now, `HH:MM`.
    pub worked_hours: String,
    pub entries: Vec<ActivityEntry>,
}

impl ShiftDetail {
    pub fn from_row(row: &BoardRow) -> Self {
        let classification = &row.classification;
        let scheduled = row.shift.as_ref().filter(|s| !s.unallocated);

        let mut entries: Vec<ActivityEntry> = row
            .timesheets
            .iter()
            .map(ActivityEntry::from_timesheet)
            .chain(row.events.iter().map(ActivityEntry::from_event))
            .collect();
        // Undated entries sink to the bottom.
        entries.sort_by_key(|e| (e.started.is_none(), e.started));

        Self {
            shift_id: row.shift_id().cloned(),
            person_id: row.person_id.clone(),
            person_name: row.person_name.clone(),
            status: classification.status,
            scheduled_start: scheduled.and(classification.due),
            scheduled_end: scheduled.and(classification.end),
            actual_start: row
                .timesheets
                .iter()
                .filter_map(|t| t.on_time.at())
                .min(),
            scheduled_hours: format_hours(classification.adjusted_minutes()),
            worked_hours: format_hours(classification.worked_minutes),
            entries,
        }
    }
}

/// Finds the selected row again on a freshly built board.
///
/// Rows are matched by shift id, walk-ins by person. When the row is gone
/// the last seen copy is returned so the view does not go blank.
pub fn resolve_selected<'a>(board: &'a DayBoard, last_seen: &'a BoardRow) -> &'a BoardRow {
    let found = match last_seen.shift_id() {
        Some(id) => board.find_shift(id),
        None => board
            .rows()
            .find(|row| row.shift.is_none() && row.person_id == last_seen.person_id),
    };
    found.unwrap_or(last_seen)
}
