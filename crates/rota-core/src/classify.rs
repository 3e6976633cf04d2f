//! Attendance classification.
//!
//! Fuses one shift with the person's timesheets and exception events into a
//! single [`AttendanceStatus`]. Classification is a pure function of its
//! inputs and `now`; it keeps no memory between calls.
//!
//! # Algorithm Summary
//!
//! 1. Resolve the window: the schedule for allocated shifts, the observed
//!    clock-on/clock-off span for unallocated shifts and walk-ins.
//! 2. Collect every verdict that applies (sickness, absence, reduction,
//!    lateness, attendance, surplus).
//! 3. Pick the candidate with the lowest [`AttendanceStatus::rank`].
//!
//! Missing or malformed time fields on a record that could bear on the shift
//! add an `Unknown` candidate, which outranks everything but sickness. Events
//! or timesheets that have not been fetched yet simply do not contribute.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::event::{Event, EventCategory};
use crate::record::{Shift, ShiftWindow, Timesheet};
use crate::status::{AttendanceStatus, StatusTone};

/// Tunables for classification.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Permitted lateness before a clock-on counts as late.
    /// Default: 5 minutes.
    pub grace_minutes: i64,

    /// How long before the scheduled start a clock-on still counts toward
    /// the shift. Default: 120 minutes.
    pub early_clock_on_minutes: i64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            grace_minutes: 5,
            early_clock_on_minutes: 120,
        }
    }
}

/// Result of classifying one shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub status: AttendanceStatus,

    /// When the person was due: the scheduled start, or the first clock-on
    /// for observed shifts.
    pub due: Option<NaiveDateTime>,

    /// Scheduled end, or the last clock-off (`now` while clocked in) for
    /// observed shifts.
    pub end: Option<NaiveDateTime>,

    /// Due time after a reduction covering the start of the shift.
    pub effective_due: Option<NaiveDateTime>,

    /// Earliest clock-on counted toward this shift.
    pub clocked_on_at: Option<NaiveDateTime>,

    pub scheduled_minutes: i64,
    pub reduced_minutes: i64,
    pub worked_minutes: i64,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            status: AttendanceStatus::Unknown,
            due: None,
            end: None,
            effective_due: None,
            clocked_on_at: None,
            scheduled_minutes: 0,
            reduced_minutes: 0,
            worked_minutes: 0,
        }
    }

    pub const fn tone(&self) -> StatusTone {
        self.status.tone()
    }

    pub const fn css_class(&self) -> &'static str {
        self.status.tone().css_class()
    }

    /// Scheduled minutes left after reductions.
    pub fn adjusted_minutes(&self) -> i64 {
        (self.scheduled_minutes - self.reduced_minutes).max(0)
    }
}

/// Classifies a shift, or a walk-in when `shift` is `None`.
///
/// With a shift, only records belonging to the shift's person are
/// considered. Without one, `timesheets` and `events` must already be
/// narrowed to the walk-in person.
pub fn classify(
    shift: Option<&Shift>,
    timesheets: &[Timesheet],
    events: &[Event],
    now: NaiveDateTime,
    config: &ClassifierConfig,
) -> Classification {
    let person = shift.map(|s| &s.person_id);
    let timesheets: Vec<&Timesheet> = timesheets
        .iter()
        .filter(|t| person.is_none_or(|p| &t.person_id == p))
        .collect();
    let events: Vec<&Event> = events
        .iter()
        .filter(|e| person.is_none_or(|p| &e.person_id == p))
        .collect();

    match shift {
        Some(shift) if !shift.unallocated => {
            classify_scheduled(shift, &timesheets, &events, now, config)
        }
        _ => classify_observed(shift, &timesheets, &events, now),
    }
}

fn classify_scheduled(
    shift: &Shift,
    timesheets: &[&Timesheet],
    events: &[&Event],
    now: NaiveDateTime,
    config: &ClassifierConfig,
) -> Classification {
    let Some(window) = shift.window() else {
        tracing::trace!(shift_id = %shift.id, "shift has no usable schedule");
        return Classification::unknown();
    };

    let mut candidates = Vec::new();
    let unusable_sheet = timesheets
        .iter()
        .any(|t| t.has_unusable_times() && could_belong(t, &window, config));
    let unusable_event = events
        .iter()
        .any(|e| e.has_unusable_times() && could_touch(e, Some(shift), &window));
    if unusable_sheet || unusable_event {
        tracing::trace!(shift_id = %shift.id, "shift has records with unusable times");
        candidates.push(AttendanceStatus::Unknown);
    }

    let counted: Vec<&Timesheet> = timesheets
        .iter()
        .copied()
        .filter(|t| counts_toward(t, &window, now, config))
        .collect();
    let clocked_on_at = counted.iter().filter_map(|t| t.on_time.at()).min();
    let worked_minutes = worked_minutes(&counted, now);

    let relevant: Vec<&Event> = events
        .iter()
        .copied()
        .filter(|e| touches(e, Some(shift), &window, window.end))
        .collect();
    let touching = |category: EventCategory| {
        relevant
            .iter()
            .copied()
            .filter(move |e| e.category == category)
    };

    let reductions = merge_intervals(
        touching(EventCategory::Reduced)
            .filter_map(|e| e.interval(window.end))
            .map(|(on, off)| (on.max(window.start), off.min(window.end)))
            .filter(|(on, off)| off > on)
            .collect(),
    );
    let has_reduction = touching(EventCategory::Reduced).next().is_some();
    let reduced_minutes: i64 = reductions
        .iter()
        .map(|(on, off)| (*off - *on).num_minutes())
        .sum();
    let effective_due = match reductions.first() {
        Some((on, off)) if *on <= window.start => *off,
        _ => window.start,
    };
    let remaining_minutes = window.minutes() - reduced_minutes;
    let grace = Duration::minutes(config.grace_minutes);

    if touching(EventCategory::Sick).next().is_some() {
        candidates.push(AttendanceStatus::Sick);
    }
    if touching(EventCategory::Absent).next().is_some() {
        candidates.push(AttendanceStatus::Absent);
    }

    candidates.push(match clocked_on_at {
        Some(_) if remaining_minutes <= 0 => AttendanceStatus::Reduced,
        Some(on) if on > effective_due + grace => AttendanceStatus::Late,
        Some(_) => AttendanceStatus::Attended,
        None if has_reduction => AttendanceStatus::Reduced,
        None if now >= window.end => AttendanceStatus::Awol,
        None if now > effective_due + grace => AttendanceStatus::Absent,
        None => AttendanceStatus::Upcoming,
    });

    Classification {
        status: pick(candidates),
        due: Some(window.start),
        end: Some(window.end),
        effective_due: Some(effective_due),
        clocked_on_at,
        scheduled_minutes: window.minutes(),
        reduced_minutes,
        worked_minutes,
    }
}

fn classify_observed(
    shift: Option<&Shift>,
    timesheets: &[&Timesheet],
    events: &[&Event],
    now: NaiveDateTime,
) -> Classification {
    let mut candidates = Vec::new();
    if timesheets.iter().any(|t| t.has_unusable_times()) {
        candidates.push(AttendanceStatus::Unknown);
    }

    let Some(first_on) = timesheets.iter().filter_map(|t| t.on_time.at()).min() else {
        return Classification::unknown();
    };
    let last_off = if timesheets.iter().any(|t| t.is_open()) {
        now.max(first_on)
    } else {
        timesheets
            .iter()
            .filter_map(|t| t.off_time.at())
            .max()
            .unwrap_or(first_on)
            .max(first_on)
    };
    let window = ShiftWindow {
        start: first_on,
        end: last_off,
    };

    for event in events {
        let status = match event.category {
            EventCategory::Sick => AttendanceStatus::Sick,
            EventCategory::Absent => AttendanceStatus::Absent,
            EventCategory::Reduced | EventCategory::Other(_) => continue,
        };
        if touches(event, shift, &window, window.end.max(now)) {
            candidates.push(status);
        } else if event.has_unusable_times() && could_touch(event, shift, &window) {
            candidates.push(AttendanceStatus::Unknown);
        }
    }
    candidates.push(AttendanceStatus::Surplus);

    Classification {
        status: pick(candidates),
        due: Some(window.start),
        end: Some(window.end),
        effective_due: Some(window.start),
        clocked_on_at: Some(first_on),
        scheduled_minutes: 0,
        reduced_minutes: 0,
        worked_minutes: worked_minutes(timesheets, now),
    }
}

/// Lowest rank wins.
fn pick(candidates: Vec<AttendanceStatus>) -> AttendanceStatus {
    candidates
        .into_iter()
        .min_by_key(|status| status.rank())
        .unwrap_or(AttendanceStatus::Unknown)
}

fn attached(event: &Event, shift: Option<&Shift>) -> bool {
    shift.is_some_and(|s| event.shift_id.as_ref() == Some(&s.id))
}

/// Whether an event applies to the shift: explicitly attached, or overlapping
/// the window. Ongoing events run until `open_end`.
fn touches(
    event: &Event,
    shift: Option<&Shift>,
    window: &ShiftWindow,
    open_end: NaiveDateTime,
) -> bool {
    attached(event, shift)
        || event
            .interval(open_end)
            .is_some_and(|(on, off)| window.overlaps(on, off))
}

/// Whether a classifying event with an unusable time might overlap the
/// window. Whatever time survived must not rule the overlap out.
fn could_touch(event: &Event, shift: Option<&Shift>, window: &ShiftWindow) -> bool {
    if matches!(event.category, EventCategory::Other(_)) {
        return false;
    }
    if attached(event, shift) {
        return true;
    }
    match (event.on_time.at(), event.off_time.at()) {
        (Some(on), _) => on < window.end,
        (None, Some(off)) => off > window.start,
        (None, None) => true,
    }
}

/// Whether a timesheet with an unusable time might have counted toward the
/// shift, judged from whichever time survived.
fn could_belong(
    timesheet: &Timesheet,
    window: &ShiftWindow,
    config: &ClassifierConfig,
) -> bool {
    let early = window.start - Duration::minutes(config.early_clock_on_minutes);
    match (timesheet.on_time.at(), timesheet.off_time.at()) {
        (Some(on), _) => on < window.end && (on >= early || on.date() == window.start.date()),
        (None, Some(off)) => off > early && off.date() <= window.end.date(),
        (None, None) => true,
    }
}

/// Whether a timesheet's clock-on belongs to this shift.
///
/// Clock-ons from the early window up to the scheduled end count, as does a
/// same-day timesheet started earlier that is still running at the start.
fn counts_toward(
    timesheet: &Timesheet,
    window: &ShiftWindow,
    now: NaiveDateTime,
    config: &ClassifierConfig,
) -> bool {
    let Some((on, off)) = timesheet.interval(now) else {
        return false;
    };
    let early = window.start - Duration::minutes(config.early_clock_on_minutes);
    if on >= early && on < window.end {
        return true;
    }
    on < early && off > window.start && on.date() == window.start.date()
}

fn worked_minutes(timesheets: &[&Timesheet], now: NaiveDateTime) -> i64 {
    timesheets
        .iter()
        .filter_map(|t| t.interval(now))
        .map(|(on, off)| (off - on).num_minutes())
        .sum()
}

fn merge_intervals(
    mut intervals: Vec<(NaiveDateTime, NaiveDateTime)>,
) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    intervals.sort_unstable();
    let mut merged: Vec<(NaiveDateTime, NaiveDateTime)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}
