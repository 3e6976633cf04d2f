//! Grouping and filtering a day's shifts into start-time buckets.
//!
//! Buckets are keyed by the scheduled start rounded down to the bucket
//! granularity and ordered ascending, with the `Unallocated` bucket last.
//! Rows inside a bucket are ordered by person id, then shift id, so the same
//! inputs always produce the same board.
//!
//! Filtering is a pipeline of dimensions: checked options within a dimension
//! combine with OR, dimensions combine with AND, and a dimension with nothing
//! checked lets every row through.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::classify::{Classification, ClassifierConfig, classify};
use crate::event::Event;
use crate::presence::{Activity, PresenceRoster};
use crate::record::{CallRecord, Shift, Timesheet};
use crate::status::AttendanceStatus;
use crate::timestamp::ClockTime;
use crate::types::{PersonId, ShiftId};

/// Configuration for grouping.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Width of a start-time bucket. Default: 15 minutes.
    pub bucket_minutes: u16,

    pub classifier: ClassifierConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: 15,
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Bucket identity. Derived ordering puts every start time before `Unallocated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKey {
    Starting(ClockTime),
    Unallocated,
}

impl BucketKey {
    /// Buckets a shift by its rounded scheduled start.
    ///
    /// Unallocated shifts and shifts without a usable start go to `Unallocated`.
    pub fn for_shift(shift: &Shift, bucket_minutes: u16) -> Self {
        if shift.unallocated {
            return Self::Unallocated;
        }
        let Some(start) = shift.start else {
            return Self::Unallocated;
        };
        let width = bucket_minutes.max(1);
        let minute = start.minute_of_day();
        ClockTime::from_minute_of_day(minute - minute % width)
            .map_or(Self::Unallocated, Self::Starting)
    }

    pub fn label(&self) -> String {
        match self {
            Self::Starting(start) => format!("Starting: {}", start.to_meridiem()),
            Self::Unallocated => "Unallocated".to_string(),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Snapshots feeding one board.
#[derive(Debug, Clone, Copy)]
pub struct BoardInputs<'a> {
    pub shifts: &'a [Shift],
    pub timesheets: &'a [Timesheet],
    pub events: &'a [Event],
    pub calls: &'a [CallRecord],
    pub roster: &'a PresenceRoster,
}

/// One line on the board: a shift, or a walk-in with no shift.
#[derive(Debug, Clone, Serialize)]
pub struct BoardRow {
    pub person_id: PersonId,
    pub person_name: Option<String>,
    pub shift: Option<Shift>,
    pub classification: Classification,
    pub job_title: Option<String>,
    pub activity: Activity,
    pub timesheets: Vec<Timesheet>,
    pub events: Vec<Event>,
    pub calls: Vec<CallRecord>,
}

impl BoardRow {
    pub fn shift_id(&self) -> Option<&ShiftId> {
        self.shift.as_ref().map(|s| &s.id)
    }

    pub const fn status(&self) -> AttendanceStatus {
        self.classification.status
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    pub key: BucketKey,
    pub label: String,
    pub rows: Vec<BoardRow>,
}

/// A day's shifts grouped for display.
#[derive(Debug, Clone, Serialize)]
pub struct DayBoard {
    pub date: NaiveDate,
    pub buckets: Vec<Bucket>,
}

impl DayBoard {
    pub fn rows(&self) -> impl Iterator<Item = &BoardRow> {
        self.buckets.iter().flat_map(|b| b.rows.iter())
    }

    pub fn row_count(&self) -> usize {
        self.buckets.iter().map(|b| b.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn find_shift(&self, id: &ShiftId) -> Option<&BoardRow> {
        self.rows().find(|row| row.shift_id() == Some(id))
    }

    /// Row counts per status, in rank order.
    pub fn status_counts(&self) -> Vec<(AttendanceStatus, usize)> {
        let mut counts: BTreeMap<u8, (AttendanceStatus, usize)> = BTreeMap::new();
        for row in self.rows() {
            let status = row.status();
            counts.entry(status.rank()).or_insert((status, 0)).1 += 1;
        }
        counts.into_values().collect()
    }
}

/// Per-person index over a snapshot slice.
struct ByPerson<'a, T> {
    map: HashMap<&'a PersonId, Vec<&'a T>>,
}

impl<'a, T> ByPerson<'a, T> {
    fn new(records: &'a [T], person: impl Fn(&T) -> &PersonId) -> Self {
        let mut map: HashMap<&'a PersonId, Vec<&'a T>> = HashMap::new();
        for record in records {
            map.entry(person(record)).or_default().push(record);
        }
        Self { map }
    }

    fn get(&self, person: &PersonId) -> &[&'a T] {
        self.map.get(person).map(Vec::as_slice).unwrap_or_default()
    }

    fn cloned(&self, person: &PersonId) -> Vec<T>
    where
        T: Clone,
    {
        self.get(person).iter().map(|r| (*r).clone()).collect()
    }
}

/// Groups, classifies and filters the shifts of `date`.
///
/// People with timesheets on the day but no shift appear as walk-in rows
/// in the `Unallocated` bucket. Shifts without a date are kept so that
/// malformed records surface as `Unknown` instead of vanishing.
pub fn group_shifts(
    date: NaiveDate,
    inputs: &BoardInputs<'_>,
    filters: &FilterSet,
    config: &AggregatorConfig,
    now: NaiveDateTime,
) -> DayBoard {
    let timesheets = ByPerson::new(inputs.timesheets, |t| &t.person_id);
    let events = ByPerson::new(inputs.events, |e| &e.person_id);
    let calls = ByPerson::new(inputs.calls, |c| &c.person_id);

    let day_shifts: Vec<&Shift> = inputs
        .shifts
        .iter()
        .filter(|s| s.date.is_none_or(|d| d == date))
        .collect();

    let make_row = |shift: Option<&Shift>, person: &PersonId| {
        let person_timesheets = timesheets.cloned(person);
        let person_events = events.cloned(person);
        let classification = classify(
            shift,
            &person_timesheets,
            &person_events,
            now,
            &config.classifier,
        );
        let presence = inputs.roster.get(person);
        BoardRow {
            person_id: person.clone(),
            person_name: shift
                .and_then(|s| s.person_name.clone())
                .or_else(|| presence.and_then(|p| p.name.clone())),
            shift: shift.cloned(),
            classification,
            job_title: presence.and_then(|p| p.job_title.clone()),
            activity: inputs.roster.activity(person, now),
            timesheets: person_timesheets,
            events: person_events,
            calls: calls.cloned(person),
        }
    };

    let mut buckets: BTreeMap<BucketKey, Vec<BoardRow>> = BTreeMap::new();
    for shift in day_shifts.iter().copied() {
        let row = make_row(Some(shift), &shift.person_id);
        if filters.matches(&row) {
            buckets
                .entry(BucketKey::for_shift(shift, config.bucket_minutes))
                .or_default()
                .push(row);
        }
    }

    let mut walk_ins: Vec<&PersonId> = timesheets
        .map
        .iter()
        .filter(|(_, sheets)| {
            sheets
                .iter()
                .any(|t| t.on_time.at().is_some_and(|on| on.date() == date))
        })
        .map(|(person, _)| *person)
        .filter(|person| !day_shifts.iter().any(|s| &s.person_id == *person))
        .collect();
    walk_ins.sort();
    for person in walk_ins {
        let row = make_row(None, person);
        if filters.matches(&row) {
            buckets.entry(BucketKey::Unallocated).or_default().push(row);
        }
    }

    let buckets = buckets
        .into_iter()
        .map(|(key, mut rows)| {
            rows.sort_by(|a, b| {
                a.person_id
                    .cmp(&b.person_id)
                    .then_with(|| a.shift_id().cmp(&b.shift_id()))
            });
            Bucket {
                key,
                label: key.label(),
                rows,
            }
        })
        .collect();

    DayBoard { date, buckets }
}

// ========== Filters ==========

/// A dimension the board can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDimension {
    JobTitle,
    Status,
}

impl FilterDimension {
    pub const fn id(self) -> &'static str {
        match self {
            Self::JobTitle => "job_title",
            Self::Status => "status",
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::JobTitle => "Job Title",
            Self::Status => "Status",
        }
    }

    /// The predicate this dimension supplies for one chosen option.
    pub fn matches(self, row: &BoardRow, value: &str) -> bool {
        match self {
            Self::JobTitle => row.job_title.as_deref() == Some(value),
            Self::Status => row.status().as_str() == value,
        }
    }
}

/// Error type for unknown filter dimension ids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown filter dimension: {0}")]
pub struct UnknownDimension(String);

impl FromStr for FilterDimension {
    type Err = UnknownDimension;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job_title" => Ok(Self::JobTitle),
            "status" => Ok(Self::Status),
            _ => Err(UnknownDimension(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
    pub checked: bool,
}

impl FilterOption {
    fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
            checked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSection {
    pub dimension: FilterDimension,
    pub options: Vec<FilterOption>,
}

impl FilterSection {
    fn new(dimension: FilterDimension, values: impl IntoIterator<Item = String>) -> Self {
        let mut options: Vec<FilterOption> = values.into_iter().map(FilterOption::new).collect();
        options.sort_by(|a, b| a.label.cmp(&b.label));
        options.dedup_by(|a, b| a.value == b.value);
        Self { dimension, options }
    }

    /// OR across checked options; passes everything when none are checked.
    pub fn matches(&self, row: &BoardRow) -> bool {
        let mut checked = self.options.iter().filter(|o| o.checked).peekable();
        if checked.peek().is_none() {
            return true;
        }
        checked.any(|o| self.dimension.matches(row, &o.value))
    }

    pub fn checked_values(&self) -> impl Iterator<Item = &str> {
        self.options
            .iter()
            .filter(|o| o.checked)
            .map(|o| o.value.as_str())
    }
}

/// The board's filter state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSet {
    sections: Vec<FilterSection>,
}

impl FilterSet {
    /// Job title options come from the roster; status options are fixed.
    pub fn standard(roster: &PresenceRoster) -> Self {
        Self {
            sections: vec![
                FilterSection::new(FilterDimension::JobTitle, roster.job_titles()),
                FilterSection::new(
                    FilterDimension::Status,
                    AttendanceStatus::FILTERABLE
                        .iter()
                        .map(|s| s.as_str().to_string()),
                ),
            ],
        }
    }

    pub fn sections(&self) -> &[FilterSection] {
        &self.sections
    }

    pub fn section(&self, dimension: FilterDimension) -> Option<&FilterSection> {
        self.sections.iter().find(|s| s.dimension == dimension)
    }

    /// Checks or unchecks an option. Checking a value the dimension does not
    /// offer yet adds it, so a filter on an unseen job title matches nothing
    /// rather than being silently dropped.
    pub fn set_checked(&mut self, dimension: FilterDimension, value: &str, checked: bool) {
        let index = match self.sections.iter().position(|s| s.dimension == dimension) {
            Some(index) => index,
            None => {
                self.sections
                    .push(FilterSection::new(dimension, std::iter::empty()));
                self.sections.len() - 1
            }
        };
        let section = &mut self.sections[index];
        if let Some(option) = section.options.iter_mut().find(|o| o.value == value) {
            option.checked = checked;
        } else if checked {
            let mut option = FilterOption::new(value);
            option.checked = true;
            section.options.push(option);
            section.options.sort_by(|a, b| a.label.cmp(&b.label));
        }
    }

    /// Unchecks every option.
    pub fn clear(&mut self) {
        for option in self.sections.iter_mut().flat_map(|s| s.options.iter_mut()) {
            option.checked = false;
        }
    }

    /// Rebuilds job title options from a fresh roster, keeping checked values.
    pub fn refresh_job_titles(&mut self, roster: &PresenceRoster) {
        let checked: Vec<String> = self
            .section(FilterDimension::JobTitle)
            .map(|s| s.checked_values().map(String::from).collect())
            .unwrap_or_default();
        let fresh = FilterSection::new(FilterDimension::JobTitle, roster.job_titles());
        match self
            .sections
            .iter_mut()
            .find(|s| s.dimension == FilterDimension::JobTitle)
        {
            Some(section) => *section = fresh,
            None => self.sections.insert(0, fresh),
        }
        for value in checked {
            self.set_checked(FilterDimension::JobTitle, &value, true);
        }
    }

    pub fn is_active(&self) -> bool {
        self.sections.iter().any(|s| s.checked_values().next().is_some())
    }

    /// AND across dimensions.
    pub fn matches(&self, row: &BoardRow) -> bool {
        self.sections.iter().all(|s| s.matches(row))
    }
}
