//! One-shot fetch of everything a board needs.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rota_client::RotaClient;
use rota_core::{
    AggregatorConfig, BoardInputs, CallRecord, DateRange, DayBoard, Event, FilterSet,
    PersonPresence, PresenceRoster, Shift, Timesheet, group_shifts,
};

/// Records for one day, fetched together.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub shifts: Vec<Shift>,
    pub timesheets: Vec<Timesheet>,
    pub events: Vec<Event>,
    pub calls: Vec<CallRecord>,
    pub presence: Vec<PersonPresence>,
}

impl Snapshot {
    pub async fn fetch(client: &RotaClient, date: NaiveDate) -> Result<Self> {
        let range = DateRange::day(date);
        let (shifts, timesheets, events, calls, presence) = tokio::try_join!(
            client.shifts(&range),
            client.timesheets(&range),
            client.events(&range),
            client.calls(&range),
            client.presence(&range),
        )
        .with_context(|| format!("failed to fetch rota data for {range}"))?;
        tracing::debug!(
            shifts = shifts.len(),
            timesheets = timesheets.len(),
            events = events.len(),
            calls = calls.len(),
            presence = presence.len(),
            "fetched snapshot"
        );
        Ok(Self {
            shifts,
            timesheets,
            events,
            calls,
            presence,
        })
    }

    pub fn roster(&self) -> PresenceRoster {
        PresenceRoster::from_records(self.presence.iter().cloned())
    }

    pub fn board(
        &self,
        date: NaiveDate,
        roster: &PresenceRoster,
        filters: &FilterSet,
        config: &AggregatorConfig,
        now: NaiveDateTime,
    ) -> DayBoard {
        let inputs = BoardInputs {
            shifts: &self.shifts,
            timesheets: &self.timesheets,
            events: &self.events,
            calls: &self.calls,
            roster,
        };
        group_shifts(date, &inputs, filters, config, now)
    }
}
