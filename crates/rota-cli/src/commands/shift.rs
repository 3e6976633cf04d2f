//! Shift command: hours summary and activity log for one shift.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use rota_core::{FilterSet, ShiftDetail, ShiftId};

use super::snapshot::Snapshot;
use super::util::{display_name, finish_lines, resolve_day};
use crate::Config;
use crate::cli::DayArgs;

fn clock(at: Option<NaiveDateTime>) -> String {
    at.map_or_else(|| "-".to_string(), |at| at.format("%H:%M").to_string())
}

fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!("{:<17}{value}", format!("{label}:"))
}

pub fn format_detail(detail: &ShiftDetail) -> String {
    let who = display_name(detail.person_name.as_deref(), &detail.person_id);
    let mut lines = vec![match &detail.shift_id {
        Some(id) => format!("Shift {id}: {who}"),
        None => format!("Walk-in: {who}"),
    }];

    lines.push(field("Status", detail.status));
    let scheduled = match (detail.scheduled_start, detail.scheduled_end) {
        (Some(start), Some(end)) => format!("{}-{}", clock(Some(start)), clock(Some(end))),
        _ => "-".to_string(),
    };
    lines.push(field("Scheduled", scheduled));
    lines.push(field("Clocked on", clock(detail.actual_start)));
    lines.push(field("Scheduled hours", &detail.scheduled_hours));
    lines.push(field("Worked hours", &detail.worked_hours));
    lines.push(String::new());

    if detail.entries.is_empty() {
        lines.push("No activity recorded.".to_string());
        return finish_lines(&lines);
    }

    lines.push(format!(
        "{:<9} {:<9} {:<12} {:<8} {}",
        "Started", "Ended", "Category", "Duration", "Action"
    ));
    for entry in &detail.entries {
        let action = entry
            .event_id
            .as_ref()
            .map(|id| format!("remove {id}"))
            .unwrap_or_default();
        lines.push(format!(
            "{:<9} {:<9} {:<12} {:<8} {}",
            entry.started_label(),
            entry.ended_label(),
            entry.category,
            entry.duration_label(),
            action
        ));
    }
    finish_lines(&lines)
}

pub async fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    shift_id: &str,
    day: &DayArgs,
    json: bool,
) -> Result<()> {
    let shift_id = ShiftId::new(shift_id.trim()).context("invalid shift id")?;
    let (date, now) = resolve_day(day)?;
    let client = config.client().context("failed to create API client")?;

    let snapshot = Snapshot::fetch(&client, date).await?;
    let roster = snapshot.roster();
    let board = snapshot.board(date, &roster, &FilterSet::default(), &config.aggregator(), now);
    let Some(row) = board.find_shift(&shift_id) else {
        bail!("shift {shift_id} not found on {date}");
    };
    let detail = ShiftDetail::from_row(row);

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&detail)?)?;
    } else {
        write!(writer, "{}", format_detail(&detail))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use rota_core::{AggregatorConfig, Event, EventCategory, EventId, PersonId};

    use crate::commands::board::tests::{at, day, snapshot};

    fn detail_for(id: &str) -> ShiftDetail {
        let mut snapshot = snapshot();
        snapshot.events.push(Event {
            id: EventId::new("ev-7").unwrap(),
            shift_id: Some(ShiftId::new("s-2").unwrap()),
            person_id: PersonId::new("1043").unwrap(),
            category: EventCategory::Other("Coaching".to_string()),
            on_time: at("10:00").into(),
            off_time: at("10:30").into(),
        });
        let roster = snapshot.roster();
        let board = snapshot.board(
            day(),
            &roster,
            &FilterSet::default(),
            &AggregatorConfig::default(),
            at("12:00"),
        );
        ShiftDetail::from_row(board.find_shift(&ShiftId::new(id).unwrap()).unwrap())
    }

    #[test]
    fn detail_lists_hours_and_activity() {
        assert_snapshot!(format_detail(&detail_for("s-2")), @r"
        Shift s-2: Sam Lee (1043)
        Status:          Late
        Scheduled:       09:00-17:00
        Clocked on:      09:20
        Scheduled hours: 08:00
        Worked hours:    02:40

        Started   Ended     Category     Duration Action
        9:20 AM   -         Shift        -
        10:00 AM  10:30 AM  Coaching     0h 30m   remove ev-7
        ");
    }

    #[test]
    fn detail_without_activity() {
        assert_snapshot!(format_detail(&detail_for("s-3")), @r"
        Shift s-3: Ana Ruiz (1044)
        Status:          Upcoming
        Scheduled:       13:00-21:00
        Clocked on:      -
        Scheduled hours: 08:00
        Worked hours:    00:00

        No activity recorded.
        ");
    }
}
