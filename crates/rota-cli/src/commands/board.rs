//! Board command: the day's shifts grouped by start time.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rota_core::{AttendanceStatus, BoardRow, DayBoard, FilterDimension, FilterSet, PresenceRoster};

use super::snapshot::Snapshot;
use super::util::{display_name, finish_lines, resolve_day};
use crate::Config;
use crate::cli::BoardArgs;

/// Parses `--status` values up front so typos fail before any fetch.
pub fn parse_statuses(values: &[String]) -> Result<Vec<AttendanceStatus>> {
    values
        .iter()
        .map(|value| value.parse::<AttendanceStatus>().map_err(anyhow::Error::from))
        .collect()
}

pub fn build_filters(
    roster: &PresenceRoster,
    job_titles: &[String],
    statuses: &[AttendanceStatus],
) -> FilterSet {
    let mut filters = FilterSet::standard(roster);
    for title in job_titles {
        filters.set_checked(FilterDimension::JobTitle, title.trim(), true);
    }
    for status in statuses {
        filters.set_checked(FilterDimension::Status, status.as_str(), true);
    }
    filters
}

fn describe_filters(filters: &FilterSet) -> Option<String> {
    let parts: Vec<String> = filters
        .sections()
        .iter()
        .filter_map(|section| {
            let values: Vec<&str> = section.checked_values().collect();
            (!values.is_empty())
                .then(|| format!("{} = {}", section.dimension.name(), values.join(" or ")))
        })
        .collect();
    (!parts.is_empty()).then(|| parts.join("; "))
}

fn format_row(row: &BoardRow) -> String {
    let schedule = match &row.shift {
        Some(shift) if !shift.unallocated => match (shift.start, shift.end) {
            (Some(start), Some(end)) => format!("{start}-{end}"),
            _ => "?".to_string(),
        },
        _ => "-".to_string(),
    };
    let clocked = row
        .classification
        .clocked_on_at
        .map_or_else(|| "-".to_string(), |at| at.format("%H:%M").to_string());
    format!(
        "  {:<8} {:<24} {:<11} {:<5} {:<12} {}",
        row.status().as_str(),
        display_name(row.person_name.as_deref(), &row.person_id),
        schedule,
        clocked,
        row.job_title.as_deref().unwrap_or("-"),
        row.activity,
    )
}

fn summary(board: &DayBoard) -> String {
    let total = board.row_count();
    let noun = if total == 1 { "shift" } else { "shifts" };
    let counts = board
        .status_counts()
        .into_iter()
        .map(|(status, count)| format!("{count} {status}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{total} {noun}: {counts}")
}

pub fn format_board(board: &DayBoard, filters: &FilterSet, now: NaiveDateTime) -> String {
    let mut lines = vec![format!(
        "Rota for {} as of {}",
        board.date.format("%a %-d %b %Y"),
        now.format("%H:%M")
    )];
    if let Some(filters) = describe_filters(filters) {
        lines.push(format!("Filters: {filters}"));
    }

    if board.is_empty() {
        lines.push(String::new());
        lines.push("No shifts match.".to_string());
        return finish_lines(&lines);
    }

    for bucket in &board.buckets {
        lines.push(String::new());
        lines.push(bucket.label.clone());
        lines.extend(bucket.rows.iter().map(format_row));
    }
    lines.push(String::new());
    lines.push(summary(board));
    finish_lines(&lines)
}

pub async fn run<W: Write>(writer: &mut W, config: &Config, args: &BoardArgs) -> Result<()> {
    let (date, now) = resolve_day(&args.day)?;
    let statuses = parse_statuses(&args.statuses)?;
    let client = config.client().context("failed to create API client")?;

    let snapshot = Snapshot::fetch(&client, date).await?;
    let roster = snapshot.roster();
    let filters = build_filters(&roster, &args.job_titles, &statuses);
    let board = snapshot.board(date, &roster, &filters, &config.aggregator(), now);

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&board)?)?;
    } else {
        write!(writer, "{}", format_board(&board, &filters, now))?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use chrono::NaiveDate;
    use insta::assert_snapshot;
    use rota_core::timestamp::{ClockTime, parse_timestamp};
    use rota_core::{AggregatorConfig, PersonId, PersonPresence, Shift, ShiftId, Timesheet};

    pub(crate) fn at(hhmm: &str) -> NaiveDateTime {
        parse_timestamp(&format!("2025-01-15 {hhmm}")).unwrap()
    }

    pub(crate) fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn shift(id: &str, person: &str, name: &str, start: u32, end: u32) -> Shift {
        Shift {
            id: ShiftId::new(id).unwrap(),
            person_id: PersonId::new(person).unwrap(),
            person_name: Some(name.to_string()),
            date: Some(day()),
            start: ClockTime::from_hhmm(start),
            end: ClockTime::from_hhmm(end),
            unallocated: false,
        }
    }

    fn sheet(person: &str, on: &str, off: Option<&str>) -> Timesheet {
        Timesheet {
            id: None,
            person_id: PersonId::new(person).unwrap(),
            kind: Some("Shift".to_string()),
            on_time: at(on).into(),
            off_time: off.map(at).into(),
        }
    }

    fn presence(person: &str, title: &str, last_active: Option<&str>) -> PersonPresence {
        PersonPresence {
            person_id: PersonId::new(person).unwrap(),
            name: None,
            last_active_at: last_active.map(at),
            job_title: Some(title.to_string()),
            rank: None,
            profile_photo: None,
        }
    }

    pub(crate) fn snapshot() -> Snapshot {
        Snapshot {
            shifts: vec![
                shift("s-1", "1042", "Jo Bloggs", 900, 1700),
                shift("s-2", "1043", "Sam Lee", 900, 1700),
                shift("s-3", "1044", "Ana Ruiz", 1300, 2100),
            ],
            timesheets: vec![
                sheet("1042", "09:04", None),
                sheet("1043", "09:20", None),
                sheet("1050", "10:00", Some("11:00")),
            ],
            events: Vec::new(),
            calls: Vec::new(),
            presence: vec![
                presence("1042", "Advisor", Some("11:59")),
                presence("1043", "Team Leader", Some("11:40")),
                presence("1044", "Advisor", None),
            ],
        }
    }

    fn render(job_titles: &[&str], statuses: &[&str]) -> String {
        let snapshot = snapshot();
        let roster = snapshot.roster();
        let job_titles: Vec<String> = job_titles.iter().map(ToString::to_string).collect();
        let statuses: Vec<String> = statuses.iter().map(ToString::to_string).collect();
        let filters = build_filters(&roster, &job_titles, &parse_statuses(&statuses).unwrap());
        let now = at("12:00");
        let board = snapshot.board(day(), &roster, &filters, &AggregatorConfig::default(), now);
        format_board(&board, &filters, now)
    }

    #[test]
    fn board_groups_rows_by_start() {
        assert_snapshot!(render(&[], &[]), @r"
        Rota for Wed 15 Jan 2025 as of 12:00

        Starting: 9:00 am
          Attended Jo Bloggs (1042)         09:00-17:00 09:04 Advisor      active
          Late     Sam Lee (1043)           09:00-17:00 09:20 Team Leader  idle

        Starting: 1:00 pm
          Upcoming Ana Ruiz (1044)          13:00-21:00 -     Advisor      offline

        Unallocated
          Surplus  1050                     -           10:00 -            offline

        4 shifts: 1 Late, 1 Attended, 1 Surplus, 1 Upcoming
        ");
    }

    #[test]
    fn board_applies_filters() {
        assert_snapshot!(render(&["Advisor"], &["late", "Attended"]), @r"
        Rota for Wed 15 Jan 2025 as of 12:00
        Filters: Job Title = Advisor; Status = Attended or Late

        Starting: 9:00 am
          Attended Jo Bloggs (1042)         09:00-17:00 09:04 Advisor      active

        1 shift: 1 Attended
        ");
    }

    #[test]
    fn board_reports_empty_result() {
        assert_snapshot!(render(&["Coach"], &[]), @r"
        Rota for Wed 15 Jan 2025 as of 12:00
        Filters: Job Title = Coach

        No shifts match.
        ");
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = parse_statuses(&["lazy".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "unknown attendance status: lazy");
    }
}
