//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use rota_core::PersonId;
use rota_core::timestamp::parse_timestamp;

use crate::cli::DayArgs;

/// Pre-compiled regex for relative day parsing.
static RELATIVE_DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(day|week)s?\s+ago$").unwrap());

/// Conservative bound for relative day parsing (~100 years).
const MAX_RELATIVE_DAYS: i64 = 100 * 366;

/// Parse a day as an ISO date, a keyword, or a relative offset.
///
/// Supports:
/// - ISO 8601: "2025-01-15"
/// - Keywords: "today", "yesterday", "tomorrow"
/// - Relative: "3 days ago", "1 week ago"
pub fn parse_day(s: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "today" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        "tomorrow" => return Ok(today + Duration::days(1)),
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Ok(date);
    }

    let Some(caps) = RELATIVE_DAY_RE.captures(&s) else {
        anyhow::bail!(
            "Invalid date: {s}. Use YYYY-MM-DD, today, yesterday, tomorrow, or relative (e.g., '3 days ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative date")?;
    let days_per_unit = match &caps[2] {
        "day" => 1,
        "week" => 7,
        unit => anyhow::bail!("Unknown date unit: {unit}"),
    };
    if n > MAX_RELATIVE_DAYS / days_per_unit {
        anyhow::bail!("Relative date value too large: {n} {}", &caps[2]);
    }

    Ok(today - Duration::days(n * days_per_unit))
}

/// Parse the `--at` override, defaulting to the local wall clock.
pub fn parse_at(at: Option<&str>) -> anyhow::Result<NaiveDateTime> {
    match at {
        Some(s) => parse_timestamp(s).with_context(|| {
            format!("Invalid time: {s}. Use YYYY-MM-DD HH:MM or YYYY-MM-DDTHH:MM:SS")
        }),
        None => Ok(Local::now().naive_local()),
    }
}

/// Resolve `--date`/`--at` into the day to show and the evaluation moment.
///
/// Without `--date` the day is the one `--at` falls on.
pub fn resolve_day(args: &DayArgs) -> anyhow::Result<(NaiveDate, NaiveDateTime)> {
    let now = parse_at(args.at.as_deref())?;
    let date = match &args.date {
        Some(date) => parse_day(date, now.date())?,
        None => now.date(),
    };
    Ok((date, now))
}

/// `Jo Bloggs (1042)`, or just the id when no name is known.
pub fn display_name(name: Option<&str>, person: &PersonId) -> String {
    match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{name} ({person})"),
        None => person.to_string(),
    }
}

/// Joins pre-rendered lines, trimming the padding left at line ends.
pub fn finish_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}
