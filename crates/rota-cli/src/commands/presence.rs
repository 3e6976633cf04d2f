//! Presence command: who is active, idle or offline.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rota_core::{Activity, DateRange, PersonPresence, PresenceRoster, classify_activity};
use serde::Serialize;

use super::util::{display_name, finish_lines, resolve_day};
use crate::Config;
use crate::cli::DayArgs;

#[derive(Debug, Serialize)]
struct PresenceEntry<'a> {
    #[serde(flatten)]
    presence: &'a PersonPresence,
    activity: Activity,
}

fn selected<'a>(
    roster: &'a PresenceRoster,
    job_titles: &'a [String],
) -> impl Iterator<Item = &'a PersonPresence> {
    roster.iter().filter(move |p| {
        job_titles.is_empty()
            || p.job_title
                .as_deref()
                .is_some_and(|title| job_titles.iter().any(|t| t.trim() == title))
    })
}

fn last_seen(at: Option<NaiveDateTime>, now: NaiveDateTime) -> String {
    match at {
        Some(at) if at.date() == now.date() => at.format("%H:%M").to_string(),
        Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
        None => "never".to_string(),
    }
}

pub fn format_presence(
    roster: &PresenceRoster,
    job_titles: &[String],
    now: NaiveDateTime,
) -> String {
    let mut lines = vec![format!("Presence as of {}", now.format("%Y-%m-%d %H:%M"))];
    lines.push(String::new());

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut total = 0;
    for person in selected(roster, job_titles) {
        let activity = classify_activity(person.last_active_at, now);
        *counts.entry(activity.as_str()).or_default() += 1;
        total += 1;
        lines.push(format!(
            "  {:<7} {:<24} {:<12} {}",
            activity.as_str(),
            display_name(person.name.as_deref(), &person.person_id),
            person.job_title.as_deref().unwrap_or("-"),
            last_seen(person.last_active_at, now),
        ));
    }

    if total == 0 {
        lines.push("No one matches.".to_string());
        return finish_lines(&lines);
    }

    let noun = if total == 1 { "person" } else { "people" };
    let breakdown = [Activity::Active, Activity::Idle, Activity::Offline]
        .into_iter()
        .filter_map(|a| counts.get(a.as_str()).map(|n| format!("{n} {a}")))
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(String::new());
    lines.push(format!("{total} {noun}: {breakdown}"));
    finish_lines(&lines)
}

pub async fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    day: &DayArgs,
    job_titles: &[String],
    json: bool,
) -> Result<()> {
    let (date, now) = resolve_day(day)?;
    let client = config.client().context("failed to create API client")?;
    let range = DateRange::day(date);
    let records = client
        .presence(&range)
        .await
        .with_context(|| format!("failed to fetch presence for {range}"))?;
    let roster = PresenceRoster::from_records(records);

    if json {
        let entries: Vec<PresenceEntry<'_>> = selected(&roster, job_titles)
            .map(|presence| PresenceEntry {
                presence,
                activity: classify_activity(presence.last_active_at, now),
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
    } else {
        write!(writer, "{}", format_presence(&roster, job_titles, now))?;
    }
    Ok(())
}
