//! Watch command: a live board that re-renders as snapshots change.

use std::io::Write;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate, NaiveDateTime};
use rota_core::{AttendanceStatus, DateRange, FilterSet};
use rota_live::{LiveBoard, RefreshBus};

use super::board::{build_filters, format_board, parse_statuses};
use super::util::resolve_day;
use crate::Config;
use crate::cli::BoardArgs;

/// What was last put on screen, to skip redundant redraws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rendered {
    applied: u64,
    errors: usize,
}

struct View<'a> {
    config: &'a Config,
    args: &'a BoardArgs,
    statuses: Vec<AttendanceStatus>,
    date: NaiveDate,
    /// `--at`, when given, freezes the evaluation moment.
    pinned: Option<NaiveDateTime>,
    once: bool,
}

impl View<'_> {
    fn now(&self) -> NaiveDateTime {
        self.pinned.unwrap_or_else(|| Local::now().naive_local())
    }
}

pub async fn run<W: Write>(
    writer: &mut W,
    config: &Config,
    args: &BoardArgs,
    once: bool,
) -> Result<()> {
    let (date, at) = resolve_day(&args.day)?;
    let view = View {
        config,
        args,
        statuses: parse_statuses(&args.statuses)?,
        date,
        pinned: args.day.at.is_some().then_some(at),
        once,
    };
    let client = config.client().context("failed to create API client")?;

    let bus = RefreshBus::new();
    let live = LiveBoard::connect(&client, config.tuning(), &bus);
    live.set_range(DateRange::day(date));

    let result = watch_loop(writer, &view, &live).await;
    live.shutdown().await;
    result
}

async fn watch_loop<W: Write>(writer: &mut W, view: &View<'_>, live: &LiveBoard) -> Result<()> {
    let mut shifts = live.shifts.subscribe();
    let mut timesheets = live.timesheets.subscribe();
    let mut events = live.events.subscribe();
    let mut calls = live.calls.subscribe();
    let mut presence = live.presence.synchronizer().subscribe();

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let mut filters: Option<FilterSet> = None;
    let mut last: Option<Rendered> = None;
    let mut announced_loading = false;

    loop {
        let changed = tokio::select! {
            _ = &mut interrupt => {
                tracing::info!("interrupted");
                return Ok(());
            }
            changed = shifts.changed() => changed,
            changed = timesheets.changed() => changed,
            changed = events.changed() => changed,
            changed = calls.changed() => changed,
            changed = presence.changed() => changed,
        };
        if changed.is_err() {
            tracing::debug!("synchronizer stopped");
            return Ok(());
        }

        let errors = live.errors();
        if !live.is_loaded() {
            if let (true, Some((kind, error))) = (view.once, errors.first()) {
                bail!("failed to load {kind}: {error}");
            }
            if live.is_loading() && !announced_loading {
                announced_loading = true;
                writeln!(writer, "Loading...")?;
                writer.flush()?;
            }
            continue;
        }

        let current = Rendered {
            applied: live.applied(),
            errors: errors.len(),
        };
        if last == Some(current) {
            continue;
        }
        last = Some(current);

        let roster = live.presence.roster();
        let filters = filters
            .get_or_insert_with(|| build_filters(&roster, &view.args.job_titles, &view.statuses));
        filters.refresh_job_titles(&roster);

        let now = view.now();
        let board = live.board(view.date, filters, &view.config.aggregator(), now);
        if view.args.json {
            writeln!(writer, "{}", serde_json::to_string_pretty(&board)?)?;
        } else {
            write!(writer, "{}", format_board(&board, filters, now))?;
            for (kind, error) in &errors {
                writeln!(writer, "Warning: {kind} may be stale: {error}")?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;

        if view.once {
            return Ok(());
        }
    }
}
