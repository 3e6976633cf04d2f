//! The per-entity synchronizer.
//!
//! Each synchronizer is one tokio task owning one entity type's snapshot.
//! Three trigger sources feed a single issuance path:
//!
//! - a date-range change, collapsed by a debounce timer,
//! - a fixed background poll,
//! - a [`RefreshSignal`] for this entity type, or an explicit refresh.
//!
//! # Algorithm Summary
//!
//! Issuing a fetch cancels the in-flight one, bumps a generation counter and
//! spawns the fetch raced against a child [`CancellationToken`]. Completions
//! come back tagged with their generation; anything but the latest is
//! discarded. A success replaces the snapshot whole. A failure keeps the old
//! snapshot and records the error. A cancellation changes nothing.
//!
//! A fetch still running after the loading delay raises the loading flag,
//! so fast responses never flicker an indicator.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use rota_core::{DateRange, EntityKind};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::feed::Feed;
use crate::refresh::{RefreshBus, RefreshSignal};

/// Timer settings for a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTuning {
    /// Quiet period after a range change before fetching. Default: 300 ms.
    pub debounce: Duration,

    /// Background refresh period. Default: 60 s.
    pub poll_interval: Duration,

    /// How long a fetch may run before the loading flag is raised.
    /// Default: 3 s.
    pub loading_delay: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            poll_interval: Duration::from_secs(60),
            loading_delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    Idle,
    Debouncing,
    Fetching,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Debouncing => "debouncing",
            Self::Fetching => "fetching",
        })
    }
}

/// Lifetime totals, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounters {
    pub issued: u64,
    pub applied: u64,
    pub cancelled: u64,
    pub failed: u64,
    pub loading_shown: u64,
}

/// What a synchronizer currently holds. Published on every change.
#[derive(Debug, Clone)]
pub struct SyncState<T> {
    pub kind: EntityKind,

    /// The last successfully fetched records, replaced whole.
    pub records: Arc<Vec<T>>,

    /// Range the held records were fetched for.
    pub range: Option<DateRange>,

    pub phase: SyncPhase,

    /// At least one fetch has been applied.
    pub loaded: bool,

    /// A fetch has been running longer than the loading delay.
    pub loading: bool,

    pub last_updated: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub counters: SyncCounters,
}

impl<T> SyncState<T> {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            records: Arc::new(Vec::new()),
            range: None,
            phase: SyncPhase::Idle,
            loaded: false,
            loading: false,
            last_updated: None,
            last_error: None,
            counters: SyncCounters::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Command {
    SetRange(DateRange),
    Refresh,
    Shutdown,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Debounce,
    Poll,
    Signal,
    Manual,
}

impl Trigger {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Debounce => "range change",
            Self::Poll => "poll",
            Self::Signal => "refresh signal",
            Self::Manual => "manual",
        }
    }
}

enum Outcome<T, E> {
    Done(Result<Vec<T>, E>),
    Cancelled,
}

struct Completion<T, E> {
    generation: u64,
    range: DateRange,
    outcome: Outcome<T, E>,
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

/// Handle to a running synchronizer task.
///
/// Dropping the handle cancels the task and any fetch it has in flight.
pub struct Synchronizer<T> {
    kind: EntityKind,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SyncState<T>>,
    token: CancellationToken,
    task: JoinHandle<()>,
    guard: DropGuard,
}

impl<T> fmt::Debug for Synchronizer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("kind", &self.kind)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<T> Synchronizer<T>
where
    T: Send + Sync + 'static,
{
    /// Starts a synchronizer task for `feed`.
    ///
    /// Nothing is fetched until a range is set. The task stops when `parent`
    /// is cancelled, on [`Synchronizer::shutdown`], or when the handle drops.
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(
        feed: F,
        tuning: SyncTuning,
        bus: Option<&RefreshBus>,
        parent: &CancellationToken,
    ) -> Self
    where
        F: Feed<Record = T>,
    {
        let kind = feed.kind();
        let token = parent.child_token();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SyncState::new(kind));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let actor = Actor {
            kind,
            feed: Arc::new(feed),
            tuning,
            state: state_tx,
            commands: commands_rx,
            refresh: bus.map(RefreshBus::subscribe),
            completions_tx,
            completions: completions_rx,
            token: token.clone(),
            range: None,
            generation: 0,
            in_flight: None,
            debounce_at: None,
            loading_at: None,
            poll_at: None,
        };
        let task = tokio::spawn(actor.run());
        tracing::debug!(%kind, "synchronizer started");

        Self {
            kind,
            commands: commands_tx,
            state: state_rx,
            guard: token.clone().drop_guard(),
            token,
            task,
        }
    }

    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Retargets the synchronizer. Any in-flight fetch is cancelled at once;
    /// the fetch for the new range starts after the debounce.
    pub fn set_range(&self, range: DateRange) {
        self.send(Command::SetRange(range));
    }

    /// Fetches now, superseding anything in flight.
    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::trace!(kind = %self.kind, ?command, "synchronizer already stopped");
        }
    }

    /// A receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<SyncState<T>> {
        self.state.clone()
    }

    /// The current state. Records are shared, not copied.
    pub fn state(&self) -> SyncState<T> {
        let state = self.state.borrow();
        SyncState {
            kind: state.kind,
            records: Arc::clone(&state.records),
            range: state.range,
            phase: state.phase,
            loaded: state.loaded,
            loading: state.loading,
            last_updated: state.last_updated,
            last_error: state.last_error.clone(),
            counters: state.counters,
        }
    }

    pub fn records(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.state.borrow().records)
    }

    /// Cancels the task and its in-flight fetch without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels the task and waits for it to finish.
    pub async fn shutdown(self) {
        let Self {
            kind,
            commands,
            task,
            guard,
            ..
        } = self;
        // Best effort: the actor may already be gone.
        let _ = commands.send(Command::Shutdown);
        drop(guard);
        if let Err(err) = task.await {
            tracing::warn!(%kind, error = %err, "synchronizer task failed");
        }
    }
}

struct Actor<F: Feed> {
    kind: EntityKind,
    feed: Arc<F>,
    tuning: SyncTuning,
    state: watch::Sender<SyncState<F::Record>>,
    commands: mpsc::UnboundedReceiver<Command>,
    refresh: Option<broadcast::Receiver<RefreshSignal>>,
    completions_tx: mpsc::UnboundedSender<Completion<F::Record, F::Error>>,
    completions: mpsc::UnboundedReceiver<Completion<F::Record, F::Error>>,
    token: CancellationToken,
    range: Option<DateRange>,
    generation: u64,
    in_flight: Option<InFlight>,
    debounce_at: Option<Instant>,
    loading_at: Option<Instant>,
    poll_at: Option<Instant>,
}

impl<F: Feed> Actor<F> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                () = self.token.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(Command::SetRange(range)) => self.set_range(range),
                    Some(Command::Refresh) => self.issue(Trigger::Manual),
                    Some(Command::Shutdown) | None => break,
                },

                Some(completion) = self.completions.recv() => self.complete(completion),

                () = sleep_until(self.debounce_at) => {
                    self.debounce_at = None;
                    self.issue(Trigger::Debounce);
                }

                () = sleep_until(self.loading_at) => {
                    self.loading_at = None;
                    self.show_loading();
                }

                () = sleep_until(self.poll_at) => {
                    self.poll_at = Some(Instant::now() + self.tuning.poll_interval);
                    // A pending debounce fetches soon anyway.
                    if self.debounce_at.is_none() {
                        self.issue(Trigger::Poll);
                    }
                }

                signal = next_signal(self.refresh.as_mut()) => match signal {
                    Some(signal) if signal.applies_to(self.kind) => self.issue(Trigger::Signal),
                    Some(_) => {}
                    None => self.refresh = None,
                },
            }
        }

        self.cancel_in_flight();
        self.state.send_modify(|state| {
            state.phase = SyncPhase::Idle;
            state.loading = false;
        });
        tracing::debug!(kind = %self.kind, "synchronizer stopped");
    }

    fn set_range(&mut self, range: DateRange) {
        let pending = self.debounce_at.is_some() || self.in_flight.is_some();
        if self.range == Some(range) && !pending {
            tracing::trace!(kind = %self.kind, %range, "range unchanged");
            return;
        }
        self.cancel_in_flight();
        self.range = Some(range);
        self.loading_at = None;
        self.debounce_at = Some(Instant::now() + self.tuning.debounce);
        if self.poll_at.is_none() {
            self.poll_at = Some(Instant::now() + self.tuning.poll_interval);
        }
        self.state.send_modify(|state| {
            state.phase = SyncPhase::Debouncing;
            state.loading = false;
        });
        tracing::debug!(kind = %self.kind, %range, "range changed");
    }

    fn issue(&mut self, trigger: Trigger) {
        let Some(range) = self.range else {
            tracing::trace!(kind = %self.kind, trigger = trigger.as_str(), "no range yet");
            return;
        };
        self.cancel_in_flight();
        self.debounce_at = None;

        self.generation += 1;
        let generation = self.generation;
        let token = self.token.child_token();
        let feed = Arc::clone(&self.feed);
        let completions = self.completions_tx.clone();
        let fetch_token = token.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = fetch_token.cancelled() => Outcome::Cancelled,
                result = feed.fetch(range) => Outcome::Done(result),
            };
            // The actor may have stopped; nothing left to report to.
            let _ = completions.send(Completion {
                generation,
                range,
                outcome,
            });
        });
        self.in_flight = Some(InFlight { generation, token });

        let loading = self.state.borrow().loading;
        if !loading {
            self.loading_at = Some(Instant::now() + self.tuning.loading_delay);
        }
        self.state.send_modify(|state| {
            state.phase = SyncPhase::Fetching;
            state.counters.issued += 1;
        });
        tracing::debug!(
            kind = %self.kind,
            %range,
            generation,
            trigger = trigger.as_str(),
            "fetch issued"
        );
    }

    fn cancel_in_flight(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.token.cancel();
            self.state.send_modify(|state| state.counters.cancelled += 1);
            tracing::debug!(
                kind = %self.kind,
                generation = in_flight.generation,
                "fetch cancelled"
            );
        }
    }

    fn show_loading(&self) {
        if self.in_flight.is_none() {
            return;
        }
        self.state.send_modify(|state| {
            state.loading = true;
            state.counters.loading_shown += 1;
        });
        tracing::debug!(kind = %self.kind, "fetch slow, showing loading indicator");
    }

    fn complete(&mut self, completion: Completion<F::Record, F::Error>) {
        let current = self.in_flight.as_ref().map(|f| f.generation);
        if current != Some(completion.generation) {
            tracing::trace!(
                kind = %self.kind,
                generation = completion.generation,
                "discarding superseded fetch"
            );
            return;
        }
        self.in_flight = None;
        self.loading_at = None;
        let next_phase = if self.debounce_at.is_some() {
            SyncPhase::Debouncing
        } else {
            SyncPhase::Idle
        };

        match completion.outcome {
            Outcome::Cancelled => {
                self.state.send_modify(|state| state.phase = next_phase);
            }
            Outcome::Done(Ok(records)) => {
                let count = records.len();
                self.state.send_modify(|state| {
                    state.records = Arc::new(records);
                    state.range = Some(completion.range);
                    state.phase = next_phase;
                    state.loaded = true;
                    state.loading = false;
                    state.last_updated = Some(Local::now().naive_local());
                    state.last_error = None;
                    state.counters.applied += 1;
                });
                tracing::debug!(
                    kind = %self.kind,
                    range = %completion.range,
                    count,
                    "snapshot replaced"
                );
            }
            Outcome::Done(Err(err)) => {
                self.state.send_modify(|state| {
                    state.phase = next_phase;
                    state.loading = false;
                    state.last_error = Some(err.to_string());
                    state.counters.failed += 1;
                });
                tracing::warn!(
                    kind = %self.kind,
                    range = %completion.range,
                    error = %err,
                    "fetch failed, keeping previous snapshot"
                );
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Next refresh signal; `None` once the bus is gone. A lagged receiver
/// treats the gap as a refresh of everything.
async fn next_signal(rx: Option<&mut broadcast::Receiver<RefreshSignal>>) -> Option<RefreshSignal> {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(signal) => Some(signal),
        Err(broadcast::error::RecvError::Lagged(_)) => Some(RefreshSignal::All),
        Err(broadcast::error::RecvError::Closed) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    #[derive(Debug, thiserror::Error)]
    #[error("server unavailable")]
    struct FakeError;

    type Step = (Duration, Result<Vec<u32>, ()>);

    #[derive(Clone)]
    struct ScriptedFeed {
        kind: EntityKind,
        steps: Arc<Mutex<VecDeque<Step>>>,
        ranges: Arc<Mutex<Vec<DateRange>>>,
        finished: Arc<AtomicUsize>,
    }

    impl ScriptedFeed {
        fn new(kind: EntityKind, steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                kind,
                steps: Arc::new(Mutex::new(steps.into_iter().collect())),
                ranges: Arc::new(Mutex::new(Vec::new())),
                finished: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn ranges(&self) -> Vec<DateRange> {
            self.ranges.lock().unwrap().clone()
        }
    }

    impl Feed for ScriptedFeed {
        type Record = u32;
        type Error = FakeError;

        fn kind(&self) -> EntityKind {
            self.kind
        }

        fn fetch(
            &self,
            range: DateRange,
        ) -> impl Future<Output = Result<Vec<u32>, FakeError>> + Send {
            self.ranges.lock().unwrap().push(range);
            let (delay, result) = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((Duration::ZERO, Ok(Vec::new())));
            let finished = Arc::clone(&self.finished);
            async move {
                sleep(delay).await;
                finished.fetch_add(1, Ordering::SeqCst);
                result.map_err(|()| FakeError)
            }
        }
    }

    fn day(d: u32) -> DateRange {
        DateRange::day(NaiveDate::from_ymd_opt(2025, 1, d).unwrap())
    }

    fn ok(delay_ms: u64, records: &[u32]) -> Step {
        (Duration::from_millis(delay_ms), Ok(records.to_vec()))
    }

    fn spawn(feed: &ScriptedFeed, bus: Option<&RefreshBus>) -> Synchronizer<u32> {
        Synchronizer::spawn(
            feed.clone(),
            SyncTuning::default(),
            bus,
            &CancellationToken::new(),
        )
    }

    async fn wait(sync: &Synchronizer<u32>, check: impl FnMut(&SyncState<u32>) -> bool) {
        sync.subscribe().wait_for(check).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn range_changes_are_debounced() {
        let feed = ScriptedFeed::new(EntityKind::Shifts, [ok(10, &[3])]);
        let sync = spawn(&feed, None);
        let start = Instant::now();

        sync.set_range(day(13));
        sleep(Duration::from_millis(100)).await;
        sync.set_range(day(14));
        sleep(Duration::from_millis(100)).await;
        sync.set_range(day(15));

        wait(&sync, |s| s.counters.applied == 1).await;
        assert!(start.elapsed() >= Duration::from_millis(500));

        let state = sync.state();
        assert_eq!(feed.ranges(), vec![day(15)]);
        assert_eq!(state.counters.issued, 1);
        assert_eq!(state.range, Some(day(15)));
        assert_eq!(*state.records, vec![3]);
        assert_eq!(state.phase, SyncPhase::Idle);
        assert!(state.loaded);
        assert!(state.last_updated.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_fetch_is_never_applied() {
        let feed = ScriptedFeed::new(EntityKind::Shifts, [ok(1000, &[1]), ok(500, &[2])]);
        let sync = spawn(&feed, None);

        sync.set_range(day(15));
        wait(&sync, |s| s.counters.issued == 1).await;
        sleep(Duration::from_millis(50)).await;
        sync.refresh();

        wait(&sync, |s| s.counters.applied == 1).await;
        let state = sync.state();
        assert_eq!(*state.records, vec![2]);
        assert_eq!(state.counters.cancelled, 1);
        assert_eq!(state.counters.loading_shown, 0);
        assert!(!state.loading);

        sleep(Duration::from_secs(5)).await;
        let state = sync.state();
        assert_eq!(*state.records, vec![2]);
        assert_eq!(state.counters.applied, 1);
        assert_eq!(feed.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_shows_loading_after_delay() {
        let feed = ScriptedFeed::new(EntityKind::Events, [ok(5000, &[7])]);
        let sync = spawn(&feed, None);
        let start = Instant::now();

        sync.set_range(day(15));
        wait(&sync, |s| s.loading).await;
        assert!(start.elapsed() >= Duration::from_millis(3300));
        assert_eq!(sync.state().phase, SyncPhase::Fetching);

        wait(&sync, |s| s.counters.applied == 1).await;
        let state = sync.state();
        assert!(!state.loading);
        assert_eq!(state.counters.loading_shown, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_previous_snapshot() {
        let feed = ScriptedFeed::new(
            EntityKind::Timesheets,
            [ok(10, &[1, 2]), (Duration::from_millis(4000), Err(()))],
        );
        let sync = spawn(&feed, None);

        sync.set_range(day(15));
        wait(&sync, |s| s.counters.applied == 1).await;
        sync.refresh();
        wait(&sync, |s| s.counters.failed == 1).await;

        let state = sync.state();
        assert_eq!(*state.records, vec![1, 2]);
        assert_eq!(state.last_error.as_deref(), Some("server unavailable"));
        assert!(!state.loading);
        assert_eq!(state.counters.loading_shown, 1);
        assert_eq!(state.phase, SyncPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn range_change_cancels_in_flight_fetch() {
        let feed = ScriptedFeed::new(EntityKind::Shifts, [ok(5000, &[1]), ok(10, &[2])]);
        let sync = spawn(&feed, None);

        sync.set_range(day(14));
        wait(&sync, |s| s.counters.issued == 1).await;
        sync.set_range(day(15));
        wait(&sync, |s| s.counters.cancelled == 1).await;
        assert_eq!(sync.state().phase, SyncPhase::Debouncing);

        wait(&sync, |s| s.counters.applied == 1).await;
        let state = sync.state();
        assert_eq!(state.range, Some(day(15)));
        assert_eq!(*state.records, vec![2]);
        assert_eq!(feed.ranges(), vec![day(14), day(15)]);
    }

    #[tokio::test(start_paused = true)]
    async fn range_change_clears_loading_of_cancelled_fetch() {
        let feed = ScriptedFeed::new(EntityKind::Events, [ok(10_000, &[1]), ok(10, &[2])]);
        let sync = spawn(&feed, None);

        sync.set_range(day(14));
        wait(&sync, |s| s.loading).await;
        sync.set_range(day(15));
        wait(&sync, |s| s.counters.cancelled == 1).await;

        let state = sync.state();
        assert!(!state.loading);
        assert_eq!(state.phase, SyncPhase::Debouncing);

        wait(&sync, |s| s.counters.applied == 1).await;
        let state = sync.state();
        assert!(!state.loading);
        assert_eq!(*state.records, vec![2]);
        assert_eq!(state.counters.loading_shown, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_a_fixed_interval() {
        let feed = ScriptedFeed::new(EntityKind::Calls, [ok(10, &[1]), ok(10, &[1, 1])]);
        let sync = spawn(&feed, None);
        let start = Instant::now();

        sync.set_range(day(15));
        wait(&sync, |s| s.counters.applied == 1).await;
        wait(&sync, |s| s.counters.applied == 2).await;

        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(*sync.records(), vec![1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn reacts_only_to_matching_refresh_signals() {
        let bus = RefreshBus::new();
        let feed = ScriptedFeed::new(EntityKind::Timesheets, [ok(10, &[1]), ok(10, &[2])]);
        let sync = spawn(&feed, Some(&bus));

        sync.set_range(day(15));
        wait(&sync, |s| s.counters.applied == 1).await;

        bus.raise(RefreshSignal::EVENTS);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(sync.state().counters.issued, 1);

        bus.raise(RefreshSignal::TIMESHEETS);
        wait(&sync, |s| s.counters.applied == 2).await;
        assert_eq!(*sync.records(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_before_range_is_ignored() {
        let feed = ScriptedFeed::new(EntityKind::Shifts, []);
        let sync = spawn(&feed, None);

        sync.refresh();
        sleep(Duration::from_secs(120)).await;
        assert_eq!(sync.state().counters.issued, 0);
        assert!(feed.ranges().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_in_flight_fetch() {
        let feed = ScriptedFeed::new(EntityKind::Shifts, [ok(10_000, &[1])]);
        let sync = spawn(&feed, None);

        sync.set_range(day(15));
        wait(&sync, |s| s.phase == SyncPhase::Fetching).await;
        let observer = sync.subscribe();
        sync.shutdown().await;

        sleep(Duration::from_secs(20)).await;
        assert_eq!(feed.finished.load(Ordering::SeqCst), 0);
        assert_eq!(observer.borrow().phase, SyncPhase::Idle);
        assert!(!observer.borrow().loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_stops_everything() {
        let parent = CancellationToken::new();
        let feed = ScriptedFeed::new(EntityKind::Shifts, [ok(10_000, &[1])]);
        let sync = Synchronizer::spawn(feed.clone(), SyncTuning::default(), None, &parent);

        sync.set_range(day(15));
        wait(&sync, |s| s.phase == SyncPhase::Fetching).await;
        parent.cancel();

        sleep(Duration::from_secs(20)).await;
        assert_eq!(feed.finished.load(Ordering::SeqCst), 0);
        assert_eq!(sync.state().counters.applied, 0);
    }
}
