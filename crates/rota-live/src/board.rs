//! One live view: a synchronizer per entity type plus presence.

use std::future::Future;

use chrono::{NaiveDate, NaiveDateTime};
use rota_client::{ApiError, RotaClient};
use rota_core::{
    AggregatorConfig, BoardInputs, CallRecord, DateRange, DayBoard, EntityKind, Event, EventId,
    FilterSet, PersonPresence, Shift, Timesheet, group_shifts,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::feed::{Feed, HttpFeed};
use crate::presence::PresenceTracker;
use crate::refresh::{RefreshBus, RefreshSignal};
use crate::sync::{SyncTuning, Synchronizer};

/// Event removal failed; no snapshot was touched.
#[derive(Debug, Error)]
#[error("failed to remove event {event_id}: {source}")]
pub struct WriteFailure {
    pub event_id: EventId,
    #[source]
    pub source: ApiError,
}

/// Anything that can delete an exception event.
pub trait EventRemover: Send + Sync {
    fn remove_event(&self, id: &EventId) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl EventRemover for RotaClient {
    fn remove_event(&self, id: &EventId) -> impl Future<Output = Result<(), ApiError>> + Send {
        Self::remove_event(self, id)
    }
}

/// Removes an event, then asks timesheets and events to refetch.
///
/// On failure nothing is raised and the caller decides how to surface it.
pub async fn remove_event_and_refresh<R: EventRemover>(
    remover: &R,
    bus: &RefreshBus,
    id: &EventId,
) -> Result<(), WriteFailure> {
    remover
        .remove_event(id)
        .await
        .map_err(|source| WriteFailure {
            event_id: id.clone(),
            source,
        })?;
    bus.raise(RefreshSignal::TIMESHEETS);
    bus.raise(RefreshSignal::EVENTS);
    Ok(())
}

/// The feeds behind a [`LiveBoard`].
#[derive(Debug)]
pub struct BoardFeeds<S, T, E, C, P> {
    pub shifts: S,
    pub timesheets: T,
    pub events: E,
    pub calls: C,
    pub presence: P,
}

impl
    BoardFeeds<
        HttpFeed<Shift>,
        HttpFeed<Timesheet>,
        HttpFeed<Event>,
        HttpFeed<CallRecord>,
        HttpFeed<PersonPresence>,
    >
{
    pub fn http(client: &RotaClient) -> Self {
        Self {
            shifts: HttpFeed::new(client.clone(), EntityKind::Shifts),
            timesheets: HttpFeed::new(client.clone(), EntityKind::Timesheets),
            events: HttpFeed::new(client.clone(), EntityKind::Events),
            calls: HttpFeed::new(client.clone(), EntityKind::Calls),
            presence: HttpFeed::new(client.clone(), EntityKind::Presence),
        }
    }
}

/// Everything one view needs kept live.
///
/// All synchronizers hang off the board's cancellation token, so
/// [`LiveBoard::shutdown`] (or dropping the board) stops every fetch and
/// timer at once.
#[derive(Debug)]
pub struct LiveBoard {
    token: CancellationToken,
    pub shifts: Synchronizer<Shift>,
    pub timesheets: Synchronizer<Timesheet>,
    pub events: Synchronizer<Event>,
    pub calls: Synchronizer<CallRecord>,
    pub presence: PresenceTracker,
}

impl LiveBoard {
    pub fn spawn<S, T, E, C, P>(
        feeds: BoardFeeds<S, T, E, C, P>,
        tuning: SyncTuning,
        bus: &RefreshBus,
    ) -> Self
    where
        S: Feed<Record = Shift>,
        T: Feed<Record = Timesheet>,
        E: Feed<Record = Event>,
        C: Feed<Record = CallRecord>,
        P: Feed<Record = PersonPresence>,
    {
        let token = CancellationToken::new();
        let bus = Some(bus);
        Self {
            shifts: Synchronizer::spawn(feeds.shifts, tuning, bus, &token),
            timesheets: Synchronizer::spawn(feeds.timesheets, tuning, bus, &token),
            events: Synchronizer::spawn(feeds.events, tuning, bus, &token),
            calls: Synchronizer::spawn(feeds.calls, tuning, bus, &token),
            presence: PresenceTracker::spawn(feeds.presence, tuning, bus, &token),
            token,
        }
    }

    pub fn connect(client: &RotaClient, tuning: SyncTuning, bus: &RefreshBus) -> Self {
        Self::spawn(BoardFeeds::http(client), tuning, bus)
    }

    /// Retargets every synchronizer.
    pub fn set_range(&self, range: DateRange) {
        tracing::info!(%range, "board range changed");
        self.shifts.set_range(range);
        self.timesheets.set_range(range);
        self.events.set_range(range);
        self.calls.set_range(range);
        self.presence.set_range(range);
    }

    pub fn refresh_all(&self) {
        self.shifts.refresh();
        self.timesheets.refresh();
        self.events.refresh();
        self.calls.refresh();
        self.presence.refresh();
    }

    /// Every synchronizer has applied at least one fetch.
    pub fn is_loaded(&self) -> bool {
        self.shifts.state().loaded
            && self.timesheets.state().loaded
            && self.events.state().loaded
            && self.calls.state().loaded
            && self.presence.state().loaded
    }

    /// Some synchronizer is showing its loading indicator.
    pub fn is_loading(&self) -> bool {
        self.shifts.state().loading
            || self.timesheets.state().loading
            || self.events.state().loading
            || self.calls.state().loading
            || self.presence.state().loading
    }

    /// Total fetches applied across the view; changes whenever any snapshot does.
    pub fn applied(&self) -> u64 {
        self.shifts.state().counters.applied
            + self.timesheets.state().counters.applied
            + self.events.state().counters.applied
            + self.calls.state().counters.applied
            + self.presence.state().counters.applied
    }

    /// The last fetch error of each synchronizer that has one.
    pub fn errors(&self) -> Vec<(EntityKind, String)> {
        [
            (EntityKind::Shifts, self.shifts.state().last_error),
            (EntityKind::Timesheets, self.timesheets.state().last_error),
            (EntityKind::Events, self.events.state().last_error),
            (EntityKind::Calls, self.calls.state().last_error),
            (EntityKind::Presence, self.presence.state().last_error),
        ]
        .into_iter()
        .filter_map(|(kind, error)| error.map(|e| (kind, e)))
        .collect()
    }

    /// Builds the board for `date` from the current snapshots.
    ///
    /// Snapshots refresh independently, so a board may combine records
    /// fetched up to one poll interval apart.
    pub fn board(
        &self,
        date: NaiveDate,
        filters: &FilterSet,
        config: &AggregatorConfig,
        now: NaiveDateTime,
    ) -> DayBoard {
        let shifts = self.shifts.records();
        let timesheets = self.timesheets.records();
        let events = self.events.records();
        let calls = self.calls.records();
        let roster = self.presence.roster();
        let inputs = BoardInputs {
            shifts: &shifts,
            timesheets: &timesheets,
            events: &events,
            calls: &calls,
            roster: &roster,
        };
        group_shifts(date, &inputs, filters, config, now)
    }

    /// Cancels the whole view without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels the whole view and waits for every synchronizer to stop.
    pub async fn shutdown(self) {
        self.token.cancel();
        tokio::join!(
            self.shifts.shutdown(),
            self.timesheets.shutdown(),
            self.events.shutdown(),
            self.calls.shutdown(),
            self.presence.shutdown(),
        );
        tracing::debug!("board stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rota_core::{AttendanceStatus, EventCategory, PersonId, ShiftId};
    use rota_core::timestamp::{ClockTime, WireTime, parse_timestamp};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("offline")]
    struct Offline;

    struct Fixed<R> {
        kind: EntityKind,
        records: Vec<R>,
        fetches: std::sync::Arc<AtomicUsize>,
    }

    impl<R> Fixed<R> {
        fn new(kind: EntityKind, records: Vec<R>) -> Self {
            Self {
                kind,
                records,
                fetches: std::sync::Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl<R: Clone + Send + Sync + 'static> Feed for Fixed<R> {
        type Record = R;
        type Error = Offline;

        fn kind(&self) -> EntityKind {
            self.kind
        }

        fn fetch(&self, _range: DateRange) -> impl Future<Output = Result<Vec<R>, Offline>> + Send {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let records = self.records.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(records)
            }
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn feeds() -> BoardFeeds<
        Fixed<Shift>,
        Fixed<Timesheet>,
        Fixed<Event>,
        Fixed<CallRecord>,
        Fixed<PersonPresence>,
    > {
        let person = PersonId::new("1042").unwrap();
        BoardFeeds {
            shifts: Fixed::new(
                EntityKind::Shifts,
                vec![Shift {
                    id: ShiftId::new("s-1").unwrap(),
                    person_id: person.clone(),
                    person_name: Some("Jo Bloggs".to_string()),
                    date: Some(date()),
                    start: ClockTime::from_hhmm(900),
                    end: ClockTime::from_hhmm(1700),
                    unallocated: false,
                }],
            ),
            timesheets: Fixed::new(
                EntityKind::Timesheets,
                vec![Timesheet {
                    id: None,
                    person_id: person.clone(),
                    kind: None,
                    on_time: at("2025-01-15 09:20:00").into(),
                    off_time: WireTime::Absent,
                }],
            ),
            events: Fixed::new(
                EntityKind::Events,
                vec![Event {
                    id: EventId::new("e-1").unwrap(),
                    shift_id: None,
                    person_id: person.clone(),
                    category: EventCategory::Other("Training".to_string()),
                    on_time: at("2025-01-15 13:00:00").into(),
                    off_time: at("2025-01-15 14:00:00").into(),
                }],
            ),
            calls: Fixed::new(EntityKind::Calls, Vec::new()),
            presence: Fixed::new(
                EntityKind::Presence,
                vec![PersonPresence {
                    person_id: person,
                    name: None,
                    last_active_at: Some(at("2025-01-15 11:59:00")),
                    job_title: Some("Advisor".to_string()),
                    rank: None,
                    profile_photo: None,
                }],
            ),
        }
    }

    struct FakeRemover {
        fail: bool,
        removed: Mutex<Vec<EventId>>,
    }

    impl EventRemover for FakeRemover {
        fn remove_event(
            &self,
            id: &EventId,
        ) -> impl Future<Output = Result<(), ApiError>> + Send {
            let result = if self.fail {
                Err(ApiError::Api {
                    status: 500,
                    message: "Server Error".to_string(),
                })
            } else {
                self.removed.lock().unwrap().push(id.clone());
                Ok(())
            };
            async move { result }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn board_combines_live_snapshots() {
        let bus = RefreshBus::new();
        let live = LiveBoard::spawn(feeds(), SyncTuning::default(), &bus);
        assert!(!live.is_loaded());

        live.set_range(DateRange::day(date()));
        let mut presence = live.presence.synchronizer().subscribe();
        presence.wait_for(|s| s.loaded).await.unwrap();
        live.shifts.subscribe().wait_for(|s| s.loaded).await.unwrap();
        live.timesheets.subscribe().wait_for(|s| s.loaded).await.unwrap();
        live.events.subscribe().wait_for(|s| s.loaded).await.unwrap();
        live.calls.subscribe().wait_for(|s| s.loaded).await.unwrap();
        assert!(live.is_loaded());
        assert!(!live.is_loading());
        assert_eq!(live.applied(), 5);
        assert!(live.errors().is_empty());

        let board = live.board(
            date(),
            &FilterSet::default(),
            &AggregatorConfig::default(),
            at("2025-01-15 12:00:00"),
        );
        assert_eq!(board.buckets.len(), 1);
        let row = &board.buckets[0].rows[0];
        assert_eq!(row.status(), AttendanceStatus::Late);
        assert_eq!(row.job_title.as_deref(), Some("Advisor"));

        live.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_polling() {
        let bus = RefreshBus::new();
        let feeds = feeds();
        let shift_fetches = std::sync::Arc::clone(&feeds.shifts.fetches);
        let live = LiveBoard::spawn(feeds, SyncTuning::default(), &bus);

        live.set_range(DateRange::day(date()));
        live.shifts.subscribe().wait_for(|s| s.loaded).await.unwrap();
        live.shutdown().await;

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(shift_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn removal_raises_refresh_signals() {
        let bus = RefreshBus::new();
        let mut rx = bus.subscribe();
        let remover = FakeRemover {
            fail: false,
            removed: Mutex::new(Vec::new()),
        };
        let id = EventId::new("e-1").unwrap();

        remove_event_and_refresh(&remover, &bus, &id).await.unwrap();

        assert_eq!(*remover.removed.lock().unwrap(), vec![id]);
        assert_eq!(rx.recv().await.unwrap(), RefreshSignal::TIMESHEETS);
        assert_eq!(rx.recv().await.unwrap(), RefreshSignal::EVENTS);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_removal_is_reported_without_signals() {
        let bus = RefreshBus::new();
        let mut rx = bus.subscribe();
        let remover = FakeRemover {
            fail: true,
            removed: Mutex::new(Vec::new()),
        };

        let err = remove_event_and_refresh(&remover, &bus, &EventId::new("e-9").unwrap())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to remove event e-9: API error (status 500): Server Error"
        );
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn removal_refetches_events_and_timesheets_only() {
        let bus = RefreshBus::new();
        let feeds = feeds();
        let shift_fetches = std::sync::Arc::clone(&feeds.shifts.fetches);
        let event_fetches = std::sync::Arc::clone(&feeds.events.fetches);
        let live = LiveBoard::spawn(feeds, SyncTuning::default(), &bus);

        live.set_range(DateRange::day(date()));
        live.events.subscribe().wait_for(|s| s.loaded).await.unwrap();
        live.shifts.subscribe().wait_for(|s| s.loaded).await.unwrap();

        let remover = FakeRemover {
            fail: false,
            removed: Mutex::new(Vec::new()),
        };
        remove_event_and_refresh(&remover, &bus, &EventId::new("e-1").unwrap())
            .await
            .unwrap();
        live.events
            .subscribe()
            .wait_for(|s| s.counters.applied == 2)
            .await
            .unwrap();
        live.timesheets
            .subscribe()
            .wait_for(|s| s.counters.applied == 2)
            .await
            .unwrap();

        assert_eq!(event_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(shift_fetches.load(Ordering::SeqCst), 1);
        live.shutdown().await;
    }
}
