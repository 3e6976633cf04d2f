//! Live presence: a synchronizer over the presence feed plus roster views.

use chrono::NaiveDateTime;
use rota_core::{Activity, DateRange, PersonId, PersonPresence, PresenceRoster};
use tokio_util::sync::CancellationToken;

use crate::feed::Feed;
use crate::refresh::RefreshBus;
use crate::sync::{SyncState, SyncTuning, Synchronizer};

/// Keeps the person-id → last-active snapshot fresh.
#[derive(Debug)]
pub struct PresenceTracker {
    sync: Synchronizer<PersonPresence>,
}

impl PresenceTracker {
    pub fn spawn<F>(
        feed: F,
        tuning: SyncTuning,
        bus: Option<&RefreshBus>,
        parent: &CancellationToken,
    ) -> Self
    where
        F: Feed<Record = PersonPresence>,
    {
        Self {
            sync: Synchronizer::spawn(feed, tuning, bus, parent),
        }
    }

    pub fn set_range(&self, range: DateRange) {
        self.sync.set_range(range);
    }

    pub fn refresh(&self) {
        self.sync.refresh();
    }

    pub fn state(&self) -> SyncState<PersonPresence> {
        self.sync.state()
    }

    /// A lookup view over the latest snapshot.
    pub fn roster(&self) -> PresenceRoster {
        PresenceRoster::from_records(self.sync.records().iter().cloned())
    }

    pub fn activity(&self, person: &PersonId, now: NaiveDateTime) -> Activity {
        self.roster().activity(person, now)
    }

    pub const fn synchronizer(&self) -> &Synchronizer<PersonPresence> {
        &self.sync
    }

    pub async fn shutdown(self) {
        self.sync.shutdown().await;
    }
}
