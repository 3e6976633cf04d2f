//! Live data for the rota dashboard.
//!
//! Each entity type (shifts, timesheets, events, calls, presence) is kept
//! fresh by its own [`Synchronizer`] task. A [`LiveBoard`] bundles the
//! synchronizers for one view and builds boards from whatever snapshots they
//! currently hold. Writes go through [`remove_event_and_refresh`], which
//! raises [`RefreshSignal`]s on the shared [`RefreshBus`].

mod board;
pub mod feed;
mod presence;
mod refresh;
mod sync;

pub use board::{BoardFeeds, EventRemover, LiveBoard, WriteFailure, remove_event_and_refresh};
pub use feed::{Feed, HttpFeed};
pub use presence::PresenceTracker;
pub use refresh::{RefreshBus, RefreshSignal};
pub use sync::{SyncCounters, SyncPhase, SyncState, SyncTuning, Synchronizer};
