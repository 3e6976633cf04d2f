//! Process-wide refresh signals raised after writes.

use std::fmt;

use rota_core::EntityKind;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 16;

/// Asks synchronizers to refetch now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshSignal {
    /// Only the synchronizer for this entity type reacts.
    Entity(EntityKind),
    /// Every subscribed synchronizer reacts.
    All,
}

impl RefreshSignal {
    pub const TIMESHEETS: Self = Self::Entity(EntityKind::Timesheets);
    pub const EVENTS: Self = Self::Entity(EntityKind::Events);

    pub fn applies_to(self, kind: EntityKind) -> bool {
        match self {
            Self::Entity(target) => target == kind,
            Self::All => true,
        }
    }
}

impl fmt::Display for RefreshSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(kind) => write!(f, "refresh-{kind}"),
            Self::All => f.write_str("refresh-all"),
        }
    }
}

/// Broadcast channel for [`RefreshSignal`]s.
///
/// Cloning yields another handle to the same bus.
#[derive(Debug, Clone)]
pub struct RefreshBus {
    sender: broadcast::Sender<RefreshSignal>,
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshSignal> {
        self.sender.subscribe()
    }

    /// Raises a signal and returns how many subscribers saw it.
    pub fn raise(&self, signal: RefreshSignal) -> usize {
        let delivered = self.sender.send(signal).unwrap_or(0);
        tracing::debug!(%signal, delivered, "refresh signal raised");
        delivered
    }
}
