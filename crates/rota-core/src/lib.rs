//! Core domain logic for the rota attendance dashboard.
//!
//! This crate contains the record types served by the rota API and the pure
//! logic built on them:
//! - Classification: deciding each shift's attendance status
//! - Aggregation: grouping a day's shifts into start-time buckets and filtering them
//! - Presence: active/idle/offline from last-active timestamps
//! - Shift detail: hours summary and the merged activity log

pub mod aggregate;
mod classify;
pub mod detail;
pub mod event;
pub mod presence;
pub mod range;
pub mod record;
pub mod status;
pub mod timestamp;
pub mod types;

pub use aggregate::{
    AggregatorConfig, BoardInputs, BoardRow, Bucket, BucketKey, DayBoard, FilterDimension,
    FilterSet, group_shifts,
};
pub use classify::{Classification, ClassifierConfig, classify};
pub use detail::{ShiftDetail, resolve_selected};
pub use event::{Event, EventCategory};
pub use presence::{Activity, PersonPresence, PresenceRoster, classify_activity};
pub use range::{DateRange, EntityKind};
pub use record::{CallRecord, Shift, ShiftWindow, Timesheet};
pub use status::{AttendanceStatus, StatusTone};
pub use timestamp::WireTime;
pub use types::{EventId, PersonId, ShiftId, ValidationError};
