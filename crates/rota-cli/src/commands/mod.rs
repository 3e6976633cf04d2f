//! CLI subcommand implementations.

pub mod board;
pub mod presence;
pub mod remove_event;
pub mod shift;
pub mod snapshot;
pub mod util;
pub mod watch;
