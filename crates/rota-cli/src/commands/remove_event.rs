//! Remove-event command.

use std::io::Write;

use anyhow::{Context, Result};
use rota_core::EventId;
use rota_live::{RefreshBus, remove_event_and_refresh};

use crate::Config;

pub async fn run<W: Write>(writer: &mut W, config: &Config, event_id: &str) -> Result<()> {
    let event_id = EventId::new(event_id.trim()).context("invalid event id")?;
    let client = config.client().context("failed to create API client")?;

    // Nothing else listens in a one-shot run; the signals only matter to a live view.
    let bus = RefreshBus::new();
    remove_event_and_refresh(&client, &bus, &event_id).await?;

    tracing::info!(%event_id, "event removed");
    writeln!(writer, "Removed event {event_id}")?;
    Ok(())
}
