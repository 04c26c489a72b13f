//! The event source backing the server.

use std::sync::Arc;

use bodyline_core::event::HealthEvent;
use bodyline_core::types::UserId;
use bodyline_events::source::{EventSource, InMemoryEventSource, JsonFileEventSource, SourceError};
use bodyline_events::EventBus;

use crate::config::ServerConfig;

/// Either a JSON file on disk or an in-memory store.
#[derive(Debug)]
pub enum ServerEventSource {
    File(JsonFileEventSource),
    Memory(InMemoryEventSource),
}

impl ServerEventSource {
    /// File-backed when `EVENTS_FILE` is configured, otherwise an empty
    /// in-memory store announcing its changes on `bus`.
    pub fn from_config(config: &ServerConfig, bus: &Arc<EventBus>) -> Self {
        match &config.events_file {
            Some(path) => Self::File(JsonFileEventSource::new(path, config.user_id)),
            None => Self::Memory(InMemoryEventSource::new().with_bus(Arc::clone(bus))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "json_file",
            Self::Memory(_) => "in_memory",
        }
    }
}

impl EventSource for ServerEventSource {
    async fn fetch_events(&self, user_id: UserId) -> Result<Vec<HealthEvent>, SourceError> {
        match self {
            Self::File(source) => source.fetch_events(user_id).await,
            Self::Memory(source) => source.fetch_events(user_id).await,
        }
    }
}
