//! Pull-based access to a user's health events.
//!
//! An [`EventSource`] always returns the complete event set for a user; the
//! timeline recomputes wholesale from it. Sources do not validate values,
//! the engine does that, but the JSON file source skips records that do
//! not even parse as events.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bodyline_core::event::HealthEvent;
use bodyline_core::types::UserId;
use tokio::sync::RwLock;

use crate::bus::{EventBus, EventsChanged};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read events from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse events from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Event source unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Asynchronous provider of a user's full event set.
pub trait EventSource: Send + Sync {
    /// Fetch every event for `user_id`. Unknown users yield an empty set.
    fn fetch_events(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<HealthEvent>, SourceError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemoryEventSource
// ---------------------------------------------------------------------------

/// Event store held in memory, optionally announcing changes on a bus.
#[derive(Debug, Default)]
pub struct InMemoryEventSource {
    events: RwLock<HashMap<UserId, Vec<HealthEvent>>>,
    bus: Option<Arc<EventBus>>,
}

impl InMemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an [`EventsChanged`] notice on `bus` after every mutation.
    pub fn with_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Replace a user's whole event set.
    pub async fn replace(&self, user_id: UserId, events: Vec<HealthEvent>) {
        self.events.write().await.insert(user_id, events);
        self.notify(user_id, "replace");
    }

    /// Append events to a user's set.
    pub async fn append(&self, user_id: UserId, events: impl IntoIterator<Item = HealthEvent>) {
        self.events
            .write()
            .await
            .entry(user_id)
            .or_default()
            .extend(events);
        self.notify(user_id, "append");
    }

    pub async fn len(&self, user_id: UserId) -> usize {
        self.events.read().await.get(&user_id).map_or(0, Vec::len)
    }

    fn notify(&self, user_id: UserId, origin: &str) {
        if let Some(bus) = &self.bus {
            bus.publish(EventsChanged::new(user_id).with_origin(origin));
        }
    }
}

impl EventSource for InMemoryEventSource {
    async fn fetch_events(&self, user_id: UserId) -> Result<Vec<HealthEvent>, SourceError> {
        Ok(self
            .events
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// JsonFileEventSource
// ---------------------------------------------------------------------------

/// Reads one user's events from a JSON array on disk.
///
/// The file is re-read on every fetch so edits are picked up by the next
/// reload. Records that do not deserialize into a [`HealthEvent`] are
/// skipped with a warning; a file that is not a JSON array is an error.
#[derive(Debug, Clone)]
pub struct JsonFileEventSource {
    path: PathBuf,
    user_id: UserId,
}

impl JsonFileEventSource {
    pub fn new(path: impl Into<PathBuf>, user_id: UserId) -> Self {
        Self {
            path: path.into(),
            user_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, raw: &[u8]) -> Result<Vec<HealthEvent>, SourceError> {
        let records: Vec<serde_json::Value> =
            serde_json::from_slice(raw).map_err(|source| SourceError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let total = records.len();
        let events: Vec<HealthEvent> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match serde_json::from_value(record) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        index,
                        error = %e,
                        "Skipping unreadable health event record"
                    );
                    None
                }
            })
            .collect();

        tracing::debug!(
            path = %self.path.display(),
            total,
            loaded = events.len(),
            "Loaded health events from file"
        );
        Ok(events)
    }
}

impl EventSource for JsonFileEventSource {
    async fn fetch_events(&self, user_id: UserId) -> Result<Vec<HealthEvent>, SourceError> {
        if user_id != self.user_id {
            return Ok(Vec::new());
        }
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.parse(&raw)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use bodyline_core::event::EventPayload;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn weight(id: &str, kg: f64) -> HealthEvent {
        HealthEvent::new(
            id,
            Utc.with_ymd_and_hms(2025, 10, 15, 7, 30, 0).unwrap(),
            EventPayload::Weight { kg },
        )
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bodyline-{}-{name}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn in_memory_unknown_user_is_empty() {
        let source = InMemoryEventSource::new();
        assert!(source.fetch_events(uuid::Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_memory_append_and_replace() {
        let source = InMemoryEventSource::new();
        let user = uuid::Uuid::new_v4();

        source.append(user, [weight("a", 80.0)]).await;
        source.append(user, [weight("b", 81.0)]).await;
        assert_eq!(source.len(user).await, 2);

        source.replace(user, vec![weight("c", 79.0)]).await;
        let events = source.fetch_events(user).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "c");
    }

    #[tokio::test]
    async fn in_memory_mutations_publish_notices() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let source = InMemoryEventSource::new().with_bus(Arc::clone(&bus));
        let user = uuid::Uuid::new_v4();

        source.append(user, [weight("a", 80.0)]).await;

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.user_id, user);
        assert_eq!(notice.origin.as_deref(), Some("append"));
    }

    #[tokio::test]
    async fn json_file_skips_unreadable_records() {
        let path = temp_path("mixed");
        let body = serde_json::json!([
            {"id": "w1", "timestamp": "2025-10-15T07:30:00Z", "stream": "weight", "kg": 80.5},
            {"id": "bad", "timestamp": "2025-10-15T07:30:00Z", "stream": "heart_rate", "bpm": 60},
            {"id": "s1", "timestamp": "2025-10-15T20:00:00Z", "stream": "steps", "count": 9000}
        ]);
        tokio::fs::write(&path, body.to_string()).await.unwrap();

        let user = uuid::Uuid::new_v4();
        let source = JsonFileEventSource::new(&path, user);
        let events = source.fetch_events(user).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "s1"]);
    }

    #[tokio::test]
    async fn json_file_other_user_is_empty() {
        let source = JsonFileEventSource::new(temp_path("unused"), uuid::Uuid::new_v4());
        assert!(source.fetch_events(uuid::Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_file_missing_is_io_error() {
        let user = uuid::Uuid::new_v4();
        let source = JsonFileEventSource::new(temp_path("missing"), user);
        assert_matches!(source.fetch_events(user).await, Err(SourceError::Io { .. }));
    }

    #[tokio::test]
    async fn json_file_not_an_array_is_parse_error() {
        let path = temp_path("object");
        tokio::fs::write(&path, r#"{"events": []}"#).await.unwrap();
        let user = uuid::Uuid::new_v4();
        let result = JsonFileEventSource::new(&path, user).fetch_events(user).await;
        tokio::fs::remove_file(&path).await.unwrap();
        assert_matches!(result, Err(SourceError::Parse { .. }));
    }
}
