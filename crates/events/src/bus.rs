//! In-process change-notice bus backed by a `tokio::sync::broadcast` channel.
//!
//! Sources publish an [`EventsChanged`] notice whenever a user's event set
//! changes; timeline workers subscribe and pull the new set. Notices carry
//! no events themselves. The bus is shared via `Arc<EventBus>`.

use bodyline_core::types::{Timestamp, UserId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// EventsChanged
// ---------------------------------------------------------------------------

/// Notice that a user's health event set changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsChanged {
    pub user_id: UserId,

    /// Free-form origin tag, e.g. `"healthkit"` or `"manual-entry"`.
    pub origin: Option<String>,

    /// When the change was observed (UTC).
    pub at: Timestamp,
}

impl EventsChanged {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            origin: None,
            at: Utc::now(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out bus for [`EventsChanged`] notices.
///
/// ```rust
/// use bodyline_events::bus::{EventBus, EventsChanged};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(EventsChanged::new(uuid::Uuid::nil()));
/// ```
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<EventsChanged>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer fills.
    /// Since notices only say "something changed", a lagged receiver just
    /// refetches.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notice to all current subscribers. Returns the number of
    /// receivers it reached.
    pub fn publish(&self, notice: EventsChanged) -> usize {
        // A SendError only means there are no receivers.
        self.sender.send(notice).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventsChanged> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
