//! Health event ingress for the timeline engine.
//!
//! - [`EventSource`] - async pull of a user's full event set.
//! - [`InMemoryEventSource`] / [`JsonFileEventSource`] - shipped sources.
//! - [`EventBus`] - in-process "events changed" notices backed by
//!   `tokio::sync::broadcast`.

pub mod bus;
pub mod source;

pub use bus::{EventBus, EventsChanged};
pub use source::{EventSource, InMemoryEventSource, JsonFileEventSource, SourceError};
