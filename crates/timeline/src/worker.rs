//! Background task driving a [`TimelineService`] from bus notices.
//!
//! [`TimelineWorker::run`] listens for [`EventsChanged`] notices for one
//! user, drains any burst of notices already queued, then refetches the
//! full event set once. It shuts down when the bus is dropped.

use std::sync::Arc;

use bodyline_core::types::UserId;
use bodyline_events::bus::EventsChanged;
use bodyline_events::source::EventSource;
use tokio::sync::broadcast;

use crate::service::{TimelineService, UpdateOutcome};

pub struct TimelineWorker<S> {
    service: Arc<TimelineService>,
    source: Arc<S>,
    user_id: UserId,
}

impl<S: EventSource> TimelineWorker<S> {
    pub fn new(service: Arc<TimelineService>, source: Arc<S>, user_id: UserId) -> Self {
        Self {
            service,
            source,
            user_id,
        }
    }

    /// Run the notice loop until the bus closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<EventsChanged>) {
        tracing::info!(user_id = %self.user_id, "Timeline worker started");
        loop {
            match receiver.recv().await {
                Ok(notice) => {
                    let relevant = notice.user_id == self.user_id;
                    let (drained, closed) = self.drain(&mut receiver);
                    if relevant || drained > 0 {
                        self.reload(drained + 1).await;
                    }
                    if closed {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Missed notices may have been ours; refetch to be current.
                    tracing::warn!(skipped = n, "Timeline worker lagged, reloading");
                    self.reload(n as usize).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::info!(user_id = %self.user_id, "Event bus closed, timeline worker shutting down");
    }

    /// Consume queued notices. Returns how many concerned this user and
    /// whether the bus closed meanwhile.
    fn drain(&self, receiver: &mut broadcast::Receiver<EventsChanged>) -> (usize, bool) {
        let mut relevant = 0;
        loop {
            match receiver.try_recv() {
                Ok(notice) => {
                    if notice.user_id == self.user_id {
                        relevant += 1;
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    relevant += n as usize;
                }
                Err(broadcast::error::TryRecvError::Empty) => return (relevant, false),
                Err(broadcast::error::TryRecvError::Closed) => return (relevant, true),
            }
        }
    }

    async fn reload(&self, notices: usize) {
        match self.service.refresh(self.source.as_ref(), self.user_id).await {
            Ok(UpdateOutcome::Published { generation }) => {
                tracing::debug!(user_id = %self.user_id, notices, generation, "Timeline reloaded");
            }
            Ok(UpdateOutcome::Coalesced) => {
                tracing::debug!(user_id = %self.user_id, notices, "Timeline reload coalesced");
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    user_id = %self.user_id,
                    "Failed to reload health events"
                );
            }
        }
    }
}
