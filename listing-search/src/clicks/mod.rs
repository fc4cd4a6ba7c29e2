//! Search click signals.
//!
//! A click on a search hit is forwarded to the analytics collaborator
//! without waiting for it. Trackers never block the caller and never fail.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// A user clicked `resource_id` on the results page of `query`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickEvent {
    pub query: String,
    pub resource_id: Uuid,
    pub session_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(query: impl Into<String>, resource_id: Uuid, session_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            resource_id,
            session_id: session_id.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Sink for click events.
pub trait ClickTracker: Send + Sync {
    /// Record `event`. Must return without waiting on I/O.
    fn track(&self, event: ClickEvent);
}

/// Emits every click as a structured log event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingClickTracker;

impl ClickTracker for TracingClickTracker {
    fn track(&self, event: ClickEvent) {
        info!(
            target: "listing_search::clicks",
            query = %event.query,
            resource_id = %event.resource_id,
            session_id = %event.session_id,
            occurred_at = %event.occurred_at.to_rfc3339(),
            "Search click"
        );
    }
}

/// Hands clicks to a consumer task over a bounded channel.
///
/// Events are dropped, with a warning, when the channel is full or the
/// consumer has gone away.
#[derive(Debug, Clone)]
pub struct ChannelClickTracker {
    sender: mpsc::Sender<ClickEvent>,
}

impl ChannelClickTracker {
    /// Create a tracker and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ClickEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl ClickTracker for ChannelClickTracker {
    fn track(&self, event: ClickEvent) {
        if let Err(e) = self.sender.try_send(event) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "channel full",
                mpsc::error::TrySendError::Closed(_) => "channel closed",
            };
            warn!(reason = reason, "Dropped search click event");
        }
    }
}
