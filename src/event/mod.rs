//! In-process click event bus.
//!
//! One broadcast channel of click events. Subscribers attach an optional
//! `{owner_id, link_id}` filter (AND semantics) and consume at their own
//! pace; the publisher never blocks and never fails. A subscriber that lags
//! behind the channel capacity loses the missed events (`Lagged`), not the
//! stream. There is no persistence and no replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::storage::{CapturedUtm, DeviceClass, ReasonCode};

/// Channel capacity. Slow subscribers past this many undelivered events
/// start lagging.
const CHANNEL_CAPACITY: usize = 1024;

/// A click event as published to live subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickStreamEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub link_id: Uuid,
    pub short_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub device_class: DeviceClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    pub redirect_url: String,
    pub reason: ReasonCode,
    pub targeting_matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm: Option<CapturedUtm>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Subscriber-side filter; present fields must all match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub owner_id: Option<Uuid>,
    pub link_id: Option<Uuid>,
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &ClickStreamEvent) -> bool {
        if let Some(owner) = self.owner_id {
            if event.owner_id != Some(owner) {
                return false;
            }
        }
        if let Some(link) = self.link_id {
            if event.link_id != link {
                return false;
            }
        }
        true
    }
}

/// Click event bus. Cheap to clone; all clones share the channel.
#[derive(Clone)]
pub struct ClickEventBus {
    sender: broadcast::Sender<ClickStreamEvent>,
}

impl ClickEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish a click event. With no subscribers the event is dropped
    /// silently; the publisher never blocks.
    pub fn publish(&self, event: ClickStreamEvent) {
        trace!("Publishing click event for {}", event.short_code);
        let _ = self.sender.send(event);
    }

    /// Subscribe with an optional filter. Dropping the returned subscription
    /// cancels it.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> ClickSubscription {
        ClickSubscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    /// Current subscriber count (debug surface).
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ClickEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A filtered subscription to the click stream.
pub struct ClickSubscription {
    receiver: broadcast::Receiver<ClickStreamEvent>,
    filter: SubscriptionFilter,
}

impl ClickSubscription {
    /// Receive the next event passing the filter.
    ///
    /// Lagging skips the missed events and continues. Returns `None` once
    /// the bus is gone (process shutdown).
    pub async fn recv(&mut self) -> Option<ClickStreamEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    trace!("Click stream subscriber lagged, {} events missed", missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
