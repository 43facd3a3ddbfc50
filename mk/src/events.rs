//! Event bus for scan lifecycle and data changes
//!
//! Observers (tree views, status bar badges, the CLI) subscribe to the bus and
//! receive every event emitted after they subscribed. Emitting never blocks
//! and never fails; with no subscribers the event is simply dropped.
//!
//! ```text
//!   Scanner ──ScanStarted──────────┐
//!   Scanner ──ScanCompleted{count}─┼──► broadcast ──► subscribers
//!   Scanner ──ItemsChanged{items}──┘
//! ```

use tokio::sync::broadcast;
use tracing::debug;

use crate::model::DetectedItem;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Events published by the scanner
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A workspace scan is about to start
    ScanStarted,
    /// A workspace scan finished with `count` items in the index
    ScanCompleted { count: usize },
    /// The set of items changed; carries the current open items
    ItemsChanged { items: Vec<DetectedItem> },
}

impl ScanEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ScanStarted => "ScanStarted",
            Self::ScanCompleted { .. } => "ScanCompleted",
            Self::ItemsChanged { .. } => "ItemsChanged",
        }
    }
}

/// Publish/subscribe channel for [`ScanEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all current subscribers
    ///
    /// Delivery order matches emit order. If a subscriber falls more than the
    /// channel capacity behind, it loses the oldest events.
    pub fn emit(&self, event: ScanEvent) {
        debug!(event_type = event.event_type(), "EventBus::emit");
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
