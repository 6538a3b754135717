//! Notifications emitted for observers (UIs, indexers).
//!
//! Delivery is a side channel: the reducer describes a notification as an effect
//! and the runtime hands it to the configured [`NotificationSink`] after the state
//! change is complete. Sinks are fire-and-forget.

use crate::types::{AccountId, Money, TicketId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// Something observers may want to know about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketNotification {
    /// A ticket was issued
    Issued {
        /// New ticket
        ticket_id: TicketId,
        /// First holder
        buyer: AccountId,
        /// Issue price
        price: Money,
    },

    /// A resale request passed validation
    TradeRequested {
        /// Ticket concerned
        ticket_id: TicketId,
        /// Who asked
        requester: AccountId,
        /// Price asked for
        proposed_price: Money,
    },

    /// A resale was settled
    TradeCompleted {
        /// Ticket concerned
        ticket_id: TicketId,
        /// Holder after the resale
        new_holder: AccountId,
        /// Amount forwarded to the previous holder
        paid_amount: Money,
    },
}

impl TicketNotification {
    /// Ticket the notification is about
    #[must_use]
    pub const fn ticket_id(&self) -> TicketId {
        match self {
            Self::Issued { ticket_id, .. }
            | Self::TradeRequested { ticket_id, .. }
            | Self::TradeCompleted { ticket_id, .. } => *ticket_id,
        }
    }
}

/// Receives notifications; must not block
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification
    fn publish(&self, notification: TicketNotification);
}

/// Sink backed by a tokio broadcast channel
///
/// Publishing with no subscriber drops the notification.
#[derive(Clone, Debug)]
pub struct BroadcastSink {
    sender: broadcast::Sender<TicketNotification>,
}

impl BroadcastSink {
    /// Creates a sink buffering up to `capacity` notifications per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to notifications published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TicketNotification> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, notification: TicketNotification) {
        if self.sender.send(notification).is_err() {
            tracing::trace!("No notification subscribers");
        }
    }
}

/// Sink that keeps every notification, for tests
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    seen: Arc<Mutex<Vec<TicketNotification>>>,
}

impl RecordingSink {
    /// Creates an empty recording sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in delivery order
    #[must_use]
    pub fn notifications(&self) -> Vec<TicketNotification> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, notification: TicketNotification) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}
