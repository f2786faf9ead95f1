//! In-process notification bus for appended event batches.
//!
//! Optional surface: a messaging front-end can subscribe to forward change
//! events as they are produced. Delivery is best-effort; the journal remains
//! the durable record.

use crate::journal::Event;
use crate::types::AccountId;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// One cycle's appended events for one account.
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub account: AccountId,
    pub events: Vec<Event>,
}

#[derive(Clone)]
pub struct EventBus {
    sender: UnboundedSender<EventBatch>,
}

impl EventBus {
    pub fn new_pair() -> (Self, UnboundedReceiver<EventBatch>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    /// A bus with no subscriber; publishes are dropped.
    pub fn disconnected() -> Self {
        let (bus, _receiver) = Self::new_pair();
        bus
    }

    pub fn publish(&self, account: AccountId, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        if self.sender.send(EventBatch { account, events }).is_err() {
            debug!(%account, "no notification subscriber; dropping event batch");
        }
    }
}
