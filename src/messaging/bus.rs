/// Event bus for pub/sub messaging
///
/// Subscribers get their own unbounded channel; publishing never blocks.
/// Subscribers whose receiver was dropped are pruned on the next publish.
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use super::events::Event;

/// Subscriber ID for tracking subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(usize);

struct Subscriber {
    id: SubscriberId,
    sender: Sender<Event>,
}

/// Event bus for broadcasting events to subscribers; clones share state
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<Mutex<usize>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(Mutex::new(0)),
        }
    }

    /// Subscribe to events, returns a receiver and subscription ID
    pub fn subscribe(&self) -> (Receiver<Event>, SubscriberId) {
        let (tx, rx) = unbounded();

        let id = {
            let mut next_id = self.next_id.lock();
            let id = SubscriberId(*next_id);
            *next_id += 1;
            id
        };

        self.subscribers.write().push(Subscriber { id, sender: tx });
        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    /// Publish an event to all subscribers; returns how many received it
    pub fn publish(&self, event: Event) -> usize {
        let mut delivered = 0;
        let mut disconnected = Vec::new();

        for subscriber in self.subscribers.read().iter() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Disconnected(_)) => disconnected.push(subscriber.id),
                Err(TrySendError::Full(_)) => {}
            }
        }

        if !disconnected.is_empty() {
            self.subscribers
                .write()
                .retain(|s| !disconnected.contains(&s.id));
            tracing::debug!("Pruned {} closed subscribers", disconnected.len());
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
