//! List-changed notifications
//!
//! Sessions subscribe to the notifier and receive a [`ListChanged`] event
//! every time a capability list mutates. Events are queued per subscriber,
//! so a slow session never blocks registration or other sessions.

use crate::mcp::capability::CapabilityKind;
use crate::mcp::protocol::{JsonRpcNotification, notification_methods};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Identifies one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(Uuid);

impl fmt::Display for SubscriberId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A capability list changed and clients should fetch it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListChanged {
    pub kind: CapabilityKind,
}

impl ListChanged {
    /// The MCP notification announcing this change
    #[inline]
    pub fn to_notification(self) -> JsonRpcNotification {
        let method = match self.kind {
            CapabilityKind::Tool => notification_methods::TOOLS_LIST_CHANGED,
            CapabilityKind::Resource => notification_methods::RESOURCES_LIST_CHANGED,
            CapabilityKind::Prompt => notification_methods::PROMPTS_LIST_CHANGED,
        };
        JsonRpcNotification::new(method.to_string(), None)
    }
}

type Subscribers = HashMap<SubscriberId, mpsc::UnboundedSender<ListChanged>>;

/// Fans list-changed events out to every subscriber
#[derive(Debug, Clone, Default)]
pub struct ChangeNotifier {
    subscribers: Arc<Mutex<Subscribers>>,
}

/// Receiving end of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<ListChanged>,
    notifier: ChangeNotifier,
}

impl ChangeNotifier {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribers(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        // The map stays consistent even if a holder panicked mid-operation.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start receiving list-changed events
    #[inline]
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(Uuid::new_v4());
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers().insert(id, sender);
        debug!("Subscriber {} added", id);

        Subscription {
            id,
            receiver,
            notifier: self.clone(),
        }
    }

    /// Stop delivering events to `id`. Returns whether it was subscribed.
    #[inline]
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers().remove(&id).is_some();
        if removed {
            debug!("Subscriber {} removed", id);
        }
        removed
    }

    /// Number of active subscribers
    #[inline]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    /// Queue a list-changed event for every subscriber without waiting for
    /// delivery. Subscribers whose receiver is gone are pruned.
    #[inline]
    pub fn notify(&self, kind: CapabilityKind) {
        let event = ListChanged { kind };
        let mut subscribers = self.subscribers();
        subscribers.retain(|id, sender| {
            let delivered = sender.send(event).is_ok();
            if !delivered {
                debug!("Pruning closed subscriber {}", id);
            }
            delivered
        });
        trace!(
            "Queued {} list change for {} subscribers",
            kind,
            subscribers.len()
        );
    }

    #[inline]
    pub fn notify_tools_changed(&self) {
        self.notify(CapabilityKind::Tool);
    }
}

impl Subscription {
    #[inline]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. Returns `None` once unsubscribed.
    #[inline]
    pub async fn recv(&mut self) -> Option<ListChanged> {
        self.receiver.recv().await
    }

    /// Take an already queued event without waiting
    #[inline]
    pub fn try_recv(&mut self) -> Option<ListChanged> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    #[inline]
    fn drop(&mut self) {
        self.notifier.unsubscribe(self.id);
    }
}
