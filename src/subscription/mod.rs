//! Change-notification registry.
//!
//! Tracks interest in per-identity changes, per-tag changes and "any new
//! event", and fans notifications out after successful journal writes.
//! Each subscriber is an unbounded channel, so one subscriber sees
//! notifications in the order they were triggered. Delivery across
//! subscribers is unordered.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Messages delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// New events were written for this persistence identity.
    EventAppended { persistence_id: String },
    /// New events carrying this tag were written.
    TaggedEventAppended { tag: String },
    /// Some new event was written.
    NewEventAppended,
}

/// Cheap-to-clone handle identifying one subscriber.
///
/// Equality and hashing use the handle id, so the same handle can be passed
/// to both subscribe and unsubscribe calls.
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    id: Uuid,
    sender: mpsc::UnboundedSender<Notification>,
}

impl SubscriberHandle {
    /// Create a handle and the receiver its notifications arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::new_v4(),
                sender,
            },
            receiver,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn deliver(&self, notification: Notification) -> bool {
        self.sender.send(notification).is_ok()
    }
}

impl PartialEq for SubscriberHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SubscriberHandle {}

impl Hash for SubscriberHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

type Keyed = RwLock<HashMap<String, HashSet<SubscriberHandle>>>;

/// Subscriber sets owned by one backend instance.
#[derive(Default)]
pub struct SubscriptionRegistry {
    by_identity: Keyed,
    by_tag: Keyed,
    new_events: RwLock<HashSet<SubscriberHandle>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe_identity(&self, persistence_id: &str, handle: SubscriberHandle) {
        subscribe_keyed(&self.by_identity, persistence_id, handle).await;
        debug!(persistence_id, "Identity subscriber added");
    }

    pub async fn unsubscribe_identity(&self, persistence_id: &str, handle: &SubscriberHandle) {
        unsubscribe_keyed(&self.by_identity, persistence_id, handle).await;
    }

    pub async fn subscribe_tag(&self, tag: &str, handle: SubscriberHandle) {
        subscribe_keyed(&self.by_tag, tag, handle).await;
        debug!(tag, "Tag subscriber added");
    }

    pub async fn unsubscribe_tag(&self, tag: &str, handle: &SubscriberHandle) {
        unsubscribe_keyed(&self.by_tag, tag, handle).await;
    }

    pub async fn subscribe_new_events(&self, handle: SubscriberHandle) {
        self.new_events.write().await.insert(handle);
    }

    pub async fn unsubscribe_new_events(&self, handle: &SubscriberHandle) {
        self.new_events.write().await.remove(handle);
    }

    /// Remove a handle from every set, e.g. when its owner terminated.
    pub async fn unsubscribe_all(&self, handle: &SubscriberHandle) {
        for keyed in [&self.by_identity, &self.by_tag] {
            let mut map = keyed.write().await;
            map.retain(|_, set| {
                set.remove(handle);
                !set.is_empty()
            });
        }
        self.new_events.write().await.remove(handle);
    }

    pub async fn has_identity_subscribers(&self) -> bool {
        !self.by_identity.read().await.is_empty()
    }

    pub async fn has_tag_subscribers(&self) -> bool {
        !self.by_tag.read().await.is_empty()
    }

    pub async fn has_new_event_subscribers(&self) -> bool {
        !self.new_events.read().await.is_empty()
    }

    /// Notify subscribers of `persistence_id`. Returns the number reached.
    pub async fn notify_identity(&self, persistence_id: &str) -> usize {
        let notification = Notification::EventAppended {
            persistence_id: persistence_id.to_string(),
        };
        notify_keyed(&self.by_identity, persistence_id, notification).await
    }

    /// Notify subscribers of `tag`. Returns the number reached.
    pub async fn notify_tag(&self, tag: &str) -> usize {
        let notification = Notification::TaggedEventAppended {
            tag: tag.to_string(),
        };
        notify_keyed(&self.by_tag, tag, notification).await
    }

    /// Notify every "new event" subscriber. Returns the number reached.
    pub async fn notify_new_event(&self) -> usize {
        let (delivered, dead) = {
            let set = self.new_events.read().await;
            deliver_all(set.iter(), &Notification::NewEventAppended)
        };
        if !dead.is_empty() {
            let mut set = self.new_events.write().await;
            for handle in &dead {
                set.remove(handle);
            }
            warn!(pruned = dead.len(), "Pruned closed new-event subscribers");
        }
        delivered
    }
}

async fn subscribe_keyed(keyed: &Keyed, key: &str, handle: SubscriberHandle) {
    keyed
        .write()
        .await
        .entry(key.to_string())
        .or_default()
        .insert(handle);
}

async fn unsubscribe_keyed(keyed: &Keyed, key: &str, handle: &SubscriberHandle) {
    let mut map = keyed.write().await;
    if let Some(set) = map.get_mut(key) {
        set.remove(handle);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

async fn notify_keyed(keyed: &Keyed, key: &str, notification: Notification) -> usize {
    let (delivered, dead) = {
        let map = keyed.read().await;
        match map.get(key) {
            Some(set) => deliver_all(set.iter(), &notification),
            None => return 0,
        }
    };
    if !dead.is_empty() {
        for handle in &dead {
            unsubscribe_keyed(keyed, key, handle).await;
        }
        warn!(key, pruned = dead.len(), "Pruned closed subscribers");
    }
    delivered
}

/// Send to each handle, returning the delivered count and the closed handles.
fn deliver_all<'a>(
    handles: impl Iterator<Item = &'a SubscriberHandle>,
    notification: &Notification,
) -> (usize, Vec<SubscriberHandle>) {
    let mut delivered = 0;
    let mut dead = Vec::new();
    for handle in handles {
        if handle.deliver(notification.clone()) {
            delivered += 1;
        } else {
            dead.push(handle.clone());
        }
    }
    (delivered, dead)
}
