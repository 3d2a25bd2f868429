//! Per-owner status fan-out.
//!
//! [`Broadcaster`] keeps, for every owner, a list of subscribers, each with
//! its own bounded queue. Publishing never blocks: a subscriber whose queue
//! is full is dropped, and its consumer sees end-of-stream and is expected
//! to resubscribe.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rendition_common::{OriginalId, OriginalStatus, OwnerId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A status change of one Original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub original_id: OriginalId,
    pub status: OriginalStatus,
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(original_id: OriginalId, status: OriginalStatus) -> Self {
        Self {
            original_id,
            status,
            timestamp: Utc::now(),
        }
    }
}

/// Identifier of one subscription, unique within a [`Broadcaster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<StatusEvent>,
}

struct Inner {
    capacity: usize,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<OwnerId, Vec<Subscriber>>>,
}

impl Inner {
    fn remove(&self, owner: OwnerId, ids: &[SubscriberId]) {
        let mut map = self.subscribers.lock();
        if let Some(subs) = map.get_mut(&owner) {
            subs.retain(|s| !ids.contains(&s.id));
            if subs.is_empty() {
                map.remove(&owner);
            }
        }
    }
}

/// Fan-out of [`StatusEvent`]s to the subscribers of each owner.
///
/// Cloning yields another handle to the same subscriber registry.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

impl Broadcaster {
    /// Create a broadcaster whose subscriber queues hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity: capacity.max(1),
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a new subscriber for `owner`.
    ///
    /// Dropping the returned [`Subscription`] unsubscribes it.
    pub fn subscribe(&self, owner: OwnerId) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));

        self.inner
            .subscribers
            .lock()
            .entry(owner)
            .or_default()
            .push(Subscriber { id, tx });

        tracing::debug!(owner_id = %owner, subscriber = id.0, "Subscriber registered");

        Subscription {
            owner,
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, owner: OwnerId, id: SubscriberId) {
        self.inner.remove(owner, &[id]);
    }

    /// Deliver `event` to every subscriber of `owner`.
    ///
    /// Returns the number of subscribers the event was queued for.
    /// Subscribers whose queue is full or whose receiver is gone are removed.
    pub fn publish(&self, owner: OwnerId, event: StatusEvent) -> usize {
        let targets: Vec<(SubscriberId, mpsc::Sender<StatusEvent>)> = {
            let map = self.inner.subscribers.lock();
            match map.get(&owner) {
                Some(subs) => subs.iter().map(|s| (s.id, s.tx.clone())).collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut dropped = Vec::new();
        for (id, tx) in &targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        owner_id = %owner,
                        subscriber = id.0,
                        "Subscriber queue full, dropping subscriber"
                    );
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => dropped.push(*id),
            }
        }

        if !dropped.is_empty() {
            self.inner.remove(owner, &dropped);
        }

        delivered
    }

    /// Number of live subscribers for `owner`.
    pub fn subscriber_count(&self, owner: OwnerId) -> usize {
        self.inner
            .subscribers
            .lock()
            .get(&owner)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("capacity", &self.inner.capacity)
            .finish_non_exhaustive()
    }
}

/// Receiving end of one subscriber queue.
///
/// Yields `None` once the subscriber has been dropped by the broadcaster
/// and its queue has drained.
pub struct Subscription {
    owner: OwnerId,
    id: SubscriberId,
    rx: mpsc::Receiver<StatusEvent>,
    registry: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<StatusEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<StatusEvent> {
        self.rx.try_recv().ok()
    }
}

impl futures::Stream for Subscription {
    type Item = StatusEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.remove(self.owner, &[self.id]);
        }
    }
}
