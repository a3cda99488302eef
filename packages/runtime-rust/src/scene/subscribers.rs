//! Subscriber registry with snapshot-then-notify fan-out.
//!
//! [`SubscriberSet`] is the Scene-owned set of listeners interested in which
//! resources a flow reads. Broadcasting copies the current membership, releases
//! the lock, and only then calls each listener, so a listener may leave (or
//! register another) from inside its own callback. Members of the snapshot are
//! each notified exactly once; joins take effect on the next broadcast.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::traits::Subscriber;

/// Handle returned by [`SubscriberSet::join`], used to leave the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

#[derive(Default)]
struct Members {
    next_id: AtomicU64,
    entries: Mutex<Vec<(SubscriberId, Arc<dyn Subscriber>)>>,
}

/// Mutable set of subscribers. Cloning yields another handle to the same set.
#[derive(Clone, Default)]
pub struct SubscriberSet {
    members: Arc<Members>,
}

impl SubscriberSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. The same subscriber may join more than once;
    /// each registration is notified independently.
    pub fn join(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId(self.members.next_id.fetch_add(1, Ordering::Relaxed));
        self.members.entries.lock().push((id, subscriber));
        id
    }

    /// Removes a registration. Returns `false` if it was not present.
    pub fn leave(&self, id: SubscriberId) -> bool {
        let mut entries = self.members.entries.lock();
        let before = entries.len();
        entries.retain(|(member, _)| *member != id);
        entries.len() != before
    }

    /// Removes every registration.
    pub fn clear(&self) {
        self.members.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.entries.lock().is_empty()
    }

    /// Notifies every current member that `resource` was read.
    ///
    /// Returns the number of subscribers notified.
    pub fn broadcast(&self, resource: &str) -> usize {
        let snapshot: Vec<Arc<dyn Subscriber>> = self
            .members
            .entries
            .lock()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in &snapshot {
            subscriber.subscribe(resource);
        }
        snapshot.len()
    }
}

impl fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("len", &self.len())
            .finish()
    }
}

/// Subscriber that accumulates the set of resources a flow read.
///
/// Useful as the dependency tracker of a reactive read pass: register it on
/// the Scene, run the computation, then inspect [`resources`](Self::resources).
#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    resources: Mutex<BTreeSet<String>>,
    notifications: AtomicU64,
}

impl RecordingSubscriber {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct resources seen so far, in name order.
    #[must_use]
    pub fn resources(&self) -> Vec<String> {
        self.resources.lock().iter().cloned().collect()
    }

    /// Returns `true` if `resource` was seen.
    #[must_use]
    pub fn depends_on(&self, resource: &str) -> bool {
        self.resources.lock().contains(resource)
    }

    /// Total notifications received, counting repeats.
    #[must_use]
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }
}

impl Subscriber for RecordingSubscriber {
    fn subscribe(&self, resource: &str) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
        self.resources.lock().insert(resource.to_string());
    }
}
