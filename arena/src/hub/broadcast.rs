//! Broadcast hub for contest displays
//!
//! Keeps class-scoped and global subscriber sets and fans messages out to
//! them. Global subscribers see every class's traffic plus the aggregate
//! messages that in-room clients must not see before reveal.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::countdown::Countdowns;
use super::message::HubMessage;
use super::subscriber::{SubscriberHandle, SubscriberId};
use crate::state::ClassId;

/// Default countdown tick
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Shared reference to BroadcastHub
pub type SharedBroadcastHub = Arc<BroadcastHub>;

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Registry {
    classes: HashMap<ClassId, HashMap<SubscriberId, SubscriberHandle>>,
    global: HashMap<SubscriberId, SubscriberHandle>,
}

/// Subscriber registry, fan-out and per-class countdowns
pub struct BroadcastHub {
    registry: RwLock<Registry>,
    pub(super) countdowns: Countdowns,
    pub(super) tick: Duration,
}

impl BroadcastHub {
    /// Create a hub with a one second countdown tick
    pub fn new() -> Self {
        Self::with_tick(DEFAULT_TICK)
    }

    pub fn with_tick(tick: Duration) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            countdowns: Countdowns::default(),
            tick,
        }
    }

    /// Create a shared reference to this hub
    pub fn shared(self) -> SharedBroadcastHub {
        Arc::new(self)
    }

    // A panic mid-mutation leaves the maps consistent, so poison is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a subscriber for one class, or globally when `class_id` is `None`.
    pub fn connect(&self, subscriber: SubscriberHandle, class_id: Option<ClassId>) {
        let id = subscriber.id();
        let mut registry = self.write();
        match class_id {
            Some(class_id) => {
                registry
                    .classes
                    .entry(class_id)
                    .or_default()
                    .insert(id, subscriber);
            }
            None => {
                registry.global.insert(id, subscriber);
            }
        }
        debug!(subscriber = %id, ?class_id, "Subscriber connected");
    }

    /// Remove a subscriber. Returns whether it was registered.
    pub fn disconnect(&self, id: SubscriberId, class_id: Option<ClassId>) -> bool {
        let mut registry = self.write();
        let removed = match class_id {
            Some(class_id) => match registry.classes.get_mut(&class_id) {
                Some(set) => {
                    let removed = set.remove(&id).is_some();
                    if set.is_empty() {
                        registry.classes.remove(&class_id);
                    }
                    removed
                }
                None => false,
            },
            None => registry.global.remove(&id).is_some(),
        };
        if removed {
            debug!(subscriber = %id, ?class_id, "Subscriber disconnected");
        }
        removed
    }

    /// Number of subscribers scoped to a class, or global ones for `None`.
    pub fn subscriber_count(&self, class_id: Option<ClassId>) -> usize {
        let registry = self.read();
        match class_id {
            Some(class_id) => registry.classes.get(&class_id).map_or(0, HashMap::len),
            None => registry.global.len(),
        }
    }

    /// Deliver to a class's subscribers and to every global subscriber.
    pub async fn broadcast_to_class(&self, class_id: ClassId, message: &HubMessage) -> FanoutReport {
        let targets: Vec<SubscriberHandle> = {
            let registry = self.read();
            registry
                .classes
                .get(&class_id)
                .into_iter()
                .flat_map(|set| set.values())
                .chain(registry.global.values())
                .cloned()
                .collect()
        };
        let report = fan_out(&targets, message).await;
        debug!(
            class_id,
            kind = %message.kind,
            delivered = report.delivered,
            failed = report.failed,
            "Class broadcast"
        );
        report
    }

    /// Deliver to global subscribers only. Class-scoped subscribers never
    /// receive these messages.
    pub async fn broadcast_global_only(&self, message: &HubMessage) -> FanoutReport {
        let targets: Vec<SubscriberHandle> = self.read().global.values().cloned().collect();
        let report = fan_out(&targets, message).await;
        debug!(
            kind = %message.kind,
            delivered = report.delivered,
            failed = report.failed,
            "Global broadcast"
        );
        report
    }

    /// Stop every countdown and drop every subscriber.
    pub fn shutdown(&self) {
        let stopped = self.countdowns.stop_all();
        let mut registry = self.write();
        let dropped = registry.global.len()
            + registry.classes.values().map(HashMap::len).sum::<usize>();
        registry.classes.clear();
        registry.global.clear();
        info!(countdowns = stopped, subscribers = dropped, "Broadcast hub shut down");
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort delivery over a stable snapshot of targets. A failed send
/// is logged and skipped.
async fn fan_out(targets: &[SubscriberHandle], message: &HubMessage) -> FanoutReport {
    if targets.is_empty() {
        return FanoutReport::default();
    }
    let text = message.to_text();
    let outcomes = join_all(targets.iter().map(|subscriber| {
        let text = text.as_str();
        async move { (subscriber.id(), subscriber.send(text).await) }
    }))
    .await;

    let mut report = FanoutReport::default();
    for (id, outcome) in outcomes {
        match outcome {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(subscriber = %id, kind = %message.kind, "Delivery failed: {}", e);
                report.failed += 1;
            }
        }
    }
    report
}
