//! Per-class countdown tasks
//!
//! Each class has at most one live countdown. A countdown is a spawned task
//! that broadcasts `TIMER_UPDATE` once per tick until it reaches zero, then
//! runs its optional completion callback. Stopping or replacing a countdown
//! cancels the task so no later tick reaches the class.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::broadcast::BroadcastHub;
use super::message::HubMessage;
use crate::state::ClassId;

/// Invoked once when a countdown reaches zero
pub type CountdownCallback = Box<dyn FnOnce(ClassId) -> BoxFuture<'static, ()> + Send>;

struct CountdownSlot {
    generation: u64,
    remaining: Arc<AtomicU64>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl CountdownSlot {
    fn halt(self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// Live countdown slots keyed by class
#[derive(Default)]
pub(super) struct Countdowns {
    slots: Mutex<HashMap<ClassId, CountdownSlot>>,
    next_generation: AtomicU64,
}

impl Countdowns {
    fn lock(&self) -> MutexGuard<'_, HashMap<ClassId, CountdownSlot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove the slot only if it still belongs to `generation`. A task that
    /// was replaced must not clear its successor.
    fn clear(&self, class_id: ClassId, generation: u64) {
        let mut slots = self.lock();
        if slots.get(&class_id).map(|s| s.generation) == Some(generation) {
            slots.remove(&class_id);
        }
    }

    pub(super) fn stop_all(&self) -> usize {
        let drained: Vec<CountdownSlot> = self.lock().drain().map(|(_, slot)| slot).collect();
        let count = drained.len();
        for slot in drained {
            slot.halt();
        }
        count
    }
}

impl BroadcastHub {
    /// Start a countdown for a class, replacing any countdown already running
    /// there. Must be called from within a tokio runtime.
    pub fn start_countdown(
        self: &Arc<Self>,
        class_id: ClassId,
        duration_secs: u64,
        on_complete: Option<CountdownCallback>,
    ) {
        let generation = self.countdowns.next_generation.fetch_add(1, Ordering::SeqCst);
        let remaining = Arc::new(AtomicU64::new(duration_secs));
        let cancel = CancellationToken::new();

        // Replace and spawn under one lock so two starts for the same class
        // can never leave two tasks running.
        let mut slots = self.countdowns.lock();
        let replaced = slots.remove(&class_id).map(CountdownSlot::halt).is_some();
        let handle = tokio::spawn(run_countdown(
            Arc::clone(self),
            class_id,
            generation,
            Arc::clone(&remaining),
            cancel.clone(),
            on_complete,
        ));
        slots.insert(
            class_id,
            CountdownSlot {
                generation,
                remaining,
                cancel,
                handle,
            },
        );
        drop(slots);

        info!(class_id, duration_secs, replaced, "Countdown started");
    }

    /// Cancel the class's countdown and clear its state. Returns whether a
    /// countdown was running.
    pub fn stop_countdown(&self, class_id: ClassId) -> bool {
        let slot = self.countdowns.lock().remove(&class_id);
        match slot {
            Some(slot) => {
                slot.halt();
                info!(class_id, "Countdown stopped");
                true
            }
            None => false,
        }
    }

    /// Remaining seconds for the class, or `None` when no countdown is live
    pub fn get_countdown(&self, class_id: ClassId) -> Option<u64> {
        self.countdowns
            .lock()
            .get(&class_id)
            .map(|slot| slot.remaining.load(Ordering::SeqCst))
    }

    /// Number of classes with a live countdown
    pub fn active_countdowns(&self) -> usize {
        self.countdowns.lock().len()
    }
}

async fn run_countdown(
    hub: Arc<BroadcastHub>,
    class_id: ClassId,
    generation: u64,
    remaining: Arc<AtomicU64>,
    cancel: CancellationToken,
    on_complete: Option<CountdownCallback>,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let secs = remaining.load(Ordering::SeqCst);
        hub.broadcast_to_class(class_id, &HubMessage::timer_update(class_id, secs))
            .await;

        if secs == 0 {
            // Cleared before the callback so the callback may start the
            // next countdown for this class.
            hub.countdowns.clear(class_id, generation);
            debug!(class_id, "Countdown finished");
            if let Some(callback) = on_complete {
                callback(class_id).await;
            }
            return;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(hub.tick) => {}
        }
        remaining.fetch_sub(1, Ordering::SeqCst);
    }
}
