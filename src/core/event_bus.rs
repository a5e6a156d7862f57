//! Named lifecycle event dispatcher.
//!
//! Architecture:
//! - Listeners register per event name with `on()` (immediate invocation)
//! - `dispatch()` invokes listeners immediately AND queues the name for
//!   deferred processing
//! - `poll()` returns queued names for batch processing in a host main loop
//!
//! Listener order: FIFO (first-registered, first-called) within one name.
//! No de-duplication: registering the same closure twice calls it twice.
//! Names are not validated; a listener for a name nobody dispatches is
//! simply never called.
//!
//! Failure isolation: a listener returning `Err` or panicking is logged and
//! skipped. Later listeners still run and nothing reaches the caller of
//! `dispatch()` (typically the tick loop).

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};

use log::{trace, warn};

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Listener callback. Receives the event name it was registered for.
pub type Listener = Arc<dyn Fn(&str) -> anyhow::Result<()> + Send + Sync>;

/// Per-instance event fan-out.
///
/// Cloning yields another handle to the same registry and queue, so the
/// host can register listeners before passing a clone to the engine.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<RwLock<HashMap<String, Vec<Listener>>>>,
    queue: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("event_names", &self.listeners.read().map(|l| l.len()).unwrap_or(0))
            .field("queue_len", &self.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Immediate ==========

    /// Append a listener for `event`.
    ///
    /// # Example
    /// ```ignore
    /// events.on("ended", |_| {
    ///     println!("done");
    ///     Ok(())
    /// });
    /// ```
    pub fn on<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&str) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(event.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Invoke every listener for `event` in registration order, then queue
    /// the name for `poll()`.
    pub fn dispatch(&self, event: &str) {
        // Snapshot so listeners may register more listeners without deadlocking
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event)
            .cloned()
            .unwrap_or_default();

        trace!("Dispatching '{}' to {} listener(s)", event, snapshot.len());
        for (idx, listener) in snapshot.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Listener #{} for '{}' failed: {:#}", idx, event, e),
                Err(payload) => warn!(
                    "Listener #{} for '{}' panicked: {}",
                    idx,
                    event,
                    panic_message(payload.as_ref())
                ),
            }
        }

        // Queue for deferred processing with eviction
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!("Event queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(event.to_string());
    }

    // ========== Deferred Processing ==========

    /// Drain event names dispatched since the last poll, oldest first
    pub fn poll(&self) -> Vec<String> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    // ========== Utilities ==========

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listener_count(event) > 0
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let make = move |tag: &'static str| -> Listener {
            let l = Arc::clone(&l);
            Arc::new(move |name: &str| -> anyhow::Result<()> {
                l.lock().unwrap().push(format!("{}:{}", tag, name));
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let bus = EventDispatcher::new();
        let (log, make) = recorder();
        for tag in ["a", "b", "c"] {
            let f = make(tag);
            bus.on("play", move |n| f(n));
        }
        bus.dispatch("play");
        assert_eq!(*log.lock().unwrap(), vec!["a:play", "b:play", "c:play"]);
    }

    #[test]
    fn test_no_deduplication() {
        let bus = EventDispatcher::new();
        let counter = Arc::new(AtomicI32::new(0));
        for _ in 0..2 {
            let c = Arc::clone(&counter);
            bus.on("pause", move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        bus.dispatch("pause");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unknown_names_never_fire() {
        let bus = EventDispatcher::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.on("teleport", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        for name in ["load", "play", "pause", "ended"] {
            bus.dispatch(name);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(bus.has_listeners("teleport"));
    }

    #[test]
    fn test_failing_listener_does_not_block_next() {
        let bus = EventDispatcher::new();
        let counter = Arc::new(AtomicI32::new(0));

        bus.on("ended", |_| anyhow::bail!("listener broke"));
        let c = Arc::clone(&counter);
        bus.on("ended", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.dispatch("ended");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventDispatcher::new();
        let counter = Arc::new(AtomicI32::new(0));

        bus.on("play", |_| panic!("listener exploded"));
        let c = Arc::clone(&counter);
        bus.on("play", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.dispatch("play");
        bus.dispatch("play");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clone_shares_registry() {
        let bus = EventDispatcher::new();
        let handle = bus.clone();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.on("load", move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        handle.dispatch("load");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(handle.listener_count("load"), 1);
    }

    #[test]
    fn test_listener_can_register_during_dispatch() {
        let bus = EventDispatcher::new();
        let inner = bus.clone();
        bus.on("load", move |_| {
            inner.on("play", |_| Ok(()));
            Ok(())
        });
        bus.dispatch("load");
        assert_eq!(bus.listener_count("play"), 1);
    }

    #[test]
    fn test_dispatch_queues_for_poll() {
        let bus = EventDispatcher::new();
        bus.dispatch("load");
        bus.dispatch("play");
        assert_eq!(bus.poll(), vec!["load".to_string(), "play".to_string()]);
        assert_eq!(bus.queue_len(), 0);
    }

    #[test]
    fn test_queue_evicts_oldest_half() {
        let bus = EventDispatcher::new();
        for _ in 0..MAX_QUEUE_SIZE {
            bus.dispatch("play");
        }
        bus.dispatch("ended");
        let queued = bus.poll();
        assert_eq!(queued.len(), MAX_QUEUE_SIZE / 2 + 1);
        assert_eq!(queued.last().map(String::as_str), Some("ended"));
    }
}
