//! Tick scheduling - the host's "run after delay" primitive
//!
//! The engine never sleeps and never owns a thread. It asks a `TickTimer`
//! for a tick after some delay and gets back a `TickHandle`; when the host
//! loop decides the delay has elapsed it calls `engine.tick(handle)`.
//! Handles are unique, so a tick that was cancelled (or superseded) can be
//! recognised and ignored when it fires late.
//!
//! `TickQueue` is the stock timer:
//! - `TickQueue::manual()` - virtual clock, jumps straight to the next due
//!   tick. Deterministic; used by tests and offline rendering.
//! - `TickQueue::wall()` - real clock; `pop_due()` only yields ticks whose
//!   deadline has passed. Used by the CLI host loop.

use std::time::{Duration, Instant};

/// Identifies one scheduled tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickHandle(u64);

/// Host timer facility
pub trait TickTimer {
    /// Arrange for a tick `delay` from now
    fn schedule(&mut self, delay: Duration) -> TickHandle;

    /// Forget a scheduled tick. Unknown or already-fired handles are ignored.
    fn cancel(&mut self, handle: TickHandle);
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    Manual(Duration),
    Wall(Instant),
}

/// Pending-tick queue with a manual or wall clock
#[derive(Debug)]
pub struct TickQueue {
    clock: Clock,
    pending: Vec<(Duration, TickHandle)>,
    next_id: u64,
}

impl TickQueue {
    /// Virtual clock starting at zero
    pub fn manual() -> Self {
        Self {
            clock: Clock::Manual(Duration::ZERO),
            pending: Vec::new(),
            next_id: 0,
        }
    }

    /// Real clock starting now
    pub fn wall() -> Self {
        Self {
            clock: Clock::Wall(Instant::now()),
            pending: Vec::new(),
            next_id: 0,
        }
    }

    /// Time since the queue was created (virtual or real)
    pub fn now(&self) -> Duration {
        match self.clock {
            Clock::Manual(now) => now,
            Clock::Wall(epoch) => epoch.elapsed(),
        }
    }

    /// True for the virtual clock, whose ticks never need real waiting
    pub fn is_manual(&self) -> bool {
        matches!(self.clock, Clock::Manual(_))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending (deadline, handle)
    fn earliest(&self) -> Option<(usize, Duration, TickHandle)> {
        self.pending
            .iter()
            .enumerate()
            .min_by_key(|(_, (due, handle))| (*due, *handle))
            .map(|(i, &(due, handle))| (i, due, handle))
    }

    /// Delay until the earliest pending tick is due (zero if overdue)
    pub fn time_until_next(&self) -> Option<Duration> {
        let (_, due, _) = self.earliest()?;
        Some(due.saturating_sub(self.now()))
    }

    /// Remove and return the earliest tick if it is due.
    ///
    /// On a manual clock the earliest tick is always due: the clock jumps
    /// forward to its deadline.
    pub fn pop_due(&mut self) -> Option<TickHandle> {
        let (idx, due, handle) = self.earliest()?;
        match &mut self.clock {
            Clock::Manual(now) => {
                *now = (*now).max(due);
            }
            Clock::Wall(epoch) => {
                if epoch.elapsed() < due {
                    return None;
                }
            }
        }
        self.pending.swap_remove(idx);
        Some(handle)
    }

    /// Advance a manual clock without firing anything
    pub fn advance(&mut self, by: Duration) {
        if let Clock::Manual(now) = &mut self.clock {
            *now += by;
        }
    }
}

impl Default for TickQueue {
    fn default() -> Self {
        Self::manual()
    }
}

impl TickTimer for TickQueue {
    fn schedule(&mut self, delay: Duration) -> TickHandle {
        let handle = TickHandle(self.next_id);
        self.next_id += 1;
        let due = self.now() + delay;
        self.pending.push((due, handle));
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        self.pending.retain(|(_, h)| *h != handle);
    }
}
