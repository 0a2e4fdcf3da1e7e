//! Purchase state guard.
//!
//! ```plain
//!            try_begin              complete(true)
//!   ┌──────┐ ─────────► ┌──────────┐ ─────────────► ┌──────┐
//!   │ Idle │            │ InFlight │                │ Done │
//!   └──────┘ ◄───────── └──────────┘                └──────┘
//!            complete(false)
//! ```
//!
//! `Done` is terminal for the process. `InFlight` is the mutual exclusion:
//! only one caller can win `try_begin` until the attempt completes.
//! `begin` wraps the transition in a `PurchaseAttempt` that rolls back to
//! `Idle` if it is dropped unfinished (e.g. a cancelled cycle).

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseState {
    Idle,
    InFlight,
    Done,
}

impl fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseState::Idle => write!(f, "idle"),
            PurchaseState::InFlight => write!(f, "in-flight"),
            PurchaseState::Done => write!(f, "done"),
        }
    }
}

/// Thread-safe owner of the process-wide `PurchaseState`.
#[derive(Debug)]
pub struct PurchaseGuard {
    state: Mutex<PurchaseState>,
}

impl PurchaseGuard {
    /// `already_bought` comes from the durable marker.
    pub fn new(already_bought: bool) -> Self {
        let initial = if already_bought {
            PurchaseState::Done
        } else {
            PurchaseState::Idle
        };
        Self {
            state: Mutex::new(initial),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PurchaseState> {
        // The state is a plain Copy value; a panicked holder cannot leave it torn.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Atomically move `Idle → InFlight`. False if not `Idle`.
    pub fn try_begin(&self) -> bool {
        let mut state = self.lock();
        if *state == PurchaseState::Idle {
            *state = PurchaseState::InFlight;
            true
        } else {
            false
        }
    }

    /// Finish the attempt started by `try_begin`: `Done` on success,
    /// back to `Idle` on failure.
    pub fn complete(&self, success: bool) {
        let mut state = self.lock();
        if *state != PurchaseState::InFlight {
            let current = *state;
            warn!(state = %current, success, "Purchase completed without an attempt in flight");
            return;
        }
        *state = if success {
            PurchaseState::Done
        } else {
            PurchaseState::Idle
        };
    }

    /// `try_begin` returning an attempt handle that must be finished with
    /// `succeed` or `fail`; dropping it unfinished counts as failure.
    pub fn begin(&self) -> Option<PurchaseAttempt<'_>> {
        self.try_begin().then_some(PurchaseAttempt {
            guard: self,
            finished: false,
        })
    }

    pub fn is_done(&self) -> bool {
        *self.lock() == PurchaseState::Done
    }

    pub fn state(&self) -> PurchaseState {
        *self.lock()
    }
}

/// An in-flight purchase. See `PurchaseGuard::begin`.
#[derive(Debug)]
pub struct PurchaseAttempt<'a> {
    guard: &'a PurchaseGuard,
    finished: bool,
}

impl PurchaseAttempt<'_> {
    pub fn succeed(mut self) {
        self.finished = true;
        self.guard.complete(true);
    }

    pub fn fail(mut self) {
        self.finished = true;
        self.guard.complete(false);
    }
}

impl Drop for PurchaseAttempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Purchase attempt abandoned, back to idle");
            self.guard.complete(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_fresh_guard_is_idle() {
        let g = PurchaseGuard::new(false);
        assert_eq!(g.state(), PurchaseState::Idle);
        assert!(!g.is_done());
    }

    #[test]
    fn test_marker_starts_done() {
        let g = PurchaseGuard::new(true);
        assert!(g.is_done());
        assert!(!g.try_begin());
    }

    #[test]
    fn test_second_begin_rejected_while_in_flight() {
        let g = PurchaseGuard::new(false);
        assert!(g.try_begin());
        assert_eq!(g.state(), PurchaseState::InFlight);
        assert!(!g.try_begin());
    }

    #[test]
    fn test_failure_returns_to_idle() {
        let g = PurchaseGuard::new(false);
        assert!(g.try_begin());
        g.complete(false);
        assert_eq!(g.state(), PurchaseState::Idle);
        assert!(g.try_begin());
    }

    #[test]
    fn test_success_is_terminal() {
        let g = PurchaseGuard::new(false);
        assert!(g.try_begin());
        g.complete(true);
        assert!(g.is_done());
        assert!(!g.try_begin());
        g.complete(false);
        assert!(g.is_done());
    }

    #[test]
    fn test_complete_without_begin_is_ignored() {
        let g = PurchaseGuard::new(false);
        g.complete(true);
        assert_eq!(g.state(), PurchaseState::Idle);
    }

    #[test]
    fn test_attempt_succeed_and_fail() {
        let g = PurchaseGuard::new(false);
        g.begin().unwrap().fail();
        assert_eq!(g.state(), PurchaseState::Idle);

        g.begin().unwrap().succeed();
        assert!(g.is_done());
        assert!(g.begin().is_none());
    }

    #[test]
    fn test_dropped_attempt_rolls_back() {
        let g = PurchaseGuard::new(false);
        {
            let _attempt = g.begin().unwrap();
            assert_eq!(g.state(), PurchaseState::InFlight);
            assert!(g.begin().is_none());
        }
        assert_eq!(g.state(), PurchaseState::Idle);
    }

    #[test]
    fn test_concurrent_begin_has_one_winner() {
        let g = Arc::new(PurchaseGuard::new(false));
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let (g, winners, barrier) = (g.clone(), winners.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    if g.try_begin() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(g.state(), PurchaseState::InFlight);
    }
}
