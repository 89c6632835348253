use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Why a cancellable wait ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Cancelled {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

struct Inner {
    cancelled: Mutex<bool>,
    wake: Condvar,
    deadline: Option<Instant>,
}

/// Caller-owned cancellation signal with an optional deadline.
///
/// Clones share the same signal, so one thread can [`cancel`](Self::cancel)
/// while another is parked in [`sleep`](Self::sleep). Backed by a
/// `Mutex<bool>` + `Condvar`, the same primitive the in-memory lock uses.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// A token that only fires when cancelled explicitly.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A token that also fires once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline))
    }

    /// A token that fires `timeout` from now. A timeout too large to
    /// represent means no deadline at all.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Instant::now().checked_add(timeout))
    }

    fn build(deadline: Option<Instant>) -> Self {
        CancellationToken {
            inner: Arc::new(Inner {
                cancelled: Mutex::new(false),
                wake: Condvar::new(),
                deadline,
            }),
        }
    }

    /// The deadline, if the token has one.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Fire the token, waking every waiter.
    pub fn cancel(&self) {
        let mut cancelled = self.state();
        *cancelled = true;
        self.inner.wake.notify_all();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.state()
    }

    /// Returns the reason if the token has already fired.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled::Cancelled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Cancelled::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Block for `duration` unless the token fires first.
    ///
    /// Never blocks past the deadline: if the deadline falls inside the
    /// requested window the call returns `DeadlineExceeded` as soon as it is
    /// reached.
    pub fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        // None when the duration overflows: wait for cancel or deadline only.
        let wake_at = Instant::now().checked_add(duration);
        let mut cancelled = self.state();

        loop {
            if *cancelled {
                return Err(Cancelled::Cancelled);
            }

            let now = Instant::now();
            if let Some(deadline) = self.inner.deadline {
                if now >= deadline {
                    return Err(Cancelled::DeadlineExceeded);
                }
            }
            if wake_at.is_some_and(|wake_at| now >= wake_at) {
                return Ok(());
            }

            let until = match (wake_at, self.inner.deadline) {
                (Some(wake_at), Some(deadline)) => Some(wake_at.min(deadline)),
                (wake_at, deadline) => wake_at.or(deadline),
            };
            cancelled = match until {
                Some(until) => {
                    self.inner
                        .wake
                        .wait_timeout(cancelled, until - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .inner
                    .wake
                    .wait(cancelled)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    // The flag is a plain bool, so a poisoned mutex still holds a valid value.
    fn state(&self) -> MutexGuard<'_, bool> {
        self.inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
