//! Cancellation tokens for bounding waits.
//!
//! Every wait in this crate races its primitive's condition against a
//! [`CancelToken`]. A token becomes cancelled at most once, either by an
//! explicit [`CancelToken::cancel`] call or by an optional deadline; once
//! cancelled it stays cancelled. Timeout and explicit cancellation are
//! deliberately indistinguishable: both resolve the racing wait to `false`.
//!
//! # Cancel Safety
//!
//! - Cancellation is push-based: pending waits register their wakers with
//!   the token and are woken the moment it fires; nothing polls.
//! - Deadlines are delivered by a shared timer thread (see [`crate::time`])
//!   and also checked lazily on every [`CancelToken::is_cancelled`] call,
//!   so an expired token reports correctly even before the timer fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::task::Waker;
use std::time::{Duration, Instant};

use crate::time::TimerDriver;
use crate::waiters::WaiterSlab;

/// Shared state behind a token and all of its clones.
#[derive(Debug)]
pub(crate) struct TokenInner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    waiters: StdMutex<WaiterSlab>,
}

impl TokenInner {
    /// Performs the one-shot cancelled transition and wakes every
    /// registered waiter. Returns whether this call made the transition.
    pub(crate) fn fire(&self) -> bool {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let wakers = {
            let mut waiters = match self.waiters.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            waiters.notify_all()
        };
        tracing::trace!(waiters = wakers.len(), "cancel token fired");
        for waker in wakers {
            waker.wake();
        }
        true
    }
}

/// A cloneable cancellation token with an optional deadline.
///
/// All clones share one state: cancelling any clone cancels them all.
/// Waits that race a token resolve `false` once it is cancelled; a token
/// that is never cancelled and carries no deadline bounds nothing.
///
/// # Example
///
/// ```ignore
/// let cancel = CancelToken::with_timeout(Duration::from_millis(10));
/// let ok = event.wait_one(&cancel).await; // false if 10ms elapse first
/// ```
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    fn with_inner_deadline(deadline: Option<Instant>) -> Self {
        let inner = Arc::new(TokenInner {
            cancelled: AtomicBool::new(false),
            deadline,
            waiters: StdMutex::new(WaiterSlab::new()),
        });
        if let Some(deadline) = deadline {
            TimerDriver::global().register(deadline, Arc::downgrade(&inner));
        }
        Self { inner }
    }

    /// Creates a token with no deadline that cancels only on an explicit
    /// [`cancel`](Self::cancel) call.
    #[must_use]
    pub fn new() -> Self {
        Self::with_inner_deadline(None)
    }

    /// Creates a token that nothing is expected to cancel.
    ///
    /// Waits racing it are unbounded. This is the stand-in for "no
    /// cancellation supplied".
    #[must_use]
    pub fn never() -> Self {
        Self::new()
    }

    /// Creates a token that expires `timeout` from now.
    ///
    /// A zero timeout produces an already-expired token.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Creates a token that expires at `deadline`.
    ///
    /// A deadline in the past produces an already-expired token.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::with_inner_deadline(Some(deadline))
    }

    /// Cancels the token, waking every wait racing it.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// token was already cancelled (or already expired).
    pub fn cancel(&self) -> bool {
        self.inner.fire()
    }

    /// Whether the token has been cancelled or its deadline has passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        // Lazy expiry: don't wait for the timer thread to notice.
        if self
            .inner
            .deadline
            .is_some_and(|deadline| deadline <= Instant::now())
        {
            self.inner.fire();
            return true;
        }
        false
    }

    /// The deadline this token expires at, if it has one.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Registers a waker to be woken when the token fires.
    pub(crate) fn register(&self, waker: &Waker) -> usize {
        self.lock_waiters().insert(waker.clone())
    }

    /// Re-arms an existing registration with a fresh waker.
    pub(crate) fn set_waker(&self, index: usize, waker: &Waker) {
        self.lock_waiters().set_waker(index, waker);
    }

    /// Drops a registration.
    pub(crate) fn deregister(&self, index: usize) {
        self.lock_waiters().remove(index);
    }

    #[cfg(test)]
    pub(crate) fn registered_waiters(&self) -> usize {
        self.lock_waiters().registered_count()
    }

    fn lock_waiters(&self) -> std::sync::MutexGuard<'_, WaiterSlab> {
        match self.inner.waiters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
