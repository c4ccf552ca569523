//! Counting semaphore with cancellable acquisition.
//!
//! Up to `capacity` concurrent holders; acquisition waits (or cancels)
//! when exhausted, release returns a slot. The semaphore tracks counts
//! only; it has no notion of *who* holds a slot, no ownership, and no
//! reentrancy; acquisitions and releases are paired by the caller.
//!
//! # Cancel Safety
//!
//! A cancelled [`wait_one`](Semaphore::wait_one) never consumes a slot; a
//! roused claimant dropped before claiming re-wakes another waiter, so a
//! freed slot is never stranded.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex as StdMutex, MutexGuard};
use std::task::{Context, Poll};

use crate::cancel::CancelToken;
use crate::handle::{WaitFuture, WaitHandle};
use crate::waiters::WaiterSlab;

/// A counting semaphore.
///
/// Invariant: `0 <= outstanding <= capacity` at all times.
#[derive(Debug)]
pub struct Semaphore {
    capacity: usize,
    state: StdMutex<SemState>,
}

#[derive(Debug)]
struct SemState {
    outstanding: usize,
    waiters: WaiterSlab,
}

impl Semaphore {
    /// Creates a semaphore admitting up to `capacity` concurrent holders.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; a semaphore nobody can acquire is a
    /// contract violation, not a configuration.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "semaphore capacity must be positive");
        Self {
            capacity,
            state: StdMutex::new(SemState {
                outstanding: 0,
                waiters: WaiterSlab::new(),
            }),
        }
    }

    /// Waits to occupy one slot, racing `cancel`.
    ///
    /// Resolves `true` with a slot occupied, or `false` on cancellation
    /// with `outstanding` untouched.
    pub fn wait_one<'a>(&'a self, cancel: &'a CancelToken) -> SemaphoreWait<'a> {
        SemaphoreWait {
            semaphore: self,
            cancel,
            slot: None,
            cancel_slot: None,
            finished: None,
        }
    }

    /// Frees one occupied slot, waking a waiter to claim it.
    ///
    /// Returns the number of slots that were occupied just before the
    /// release; `0` means nothing was held and the call was a benign
    /// no-op.
    pub fn release(&self) -> usize {
        let (occupied, waker) = {
            let mut state = self.lock_state();
            let occupied = state.outstanding;
            if occupied == 0 {
                (0, None)
            } else {
                state.outstanding -= 1;
                (occupied, state.waiters.rouse_one())
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        occupied
    }

    /// Number of free slots at the instant of the call.
    ///
    /// Best-effort under concurrency: the value may be stale by the time
    /// the caller acts on it.
    #[must_use]
    pub fn available(&self) -> usize {
        self.capacity - self.lock_state().outstanding
    }

    /// The fixed number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) fn registered_waiters(&self) -> usize {
        self.lock_state().waiters.registered_count()
    }

    fn lock_state(&self) -> MutexGuard<'_, SemState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WaitHandle for Semaphore {
    fn wait_one<'a>(&'a self, cancel: &'a CancelToken) -> WaitFuture<'a> {
        Box::pin(Self::wait_one(self, cancel))
    }
}

/// Future returned by [`Semaphore::wait_one`].
#[derive(Debug)]
pub struct SemaphoreWait<'a> {
    semaphore: &'a Semaphore,
    cancel: &'a CancelToken,
    slot: Option<usize>,
    cancel_slot: Option<usize>,
    finished: Option<bool>,
}

impl SemaphoreWait<'_> {
    /// Occupies a slot if one is free; registers otherwise.
    fn try_claim(&mut self, cx: &mut Context<'_>) -> bool {
        let mut state = self.semaphore.lock_state();
        if state.outstanding < self.semaphore.capacity {
            state.outstanding += 1;
            if let Some(index) = self.slot.take() {
                state.waiters.remove(index);
            }
            return true;
        }
        match self.slot {
            None => self.slot = Some(state.waiters.insert(cx.waker().clone())),
            Some(index) => state.waiters.set_waker(index, cx.waker()),
        }
        false
    }

    fn finish(&mut self, result: bool) -> bool {
        self.cleanup();
        self.finished = Some(result);
        result
    }

    fn cleanup(&mut self) {
        let rouse = {
            let mut state = self.semaphore.lock_state();
            if let Some(index) = self.slot.take() {
                state.waiters.remove(index);
            }
            // A release may have roused us; pass the wakeup on so the
            // freed slot is not stranded.
            if state.outstanding < self.semaphore.capacity {
                state.waiters.rouse_one()
            } else {
                None
            }
        };
        if let Some(waker) = rouse {
            waker.wake();
        }
        if let Some(index) = self.cancel_slot.take() {
            self.cancel.deregister(index);
        }
    }
}

impl Future for SemaphoreWait<'_> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        if let Some(result) = this.finished {
            return Poll::Ready(result);
        }
        if this.try_claim(cx) {
            return Poll::Ready(this.finish(true));
        }
        if this.cancel.is_cancelled() {
            return Poll::Ready(this.finish(false));
        }

        match this.cancel_slot {
            None => this.cancel_slot = Some(this.cancel.register(cx.waker())),
            Some(index) => this.cancel.set_waker(index, cx.waker()),
        }
        if this.cancel.is_cancelled() {
            return Poll::Ready(this.finish(false));
        }

        Poll::Pending
    }
}

impl Drop for SemaphoreWait<'_> {
    fn drop(&mut self) {
        if self.finished.is_none() {
            self.cleanup();
        }
    }
}
