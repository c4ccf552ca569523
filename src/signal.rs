//! One-shot broadcast latch: the base cancellable wait primitive.
//!
//! A [`Signal`] starts untriggered and makes exactly one transition to
//! triggered, after which it stays observable forever; "not yet triggered
//! again" is represented by minting a fresh `Signal` (see
//! [`ManualResetEvent`](crate::ManualResetEvent), which mints one per
//! reset generation).
//!
//! [`Signal::wait`] races "triggered" against a [`CancelToken`]: the
//! future resolves `true` if the signal triggers before cancellation and
//! `false` otherwise, with push wakeups on both sides and exactly one
//! outcome per wait.
//!
//! # Cancel Safety
//!
//! Dropping a wait future before it resolves deregisters it from both the
//! signal and the token; nothing leaks and nothing is consumed.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::task::{Context, Poll};

use crate::cancel::CancelToken;
use crate::waiters::WaiterSlab;

/// A one-shot broadcast latch.
///
/// Triggering releases every current and future waiter; the transition
/// cannot be undone.
#[derive(Debug, Default)]
pub struct Signal {
    triggered: AtomicBool,
    waiters: StdMutex<WaiterSlab>,
}

impl Signal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            waiters: StdMutex::new(WaiterSlab::new()),
        }
    }

    /// Triggers the signal, releasing every waiter.
    ///
    /// Returns `true` if this call performed the one-shot transition,
    /// `false` if the signal was already triggered.
    pub fn trigger(&self) -> bool {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let wakers = self.lock_waiters().notify_all();
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Whether the signal has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Waits for the signal, racing `cancel`.
    ///
    /// Resolves `true` if the signal triggers before the token fires,
    /// `false` otherwise.
    pub fn wait<'a>(&'a self, cancel: &'a CancelToken) -> SignalWait<'a> {
        SignalWait {
            signal: self,
            cancel,
            core: WaitCore::new(),
        }
    }

    /// Like [`wait`](Self::wait), but owning its signal and token.
    ///
    /// Used where the wait must not borrow, e.g. waiting on the signal of
    /// a particular [`ManualResetEvent`](crate::ManualResetEvent) version.
    #[must_use]
    pub fn wait_owned(self: Arc<Self>, cancel: CancelToken) -> OwnedSignalWait {
        OwnedSignalWait {
            signal: self,
            cancel,
            core: WaitCore::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn registered_waiters(&self) -> usize {
        self.lock_waiters().registered_count()
    }

    fn lock_waiters(&self) -> MutexGuard<'_, WaiterSlab> {
        match self.waiters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Registration bookkeeping shared by the borrowed and owned wait futures.
#[derive(Debug)]
struct WaitCore {
    slot: Option<usize>,
    cancel_slot: Option<usize>,
    finished: Option<bool>,
}

impl WaitCore {
    const fn new() -> Self {
        Self {
            slot: None,
            cancel_slot: None,
            finished: None,
        }
    }

    /// Races `signal` against `cancel`, registering wakers on both sides.
    fn poll(
        &mut self,
        signal: &Signal,
        cancel: &CancelToken,
        cx: &mut Context<'_>,
    ) -> Poll<bool> {
        if let Some(result) = self.finished {
            return Poll::Ready(result);
        }
        // The signal wins ties: an already-triggered signal resolves true
        // even if the token expired in the same instant.
        if signal.is_triggered() {
            return Poll::Ready(self.finish(signal, cancel, true));
        }
        if cancel.is_cancelled() {
            return Poll::Ready(self.finish(signal, cancel, false));
        }

        match self.slot {
            None => self.slot = Some(signal.lock_waiters().insert(cx.waker().clone())),
            Some(index) => signal.lock_waiters().set_waker(index, cx.waker()),
        }
        // Re-check: a trigger between the first check and registration
        // would have broadcast to an empty slab.
        if signal.is_triggered() {
            return Poll::Ready(self.finish(signal, cancel, true));
        }

        match self.cancel_slot {
            None => self.cancel_slot = Some(cancel.register(cx.waker())),
            Some(index) => cancel.set_waker(index, cx.waker()),
        }
        if cancel.is_cancelled() {
            return Poll::Ready(self.finish(signal, cancel, false));
        }

        Poll::Pending
    }

    fn finish(&mut self, signal: &Signal, cancel: &CancelToken, result: bool) -> bool {
        self.cleanup(signal, cancel);
        self.finished = Some(result);
        result
    }

    fn cleanup(&mut self, signal: &Signal, cancel: &CancelToken) {
        if let Some(index) = self.slot.take() {
            signal.lock_waiters().remove(index);
        }
        if let Some(index) = self.cancel_slot.take() {
            cancel.deregister(index);
        }
    }
}

/// Future returned by [`Signal::wait`].
#[derive(Debug)]
pub struct SignalWait<'a> {
    signal: &'a Signal,
    cancel: &'a CancelToken,
    core: WaitCore,
}

impl Future for SignalWait<'_> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        this.core.poll(this.signal, this.cancel, cx)
    }
}

impl Drop for SignalWait<'_> {
    fn drop(&mut self) {
        self.core.cleanup(self.signal, self.cancel);
    }
}

/// Future returned by [`Signal::wait_owned`].
#[derive(Debug)]
pub struct OwnedSignalWait {
    signal: Arc<Signal>,
    cancel: CancelToken,
    core: WaitCore,
}

impl Future for OwnedSignalWait {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        this.core.poll(&this.signal, &this.cancel, cx)
    }
}

impl Drop for OwnedSignalWait {
    fn drop(&mut self) {
        self.core.cleanup(&self.signal, &self.cancel);
    }
}
