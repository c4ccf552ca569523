//! Edge-triggered event: each `set` admits exactly one waiter.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex as StdMutex, MutexGuard};
use std::task::{Context, Poll};

use crate::cancel::CancelToken;
use crate::handle::{EventWaitHandle, WaitFuture, WaitHandle};
use crate::waiters::WaiterSlab;

/// An auto-resetting event.
///
/// The event holds at most one admission token. [`set`](Self::set) places
/// a token (a no-op if one is already pending); a successful wait consumes
/// it atomically and the event reverts to non-signaled. With N concurrent
/// waiters and M sets, exactly `min(N, M)` waits resolve `true`, but not
/// in any guaranteed order: a token may go to any currently-blocked or
/// future waiter.
///
/// # Cancel Safety
///
/// A cancelled wait never consumes a token. A woken claimant that is
/// dropped before claiming re-wakes another waiter, so a pending token is
/// never stranded.
#[derive(Debug)]
pub struct AutoResetEvent {
    state: StdMutex<AutoState>,
}

#[derive(Debug)]
struct AutoState {
    /// The capacity-1 admission slot.
    token: bool,
    waiters: WaiterSlab,
}

impl AutoResetEvent {
    /// Creates the event, pre-loading one admission token if `signaled`.
    #[must_use]
    pub fn new(signaled: bool) -> Self {
        Self {
            state: StdMutex::new(AutoState {
                token: signaled,
                waiters: WaiterSlab::new(),
            }),
        }
    }

    /// Places one admission token, waking a waiter to claim it.
    ///
    /// Returns `false` without queuing anything if a token is already
    /// pending; signals are never queued beyond one.
    pub fn set(&self) -> bool {
        let waker = {
            let mut state = self.lock_state();
            if state.token {
                return false;
            }
            state.token = true;
            state.waiters.rouse_one()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    /// Drains a pending admission token.
    ///
    /// Returns whether a token was drained; draining cancels a pending
    /// signal before any waiter claims it.
    pub fn reset(&self) -> bool {
        let mut state = self.lock_state();
        std::mem::take(&mut state.token)
    }

    /// Waits to consume an admission token, racing `cancel`.
    pub fn wait_one<'a>(&'a self, cancel: &'a CancelToken) -> AutoResetWait<'a> {
        AutoResetWait {
            event: self,
            cancel,
            slot: None,
            cancel_slot: None,
            finished: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn registered_waiters(&self) -> usize {
        self.lock_state().waiters.registered_count()
    }

    fn lock_state(&self) -> MutexGuard<'_, AutoState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WaitHandle for AutoResetEvent {
    fn wait_one<'a>(&'a self, cancel: &'a CancelToken) -> WaitFuture<'a> {
        Box::pin(Self::wait_one(self, cancel))
    }
}

impl EventWaitHandle for AutoResetEvent {
    fn set(&self) -> bool {
        Self::set(self)
    }

    fn reset(&self) -> bool {
        Self::reset(self)
    }
}

/// Future returned by [`AutoResetEvent::wait_one`].
#[derive(Debug)]
pub struct AutoResetWait<'a> {
    event: &'a AutoResetEvent,
    cancel: &'a CancelToken,
    slot: Option<usize>,
    cancel_slot: Option<usize>,
    finished: Option<bool>,
}

impl AutoResetWait<'_> {
    /// Claims the token if one is pending; registers otherwise.
    fn try_claim(&mut self, cx: &mut Context<'_>) -> bool {
        let mut state = self.event.lock_state();
        if state.token {
            state.token = false;
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
            let mut state = self.event.lock_state();
            if let Some(index) = self.slot.take() {
                state.waiters.remove(index);
            }
            // We may have been the claimant a `set` roused; hand the
            // wakeup on so the token is not stranded.
            if state.token {
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

impl Future for AutoResetWait<'_> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        if let Some(result) = this.finished {
            return Poll::Ready(result);
        }
        // Claim wins ties with cancellation: a pending token present at
        // poll time admits this waiter even if the deadline just passed.
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

impl Drop for AutoResetWait<'_> {
    fn drop(&mut self) {
        if self.finished.is_none() {
            self.cleanup();
        }
    }
}
