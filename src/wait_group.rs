//! Countdown latch: waiters pass when the counter reaches zero.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex as StdMutex, MutexGuard};
use std::task::{Context, Poll};

use crate::cancel::CancelToken;
use crate::handle::{WaitFuture, WaitHandle};
use crate::waiters::WaiterSlab;

/// A countdown wait group.
///
/// [`add`](Self::add) raises the outstanding-work counter, [`done`]
/// (Self::done) lowers it, and waits resolve `true` once it reaches (or
/// already is) zero. Delivery is latched per waiter: a completion observed
/// at zero is not revoked by a racing re-`add`. A group that is not reused
/// stays satisfied.
///
/// # Panics
///
/// Driving the counter below zero is a contract violation and panics.
#[derive(Debug, Default)]
pub struct WaitGroup {
    state: StdMutex<WgState>,
}

#[derive(Debug, Default)]
struct WgState {
    count: i64,
    waiters: WaiterSlab,
}

impl WaitGroup {
    /// Creates an empty group (counter at zero, already satisfied).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjusts the outstanding-work counter by `delta`.
    ///
    /// A transition to zero releases every pending waiter.
    pub fn add(&self, delta: i64) {
        let wakers = {
            let mut state = self.lock_state();
            let next = state.count + delta;
            assert!(next >= 0, "wait group counter driven negative");
            state.count = next;
            if next == 0 && delta < 0 {
                state.waiters.notify_all()
            } else {
                Vec::new()
            }
        };
        for waker in wakers {
            waker.wake();
        }
    }

    /// Marks one unit of work complete; shorthand for `add(-1)`.
    pub fn done(&self) {
        self.add(-1);
    }

    /// The counter value at the instant of the call.
    #[must_use]
    pub fn count(&self) -> i64 {
        self.lock_state().count
    }

    /// Waits for the counter to reach zero, racing `cancel`.
    pub fn wait_one<'a>(&'a self, cancel: &'a CancelToken) -> WaitGroupWait<'a> {
        WaitGroupWait {
            group: self,
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

    fn lock_state(&self) -> MutexGuard<'_, WgState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WaitHandle for WaitGroup {
    fn wait_one<'a>(&'a self, cancel: &'a CancelToken) -> WaitFuture<'a> {
        Box::pin(Self::wait_one(self, cancel))
    }
}

/// Future returned by [`WaitGroup::wait_one`].
#[derive(Debug)]
pub struct WaitGroupWait<'a> {
    group: &'a WaitGroup,
    cancel: &'a CancelToken,
    slot: Option<usize>,
    cancel_slot: Option<usize>,
    finished: Option<bool>,
}

impl WaitGroupWait<'_> {
    fn finish(&mut self, result: bool) -> bool {
        self.cleanup();
        self.finished = Some(result);
        result
    }

    fn cleanup(&mut self) {
        if let Some(index) = self.slot.take() {
            self.group.lock_state().waiters.remove(index);
        }
        if let Some(index) = self.cancel_slot.take() {
            self.cancel.deregister(index);
        }
    }
}

impl Future for WaitGroupWait<'_> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        if let Some(result) = this.finished {
            return Poll::Ready(result);
        }

        {
            let mut state = this.group.lock_state();
            // Latched delivery: a zero observed while we slept counts even
            // if the group has since been re-armed.
            let delivered = this.slot.is_some_and(|index| state.waiters.is_notified(index));
            if delivered || state.count == 0 {
                drop(state);
                return Poll::Ready(this.finish(true));
            }
            match this.slot {
                None => this.slot = Some(state.waiters.insert(cx.waker().clone())),
                Some(index) => state.waiters.set_waker(index, cx.waker()),
            }
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

impl Drop for WaitGroupWait<'_> {
    fn drop(&mut self) {
        if self.finished.is_none() {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{block_on, init_test_logging, poll_once};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn empty_group_is_already_satisfied() {
        init_test("empty_group_is_already_satisfied");
        let group = WaitGroup::new();
        let cancel = CancelToken::with_timeout(Duration::from_millis(20));
        let result = block_on(group.wait_one(&cancel));
        crate::assert_with_log!(result, "zero counter resolves true", true, result);
        crate::test_complete!("empty_group_is_already_satisfied");
    }

    #[test]
    fn wait_resolves_when_work_drains() {
        init_test("wait_resolves_when_work_drains");
        let group = Arc::new(WaitGroup::new());
        group.add(3);

        let workers = Arc::clone(&group);
        let handle = thread::spawn(move || {
            for _ in 0..3 {
                thread::sleep(Duration::from_millis(10));
                workers.done();
            }
        });

        let cancel = CancelToken::with_timeout(Duration::from_secs(2));
        let result = block_on(group.wait_one(&cancel));
        crate::assert_with_log!(result, "drained to zero", true, result);
        assert_eq!(group.count(), 0);
        handle.join().expect("thread panicked");
        crate::test_complete!("wait_resolves_when_work_drains");
    }

    #[test]
    fn cancellation_while_work_outstanding() {
        init_test("cancellation_while_work_outstanding");
        let group = WaitGroup::new();
        group.add(1);
        let cancel = CancelToken::with_timeout(Duration::from_millis(20));
        let result = block_on(group.wait_one(&cancel));
        crate::assert_with_log!(!result, "cancelled before zero", false, result);
        assert_eq!(group.registered_waiters(), 0);
        crate::test_complete!("cancellation_while_work_outstanding");
    }

    #[test]
    fn satisfied_group_stays_satisfied() {
        init_test("satisfied_group_stays_satisfied");
        let group = WaitGroup::new();
        group.add(1);
        group.done();
        for _ in 0..3 {
            let cancel = CancelToken::with_timeout(Duration::from_millis(20));
            assert!(block_on(group.wait_one(&cancel)));
        }
        crate::test_complete!("satisfied_group_stays_satisfied");
    }

    #[test]
    fn rearm_does_not_revoke_latched_completion() {
        init_test("rearm_does_not_revoke_latched_completion");
        let group = WaitGroup::new();
        group.add(1);
        let cancel = CancelToken::never();

        let mut wait = group.wait_one(&cancel);
        assert!(poll_once(&mut wait).is_pending());

        // Zero transition latches delivery; re-arming afterwards must not
        // put the already-released waiter back to sleep.
        group.done();
        group.add(5);
        let result = block_on(wait);
        crate::assert_with_log!(result, "latched completion", true, result);
        crate::test_complete!("rearm_does_not_revoke_latched_completion");
    }

    #[test]
    #[should_panic(expected = "driven negative")]
    fn underflow_is_a_contract_violation() {
        let group = WaitGroup::new();
        group.done();
    }
}
