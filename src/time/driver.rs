//! Wall-clock timer thread backing token deadlines.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::{OnceLock, Weak};
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::cancel::TokenInner;

/// One pending deadline. Ordered as a min-heap on (deadline, seq) so the
/// earliest expiry sits at the top and ties fire in registration order.
struct TimerEntry {
    deadline: Instant,
    seq: u64,
    token: Weak<TokenInner>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Reversed: BinaryHeap is a max-heap.
        (other.deadline, other.seq).cmp(&(self.deadline, self.seq))
    }
}

struct DriverState {
    queue: BinaryHeap<TimerEntry>,
    next_seq: u64,
}

/// Process-wide deadline scheduler.
///
/// Entries hold tokens weakly: a token whose every clone was dropped
/// before expiry is skipped when its deadline comes up.
pub(crate) struct TimerDriver {
    state: Mutex<DriverState>,
    cvar: Condvar,
}

impl TimerDriver {
    /// Returns the shared driver, spawning its thread on first use.
    pub(crate) fn global() -> &'static Self {
        static DRIVER: OnceLock<TimerDriver> = OnceLock::new();
        DRIVER.get_or_init(|| {
            let driver = Self {
                state: Mutex::new(DriverState {
                    queue: BinaryHeap::new(),
                    next_seq: 0,
                }),
                cvar: Condvar::new(),
            };
            thread::Builder::new()
                .name("waithandle-timer".into())
                .spawn(|| Self::global().run())
                .expect("failed to spawn timer thread");
            driver
        })
    }

    /// Schedules `token` to fire at `deadline`.
    pub(crate) fn register(&self, deadline: Instant, token: Weak<TokenInner>) {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(TimerEntry {
            deadline,
            seq,
            token,
        });
        // The new entry may be earlier than what the thread is sleeping on.
        self.cvar.notify_one();
    }

    fn run(&self) {
        let mut state = self.state.lock();
        loop {
            let now = Instant::now();
            let mut due = Vec::new();
            while state
                .queue
                .peek()
                .is_some_and(|entry| entry.deadline <= now)
            {
                if let Some(entry) = state.queue.pop() {
                    due.push(entry);
                }
            }

            if !due.is_empty() {
                // Fire outside the lock: waking a waiter must not contend
                // with concurrent registrations.
                drop(state);
                for entry in due {
                    if let Some(token) = entry.token.upgrade() {
                        tracing::trace!(seq = entry.seq, "deadline expired");
                        token.fire();
                    }
                }
                state = self.state.lock();
                continue;
            }

            match state.queue.peek().map(|entry| entry.deadline) {
                Some(deadline) => {
                    self.cvar.wait_until(&mut state, deadline);
                }
                None => self.cvar.wait(&mut state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use std::time::Duration;

    #[test]
    fn dropped_token_entry_is_skipped() {
        let token = CancelToken::with_timeout(Duration::from_millis(20));
        drop(token);
        // Nothing to observe but absence of a panic once the deadline
        // passes with only a dead weak ref in the heap.
        thread::sleep(Duration::from_millis(60));
    }

    #[test]
    fn earlier_registration_preempts_sleep() {
        let long = CancelToken::with_timeout(Duration::from_secs(30));
        let short = CancelToken::with_timeout(Duration::from_millis(20));
        thread::sleep(Duration::from_millis(200));
        assert!(short.is_cancelled());
        assert!(!long.is_cancelled());
    }
}
