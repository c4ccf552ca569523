//! Level-triggered event: once set, all waiters pass until reset.
//!
//! Internally each non-signaled period is a *version*: resetting bumps the
//! version and discards its [`Signal`]; the first waiter of the new
//! version mints a fresh signal, and every concurrent first-waiter shares
//! that same one (exactly one signal is published per version). `set`
//! captures the current version's signal in the same critical section as
//! the signaled transition, so a racing reset can never discard a captured
//! signal untriggered and a set can never wake waiters of a different
//! version.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::task::{Context, Poll};

use crate::cancel::CancelToken;
use crate::handle::{EventWaitHandle, WaitFuture, WaitHandle};
use crate::signal::{OwnedSignalWait, Signal};

/// A manual-resetting (level-triggered) event.
///
/// While signaled, every current and future wait resolves `true`
/// immediately; [`reset`](Self::reset) closes the gate again.
#[derive(Debug)]
pub struct ManualResetEvent {
    /// Lock-free mirror of the signaled flag for the wait fast path.
    signaled: AtomicBool,
    state: StdMutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    signaled: bool,
    /// Generation counter; bumped on every reset.
    version: u64,
    /// The current version's signal, minted lazily by its first waiter.
    signal: Option<Arc<Signal>>,
}

impl ManualResetEvent {
    /// Creates the event in the given signaled state.
    #[must_use]
    pub fn new(signaled: bool) -> Self {
        Self {
            signaled: AtomicBool::new(signaled),
            state: StdMutex::new(ManualState {
                signaled,
                version: 0,
                signal: None,
            }),
        }
    }

    /// Signals the event, releasing every waiter of the current version.
    ///
    /// Idempotent: returns `false` if the event was already signaled.
    pub fn set(&self) -> bool {
        // Capture the signal in the same critical section as the signaled
        // transition: a reset racing us may discard the slot, but not the
        // captured signal, so waiters of this version are still released.
        let signal = {
            let mut state = self.lock_state();
            if state.signaled {
                return false;
            }
            state.signaled = true;
            self.signaled.store(true, Ordering::Release);
            state.signal.clone()
        };
        if let Some(signal) = signal {
            signal.trigger();
        }
        true
    }

    /// Returns the event to non-signaled, starting a new version.
    ///
    /// Idempotent: returns `false` if the event was not signaled. Does not
    /// mint the new version's signal; the next waiter does, exactly once.
    pub fn reset(&self) -> bool {
        let mut state = self.lock_state();
        if !state.signaled {
            return false;
        }
        state.signaled = false;
        self.signaled.store(false, Ordering::Release);
        state.version += 1;
        state.signal = None;
        true
    }

    /// Whether the event is currently signaled.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Waits for the event to be signaled, racing `cancel`.
    ///
    /// Resolves `true` immediately (without touching any signal) if the
    /// event is already signaled.
    pub fn wait_one<'a>(&'a self, cancel: &'a CancelToken) -> ManualResetWait<'a> {
        ManualResetWait {
            event: self,
            cancel,
            inner: None,
            finished: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn current_version(&self) -> u64 {
        self.lock_state().version
    }

    #[cfg(test)]
    pub(crate) fn current_signal(&self) -> Option<Arc<Signal>> {
        self.lock_state().signal.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, ManualState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl WaitHandle for ManualResetEvent {
    fn wait_one<'a>(&'a self, cancel: &'a CancelToken) -> WaitFuture<'a> {
        Box::pin(Self::wait_one(self, cancel))
    }
}

impl EventWaitHandle for ManualResetEvent {
    fn set(&self) -> bool {
        Self::set(self)
    }

    fn reset(&self) -> bool {
        Self::reset(self)
    }
}

/// Future returned by [`ManualResetEvent::wait_one`].
#[derive(Debug)]
pub struct ManualResetWait<'a> {
    event: &'a ManualResetEvent,
    cancel: &'a CancelToken,
    /// Wait on the captured version's signal, once registered.
    inner: Option<OwnedSignalWait>,
    finished: Option<bool>,
}

impl Future for ManualResetWait<'_> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = self.get_mut();
        if let Some(result) = this.finished {
            return Poll::Ready(result);
        }

        if this.inner.is_none() {
            // Fast path: already signaled, no signal consulted.
            if this.event.is_set() {
                this.finished = Some(true);
                return Poll::Ready(true);
            }
            let signal = {
                let mut state = this.event.lock_state();
                if state.signaled {
                    this.finished = Some(true);
                    return Poll::Ready(true);
                }
                // Mint the current version's signal exactly once; racing
                // first-waiters all share the winner's.
                Arc::clone(state.signal.get_or_insert_with(|| Arc::new(Signal::new())))
            };
            this.inner = Some(signal.wait_owned(this.cancel.clone()));
        }

        let Some(inner) = this.inner.as_mut() else {
            unreachable!("manual-reset wait lost its signal wait");
        };
        match Pin::new(inner).poll(cx) {
            Poll::Ready(result) => {
                this.finished = Some(result);
                Poll::Ready(result)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
