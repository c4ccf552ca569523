//! The polymorphic wait-handle contract.
//!
//! Every primitive in this crate resolves a cancellable wait to a `bool`:
//! `true` when the condition was satisfied, `false` when the wait gave up
//! (cancelled or timed out, deliberately indistinguishable). [`WaitHandle`]
//! abstracts over that so heterogeneous primitives can be composed by the
//! [`wait_all`](crate::wait_all) / [`wait_any`](crate::wait_any)
//! combinators.
//!
//! The trait returns a boxed [`WaitFuture`] for object safety; each
//! primitive also exposes its concrete, allocation-free future through an
//! inherent `wait_one`.

use std::future::Future;
use std::pin::Pin;

use crate::cancel::CancelToken;

/// Boxed resolution of one cancellable wait.
pub type WaitFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// A primitive that can be waited on under cancellation.
pub trait WaitHandle: Send + Sync {
    /// Waits until the handle's condition is satisfied or `cancel` fires.
    ///
    /// Resolves `true` on satisfaction, `false` on cancellation. Exactly
    /// one outcome is produced per wait; a wait racing a token that never
    /// fires is unbounded.
    fn wait_one<'a>(&'a self, cancel: &'a CancelToken) -> WaitFuture<'a>;
}

/// A [`WaitHandle`] with explicit signaled-state transitions.
pub trait EventWaitHandle: WaitHandle {
    /// Moves the event towards signaled.
    ///
    /// Returns whether the requested transition actually occurred; an
    /// idempotent no-op reports `false`, not an error.
    fn set(&self) -> bool;

    /// Moves the event towards non-signaled.
    ///
    /// Returns whether the requested transition actually occurred.
    fn reset(&self) -> bool;
}
