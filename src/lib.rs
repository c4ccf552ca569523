//! Waithandle: cancellable cross-thread signaling primitives.
//!
//! # Overview
//!
//! A small set of signaling primitives ([`AutoResetEvent`],
//! [`ManualResetEvent`], [`Semaphore`], and [`WaitGroup`]) unified behind
//! one polymorphic [`WaitHandle`] contract that supports cancellable,
//! timeout-bounded waiting, plus two combinators ([`wait_all`],
//! [`wait_any`]) that compose multiple handles into a single cancellable
//! wait.
//!
//! # Core Guarantees
//!
//! - **Exactly one outcome per wait**: every wait resolves to `true`
//!   (condition satisfied) or `false` (cancelled or timed out; the two
//!   are deliberately indistinguishable), never both, never neither
//! - **No lost wakeups**: signals present at wait time are observed;
//!   claimants dropped mid-handoff pass the wakeup on
//! - **No leaked waits**: dropping any wait future, or resolving a
//!   combinator, deregisters every pending registration
//! - **Push-based**: waits suspend on `Waker`s woken by state transitions
//!   and deadline expiry; nothing polls on an interval
//! - **Runtime-agnostic**: the futures obey the plain `Waker` contract
//!   and run under any executor (tests drive them with a thread parker)
//!
//! # Non-blocking mutators
//!
//! `set`, `reset`, `release`, `add`, `done`, and `cancel` never suspend;
//! locks guard state transitions only, never a wait.
//!
//! # Module Structure
//!
//! - [`cancel`]: cancellation tokens with optional deadlines
//! - [`signal`]: one-shot broadcast latch, the base cancellable wait
//! - [`handle`]: the [`WaitHandle`] / [`EventWaitHandle`] contract
//! - [`event`]: auto- and manual-reset events
//! - [`semaphore`]: counting semaphore
//! - [`wait_group`]: countdown latch
//! - [`combinator`]: wait-for-all / wait-for-any composition
//! - [`test_utils`]: logging init and a minimal future driver for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod combinator;
pub mod event;
pub mod handle;
pub mod semaphore;
pub mod signal;
pub mod test_utils;
mod time;
pub mod wait_group;
mod waiters;

pub use cancel::CancelToken;
pub use combinator::{wait_all, wait_any, WaitAll, WaitAny};
pub use event::{AutoResetEvent, AutoResetWait, ManualResetEvent, ManualResetWait};
pub use handle::{EventWaitHandle, WaitFuture, WaitHandle};
pub use semaphore::{Semaphore, SemaphoreWait};
pub use signal::{OwnedSignalWait, Signal, SignalWait};
pub use wait_group::{WaitGroup, WaitGroupWait};
