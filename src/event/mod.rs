//! Event wait handles.
//!
//! - [`AutoResetEvent`]: edge-triggered; each `set` admits exactly one
//!   waiter, then the event reverts to non-signaled.
//! - [`ManualResetEvent`]: level-triggered; once `set`, all current and
//!   future waiters pass until `reset`.

mod auto;
mod manual;

pub use auto::{AutoResetEvent, AutoResetWait};
pub use manual::{ManualResetEvent, ManualResetWait};
