//! Deadline delivery for cancellation tokens.
//!
//! Tokens created with a deadline register themselves with a process-wide
//! [`TimerDriver`]. The driver owns one background thread that sleeps
//! until the earliest pending deadline and fires the corresponding tokens;
//! there is no polling interval. Tokens are held weakly, so dropping every
//! clone of a token before its deadline leaves nothing to fire.

mod driver;

pub(crate) use driver::TimerDriver;
