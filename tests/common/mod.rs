#![allow(dead_code)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

pub use waithandle::test_utils::{block_on, init_test_logging, poll_once};

/// Initialize logging and announce the test phase.
pub fn init_test(name: &str) {
    init_test_logging();
    waithandle::test_phase!(name);
}
