//! Compose wait handles: wait-for-all and wait-for-any.
//!
//! Both combinators start one wait per handle, all racing the same outer
//! token, and drive them to a single `bool`:
//!
//! - [`wait_all`]: `true` iff every handle resolves `true`; `false` the
//!   instant any handle resolves `false` (which, handles sharing the outer
//!   token, includes cancellation), without waiting for the rest.
//! - [`wait_any`]: `true` the instant any handle resolves `true`; `false`
//!   only once every handle has given up.
//!
//! Exactly one final result is produced no matter how many handles race:
//! the combinator future owns every per-handle wait and drops the losers
//! the moment the result is decided. Dropping a wait deregisters it from
//! its primitive and the token, so no background work outlives the
//! combinator's own resolution.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::cancel::CancelToken;
use crate::handle::{WaitFuture, WaitHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    All,
    Any,
}

/// Waits until every handle resolves `true`, short-circuiting on the
/// first `false` or on cancellation.
///
/// An empty handle set resolves `true` immediately (vacuous conjunction).
pub fn wait_all<'a>(
    cancel: &'a CancelToken,
    handles: &'a [&'a dyn WaitHandle],
) -> WaitAll<'a> {
    WaitAll {
        inner: MultiWait::new(Mode::All, cancel, handles),
    }
}

/// Waits until any handle resolves `true`.
///
/// Resolves `false` only once every handle has given up, with all
/// per-handle waits racing the same outer token, that is when the token
/// fires. An empty handle set resolves `false` immediately (nothing can
/// ever succeed).
pub fn wait_any<'a>(
    cancel: &'a CancelToken,
    handles: &'a [&'a dyn WaitHandle],
) -> WaitAny<'a> {
    WaitAny {
        inner: MultiWait::new(Mode::Any, cancel, handles),
    }
}

/// Future returned by [`wait_all`].
pub struct WaitAll<'a> {
    inner: MultiWait<'a>,
}

impl Future for WaitAll<'_> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        self.get_mut().inner.poll(cx)
    }
}

/// Future returned by [`wait_any`].
pub struct WaitAny<'a> {
    inner: MultiWait<'a>,
}

impl Future for WaitAny<'_> {
    type Output = bool;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        self.get_mut().inner.poll(cx)
    }
}

struct MultiWait<'a> {
    /// One wait per handle; `None` once that wait has resolved.
    children: Vec<Option<WaitFuture<'a>>>,
    remaining: usize,
    mode: Mode,
    finished: Option<bool>,
}

impl<'a> MultiWait<'a> {
    fn new(mode: Mode, cancel: &'a CancelToken, handles: &'a [&'a dyn WaitHandle]) -> Self {
        let children: Vec<_> = handles
            .iter()
            .map(|handle| Some(handle.wait_one(cancel)))
            .collect();
        let remaining = children.len();
        Self {
            children,
            remaining,
            mode,
            finished: None,
        }
    }

    fn poll(&mut self, cx: &mut Context<'_>) -> Poll<bool> {
        if let Some(result) = self.finished {
            return Poll::Ready(result);
        }

        for index in 0..self.children.len() {
            let Some(wait) = self.children[index].as_mut() else {
                continue;
            };
            let Poll::Ready(result) = wait.as_mut().poll(cx) else {
                continue;
            };
            self.children[index] = None;
            self.remaining -= 1;
            match (self.mode, result) {
                // Short-circuit: one failure sinks the conjunction, one
                // success decides the disjunction.
                (Mode::All, false) => return Poll::Ready(self.finish(false)),
                (Mode::Any, true) => return Poll::Ready(self.finish(true)),
                _ => {}
            }
        }

        if self.remaining == 0 {
            let result = self.mode == Mode::All;
            return Poll::Ready(self.finish(result));
        }
        Poll::Pending
    }

    fn finish(&mut self, result: bool) -> bool {
        // Dropping the losing waits deregisters them from their
        // primitives and the token; nothing keeps running.
        self.children.clear();
        self.remaining = 0;
        self.finished = Some(result);
        result
    }
}
