//! Limits on how long a motion may block.
//!
//! The default `WaitPolicy::blocking()` waits forever, so a stalled wheel
//! blocks the caller indefinitely. A deadline or a cancel token bounds it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cloneable flag that asks an in-flight motion to stop
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Re-arm after a cancelled motion
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Why a bounded wait gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitLimit {
    Cancelled,
    DeadlinePassed,
}

/// How a motion waits for its wheels
#[derive(Debug, Clone, Default)]
pub struct WaitPolicy {
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl WaitPolicy {
    /// Wait until both wheels arrive, however long that takes
    pub fn blocking() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.deadline.is_none() && self.cancel.is_none()
    }

    /// Checked once per poll; cancellation wins over the deadline
    pub fn check(&self, now: Instant) -> Option<WaitLimit> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(WaitLimit::Cancelled);
        }
        match self.deadline {
            Some(deadline) if now >= deadline => Some(WaitLimit::DeadlinePassed),
            _ => None,
        }
    }
}
