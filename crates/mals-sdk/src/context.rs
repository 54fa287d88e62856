//! Call context carried into RPC handlers
//!
//! The bridge never times out a host call on its own. Deadlines and
//! cancellation travel in a `CallContext` that callees are expected to
//! consult.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct ContextState {
    deadline: Option<Instant>,
    cancelled: AtomicBool,
}

/// Deadline plus cancellation flag, cheap to clone.
///
/// Clones share the cancellation flag: cancelling one cancels all.
#[derive(Debug, Clone)]
pub struct CallContext {
    state: Arc<ContextState>,
}

impl CallContext {
    /// Context with no deadline
    pub fn background() -> Self {
        Self {
            state: Arc::new(ContextState {
                deadline: None,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Context that expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            state: Arc::new(ContextState {
                deadline: Instant::now().checked_add(timeout),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Mark this context (and every clone) cancelled
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    /// Whether `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Absolute deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.state.deadline
    }

    /// Time left before the deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.state
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Cancelled or past the deadline
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Why the context is done
    pub fn err(&self) -> Option<&'static str> {
        if self.is_cancelled() {
            return Some("context canceled");
        }
        match self.state.deadline {
            Some(deadline) if Instant::now() >= deadline => Some("context deadline exceeded"),
            _ => None,
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::background()
    }
}
