//! Scheduling primitive behind the dialog's expiration timer
//!
//! A session never sleeps on its own; it asks an injected [`Scheduler`] to
//! run a task after a delay and keeps the returned [`TimerHandle`] so the
//! task can be called off. Two schedulers ship with the crate:
//! - [`TokioScheduler`]: wall clock, one spawned task per timer
//! - [`VirtualScheduler`]: a clock that only moves when told to, for tests

mod tokio_scheduler;
mod virtual_clock;

pub use tokio_scheduler::TokioScheduler;
pub use virtual_clock::VirtualScheduler;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Work run once when a timer fires
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after a delay
pub trait Scheduler: Send + Sync {
    /// Schedule `task` to run once after `delay`
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle;
}

impl<T: Scheduler + ?Sized> Scheduler for Arc<T> {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        (**self).schedule(delay, task)
    }
}

/// Cancellable reference to a scheduled task
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    /// Wrap the token a scheduler watches for cancellation
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Call off the task. Cancelling twice, or after the task ran, is a no-op.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
