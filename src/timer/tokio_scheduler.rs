//! Wall-clock scheduler backed by the tokio runtime

use super::{Scheduler, TimerHandle, TimerTask};
use crate::errors::{DialogError, DialogResult};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Spawns one task per timer that races a sleep against cancellation
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Bind to the runtime the caller is running on
    pub fn current() -> DialogResult<Self> {
        Handle::try_current()
            .map(Self::with_handle)
            .map_err(|e| DialogError::SchedulerUnavailable(e.to_string()))
    }

    /// Bind to an explicit runtime
    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        self.handle.spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    trace!("timer cancelled before expiry");
                }
                _ = tokio::time::sleep(delay) => {
                    // A cancel can land between the wake-up and this branch
                    if !cancelled.is_cancelled() {
                        task();
                    }
                }
            }
        });

        TimerHandle::new(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_task_runs_after_delay() {
        let scheduler = TokioScheduler::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        scheduler.schedule(
            Duration::from_secs(30),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_task_never_runs() {
        let scheduler = TokioScheduler::current().unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = scheduler.schedule(
            Duration::from_secs(1),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_current_without_runtime() {
        let result = TokioScheduler::current();
        assert!(matches!(result, Err(DialogError::SchedulerUnavailable(_))));
    }
}
