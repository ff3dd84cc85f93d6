//! Manually advanced clock
//!
//! Time stands still until [`VirtualScheduler::advance`] is called. Due
//! tasks run in deadline order (ties in scheduling order) and outside the
//! internal lock, so a task is free to schedule more work.

use super::{Scheduler, TimerHandle, TimerTask};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct PendingTask {
    due: Duration,
    seq: u64,
    token: CancellationToken,
    task: TimerTask,
}

#[derive(Default)]
struct ClockState {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTask>,
}

/// Scheduler driven by an explicit clock
#[derive(Default)]
pub struct VirtualScheduler {
    state: Mutex<ClockState>,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the clock was created
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of scheduled tasks that are neither cancelled nor fired
    pub fn pending(&self) -> usize {
        self.lock()
            .pending
            .iter()
            .filter(|p| !p.token.is_cancelled())
            .count()
    }

    /// Move the clock forward, running every task that falls due.
    ///
    /// Returns how many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut fired = 0;

        loop {
            let next = {
                let mut state = self.lock();
                state.pending.retain(|p| !p.token.is_cancelled());

                let due = state
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(index, _)| index);

                match due {
                    Some(index) => {
                        let next = state.pending.remove(index);
                        state.now = next.due;
                        next
                    }
                    None => {
                        state.now = target;
                        break;
                    }
                }
            };

            (next.task)();
            fired += 1;
        }

        fired
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerHandle {
        let token = CancellationToken::new();
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now + delay;

        state.pending.push(PendingTask {
            due,
            seq,
            token: token.clone(),
            task,
        });

        TimerHandle::new(token)
    }
}

impl fmt::Debug for VirtualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualScheduler")
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}
