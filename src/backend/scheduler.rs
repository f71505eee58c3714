use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::foundation::clock::{ManualClock, MonotonicClock};
use crate::foundation::error::{AnimError, AnimResult};

/// Task run once by a [`DelayedScheduler`].
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after a delay on a designated execution context.
pub trait DelayedScheduler: Send + Sync {
    /// Run `task` once, no earlier than `delay_ms` from now.
    fn schedule(&self, delay_ms: u64, task: ScheduledTask);
}

struct Timed {
    due: u64,
    seq: u64,
    task: ScheduledTask,
}

impl PartialEq for Timed {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Timed {}

impl PartialOrd for Timed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timed {
    // Reversed: the earliest deadline sits at the top of the max-heap, FIFO among equals.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Scheduler backed by one dedicated timer thread.
///
/// Tasks run on the timer thread in deadline order. Tasks still queued when the scheduler is
/// dropped are discarded.
pub struct ThreadScheduler {
    tx: Option<mpsc::Sender<(Instant, ScheduledTask)>>,
    join: Option<thread::JoinHandle<()>>,
}

impl ThreadScheduler {
    /// Spawn the timer thread.
    pub fn new() -> AnimResult<Self> {
        let (tx, rx) = mpsc::channel();
        let join = thread::Builder::new()
            .name("animcache-timer".to_string())
            .spawn(move || run_timer(rx))
            .map_err(|e| AnimError::scheduler(format!("failed to spawn timer thread: {e}")))?;
        Ok(Self {
            tx: Some(tx),
            join: Some(join),
        })
    }
}

impl DelayedScheduler for ThreadScheduler {
    fn schedule(&self, delay_ms: u64, task: ScheduledTask) {
        let due = Instant::now() + Duration::from_millis(delay_ms);
        let sent = self.tx.as_ref().is_some_and(|tx| tx.send((due, task)).is_ok());
        if !sent {
            tracing::warn!(delay_ms, "timer thread is gone; dropping scheduled task");
        }
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        // Disconnecting the channel stops the timer loop.
        self.tx = None;
        if let Some(join) = self.join.take() {
            if join.thread().id() != thread::current().id() {
                let _ = join.join();
            }
        }
    }
}

fn run_timer(rx: mpsc::Receiver<(Instant, ScheduledTask)>) {
    let origin = Instant::now();
    let to_ms = |t: Instant| u64::try_from(t.saturating_duration_since(origin).as_millis());
    let mut queue: BinaryHeap<Timed> = BinaryHeap::new();
    let mut seq = 0u64;

    loop {
        let now = Instant::now();
        let now_ms = to_ms(now).unwrap_or(u64::MAX);
        while queue.peek().is_some_and(|t| t.due <= now_ms) {
            if let Some(timed) = queue.pop() {
                (timed.task)();
            }
        }

        let received = match queue.peek() {
            Some(next) => {
                let wait = Duration::from_millis(next.due.saturating_sub(now_ms));
                rx.recv_timeout(wait)
            }
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((due, task)) => {
                seq += 1;
                queue.push(Timed {
                    due: to_ms(due).unwrap_or(u64::MAX),
                    seq,
                    task,
                });
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

/// Scheduler driven by a [`ManualClock`].
///
/// Tasks run on the thread that calls [`ManualScheduler::advance`] or
/// [`ManualScheduler::run_due`], once the clock has reached their deadline.
pub struct ManualScheduler {
    clock: Arc<ManualClock>,
    state: Mutex<ManualState>,
}

#[derive(Default)]
struct ManualState {
    queue: BinaryHeap<Timed>,
    seq: u64,
}

impl ManualScheduler {
    /// Create a scheduler reading deadlines from `clock`.
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            state: Mutex::new(ManualState::default()),
        }
    }

    /// The clock this scheduler follows.
    pub fn clock(&self) -> &Arc<ManualClock> {
        &self.clock
    }

    /// Number of tasks not yet run.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Deadline of the next task, if any.
    pub fn next_due_ms(&self) -> Option<u64> {
        self.state.lock().queue.peek().map(|t| t.due)
    }

    /// Run every task whose deadline has passed, including tasks they schedule that are also due.
    pub fn run_due(&self) -> usize {
        let mut n = 0;
        loop {
            let now = self.clock.now_ms();
            let task = {
                let mut st = self.state.lock();
                match st.queue.peek() {
                    Some(t) if t.due <= now => st.queue.pop(),
                    _ => None,
                }
            };
            let Some(timed) = task else {
                return n;
            };
            (timed.task)();
            n += 1;
        }
    }

    /// Move the clock forward by `delta_ms`, running tasks at their deadlines along the way.
    ///
    /// The clock is stepped to each intermediate deadline so tasks observe the time they were
    /// due at.
    pub fn advance(&self, delta_ms: u64) -> usize {
        let target = self.clock.now_ms().saturating_add(delta_ms);
        let mut n = 0;
        while let Some(due) = self.next_due_ms().filter(|due| *due <= target) {
            self.clock.set(due);
            n += self.run_due();
        }
        self.clock.set(target);
        n + self.run_due()
    }
}

impl DelayedScheduler for ManualScheduler {
    fn schedule(&self, delay_ms: u64, task: ScheduledTask) {
        let due = self.clock.now_ms().saturating_add(delay_ms);
        let mut st = self.state.lock();
        st.seq += 1;
        let seq = st.seq;
        st.queue.push(Timed { due, seq, task });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backend/scheduler.rs"]
mod tests;
