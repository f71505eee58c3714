use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::foundation::error::{AnimError, AnimResult};

/// Fire-and-forget unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool that runs preparation jobs.
pub trait FrameExecutor: Send + Sync {
    /// Queue `job` for execution. The submitter never observes the result.
    fn execute(&self, job: Job);
}

/// Executor backed by a dedicated rayon thread pool.
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    /// Build a pool with `threads` workers, or rayon's default when `None`.
    pub fn new(threads: Option<usize>) -> AnimResult<Self> {
        Ok(Self {
            pool: build_thread_pool(threads)?,
        })
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl FrameExecutor for RayonExecutor {
    fn execute(&self, job: Job) {
        self.pool.spawn(job);
    }
}

fn build_thread_pool(threads: Option<usize>) -> AnimResult<rayon::ThreadPool> {
    if threads == Some(0) {
        return Err(AnimError::validation(
            "preparer 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("animcache-prepare-{i}"))
        .panic_handler(|_| tracing::error!("frame preparation job panicked"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| AnimError::scheduler(format!("failed to build rayon thread pool: {e}")))
}

/// Executor that queues jobs until they are run explicitly.
///
/// Jobs run in submission order on the thread that calls [`QueueExecutor::run_next`] or
/// [`QueueExecutor::run_all`].
#[derive(Default)]
pub struct QueueExecutor {
    queue: Mutex<VecDeque<Job>>,
}

impl QueueExecutor {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether no jobs are queued.
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Run the oldest queued job. Returns `false` when the queue was empty.
    pub fn run_next(&self) -> bool {
        let job = self.queue.lock().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Run queued jobs, including ones queued while running, until the queue is empty.
    pub fn run_all(&self) -> usize {
        let mut n = 0;
        while self.run_next() {
            n += 1;
        }
        n
    }
}

impl FrameExecutor for QueueExecutor {
    fn execute(&self, job: Job) {
        self.queue.lock().push_back(job);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/prepare/executor.rs"]
mod tests;
