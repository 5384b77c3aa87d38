//! Fixed-size thread pool with a shared FIFO queue.
//!
//! Workers sleep on a condition variable while the queue is empty and take
//! tasks strictly in submission order. Completion order across workers is
//! not guaranteed.
//!
//! Shutdown stops new submissions, lets the workers drain whatever is
//! already queued, and joins them. A submission racing shutdown either lands
//! before the flag is set, and runs, or is rejected with
//! [`PoolError::ShuttingDown`]; the flag is only read and written under the
//! queue mutex.

use log::{debug, error, info, trace};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use wisp_core::PoolError;

use super::config::ThreadPoolConfig;
use super::task::{PackagedTask, Task, TaskHandle, TaskOutcome};

/// Statistics about the thread pool
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ThreadPoolStats {
    /// Number of tasks queued
    pub tasks_queued: usize,

    /// Number of tasks completed
    pub tasks_completed: usize,

    /// Number of tasks that panicked
    pub tasks_panicked: usize,

    /// Total task execution time (microseconds)
    pub total_execution_time_us: u64,

    /// Queue wait time (microseconds)
    pub total_queue_time_us: u64,

    /// Maximum task execution time (microseconds)
    pub max_execution_time_us: u64,
}

/// Live counters behind [`ThreadPoolStats`]
#[derive(Debug, Default)]
struct StatsCounters {
    tasks_queued: AtomicUsize,
    tasks_completed: AtomicUsize,
    tasks_panicked: AtomicUsize,
    total_execution_time_us: AtomicU64,
    total_queue_time_us: AtomicU64,
    max_execution_time_us: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> ThreadPoolStats {
        ThreadPoolStats {
            tasks_queued: self.tasks_queued.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            total_execution_time_us: self.total_execution_time_us.load(Ordering::Relaxed),
            total_queue_time_us: self.total_queue_time_us.load(Ordering::Relaxed),
            max_execution_time_us: self.max_execution_time_us.load(Ordering::Relaxed),
        }
    }

    fn record_execution(&self, exec_time_us: u64, outcome: TaskOutcome) {
        self.total_execution_time_us
            .fetch_add(exec_time_us, Ordering::Relaxed);
        self.max_execution_time_us
            .fetch_max(exec_time_us, Ordering::Relaxed);

        match outcome {
            TaskOutcome::Completed => self.tasks_completed.fetch_add(1, Ordering::Relaxed),
            TaskOutcome::Panicked => self.tasks_panicked.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Task with metadata for tracking
struct QueuedTask {
    /// The type-erased work
    task: Box<dyn Task>,

    /// When the task was enqueued
    enqueued_at: Instant,
}

/// State guarded by the queue mutex
struct TaskQueue {
    tasks: VecDeque<QueuedTask>,
    shutting_down: bool,
}

/// State shared between the pool handle and its workers
struct Shared {
    queue: Mutex<TaskQueue>,

    /// Signalled when a task is queued or shutdown begins
    available: Condvar,

    stats: StatsCounters,
    collect_stats: bool,
}

/// A fixed-size pool of worker threads executing submitted closures.
///
/// # Example
///
/// ```
/// use wisp_concurrency::ThreadPool;
///
/// let pool = ThreadPool::new(2).unwrap();
/// let handle = pool.enqueue(|| 40 + 2).unwrap();
/// assert_eq!(handle.wait().unwrap(), 42);
/// ```
pub struct ThreadPool {
    /// State shared with the workers
    shared: Arc<Shared>,

    /// Worker threads
    workers: Vec<JoinHandle<()>>,

    /// Configuration
    config: ThreadPoolConfig,
}

impl ThreadPool {
    /// Create a new thread pool with `threads` workers and default settings
    pub fn new(threads: usize) -> Result<Self, PoolError> {
        let config = ThreadPoolConfig {
            threads,
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Create a new thread pool with the specified configuration
    pub fn with_config(config: ThreadPoolConfig) -> Result<Self, PoolError> {
        if config.threads == 0 {
            return Err(PoolError::NoWorkers);
        }

        info!(
            "Creating thread pool with {} workers ({})",
            config.threads, config.thread_name_prefix
        );

        let shared = Arc::new(Shared {
            queue: Mutex::new(TaskQueue {
                tasks: VecDeque::new(),
                shutting_down: false,
            }),
            available: Condvar::new(),
            stats: StatsCounters::default(),
            collect_stats: config.collect_stats,
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(config.threads),
            config,
        };

        for id in 0..pool.config.threads {
            let name = format!("{}-{}", pool.config.thread_name_prefix, id);
            let shared = Arc::clone(&pool.shared);

            // On failure `pool` is dropped, which stops and joins the workers
            // spawned so far.
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || Self::worker_loop(id, shared))
                .map_err(|source| PoolError::SpawnFailed { name, source })?;

            pool.workers.push(handle);
        }

        Ok(pool)
    }

    /// Worker thread main loop
    fn worker_loop(id: usize, shared: Arc<Shared>) {
        debug!("Worker {}: Starting", id);

        loop {
            let queued = {
                let mut queue = shared.queue.lock();
                loop {
                    if let Some(queued) = queue.tasks.pop_front() {
                        break queued;
                    }
                    if queue.shutting_down {
                        debug!("Worker {}: Shutting down", id);
                        return;
                    }
                    shared.available.wait(&mut queue);
                }
            };

            let queue_time = queued.enqueued_at.elapsed();
            trace!(
                "Worker {}: Executing task (queue time: {:.2}ms)",
                id,
                queue_time.as_micros() as f64 / 1000.0
            );

            let exec_start = Instant::now();
            let outcome = queued.task.execute();
            let exec_time = exec_start.elapsed();

            if shared.collect_stats {
                shared
                    .stats
                    .total_queue_time_us
                    .fetch_add(queue_time.as_micros() as u64, Ordering::Relaxed);
                shared
                    .stats
                    .record_execution(exec_time.as_micros() as u64, outcome);
            }

            match outcome {
                TaskOutcome::Completed => trace!(
                    "Worker {}: Task completed in {:.2}ms",
                    id,
                    exec_time.as_micros() as f64 / 1000.0
                ),
                TaskOutcome::Panicked => debug!("Worker {}: Task panicked", id),
            }
        }
    }

    /// Submit a closure and get a handle to its eventual result.
    ///
    /// Never blocks; the caller decides whether to wait on the handle.
    pub fn enqueue<F, T>(&self, f: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (task, handle) = PackagedTask::new(f);
        self.push(Box::new(task))?;
        Ok(handle)
    }

    /// Submit a function together with the argument it will be called with.
    pub fn enqueue_with<F, A, T>(&self, f: F, args: A) -> Result<TaskHandle<T>, PoolError>
    where
        F: FnOnce(A) -> T + Send + 'static,
        A: Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(move || f(args))
    }

    /// Submit a closure whose result nobody will wait for.
    ///
    /// A panic in the closure is logged.
    pub fn execute<F>(&self, f: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(f).map(drop)
    }

    fn push(&self, task: Box<dyn Task>) -> Result<(), PoolError> {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutting_down {
                return Err(PoolError::ShuttingDown);
            }
            queue.tasks.push_back(QueuedTask {
                task,
                enqueued_at: Instant::now(),
            });
        }

        if self.shared.collect_stats {
            self.shared.stats.tasks_queued.fetch_add(1, Ordering::Relaxed);
        }

        self.shared.available.notify_one();
        Ok(())
    }

    /// Get current statistics for the thread pool
    pub fn stats(&self) -> ThreadPoolStats {
        if self.shared.collect_stats {
            self.shared.stats.snapshot()
        } else {
            ThreadPoolStats::default()
        }
    }

    /// Number of tasks waiting for a worker
    pub fn queued_len(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    /// Get the number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Get the configuration this pool was built with
    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    /// Check if the thread pool is shutting down
    pub fn is_shutting_down(&self) -> bool {
        self.shared.queue.lock().shutting_down
    }

    /// Stop accepting tasks and let the workers exit once the queue drains.
    ///
    /// Does not wait for them; see [`shutdown_and_join`](Self::shutdown_and_join).
    pub fn shutdown(&self) {
        let pending = {
            let mut queue = self.shared.queue.lock();
            if queue.shutting_down {
                return;
            }
            queue.shutting_down = true;
            queue.tasks.len()
        };

        info!("Shutting down thread pool ({} task(s) still queued)", pending);
        self.shared.available.notify_all();
    }

    /// Shut down the thread pool and wait for workers to finish
    pub fn shutdown_and_join(mut self) {
        self.shutdown();
        self.join_workers();
    }

    fn join_workers(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        let current = thread::current().id();
        let mut detached = false;

        for worker in self.workers.drain(..) {
            // The last reference to a pool can be dropped by one of its own tasks
            if worker.thread().id() == current {
                detached = true;
                continue;
            }
            worker.join().unwrap_or_else(|e| {
                error!("Worker thread panicked during shutdown: {:?}", e);
            });
        }

        if detached {
            debug!("Thread pool dropped from its own worker; that worker exits on its own");
        } else {
            info!("Thread pool shutdown complete");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        self.join_workers();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers.len())
            .field("config", &self.config)
            .finish()
    }
}
