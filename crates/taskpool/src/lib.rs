//! # Taskpool — Fixed-Size Worker Pool
//!
//! A worker pool for owning tasks with a two-phase execution contract:
//! a short pre-hook run under the pool's lock, then the task body run
//! outside it. Each worker thread carries a stable small-integer id that
//! tasks can use for affinity tagging (per-worker buffers, shard picking).
//!
//! The queue is bounded: [`TaskPool::submit`] blocks while the queue is at
//! capacity, giving producers backpressure instead of unbounded memory
//! growth. [`TaskPool::shutdown`] is cooperative — workers drain whatever
//! is queued, then exit, and further submissions fail with
//! [`PoolError::Closed`].

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

/// Errors from submitting work to a [`TaskPool`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has been shut down and accepts no further tasks.
    #[error("task pool is closed")]
    Closed,
}

/// A unit of work owned by the pool.
///
/// For each task the pool first calls [`run_in_lock`](Task::run_in_lock)
/// while still holding the queue lock (keep it short: bookkeeping only),
/// then releases the lock and calls [`run`](Task::run) with the
/// sequentially assigned task id.
pub trait Task: Send {
    /// Pre-hook executed under the pool's lock.
    fn run_in_lock(&mut self, worker_id: usize);

    /// Task body executed outside the lock.
    fn run(&mut self, worker_id: usize, task_id: u64);
}

struct QueueState {
    queue: VecDeque<(u64, Box<dyn Task>)>,
    next_task_id: u64,
    stopping: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// Fixed-size worker pool with a bounded task queue.
pub struct TaskPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskPool {
    /// Spawns `num_workers` worker threads sharing a queue bounded at
    /// `queue_capacity` tasks. Worker ids are `0..num_workers` and stay
    /// fixed for the life of the pool.
    pub fn start(num_workers: usize, queue_capacity: usize) -> Self {
        assert!(num_workers > 0, "a pool needs at least one worker");
        assert!(queue_capacity > 0, "a pool needs a nonzero queue");

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                queue: VecDeque::with_capacity(queue_capacity),
                next_task_id: 0,
                stopping: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: queue_capacity,
        });

        let workers = (0..num_workers)
            .map(|worker_id| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || worker_loop(&shared, worker_id))
            })
            .collect();

        log::debug!(
            target: "galekv::taskpool",
            "started pool with {} workers, queue capacity {}",
            num_workers,
            queue_capacity
        );
        Self { shared, workers }
    }

    /// Enqueues a task, blocking while the queue is at capacity.
    ///
    /// Returns the task's sequentially assigned id.
    ///
    /// # Errors
    ///
    /// [`PoolError::Closed`] once [`shutdown`](TaskPool::shutdown) has been
    /// called, including while a submit is blocked waiting for space.
    pub fn submit(&self, task: Box<dyn Task>) -> Result<u64, PoolError> {
        let mut state = self.shared.state.lock();
        while state.queue.len() >= self.shared.capacity && !state.stopping {
            self.shared.not_full.wait(&mut state);
        }
        if state.stopping {
            return Err(PoolError::Closed);
        }

        let task_id = state.next_task_id;
        state.next_task_id += 1;
        state.queue.push_back((task_id, task));
        self.shared.not_empty.notify_one();
        Ok(task_id)
    }

    /// Cooperative stop: workers finish the queued tasks, then exit; this
    /// call joins them. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stopping = true;
        }
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared, worker_id: usize) {
    loop {
        let mut state = shared.state.lock();
        let (task_id, mut task) = loop {
            if let Some(entry) = state.queue.pop_front() {
                break entry;
            }
            if state.stopping {
                log::trace!(target: "galekv::taskpool", "worker {} exiting", worker_id);
                return;
            }
            shared.not_empty.wait(&mut state);
        };

        // Pre-hook runs under the same lock acquisition that popped.
        task.run_in_lock(worker_id);
        drop(state);
        shared.not_full.notify_one();

        task.run(worker_id, task_id);
    }
}

#[cfg(test)]
mod tests;
