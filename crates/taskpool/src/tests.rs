use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Duration;

// -------------------- Helpers --------------------

/// Records the phases it went through and which worker ran it.
struct RecordingTask {
    log: Arc<Mutex<Vec<(u64, usize, &'static str)>>>,
}

impl Task for RecordingTask {
    fn run_in_lock(&mut self, worker_id: usize) {
        // Task id is not known in-lock; use a sentinel.
        self.log.lock().push((u64::MAX, worker_id, "in_lock"));
    }

    fn run(&mut self, worker_id: usize, task_id: u64) {
        self.log.lock().push((task_id, worker_id, "run"));
    }
}

struct CountingTask {
    counter: Arc<AtomicUsize>,
}

impl Task for CountingTask {
    fn run_in_lock(&mut self, _worker_id: usize) {}

    fn run(&mut self, _worker_id: usize, _task_id: u64) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Blocks inside `run` until released through a channel.
struct GatedTask {
    gate: mpsc::Receiver<()>,
    counter: Arc<AtomicUsize>,
}

impl Task for GatedTask {
    fn run_in_lock(&mut self, _worker_id: usize) {}

    fn run(&mut self, _worker_id: usize, _task_id: u64) {
        let _ = self.gate.recv();
        self.counter.fetch_add(1, Ordering::SeqCst);
    }
}

// -------------------- Execution --------------------

#[test]
fn every_submitted_task_runs() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut pool = TaskPool::start(4, 16);

    for _ in 0..100 {
        pool.submit(Box::new(CountingTask {
            counter: Arc::clone(&counter),
        }))
        .unwrap();
    }
    pool.shutdown();

    assert_eq!(counter.load(Ordering::SeqCst), 100);
}

#[test]
fn task_ids_are_sequential() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pool = TaskPool::start(2, 8);

    let mut expected = Vec::new();
    for _ in 0..20 {
        let id = pool
            .submit(Box::new(RecordingTask {
                log: Arc::clone(&log),
            }))
            .unwrap();
        expected.push(id);
    }
    pool.shutdown();

    assert_eq!(expected, (0..20).collect::<Vec<u64>>());

    let mut ran: Vec<u64> = log
        .lock()
        .iter()
        .filter(|(_, _, phase)| *phase == "run")
        .map(|(id, _, _)| *id)
        .collect();
    ran.sort_unstable();
    assert_eq!(ran, expected);
}

#[test]
fn in_lock_hook_precedes_run_on_the_same_worker() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pool = TaskPool::start(1, 8);

    for _ in 0..5 {
        pool.submit(Box::new(RecordingTask {
            log: Arc::clone(&log),
        }))
        .unwrap();
    }
    pool.shutdown();

    let entries = log.lock();
    // Single worker: phases strictly alternate in_lock, run, in_lock, ...
    assert_eq!(entries.len(), 10);
    for pair in entries.chunks(2) {
        assert_eq!(pair[0].2, "in_lock");
        assert_eq!(pair[1].2, "run");
        assert_eq!(pair[0].1, pair[1].1);
    }
}

#[test]
fn worker_ids_are_stable_and_small() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut pool = TaskPool::start(3, 32);

    for _ in 0..60 {
        pool.submit(Box::new(RecordingTask {
            log: Arc::clone(&log),
        }))
        .unwrap();
    }
    pool.shutdown();

    for (_, worker_id, _) in log.lock().iter() {
        assert!(*worker_id < 3);
    }
}

// -------------------- Backpressure --------------------

#[test]
fn submit_blocks_when_the_queue_is_full() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut pool = TaskPool::start(1, 1);
    let (tx, rx) = mpsc::channel();

    // Occupies the single worker until released.
    pool.submit(Box::new(GatedTask {
        gate: rx,
        counter: Arc::clone(&counter),
    }))
    .unwrap();
    // Fills the queue's single slot.
    pool.submit(Box::new(CountingTask {
        counter: Arc::clone(&counter),
    }))
    .unwrap();

    // A third submit must block until the worker frees a slot.
    let pool = Arc::new(Mutex::new(pool));
    let submitted = Arc::new(AtomicBool::new(false));
    let handle = {
        let pool = Arc::clone(&pool);
        let submitted = Arc::clone(&submitted);
        let counter = Arc::clone(&counter);
        std::thread::spawn(move || {
            pool.lock().submit(Box::new(CountingTask { counter })).unwrap();
            submitted.store(true, Ordering::SeqCst);
        })
    };

    std::thread::sleep(Duration::from_millis(100));
    assert!(
        !submitted.load(Ordering::SeqCst),
        "submit returned while the queue was full"
    );

    tx.send(()).unwrap();
    handle.join().unwrap();
    assert!(submitted.load(Ordering::SeqCst));

    pool.lock().shutdown();
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

// -------------------- Shutdown --------------------

#[test]
fn shutdown_drains_queued_tasks() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut pool = TaskPool::start(1, 64);

    for _ in 0..50 {
        pool.submit(Box::new(CountingTask {
            counter: Arc::clone(&counter),
        }))
        .unwrap();
    }
    pool.shutdown();
    assert_eq!(counter.load(Ordering::SeqCst), 50);
}

#[test]
fn submit_after_shutdown_is_refused() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut pool = TaskPool::start(2, 4);
    pool.shutdown();

    let err = pool
        .submit(Box::new(CountingTask { counter }))
        .unwrap_err();
    assert_eq!(err, PoolError::Closed);
}

#[test]
fn shutdown_is_idempotent() {
    let mut pool = TaskPool::start(2, 4);
    pool.shutdown();
    pool.shutdown();
}
