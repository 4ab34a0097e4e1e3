//! A fixed-size work-stealing thread pool.
//!
//! Each worker owns one [`WorkStealingQueue`]. `submit` round-robins across the queues; an idle
//! worker first checks its own queue, then steals from its peers in index order before parking on
//! the shared condition variable. Shutdown is cooperative: the pool drains whatever is queued
//! before any worker exits.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use super::queue::{Task, WorkStealingQueue};

/// Error returned when submitting to a pool that has already been told to shut down.
#[derive(Debug, thiserror::Error)]
#[error("cannot submit task to a stopped thread pool")]
pub struct PoolStopped;

struct Shared {
    queues: Vec<WorkStealingQueue>,
    stop: AtomicBool,
    next_queue: AtomicUsize,
    pending: AtomicUsize,
    cv_mutex: Mutex<()>,
    cv: Condvar,
}

/// A fixed-size pool of worker threads, each backed by its own work-stealing queue.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawns `num_threads` workers, each bound to its own queue. `num_threads` is coerced up to
    /// 1 if given as 0.
    pub fn new(num_threads: usize) -> Self {
        let num_threads = num_threads.max(1);

        let mut queues = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            queues.push(WorkStealingQueue::new());
        }

        let shared = Arc::new(Shared {
            queues,
            stop: AtomicBool::new(false),
            next_queue: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
            cv_mutex: Mutex::new(()),
            cv: Condvar::new(),
        });

        let workers = (0..num_threads)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || worker_loop(shared, i))
            })
            .collect();

        ThreadPool { shared, workers }
    }

    /// Submits a task to the pool. Picks a queue by round-robin, pushes the task, and wakes one
    /// waiting worker. Fails if [`ThreadPool::shutdown`] has already been called.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolStopped>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shared.stop.load(Ordering::Relaxed) {
            return Err(PoolStopped);
        }

        let index = self.shared.next_queue.fetch_add(1, Ordering::Relaxed) % self.shared.queues.len();
        self.shared.queues[index].push(Box::new(task));
        self.shared.pending.fetch_add(1, Ordering::Release);
        // Hold the condvar's mutex while notifying so a worker that is between checking the
        // predicate and waiting can't miss this wakeup.
        let _guard = self.shared.cv_mutex.lock().unwrap();
        self.shared.cv.notify_one();
        Ok(())
    }

    /// The number of tasks submitted but not yet picked up by a worker.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Signals shutdown, wakes every worker, and joins them all. In-flight and already-queued
    /// tasks are allowed to finish; nothing is cancelled. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shared.stop.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let _guard = self.shared.cv_mutex.lock().unwrap();
            self.shared.cv.notify_all();
        }

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers.len())
            .field("pending", &self.pending())
            .finish()
    }
}

fn try_get_task(shared: &Shared, owner: usize) -> Option<Task> {
    let task = shared.queues[owner]
        .pop()
        .or_else(|| shared.queues.iter().enumerate().find_map(|(i, q)| if i == owner { None } else { q.steal() }));

    if task.is_some() {
        shared.pending.fetch_sub(1, Ordering::AcqRel);
    }
    task
}

fn worker_loop(shared: Arc<Shared>, id: usize) {
    loop {
        if let Some(task) = try_get_task(&shared, id) {
            // A panicking task must not take the worker down with it.
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task));
            continue;
        }

        let guard = shared.cv_mutex.lock().unwrap();
        let _guard = shared
            .cv
            .wait_while(guard, |_| {
                !shared.stop.load(Ordering::Relaxed) && shared.pending.load(Ordering::Acquire) == 0
            })
            .unwrap();

        if shared.stop.load(Ordering::Relaxed) && shared.pending.load(Ordering::Acquire) == 0 {
            return;
        }
    }
}
