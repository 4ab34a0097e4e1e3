//! A single-lock double-ended task queue.
//!
//! The owning worker treats it as a LIFO stack (`push`/`pop` both touch the back, so the owner
//! gets cache locality on the task it just queued); thieves treat it as a FIFO (`steal` takes from
//! the front, so they grab the oldest task rather than racing the owner on the hot end).
//! Concurrency is deliberately unambitious: one mutex per queue, rather than a lock-free deque —
//! correctness is trivial and there are many queues, so contention stays local to one worker at a
//! time.

use std::collections::VecDeque;
use std::sync::Mutex;

/// A unit of work submitted to the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A work-stealing queue: owner `push`/`pop` at the back, thief `steal` from the front.
#[derive(Default)]
pub struct WorkStealingQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl WorkStealingQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a task onto the back of the queue.
    pub fn push(&self, task: Task) {
        self.tasks.lock().unwrap().push_back(task);
    }

    /// Pops a task from the back of the queue — the owner's LIFO end.
    pub fn pop(&self) -> Option<Task> {
        self.tasks.lock().unwrap().pop_back()
    }

    /// Steals a task from the front of the queue — the thief's FIFO end.
    pub fn steal(&self) -> Option<Task> {
        self.tasks.lock().unwrap().pop_front()
    }

    /// The number of tasks currently queued.
    pub fn size(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }
}

impl std::fmt::Debug for WorkStealingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkStealingQueue")
            .field("size", &self.size())
            .finish()
    }
}
