//! The work-stealing thread pool that backs pool mode.

pub mod queue;
pub mod thread_pool;

pub use queue::WorkStealingQueue;
pub use thread_pool::{PoolStopped, ThreadPool};
