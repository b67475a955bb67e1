pub mod job;
pub mod pool;

pub use job::{Job, JobResult, TaskContext, TaskHandler, TaskReport};
pub use pool::WorkerPool;
