use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TaskError;
use crate::source::Source;
use crate::task::TaskOutcome;

/// What a handler sees of the job it is running.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub job_id: String,
    pub source: Source,
    /// Budget for the whole task, counted from when it got a worker slot.
    pub timeout: Duration,
}

/// Diagnostics a successful handler hands back. Never treated as the task's
/// result; the files it wrote are.
#[derive(Debug, Clone, Default)]
pub struct TaskReport {
    pub stdout: String,
    pub stderr: String,
}

/// A unit of work the pool can run.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError>;
}

pub struct Job {
    pub id: String,
    pub source: Source,
    pub handler: Box<dyn TaskHandler>,
}

impl Job {
    pub fn new(source: Source, handler: Box<dyn TaskHandler>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source,
            handler,
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub source: Source,
    pub outcome: TaskOutcome,
    pub report: TaskReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    pub fn success(job_id: &str, source: Source, report: TaskReport, started_at: DateTime<Utc>) -> Self {
        Self::finish(job_id, source, TaskOutcome::Success, report, started_at)
    }

    pub fn failure(job_id: &str, source: Source, reason: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self::finish(
            job_id,
            source,
            TaskOutcome::failed(reason),
            TaskReport::default(),
            started_at,
        )
    }

    pub fn timed_out(job_id: &str, source: Source, elapsed: Duration, started_at: DateTime<Utc>) -> Self {
        Self::finish(
            job_id,
            source,
            TaskOutcome::timed_out(elapsed),
            TaskReport::default(),
            started_at,
        )
    }

    fn finish(
        job_id: &str,
        source: Source,
        outcome: TaskOutcome,
        report: TaskReport,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            source,
            outcome,
            report,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
