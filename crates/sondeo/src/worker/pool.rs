use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use log::{debug, error, info};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;

use crate::error::TaskError;
use crate::source::Source;
use crate::worker::job::{Job, JobResult, TaskContext};

/// Extra time the pool waits past a task's timeout before abandoning it, so
/// handlers that enforce the timeout themselves get to kill and reap their
/// child and drain its output first.
const KILL_GRACE: Duration = Duration::from_secs(crate::process::DRAIN_GRACE.as_secs() + 1);

/// Runs jobs concurrently on at most `worker_count` slots, each under its own
/// timeout.
pub struct WorkerPool {
    worker_count: usize,
    task_timeout: Duration,
}

impl WorkerPool {
    pub fn new(worker_count: usize, task_timeout: Duration) -> Self {
        Self {
            worker_count: worker_count.max(1),
            task_timeout,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    pub async fn run(&self, jobs: Vec<Job>) -> Vec<JobResult> {
        self.run_with(jobs, |_| {}).await
    }

    /// Runs every job to a terminal result, calling `on_result` as each one
    /// finishes. Exactly one result is returned per submitted job.
    pub async fn run_with<F>(&self, jobs: Vec<Job>, mut on_result: F) -> Vec<JobResult>
    where
        F: FnMut(&JobResult),
    {
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut set = JoinSet::new();
        let mut pending: HashMap<String, Source> = HashMap::with_capacity(jobs.len());

        info!(
            "Starting {} jobs on {} workers (timeout {:?})",
            jobs.len(),
            self.worker_count,
            self.task_timeout
        );

        for job in jobs {
            pending.insert(job.id.clone(), job.source);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.task_timeout;

            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return JobResult::failure(
                            &job.id,
                            job.source,
                            "worker pool closed before the task started",
                            Utc::now(),
                        )
                    }
                };
                execute(job, timeout).await
            });
        }

        let mut results = Vec::with_capacity(pending.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(result) => {
                    pending.remove(&result.job_id);
                    debug!("Job {} ({}) finished: {}", result.job_id, result.source, result.outcome);
                    on_result(&result);
                    results.push(result);
                }
                Err(e) => error!("Worker task aborted: {}", e),
            }
        }

        for (job_id, source) in pending {
            let result = JobResult::failure(&job_id, source, "worker task aborted", Utc::now());
            on_result(&result);
            results.push(result);
        }

        info!("All {} jobs finished", results.len());
        results
    }
}

async fn execute(job: Job, timeout: Duration) -> JobResult {
    let started_at = Utc::now();
    let started = Instant::now();
    let ctx = TaskContext {
        job_id: job.id.clone(),
        source: job.source,
        timeout,
    };
    let span = tracing::info_span!("task", source = %job.source, job_id = %job.id);

    let guarded = AssertUnwindSafe(job.handler.run(&ctx)).catch_unwind();
    let result = tokio::time::timeout(timeout + KILL_GRACE, guarded)
        .instrument(span)
        .await;

    match result {
        Ok(Ok(Ok(report))) => JobResult::success(&job.id, job.source, report, started_at),
        Ok(Ok(Err(e))) => match e.timeout_elapsed() {
            Some(elapsed) => JobResult::timed_out(&job.id, job.source, elapsed, started_at),
            None => JobResult::failure(&job.id, job.source, e.to_string(), started_at),
        },
        Ok(Err(panic)) => {
            let e = TaskError::Panicked(panic_message(panic));
            error!("Job {} ({}) {}", job.id, job.source, e);
            JobResult::failure(&job.id, job.source, e.to_string(), started_at)
        }
        // Dropping the handler future drops any child it owns, and children
        // are spawned with kill_on_drop.
        Err(_) => JobResult::timed_out(&job.id, job.source, started.elapsed(), started_at),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::task::TaskOutcome;
    use crate::worker::job::{TaskHandler, TaskReport};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Succeed,
        Fail(&'static str),
        Panic,
        Sleep(Duration),
        ReportTimeout,
    }

    struct Fake(Behavior);

    #[async_trait]
    impl TaskHandler for Fake {
        async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
            match &self.0 {
                Behavior::Succeed => Ok(TaskReport {
                    stdout: "ok".to_string(),
                    stderr: String::new(),
                }),
                Behavior::Fail(msg) => Err(TaskError::Other(msg.to_string())),
                Behavior::Panic => panic!("collector exploded"),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(TaskReport::default())
                }
                Behavior::ReportTimeout => Err(TaskError::Process(ProcessError::TimedOut {
                    program: "fake".to_string(),
                    elapsed: ctx.timeout,
                })),
            }
        }
    }

    fn job(source: Source, behavior: Behavior) -> Job {
        Job::new(source, Box::new(Fake(behavior)))
    }

    fn outcome_for(results: &[JobResult], source: Source) -> &TaskOutcome {
        &results.iter().find(|r| r.source == source).unwrap().outcome
    }

    #[tokio::test]
    async fn test_every_job_yields_one_result() {
        let pool = WorkerPool::new(2, Duration::from_secs(5));
        let results = pool
            .run(vec![
                job(Source::LinkedIn, Behavior::Succeed),
                job(Source::Twitter, Behavior::Fail("no data")),
                job(Source::Facebook, Behavior::Panic),
                job(Source::Reddit, Behavior::Succeed),
            ])
            .await;

        assert_eq!(results.len(), 4);
        assert!(outcome_for(&results, Source::LinkedIn).is_success());
        assert!(outcome_for(&results, Source::Reddit).is_success());
        assert_eq!(
            outcome_for(&results, Source::Twitter).reason().as_deref(),
            Some("no data")
        );
        let panic_reason = outcome_for(&results, Source::Facebook).reason().unwrap();
        assert!(panic_reason.contains("collector exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_job_times_out_without_blocking_siblings() {
        let pool = WorkerPool::new(4, Duration::from_secs(2));
        let results = pool
            .run(vec![
                job(Source::LinkedIn, Behavior::Sleep(Duration::from_secs(3600))),
                job(Source::Reddit, Behavior::Sleep(Duration::from_millis(10))),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(outcome_for(&results, Source::Reddit).is_success());
        match outcome_for(&results, Source::LinkedIn) {
            TaskOutcome::TimedOut { elapsed } => {
                assert!(*elapsed >= Duration::from_secs(2));
                assert!(*elapsed <= Duration::from_secs(2) + KILL_GRACE + Duration::from_millis(100));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_handler_timeout_maps_to_timed_out() {
        let pool = WorkerPool::new(1, Duration::from_secs(7));
        let results = pool.run(vec![job(Source::Twitter, Behavior::ReportTimeout)]).await;
        assert_eq!(
            results[0].outcome,
            TaskOutcome::timed_out(Duration::from_secs(7))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded_and_timeout_starts_at_slot() {
        // Two slots, three two-second jobs: the third waits for a slot, and
        // its budget only starts once it has one.
        let pool = WorkerPool::new(2, Duration::from_millis(2500));
        let started = tokio::time::Instant::now();
        let results = pool
            .run(vec![
                job(Source::LinkedIn, Behavior::Sleep(Duration::from_secs(2))),
                job(Source::Twitter, Behavior::Sleep(Duration::from_secs(2))),
                job(Source::Reddit, Behavior::Sleep(Duration::from_secs(2))),
            ])
            .await;

        assert!(results.iter().all(|r| r.outcome.is_success()));
        assert!(started.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_on_result_called_per_job() {
        let pool = WorkerPool::new(3, Duration::from_secs(5));
        let seen = AtomicUsize::new(0);
        let results = pool
            .run_with(
                vec![
                    job(Source::LinkedIn, Behavior::Succeed),
                    job(Source::Reddit, Behavior::Fail("x")),
                ],
                |_| {
                    seen.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_job_list() {
        let pool = WorkerPool::new(0, Duration::from_secs(1));
        assert_eq!(pool.worker_count(), 1);
        assert!(pool.run(Vec::new()).await.is_empty());
    }
}
