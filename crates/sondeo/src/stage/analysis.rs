use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::TaskError;
use crate::pipeline::progress::{ProgressReporter, RunEvent};
use crate::pipeline::Stage;
use crate::process::run_script;
use crate::task::{AnalysisTask, OutcomeSet};
use crate::worker::{Job, JobResult, TaskContext, TaskHandler, TaskReport, WorkerPool};

use super::{dedup_by_source, fold_results};

struct AnalyzeJob {
    task: AnalysisTask,
    workdir: PathBuf,
}

#[async_trait]
impl TaskHandler for AnalyzeJob {
    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let output = run_script(
            &self.task.analyzer,
            &self.workdir,
            &self.task.placeholders(),
            Some(ctx.timeout),
        )
        .await?;
        debug!(stdout = %output.stdout.trim(), "interpreter output");
        Ok(TaskReport {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Runs one interpreter per source against its cleaned CSV.
pub struct AnalysisCoordinator {
    workdir: PathBuf,
}

impl AnalysisCoordinator {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Tasks whose script or input file is missing fail immediately without
    /// launching anything; the rest run concurrently with independent
    /// timeouts.
    pub async fn run(
        &self,
        tasks: Vec<AnalysisTask>,
        max_workers: usize,
        per_task_timeout: Duration,
        progress: &dyn ProgressReporter,
    ) -> OutcomeSet {
        let tasks = dedup_by_source(tasks, |t| t.source);
        info!("Analysis: {} interpreters", tasks.len());

        let mut rejected = Vec::new();
        let mut jobs = Vec::new();
        for task in tasks {
            match self.check_preconditions(&task) {
                Ok(()) => jobs.push(Job::new(
                    task.source,
                    Box::new(AnalyzeJob {
                        task,
                        workdir: self.workdir.clone(),
                    }),
                )),
                Err(e) => {
                    warn!("{}: skipping analysis: {}", task.source, e);
                    let job_id = uuid::Uuid::new_v4().to_string();
                    rejected.push(JobResult::failure(&job_id, task.source, e.to_string(), Utc::now()));
                }
            }
        }

        let report = |result: &JobResult| {
            if result.outcome.is_success() {
                info!("{}: analysis succeeded", result.source);
            } else {
                warn!("{}: analysis {}", result.source, result.outcome);
            }
            progress.report(RunEvent::TaskFinished {
                stage: Stage::Analyzing,
                source: Some(result.source),
                outcome: result.outcome.clone(),
                output: result.report.stdout.clone(),
            });
        };

        for result in &rejected {
            report(result);
        }

        let pool = WorkerPool::new(max_workers, per_task_timeout);
        let mut results = pool.run_with(jobs, &report).await;
        results.extend(rejected);

        fold_results(results)
    }

    fn check_preconditions(&self, task: &AnalysisTask) -> Result<(), TaskError> {
        task.analyzer.ensure_exists(&self.workdir)?;
        if !task.input_path.is_file() {
            return Err(TaskError::InputMissing(task.input_path.clone()));
        }
        Ok(())
    }
}
