use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::TaskError;
use crate::pipeline::progress::{ProgressReporter, RunEvent};
use crate::pipeline::Stage;
use crate::process::{run_script, ScriptCommand};
use crate::source::Source;
use crate::task::{CollectionTask, OutcomeSet};
use crate::worker::{Job, TaskContext, TaskHandler, TaskReport, WorkerPool};

use super::{dedup_by_source, fold_results};

/// Gathers raw records for one platform into the task's output path.
#[async_trait]
pub trait SourceCollector: Send + Sync {
    fn source(&self) -> Source;

    async fn collect(
        &self,
        task: &CollectionTask,
        ctx: &TaskContext,
    ) -> Result<TaskReport, TaskError>;
}

/// Collector backed by an external script run in its own process.
pub struct ScriptCollector {
    source: Source,
    command: ScriptCommand,
    workdir: PathBuf,
}

impl ScriptCollector {
    pub fn new(source: Source, command: ScriptCommand, workdir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            command,
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl SourceCollector for ScriptCollector {
    fn source(&self) -> Source {
        self.source
    }

    async fn collect(
        &self,
        task: &CollectionTask,
        ctx: &TaskContext,
    ) -> Result<TaskReport, TaskError> {
        if let Some(parent) = task.output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TaskError::Other(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        // A file left by an earlier run must not pass for this run's output.
        if task.output_path.is_file() {
            tokio::fs::remove_file(&task.output_path)
                .await
                .map_err(|e| TaskError::Other(format!("cannot remove stale {}: {}", task.output_path.display(), e)))?;
        }

        let output = run_script(
            &self.command,
            &self.workdir,
            &task.placeholders(),
            Some(ctx.timeout),
        )
        .await?;

        if !task.output_path.is_file() {
            return Err(TaskError::NoOutput(task.output_path.clone()));
        }

        Ok(TaskReport {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Explicit mapping from platform to the collector that serves it.
#[derive(Default, Clone)]
pub struct CollectorRegistry {
    collectors: HashMap<Source, Arc<dyn SourceCollector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `ScriptCollector` per configured source, enabled or not.
    pub fn from_config(config: &Config) -> Self {
        let workdir = config.workspace_path();
        let mut registry = Self::new();
        for source in &config.sources {
            registry.register(Arc::new(ScriptCollector::new(
                source.name,
                source.collector_command(),
                workdir.clone(),
            )));
        }
        registry
    }

    /// Registers `collector`, replacing any earlier one for its source.
    pub fn register(&mut self, collector: Arc<dyn SourceCollector>) {
        self.collectors.insert(collector.source(), collector);
    }

    pub fn get(&self, source: Source) -> Option<Arc<dyn SourceCollector>> {
        self.collectors.get(&source).cloned()
    }

    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<_> = self.collectors.keys().copied().collect();
        sources.sort();
        sources
    }
}

struct CollectJob {
    collector: Option<Arc<dyn SourceCollector>>,
    task: CollectionTask,
}

#[async_trait]
impl TaskHandler for CollectJob {
    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let collector = self
            .collector
            .as_ref()
            .ok_or_else(|| TaskError::NoCollector(self.task.source.file_stem().to_string()))?;
        debug!(
            "Collecting {} items per topic for {:?}",
            self.task.item_target, self.task.topics
        );
        collector.collect(&self.task, ctx).await
    }
}

/// Runs every collector concurrently, each in its own process.
pub struct ExtractionCoordinator {
    registry: Arc<CollectorRegistry>,
}

impl ExtractionCoordinator {
    pub fn new(registry: Arc<CollectorRegistry>) -> Self {
        Self { registry }
    }

    pub async fn run(
        &self,
        tasks: Vec<CollectionTask>,
        max_workers: usize,
        per_task_timeout: Duration,
        progress: &dyn ProgressReporter,
    ) -> OutcomeSet {
        let tasks = dedup_by_source(tasks, |t| t.source);
        info!("Extraction: {} collectors", tasks.len());

        let jobs: Vec<Job> = tasks
            .into_iter()
            .map(|task| {
                let source = task.source;
                let collector = self.registry.get(source);
                Job::new(source, Box::new(CollectJob { collector, task }))
            })
            .collect();

        let pool = WorkerPool::new(max_workers, per_task_timeout);
        let results = pool
            .run_with(jobs, |result| {
                if result.outcome.is_success() {
                    info!("{}: extraction succeeded", result.source);
                } else {
                    warn!("{}: extraction {}", result.source, result.outcome);
                }
                progress.report(RunEvent::TaskFinished {
                    stage: Stage::Extracting,
                    source: Some(result.source),
                    outcome: result.outcome.clone(),
                    output: result.report.stdout.clone(),
                });
            })
            .await;

        fold_results(results)
    }
}
