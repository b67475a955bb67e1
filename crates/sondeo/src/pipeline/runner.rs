use std::path::Path;
use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::process::Placeholders;
use crate::stage::{AnalysisCoordinator, CollectorRegistry, ExtractionCoordinator, PhaseRunner};
use crate::task::{AnalysisTask, CollectionTask, OutcomeSet};

use super::config::PipelineConfig;
use super::context::{RunState, Stage};
use super::error::PipelineError;
use super::progress::{ProgressReporter, RunEvent};

/// What the caller asks a run to do.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub topics: Vec<String>,
    /// Falls back to the configured items per topic.
    pub items_per_topic: Option<u32>,
}

impl RunRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topics: vec![topic.into()],
            items_per_topic: None,
        }
    }

    /// Splits a comma separated topic list, dropping empty entries.
    pub fn from_topic_list(list: &str) -> Self {
        Self {
            topics: split_topics(list),
            items_per_topic: None,
        }
    }

    pub fn with_items(mut self, items: u32) -> Self {
        self.items_per_topic = Some(items);
        self
    }
}

pub fn split_topics(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sequences extraction, preprocessing and analysis for one topic.
pub struct PipelineOrchestrator {
    config: Arc<PipelineConfig>,
    extraction: ExtractionCoordinator,
    preprocessing: PhaseRunner,
    analysis: AnalysisCoordinator,
}

impl PipelineOrchestrator {
    pub fn new(config: Arc<PipelineConfig>, registry: Arc<CollectorRegistry>) -> Self {
        let preprocessing = PhaseRunner::new(&config.workdir);
        let analysis = AnalysisCoordinator::new(&config.workdir);
        Self {
            config,
            extraction: ExtractionCoordinator::new(registry),
            preprocessing,
            analysis,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the whole pipeline and returns its terminal state. Never panics
    /// or errors out: every failure ends as a `FAILED` state.
    pub async fn run(&self, request: RunRequest, progress: &dyn ProgressReporter) -> RunState {
        let topics: Vec<String> = request
            .topics
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let items = request
            .items_per_topic
            .filter(|n| *n > 0)
            .unwrap_or(self.config.default_items_per_topic);
        let mut state = RunState::new(topics, items);

        progress.report(RunEvent::Started {
            run_id: state.run_id.clone(),
            topics: state.topics.clone(),
            items_per_topic: state.items_per_topic,
        });

        let span = info_span!("pipeline", run_id = %state.run_id, topic = %state.topic);
        async {
            if let Err(e) = self.run_stages(&mut state, progress).await {
                self.fail(&mut state, e.to_string(), progress);
            }
        }
        .instrument(span)
        .await;

        info!("Run finished: {}", state.stage);
        progress.report(RunEvent::Completed {
            summary: state.summary(),
        });
        state
    }

    async fn run_stages(
        &self,
        state: &mut RunState,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        // INIT
        if state.topics.is_empty() {
            return Err(PipelineError::EmptyTopic);
        }
        if self.config.sources.is_empty() {
            return Err(PipelineError::NoSources);
        }
        let layout = &self.config.layout;
        for dir in [&layout.raw_dir, &layout.clean_dir, &layout.results_dir] {
            ensure_dir(dir)?;
        }
        let collection_tasks: Vec<CollectionTask> = self
            .config
            .enabled_sources()
            .map(|source| CollectionTask {
                source,
                topics: state.topics.clone(),
                item_target: state.items_per_topic,
                output_path: layout.raw_csv(source),
            })
            .collect();

        // EXTRACTING
        self.enter(state, Stage::Extracting, progress)?;
        let outcomes = self
            .extraction
            .run(
                collection_tasks,
                self.config.extraction_workers,
                self.config.extraction_timeout,
                progress,
            )
            .instrument(info_span!("stage", stage = "extraction"))
            .await;
        finish_stage(Stage::Extracting, &outcomes, progress);
        state.extraction = outcomes;

        let succeeded = state.extraction.success_count();
        if succeeded < self.config.min_successful_sources {
            let message = format!(
                "only {} of {} sources collected data, {} required",
                succeeded,
                state.extraction.len(),
                self.config.min_successful_sources
            );
            self.fail(state, message, progress);
            return Ok(());
        }
        if state.extraction.failure_count() > 0 {
            warn!(
                "Continuing with {} of {} sources",
                succeeded,
                state.extraction.len()
            );
        }

        // PREPROCESSING
        self.enter(state, Stage::Preprocessing, progress)?;
        let vars = Placeholders::new()
            .with("input", layout.raw_dir.display().to_string())
            .with("output", layout.clean_dir.display().to_string())
            .with("topic", state.topic.clone());
        let (outcome, report) = self
            .preprocessing
            .run_captured(
                &self.config.preprocessing,
                &vars,
                self.config.preprocessing_timeout,
            )
            .instrument(info_span!("stage", stage = "preprocessing"))
            .await;
        progress.report(RunEvent::TaskFinished {
            stage: Stage::Preprocessing,
            source: None,
            outcome: outcome.clone(),
            output: report.stdout,
        });
        state.preprocessing = Some(outcome.clone());

        if let Some(reason) = outcome.reason() {
            warn!("Preprocessing failed, skipping analysis");
            self.fail(state, format!("Preprocessing failed: {}", reason), progress);
            return Ok(());
        }
        finish_preprocessing(progress);

        // ANALYZING
        self.enter(state, Stage::Analyzing, progress)?;
        let analysis_tasks: Vec<AnalysisTask> = self
            .config
            .sources
            .iter()
            .map(|plan| AnalysisTask {
                source: plan.source,
                analyzer: plan.analyzer.clone(),
                input_path: layout.clean_csv(plan.source),
                topic: state.topic.clone(),
            })
            .collect();
        let outcomes = self
            .analysis
            .run(
                analysis_tasks,
                self.config.analysis_workers,
                self.config.analysis_timeout,
                progress,
            )
            .instrument(info_span!("stage", stage = "analysis"))
            .await;
        finish_stage(Stage::Analyzing, &outcomes, progress);
        state.analysis = outcomes;

        // DONE, regardless of individual analysis failures
        state.transition(Stage::Done)?;
        Ok(())
    }

    fn enter(
        &self,
        state: &mut RunState,
        stage: Stage,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        state.transition(stage)?;
        info!("{} started", stage.label());
        progress.report(RunEvent::StageStarted { stage });
        Ok(())
    }

    fn fail(&self, state: &mut RunState, error: String, progress: &dyn ProgressReporter) {
        let stage = state.stage;
        warn!("Run failed during {}: {}", stage.label(), error);
        state.fail(error.clone());
        progress.report(RunEvent::Failed { stage, error });
    }
}

fn ensure_dir(dir: &Path) -> Result<(), PipelineError> {
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::Directory {
        path: dir.to_path_buf(),
        source: e,
    })
}

fn finish_stage(stage: Stage, outcomes: &OutcomeSet, progress: &dyn ProgressReporter) {
    info!(
        "{} finished: {} succeeded, {} failed",
        stage.label(),
        outcomes.success_count(),
        outcomes.failure_count()
    );
    progress.report(RunEvent::StageFinished {
        stage,
        successes: outcomes.success_count(),
        failures: outcomes.failure_count(),
    });
}

fn finish_preprocessing(progress: &dyn ProgressReporter) {
    progress.report(RunEvent::StageFinished {
        stage: Stage::Preprocessing,
        successes: 1,
        failures: 0,
    });
}
