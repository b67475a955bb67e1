//! At most one pipeline run at a time, observable while it progresses.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::broadcast::{LogBroadcaster, LogEntry, RunLog};
use crate::error::SupervisorError;
use crate::pipeline::{
    BroadcastProgress, FanoutProgress, PipelineOrchestrator, ProgressReporter, RunEvent,
    RunRequest, RunState, RunSummary, Stage,
};
use crate::task::{OutcomeSet, TaskOutcome};

/// Point-in-time view of the current (or last) run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub run_id: Option<String>,
    pub topic: Option<String>,
    pub stage: Stage,
    pub stage_label: &'static str,
    pub running: bool,
    pub completed: bool,
    pub progress_percent: u8,
    pub extraction: OutcomeSet,
    pub preprocessing: Option<TaskOutcome>,
    pub analysis: OutcomeSet,
    pub error: Option<String>,
    pub summary: Option<RunSummary>,
    #[serde(skip)]
    completed_stages: u8,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            run_id: None,
            topic: None,
            stage: Stage::Init,
            stage_label: Stage::Init.label(),
            running: false,
            completed: false,
            progress_percent: 0,
            extraction: OutcomeSet::new(),
            preprocessing: None,
            analysis: OutcomeSet::new(),
            error: None,
            summary: None,
            completed_stages: 0,
        }
    }
}

impl RunStatus {
    fn starting(topic: &str) -> Self {
        Self {
            topic: Some(topic.to_string()),
            running: true,
            ..Self::default()
        }
    }

    fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
        self.stage_label = stage.label();
        self.completed = stage == Stage::Done;
    }

    fn apply(&mut self, event: &RunEvent) {
        match event {
            RunEvent::Started { run_id, topics, .. } => {
                self.run_id = Some(run_id.clone());
                self.topic = topics.first().cloned().or(self.topic.take());
            }
            RunEvent::StageStarted { stage } => {
                if *stage != Stage::Extracting {
                    self.completed_stages += 1;
                }
                self.set_stage(*stage);
            }
            RunEvent::TaskFinished {
                stage,
                source,
                outcome,
                ..
            } => match (stage, source) {
                (Stage::Extracting, Some(source)) => {
                    self.extraction.record(*source, outcome.clone());
                }
                (Stage::Analyzing, Some(source)) => {
                    self.analysis.record(*source, outcome.clone());
                }
                (Stage::Preprocessing, None) => self.preprocessing = Some(outcome.clone()),
                _ => {}
            },
            RunEvent::StageFinished { .. } => {}
            RunEvent::Failed { error, .. } => {
                self.error = Some(error.clone());
                self.set_stage(Stage::Failed);
            }
            RunEvent::Completed { summary } => {
                if summary.final_stage == Stage::Done {
                    self.completed_stages = 3;
                }
                self.set_stage(summary.final_stage);
                self.error = summary.error.clone();
                self.summary = Some(summary.clone());
                self.running = false;
            }
        }
        self.progress_percent = (u32::from(self.completed_stages.min(3)) * 100 / 3) as u8;
    }
}

type SharedStatus = Arc<RwLock<RunStatus>>;

fn write(status: &SharedStatus) -> RwLockWriteGuard<'_, RunStatus> {
    match status.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn read(status: &SharedStatus) -> RwLockReadGuard<'_, RunStatus> {
    match status.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Mirrors run events into the shared status.
struct StatusReporter {
    status: SharedStatus,
}

impl ProgressReporter for StatusReporter {
    fn report(&self, event: RunEvent) {
        write(&self.status).apply(&event);
    }
}

/// Clears the running flag even if the run task dies early.
struct RunningGuard(SharedStatus);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut status = write(&self.0);
        if status.running {
            warn!("Run ended without a completion event");
            status.running = false;
            if !status.stage.is_terminal() {
                status.error = Some("run aborted".to_string());
                status.set_stage(Stage::Failed);
            }
        }
    }
}

/// Owns the orchestrator and rejects overlapping runs.
pub struct RunSupervisor {
    orchestrator: Arc<PipelineOrchestrator>,
    broadcaster: LogBroadcaster,
    log: Arc<RunLog>,
    status: SharedStatus,
}

impl RunSupervisor {
    /// Must be called inside a tokio runtime: the run log starts following
    /// `broadcaster` immediately.
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, broadcaster: LogBroadcaster) -> Self {
        let log = Arc::new(RunLog::default());
        // Detached: lives as long as the broadcaster has senders.
        drop(log.follow(&broadcaster));
        Self {
            orchestrator,
            broadcaster,
            log,
            status: Arc::new(RwLock::new(RunStatus::default())),
        }
    }

    pub fn broadcaster(&self) -> &LogBroadcaster {
        &self.broadcaster
    }

    /// Starts a run in the background and returns the analysis topic.
    pub fn start(&self, request: RunRequest) -> Result<(String, JoinHandle<RunState>), SupervisorError> {
        let topic = request
            .topics
            .iter()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(SupervisorError::EmptyTopic)?;

        {
            let mut status = write(&self.status);
            if status.running {
                return Err(SupervisorError::AlreadyRunning {
                    topic: status.topic.clone().unwrap_or_default(),
                });
            }
            *status = RunStatus::starting(&topic);
        }
        self.log.clear();
        info!("Starting run for '{}'", topic);

        let orchestrator = Arc::clone(&self.orchestrator);
        let broadcast = BroadcastProgress::new(self.broadcaster.clone());
        let status = Arc::clone(&self.status);
        let handle = tokio::spawn(async move {
            let _guard = RunningGuard(Arc::clone(&status));
            let reporter = StatusReporter { status };
            let reporters: Vec<&dyn ProgressReporter> = vec![&reporter, &broadcast];
            let progress = FanoutProgress::new(reporters);
            orchestrator.run(request, &progress).await
        });

        Ok((topic, handle))
    }

    pub fn status(&self) -> RunStatus {
        read(&self.status).clone()
    }

    pub fn is_running(&self) -> bool {
        read(&self.status).running
    }

    pub fn is_done(&self) -> bool {
        read(&self.status).completed
    }

    pub fn logs_since(&self, cursor: u64) -> Vec<LogEntry> {
        self.log.since(cursor)
    }
}
