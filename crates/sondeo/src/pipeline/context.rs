use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::Source;
use crate::task::{OutcomeSet, TaskOutcome};

use super::error::PipelineError;

/// Position of a run in `INIT -> EXTRACTING -> PREPROCESSING -> ANALYZING ->
/// DONE`, with `FAILED` reachable from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Extracting,
    Preprocessing,
    Analyzing,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Init => "INIT",
            Stage::Extracting => "EXTRACTING",
            Stage::Preprocessing => "PREPROCESSING",
            Stage::Analyzing => "ANALYZING",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Init => "Initialization",
            Stage::Extracting => "Extraction",
            Stage::Preprocessing => "Preprocessing",
            Stage::Analyzing => "Analysis",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    fn next(&self) -> Option<Stage> {
        match self {
            Stage::Init => Some(Stage::Extracting),
            Stage::Extracting => Some(Stage::Preprocessing),
            Stage::Preprocessing => Some(Stage::Analyzing),
            Stage::Analyzing => Some(Stage::Done),
            Stage::Done | Stage::Failed => None,
        }
    }

    pub fn can_transition_to(&self, to: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Stage::Failed || self.next() == Some(to)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one pipeline run, owned by the orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub run_id: String,
    pub topic: String,
    pub topics: Vec<String>,
    pub items_per_topic: u32,
    pub stage: Stage,
    /// Stages that ran to completion, 0..=3.
    pub completed_stages: u8,
    pub extraction: OutcomeSet,
    pub preprocessing: Option<TaskOutcome>,
    pub analysis: OutcomeSet,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl RunState {
    /// The first topic is the one handed to interpreters.
    pub fn new(topics: Vec<String>, items_per_topic: u32) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            topic: topics.first().cloned().unwrap_or_default(),
            topics,
            items_per_topic,
            stage: Stage::Init,
            completed_stages: 0,
            extraction: OutcomeSet::new(),
            preprocessing: None,
            analysis: OutcomeSet::new(),
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    pub fn transition(&mut self, to: Stage) -> Result<(), PipelineError> {
        if !self.stage.can_transition_to(to) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        if to != Stage::Failed && self.stage != Stage::Init {
            self.completed_stages += 1;
        }
        self.stage = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Moves to `FAILED` with `error`. No-op once the run is terminal.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.stage.is_terminal() {
            return;
        }
        self.error = Some(error.into());
        self.stage = Stage::Failed;
        self.finished_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    pub fn progress_percent(&self) -> u8 {
        (u32::from(self.completed_stages.min(3)) * 100 / 3) as u8
    }

    pub fn elapsed_secs(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as f64 / 1000.0
    }

    pub fn summary(&self) -> RunSummary {
        let mut successes = Vec::new();
        let mut failures = Vec::new();

        let mut push = |stage: Stage, source: Option<Source>, outcome: &TaskOutcome| {
            match outcome.reason() {
                None => successes.push(TaskEntry { stage, source }),
                Some(reason) => failures.push(FailureEntry {
                    stage,
                    source,
                    reason,
                }),
            }
        };
        for (source, outcome) in self.extraction.iter() {
            push(Stage::Extracting, Some(source), outcome);
        }
        if let Some(outcome) = &self.preprocessing {
            push(Stage::Preprocessing, None, outcome);
        }
        for (source, outcome) in self.analysis.iter() {
            push(Stage::Analyzing, Some(source), outcome);
        }

        let elapsed_secs = self.elapsed_secs();
        RunSummary {
            run_id: self.run_id.clone(),
            topic: self.topic.clone(),
            final_stage: self.stage,
            successes,
            failures,
            error: self.error.clone(),
            elapsed_secs,
            elapsed_minutes: elapsed_secs / 60.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

impl fmt::Display for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(source) => write!(f, "{} {}", self.stage.label(), source),
            None => f.write_str(self.stage.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub reason: String,
}

/// What a finished run reports: successes, failures and elapsed time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub topic: String,
    pub final_stage: Stage,
    pub successes: Vec<TaskEntry>,
    pub failures: Vec<FailureEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_secs: f64,
    pub elapsed_minutes: f64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} for '{}': {}", self.run_id, self.topic, self.final_stage)?;
        writeln!(f, "Successful tasks: {}", self.successes.len())?;
        for entry in &self.successes {
            writeln!(f, "  + {}", entry)?;
        }
        writeln!(f, "Failed tasks: {}", self.failures.len())?;
        for failure in &self.failures {
            let entry = TaskEntry {
                stage: failure.stage,
                source: failure.source,
            };
            writeln!(f, "  - {}: {}", entry, failure.reason)?;
        }
        if let Some(error) = &self.error {
            writeln!(f, "Error: {}", error)?;
        }
        write!(
            f,
            "Elapsed: {:.1}s ({:.2} min)",
            self.elapsed_secs, self.elapsed_minutes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> RunState {
        RunState::new(vec!["ram".to_string(), "gpu".to_string()], 20)
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = state();
        assert_eq!(state.topic, "ram");
        assert_eq!(state.progress_percent(), 0);

        state.transition(Stage::Extracting).unwrap();
        assert_eq!(state.progress_percent(), 0);
        state.transition(Stage::Preprocessing).unwrap();
        assert_eq!(state.progress_percent(), 33);
        state.transition(Stage::Analyzing).unwrap();
        assert_eq!(state.progress_percent(), 66);
        state.transition(Stage::Done).unwrap();
        assert_eq!(state.progress_percent(), 100);
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn test_skipping_a_stage_is_rejected() {
        let mut state = state();
        state.transition(Stage::Extracting).unwrap();
        let err = state.transition(Stage::Analyzing).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTransition { .. }));
        assert_eq!(state.stage, Stage::Extracting);
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut state = state();
        state.transition(Stage::Extracting).unwrap();
        state.fail("preprocessing exploded");
        assert_eq!(state.stage, Stage::Failed);

        state.fail("second error");
        assert_eq!(state.error.as_deref(), Some("preprocessing exploded"));
        assert!(state.transition(Stage::Preprocessing).is_err());
        assert!(state.transition(Stage::Failed).is_err());
    }

    #[test]
    fn test_summary_lists_failures_with_reasons() {
        let mut state = state();
        state.extraction.record(Source::Reddit, TaskOutcome::Success);
        state
            .extraction
            .record(Source::Twitter, TaskOutcome::failed("login wall"));
        state.preprocessing = Some(TaskOutcome::Success);
        state.analysis.record(Source::Reddit, TaskOutcome::Success);

        let summary = state.summary();
        assert_eq!(summary.successes.len(), 3);
        assert_eq!(
            summary.failures,
            vec![FailureEntry {
                stage: Stage::Extracting,
                source: Some(Source::Twitter),
                reason: "login wall".to_string(),
            }]
        );
        let text = summary.to_string();
        assert!(text.contains("Extraction Twitter/X: login wall"));
        assert!(text.contains("+ Preprocessing"));
    }

    #[test]
    fn test_stage_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Stage::Preprocessing).unwrap(), "\"PREPROCESSING\"");
    }
}
