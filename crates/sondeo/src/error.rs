use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SondeoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Results error: {0}")]
    Results(#[from] ResultsError),

    #[error("LLM error: {0}")]
    Llm(#[from] crate::llm::LlmError),

    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid source '{name}': {reason}")]
    InvalidSource { name: String, reason: String },

    #[error("Invalid environment override {var}='{value}': {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting on '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {code}: {stderr}")]
    NonZeroExit {
        program: String,
        code: String,
        stderr: String,
    },

    #[error("'{program}' timed out after {:.1}s", elapsed.as_secs_f64())]
    TimedOut { program: String, elapsed: Duration },
}

/// Failure raised inside a single stage task, before it is folded into a
/// `TaskOutcome`.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("Input file not found: {0}")]
    InputMissing(PathBuf),

    #[error("No collector registered for source '{0}'")]
    NoCollector(String),

    #[error("Collector produced no output at '{0}'")]
    NoOutput(PathBuf),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

impl TaskError {
    /// Returns the elapsed time when the underlying failure was a timeout.
    pub fn timeout_elapsed(&self) -> Option<Duration> {
        match self {
            TaskError::Process(ProcessError::TimedOut { elapsed, .. }) => Some(*elapsed),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("Failed to read results directory '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid analysis bundle '{path}': {source}")]
    InvalidBundle {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid CSV '{path}': {source}")]
    InvalidCsv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("A pipeline run is already in progress (topic: {topic})")]
    AlreadyRunning { topic: String },

    #[error("Topic must not be empty")]
    EmptyTopic,
}

pub type Result<T> = std::result::Result<T, SondeoError>;
