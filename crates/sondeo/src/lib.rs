pub mod broadcast;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod process;
pub mod results;
pub mod source;
pub mod stage;
pub mod supervisor;
pub mod task;
pub mod worker;

pub use broadcast::{LogBroadcaster, LogEntry, LogEvent, LogLevel, RunLog};
pub use config::{load_config, load_or_default, Config};
pub use error::{
    ConfigError, ProcessError, ResultsError, Result, SondeoError, SupervisorError, TaskError,
};
pub use llm::{Interpreter, LlmError};
pub use pipeline::{PipelineConfig, PipelineOrchestrator, RunRequest, RunState, RunSummary, Stage};
pub use results::{AggregateReport, ResultAggregator, SentimentTally};
pub use source::{DataLayout, Source};
pub use stage::CollectorRegistry;
pub use supervisor::{RunStatus, RunSupervisor};
pub use task::{OutcomeSet, TaskOutcome};
