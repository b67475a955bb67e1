pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::{PipelineConfig, SourcePlan};
pub use context::{FailureEntry, RunState, RunSummary, Stage, TaskEntry};
pub use error::PipelineError;
pub use progress::{BroadcastProgress, FanoutProgress, NoopProgress, ProgressReporter, RunEvent};
pub use runner::{split_topics, PipelineOrchestrator, RunRequest};
