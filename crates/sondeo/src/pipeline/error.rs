use thiserror::Error;

use super::context::Stage;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Topic must not be empty")]
    EmptyTopic,

    #[error("No enabled sources to collect from")]
    NoSources,

    #[error("Invalid stage transition {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Cannot prepare directory '{path}': {source}")]
    Directory {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
