pub mod outcome;

use std::path::PathBuf;

use crate::process::{Placeholders, ScriptCommand};
use crate::source::Source;

pub use outcome::{OutcomeSet, TaskOutcome};

/// One collector invocation: gather `item_target` items per topic for
/// `source` into `output_path`.
#[derive(Debug, Clone)]
pub struct CollectionTask {
    pub source: Source,
    pub topics: Vec<String>,
    pub item_target: u32,
    pub output_path: PathBuf,
}

impl CollectionTask {
    pub fn placeholders(&self) -> Placeholders {
        Placeholders::new()
            .with("topic", self.topics.first().cloned().unwrap_or_default())
            .with("topics", self.topics.join(","))
            .with("items", self.item_target.to_string())
            .with("output", self.output_path.display().to_string())
    }
}

/// One interpreter invocation against a source's cleaned CSV.
#[derive(Debug, Clone)]
pub struct AnalysisTask {
    pub source: Source,
    pub analyzer: ScriptCommand,
    pub input_path: PathBuf,
    pub topic: String,
}

impl AnalysisTask {
    pub fn placeholders(&self) -> Placeholders {
        Placeholders::new()
            .with("input", self.input_path.display().to_string())
            .with("topic", self.topic.clone())
    }
}
