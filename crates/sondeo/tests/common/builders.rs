//! Builders for test configurations.

#![allow(dead_code)]

use std::path::Path;

use sondeo::config::{Config, SourceConfig};
use sondeo::process::ScriptCommand;
use sondeo::Source;

/// Shell command for a script relative to the workspace.
pub fn sh(script: &str, args: &[&str]) -> ScriptCommand {
    ScriptCommand::new(Some("sh"), script, args)
}

/// Builder for `Config` instances rooted at a test workspace.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from the defaults with no sources and short timeouts.
    pub fn new(workspace: &Path) -> Self {
        let mut config = Config::default();
        config.workspace_dir = workspace.display().to_string();
        config.sources.clear();
        config.extraction.task_timeout_secs = 10;
        config.preprocessing.timeout_secs = 10;
        config.analysis.task_timeout_secs = 10;
        config.llm.enabled = false;
        Self { config }
    }

    pub fn source(mut self, source: Source, collector: ScriptCommand, analyzer: ScriptCommand) -> Self {
        let mut entry = SourceConfig::new(source);
        entry.collector = Some(collector);
        entry.analyzer = Some(analyzer);
        self.config.sources.push(entry);
        self
    }

    pub fn disabled_source(mut self, source: Source) -> Self {
        let mut entry = SourceConfig::new(source);
        entry.enabled = false;
        self.config.sources.push(entry);
        self
    }

    pub fn preprocessing(mut self, command: ScriptCommand) -> Self {
        self.config.preprocessing.command = command;
        self
    }

    pub fn extraction_timeout(mut self, secs: u64) -> Self {
        self.config.extraction.task_timeout_secs = secs;
        self
    }

    pub fn analysis_timeout(mut self, secs: u64) -> Self {
        self.config.analysis.task_timeout_secs = secs;
        self
    }

    pub fn min_successful_sources(mut self, count: usize) -> Self {
        self.config.extraction.min_successful_sources = count;
        self
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.config.extraction.max_workers = count;
        self.config.analysis.max_workers = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
