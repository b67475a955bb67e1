use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::process::ScriptCommand;
use crate::source::{DataLayout, Source};

/// Per-source commands for an enabled platform.
#[derive(Debug, Clone)]
pub struct SourcePlan {
    pub source: Source,
    pub analyzer: ScriptCommand,
}

/// Everything one run needs, resolved from `Config`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workdir: PathBuf,
    pub layout: DataLayout,
    pub default_items_per_topic: u32,
    pub sources: Vec<SourcePlan>,
    pub extraction_workers: usize,
    pub extraction_timeout: Duration,
    pub min_successful_sources: usize,
    pub preprocessing: ScriptCommand,
    pub preprocessing_timeout: Duration,
    pub analysis_workers: usize,
    pub analysis_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workdir: config.workspace_path(),
            layout: config.data_layout(),
            default_items_per_topic: config.items_per_topic,
            sources: config
                .enabled_sources()
                .map(|s| SourcePlan {
                    source: s.name,
                    analyzer: s.analyzer_command(),
                })
                .collect(),
            extraction_workers: config.extraction.max_workers,
            extraction_timeout: Duration::from_secs(config.extraction.task_timeout_secs),
            min_successful_sources: config.extraction.min_successful_sources,
            preprocessing: config.preprocessing.command.clone(),
            preprocessing_timeout: Duration::from_secs(config.preprocessing.timeout_secs),
            analysis_workers: config.analysis.max_workers,
            analysis_timeout: Duration::from_secs(config.analysis.task_timeout_secs),
        }
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.sources.iter().map(|s| s.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_from_config_keeps_enabled_sources_only() {
        let config = load_config_from_str(
            r#"{
                "version": "1.0",
                "workspace_dir": "/srv/sondeo",
                "sources": [
                    { "name": "reddit" },
                    { "name": "facebook", "enabled": false }
                ],
                "preprocessing": { "timeout_secs": 12 }
            }"#,
        )
        .unwrap();

        let pipeline = PipelineConfig::from_config(&config);
        assert_eq!(pipeline.enabled_sources().collect::<Vec<_>>(), vec![Source::Reddit]);
        assert_eq!(pipeline.preprocessing_timeout, Duration::from_secs(12));
        assert_eq!(
            pipeline.layout.raw_csv(Source::Reddit),
            PathBuf::from("/srv/sondeo/datos_extraidos/reddit.csv")
        );
    }
}
