use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::process::ScriptCommand;
use crate::source::{DataLayout, Source};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Directory scripts run in and relative paths resolve against.
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: String,
    #[serde(default)]
    pub default_topic: Option<String>,
    #[serde(default = "default_items_per_topic")]
    pub items_per_topic: u32,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub llm: LlmConfig,
}

fn default_workspace_dir() -> String {
    ".".to_string()
}

fn default_items_per_topic() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            workspace_dir: default_workspace_dir(),
            default_topic: None,
            items_per_topic: default_items_per_topic(),
            layout: LayoutConfig::default(),
            extraction: ExtractionConfig::default(),
            preprocessing: PreprocessingConfig::default(),
            analysis: AnalysisConfig::default(),
            sources: default_sources(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    pub fn workspace_path(&self) -> PathBuf {
        PathBuf::from(&self.workspace_dir)
    }

    /// Data directories resolved against the workspace.
    pub fn data_layout(&self) -> DataLayout {
        DataLayout::new(
            &self.layout.raw_dir,
            &self.layout.clean_dir,
            &self.layout.results_dir,
        )
        .rooted_at(&self.workspace_path())
    }

    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn source(&self, source: Source) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == source)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: String,
    #[serde(default = "default_clean_dir")]
    pub clean_dir: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
}

fn default_raw_dir() -> String {
    "datos_extraidos".to_string()
}

fn default_clean_dir() -> String {
    "datos_limpios".to_string()
}

fn default_results_dir() -> String {
    "resultados".to_string()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            clean_dir: default_clean_dir(),
            results_dir: default_results_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_extraction_timeout")]
    pub task_timeout_secs: u64,
    /// Minimum number of collectors that must succeed before preprocessing
    /// runs. Zero means always proceed.
    #[serde(default)]
    pub min_successful_sources: usize,
}

fn default_max_workers() -> usize {
    4
}

fn default_extraction_timeout() -> u64 {
    600
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            task_timeout_secs: default_extraction_timeout(),
            min_successful_sources: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    #[serde(default = "default_preprocessing_command")]
    pub command: ScriptCommand,
    #[serde(default = "default_preprocessing_timeout")]
    pub timeout_secs: u64,
}

fn default_preprocessing_command() -> ScriptCommand {
    ScriptCommand::python("pipeline/preprocesamiento.py", &[])
}

fn default_preprocessing_timeout() -> u64 {
    300
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            command: default_preprocessing_command(),
            timeout_secs: default_preprocessing_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_analysis_timeout")]
    pub task_timeout_secs: u64,
}

fn default_analysis_timeout() -> u64 {
    900
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            task_timeout_secs: default_analysis_timeout(),
        }
    }
}

/// One platform entry. Missing commands fall back to the bundled scripts
/// for that platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: Source,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector: Option<ScriptCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<ScriptCommand>,
}

impl SourceConfig {
    pub fn new(name: Source) -> Self {
        Self {
            name,
            enabled: true,
            collector: None,
            analyzer: None,
        }
    }

    pub fn collector_command(&self) -> ScriptCommand {
        self.collector
            .clone()
            .unwrap_or_else(|| default_collector(self.name))
    }

    pub fn analyzer_command(&self) -> ScriptCommand {
        self.analyzer
            .clone()
            .unwrap_or_else(|| default_analyzer(self.name))
    }
}

fn default_sources() -> Vec<SourceConfig> {
    Source::ALL.iter().copied().map(SourceConfig::new).collect()
}

const COLLECTOR_ARGS: &[&str] = &[
    "--topics", "{topics}", "--items", "{items}", "--output", "{output}",
];
const ANALYZER_ARGS: &[&str] = &["{input}", "{topic}"];

pub fn default_collector(source: Source) -> ScriptCommand {
    let script = match source {
        Source::LinkedIn => "webscraping_extractores/extraerLinkedln.py",
        Source::Twitter => "webscraping_extractores/extraerX.py",
        Source::Facebook => "webscraping_extractores/extraerFb.py",
        Source::Reddit => "webscraping_extractores/extraerReddit.py",
    };
    ScriptCommand::python(script, COLLECTOR_ARGS)
}

pub fn default_analyzer(source: Source) -> ScriptCommand {
    let script = match source {
        Source::LinkedIn => "Parte2/promptLinkedin.py",
        Source::Twitter => "Parte2/promptx.py",
        Source::Facebook => "Parte2/promptFacebook.py",
        Source::Reddit => "Parte2/promptReddit.py",
    };
    ScriptCommand::python(script, ANALYZER_ARGS)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Only ever populated from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_llm_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_llm_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            api_key: None,
        }
    }
}
