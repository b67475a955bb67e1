//! Isolated workspace for running whole pipelines against shell scripts.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use sondeo::llm::{Interpreter, LlmError};
use sondeo::pipeline::{ProgressReporter, RunEvent};
use sondeo::process::ScriptCommand;
use sondeo::{
    CollectorRegistry, Config, PipelineConfig, PipelineOrchestrator, RunRequest, RunState, Source,
};

use super::builders::{sh, ConfigBuilder};

/// Writes a CSV with a header and one row per item to `$1`.
pub const COLLECTOR_OK: &str = r#"printf 'content,author,timestamp,topic,extraction_time\n' > "$1"
printf 'me gusta,ana,2025-11-20,%s,now\n' "$2" >> "$1"
echo "collected for $2"
"#;

/// Copies every raw CSV in `$1` to `$2/<name>_limpio.csv`.
pub const PREPROCESS_OK: &str = r#"mkdir -p "$2"
for f in "$1"/*.csv; do
  [ -f "$f" ] || continue
  name=$(basename "$f" .csv)
  cp "$f" "$2/${name}_limpio.csv"
done
echo "cleaned"
"#;

pub const PREPROCESS_FAIL: &str = r#"echo "loading files"
echo "KeyError: 'contenido'" >&2
exit 1
"#;

/// Writes `resultados/<name>_con_analisis.csv` and leaves a marker per call.
pub const ANALYZER_OK: &str = r#"name=$(basename "$1" _limpio.csv)
mkdir -p resultados markers
printf 'contenido,sentimiento\nme gusta,POSITIVO\n' > "resultados/${name}_con_analisis.csv"
touch "markers/${name}"
echo "analyzed $name for $2"
"#;

pub const SLEEP: &str = "sleep 30\n";

/// Test workspace rooted in a temporary directory.
pub struct TestHarness {
    temp_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a script relative to the workspace root.
    pub fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.root().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create script dir");
        }
        std::fs::write(&path, body).expect("Failed to write script");
        path
    }

    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        self.write_script(relative, content)
    }

    /// Collector script for `source` with the given body.
    pub fn collector(&self, source: Source, body: &str) -> ScriptCommand {
        let name = format!("collect_{}.sh", source.file_stem());
        self.write_script(&name, body);
        sh(&name, &["{output}", "{topic}", "{items}"])
    }

    pub fn analyzer(&self, body: &str) -> ScriptCommand {
        self.write_script("analyze.sh", body);
        sh("analyze.sh", &["{input}", "{topic}"])
    }

    pub fn preprocessing(&self, body: &str) -> ScriptCommand {
        self.write_script("preprocess.sh", body);
        sh("preprocess.sh", &["{input}", "{output}"])
    }

    pub fn config(&self) -> ConfigBuilder {
        ConfigBuilder::new(self.root())
    }

    pub fn orchestrator(&self, config: &Config) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            Arc::new(PipelineConfig::from_config(config)),
            Arc::new(CollectorRegistry::from_config(config)),
        )
    }

    pub async fn run(&self, config: &Config, topic: &str, progress: &dyn ProgressReporter) -> RunState {
        self.orchestrator(config)
            .run(RunRequest::new(topic).with_items(2), progress)
            .await
    }

    /// Whether the analyzer was invoked for the file stem `name`.
    pub fn analyzed(&self, name: &str) -> bool {
        self.root().join("markers").join(name).exists()
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root().join("resultados")
    }
}

/// Records every event it receives.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: RunEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Interpreter returning a fixed answer and remembering the prompts.
pub struct StubInterpreter {
    answer: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl StubInterpreter {
    pub fn answering(text: &str) -> Self {
        Self {
            answer: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Interpreter for StubInterpreter {
    async fn interpret_text(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer.clone().map_err(LlmError::Api)
    }

    fn model(&self) -> &str {
        "stub"
    }
}
