use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ResultsError;
use crate::llm::{global_prompt, interpret_or_inline, Interpreter};

use super::bundle::{read_rows, AnalysisBundle};
use super::tally::{Sentiment, SentimentTally};

/// Everything persisted for one source in the results directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceResults {
    pub bundle: Option<AnalysisBundle>,
    pub rows: Vec<HashMap<String, String>>,
    pub tally: SentimentTally,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub sources: BTreeMap<String, SourceResults>,
    pub global_sentiment: SentimentTally,
    pub predominant: Sentiment,
    pub global_interpretation: String,
}

/// Reads the per-source outputs of a run and summarizes them.
pub struct ResultAggregator {
    results_dir: PathBuf,
}

impl ResultAggregator {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Groups `.json` bundles and `.csv` datasets by the lowercased file name
    /// prefix up to the first `_`. A missing directory yields no sources;
    /// unreadable files are skipped with a warning.
    pub fn scan(&self) -> Result<BTreeMap<String, SourceResults>, ResultsError> {
        let mut sources: BTreeMap<String, SourceResults> = BTreeMap::new();
        if !self.results_dir.is_dir() {
            debug!("No results directory at {}", self.results_dir.display());
            return Ok(sources);
        }

        let walker = WalkDir::new(&self.results_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| ResultsError::ScanFailed {
                path: self.results_dir.clone(),
                source: e,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(name) = source_name(path) else {
                continue;
            };

            match path.extension().and_then(|e| e.to_str()) {
                Some("json") => match AnalysisBundle::read(path) {
                    Ok(bundle) => {
                        sources.entry(name).or_default().bundle = Some(bundle);
                    }
                    Err(e) => warn!("Skipping {}", e),
                },
                Some("csv") => match read_rows(path) {
                    Ok(rows) => {
                        let results = sources.entry(name).or_default();
                        results.tally.merge(&SentimentTally::from_rows(&rows));
                        results.rows.extend(rows);
                    }
                    Err(e) => warn!("Skipping {}", e),
                },
                _ => {}
            }
        }

        Ok(sources)
    }

    /// Sum of every source's tally.
    pub fn global_tally(sources: &BTreeMap<String, SourceResults>) -> SentimentTally {
        sources.values().fold(SentimentTally::default(), |mut acc, s| {
            acc.merge(&s.tally);
            acc
        })
    }

    /// Scans, tallies and asks `interpreter` for one interpretation of the
    /// global tally. An LLM failure is reported inline in
    /// `global_interpretation`, never as an error.
    pub async fn aggregate(
        &self,
        interpreter: &dyn Interpreter,
    ) -> Result<AggregateReport, ResultsError> {
        let sources = self.scan()?;
        let global_sentiment = Self::global_tally(&sources);
        info!(
            "Aggregated {} sources: {} positive, {} negative, {} neutral",
            sources.len(),
            global_sentiment.positive,
            global_sentiment.negative,
            global_sentiment.neutral
        );

        let global_interpretation =
            interpret_or_inline(interpreter, &global_prompt(&global_sentiment)).await;

        Ok(AggregateReport {
            predominant: global_sentiment.predominant(),
            sources,
            global_sentiment,
            global_interpretation,
        })
    }
}

/// `reddit_con_analisis.csv` -> `reddit`, `X_analisis_completo.json` -> `x`.
fn source_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.starts_with('.') {
        return None;
    }
    let prefix = file_name.split('_').next()?;
    let prefix = prefix.split('.').next().unwrap_or(prefix);
    if prefix.is_empty() {
        return None;
    }
    Some(prefix.to_lowercase())
}
