use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ResultsError;

use super::tally::SentimentTally;

/// Per-source JSON artifact written by an interpreter script.
///
/// Only the fields the aggregator and the dashboard read are typed; every
/// statistical section is kept verbatim in `sections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBundle {
    #[serde(default)]
    pub metadata: BundleMetadata,

    #[serde(rename = "resumen_para_llm", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(rename = "interpretacion_llm", default, skip_serializing_if = "Option::is_none")]
    pub interpretation: Option<LlmInterpretation>,

    /// `analisis_polaridad`, `frecuencia_palabras`, `analisis_ngramas`, ...
    #[serde(flatten)]
    pub sections: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    #[serde(rename = "fecha_analisis", default)]
    pub analyzed_at: Option<String>,
    #[serde(rename = "tema", default)]
    pub topic: String,
    #[serde(rename = "total_comentarios", default)]
    pub total_comments: u64,
    #[serde(rename = "fuente", default)]
    pub source: String,
    #[serde(rename = "version_analisis", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmInterpretation {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "modelo_usado", default)]
    pub model: Option<String>,
    #[serde(rename = "prompt_enviado", default, skip_serializing)]
    pub prompt: Option<String>,
    #[serde(rename = "interpretacion_completa", default)]
    pub text: String,
}

impl AnalysisBundle {
    pub fn read(path: &Path) -> Result<Self, ResultsError> {
        let file = File::open(path).map_err(|e| ResultsError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| {
            ResultsError::InvalidBundle {
                path: path.to_path_buf(),
                source: e,
            }
        })
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    /// Sentiment distribution as computed by the interpreter, from
    /// `analisis_polaridad.distribucion_sentimientos`.
    pub fn distribution(&self) -> Option<SentimentTally> {
        let dist = self
            .section("analisis_polaridad")?
            .get("distribucion_sentimientos")?;
        let count = |key: &str| dist.get(key).and_then(Value::as_u64).unwrap_or(0);
        Some(SentimentTally::new(
            count("positivos"),
            count("negativos"),
            count("neutrales"),
        ))
    }
}

/// Reads an enriched CSV into header-keyed rows.
///
/// Short rows miss their trailing columns and extra fields are dropped. A
/// record that cannot be read at all is skipped; only an unreadable file or
/// header is an error.
pub fn read_rows(path: &Path) -> Result<Vec<HashMap<String, String>>, ResultsError> {
    let invalid = |e: csv::Error| ResultsError::InvalidCsv {
        path: path.to_path_buf(),
        source: e,
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(invalid)?;
    let headers = reader.headers().map_err(invalid)?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => rows.push(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect(),
            ),
            Err(e) => warn!("Skipping unreadable row in {}: {}", path.display(), e),
        }
    }
    Ok(rows)
}
