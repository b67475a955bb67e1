//! The static registry of platforms and the on-disk layout of their files.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A social-media platform content is collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    LinkedIn,
    Twitter,
    Facebook,
    Reddit,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::LinkedIn,
        Source::Twitter,
        Source::Facebook,
        Source::Reddit,
    ];

    /// Human readable name used in logs and summaries.
    pub fn display_name(&self) -> &'static str {
        match self {
            Source::LinkedIn => "LinkedIn",
            Source::Twitter => "Twitter/X",
            Source::Facebook => "Facebook",
            Source::Reddit => "Reddit",
        }
    }

    /// Stem shared by every file this source produces.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Source::LinkedIn => "linkedin",
            Source::Twitter => "X",
            Source::Facebook => "facebook",
            Source::Reddit => "reddit",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "linkedin" => Some(Source::LinkedIn),
            "twitter" | "x" | "twitter/x" => Some(Source::Twitter),
            "facebook" | "fb" => Some(Source::Facebook),
            "reddit" => Some(Source::Reddit),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Directories every stage reads from and writes to.
///
/// Each source owns distinct paths in every directory, so concurrent tasks of
/// one stage never write the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    pub raw_dir: PathBuf,
    pub clean_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl DataLayout {
    pub fn new(
        raw_dir: impl Into<PathBuf>,
        clean_dir: impl Into<PathBuf>,
        results_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            clean_dir: clean_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    /// Resolves every relative directory against `base`.
    pub fn rooted_at(&self, base: &Path) -> Self {
        let root = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        Self {
            raw_dir: root(&self.raw_dir),
            clean_dir: root(&self.clean_dir),
            results_dir: root(&self.results_dir),
        }
    }

    /// `datos_extraidos/<stem>.csv`
    pub fn raw_csv(&self, source: Source) -> PathBuf {
        self.raw_dir.join(format!("{}.csv", source.file_stem()))
    }

    /// `datos_limpios/<stem>_limpio.csv`
    pub fn clean_csv(&self, source: Source) -> PathBuf {
        self.clean_dir
            .join(format!("{}_limpio.csv", source.file_stem()))
    }

    /// `resultados/<stem>_con_analisis.csv`
    pub fn enriched_csv(&self, source: Source) -> PathBuf {
        self.results_dir
            .join(format!("{}_con_analisis.csv", source.file_stem()))
    }

    /// `resultados/<stem>_analisis_completo.json`
    pub fn bundle_json(&self, source: Source) -> PathBuf {
        self.results_dir
            .join(format!("{}_analisis_completo.json", source.file_stem()))
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("datos_extraidos", "datos_limpios", "resultados")
    }
}
