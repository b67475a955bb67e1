use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Column of the enriched CSV holding the per-row label.
pub const SENTIMENT_COLUMN: &str = "sentimiento";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Fixed evaluation order, also the tie-break order.
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral];

    /// Parses a label as written by the interpreter scripts
    /// (`POSITIVO`, `NEGATIVO`, `NEUTRAL`), ignoring case and padding.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "POSITIVO" => Some(Sentiment::Positive),
            "NEGATIVO" => Some(Sentiment::Negative),
            "NEUTRAL" => Some(Sentiment::Neutral),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Sentiment::Positive => "POSITIVO",
            Sentiment::Negative => "NEGATIVO",
            Sentiment::Neutral => "NEUTRAL",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment counts across one or more enriched datasets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentTally {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
    pub total: u64,
}

impl SentimentTally {
    pub fn new(positive: u64, negative: u64, neutral: u64) -> Self {
        Self {
            positive,
            negative,
            neutral,
            total: positive + negative + neutral,
        }
    }

    /// Counts the `sentimiento` column of `rows`. Rows without a recognised
    /// label are skipped and do not contribute to `total`.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a HashMap<String, String>>,
    {
        let mut tally = Self::default();
        for row in rows {
            if let Some(sentiment) = row.get(SENTIMENT_COLUMN).and_then(|v| Sentiment::from_label(v)) {
                tally.add(sentiment);
            }
        }
        tally
    }

    pub fn add(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
        self.total += 1;
    }

    pub fn merge(&mut self, other: &SentimentTally) {
        self.positive += other.positive;
        self.negative += other.negative;
        self.neutral += other.neutral;
        self.total += other.total;
    }

    pub fn count(&self, sentiment: Sentiment) -> u64 {
        match sentiment {
            Sentiment::Positive => self.positive,
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
        }
    }

    /// Category with the largest count. Ties resolve positive, then
    /// negative, then neutral; an empty tally is positive.
    pub fn predominant(&self) -> Sentiment {
        let mut best = Sentiment::Positive;
        for sentiment in Sentiment::ALL {
            if self.count(sentiment) > self.count(best) {
                best = sentiment;
            }
        }
        best
    }
}
