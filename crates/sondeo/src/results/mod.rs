//! Reading, tallying and interpreting the persisted results of a run.

pub mod aggregator;
pub mod bundle;
pub mod tally;

pub use aggregator::{AggregateReport, ResultAggregator, SourceResults};
pub use bundle::{read_rows, AnalysisBundle, BundleMetadata, LlmInterpretation};
pub use tally::{Sentiment, SentimentTally, SENTIMENT_COLUMN};
