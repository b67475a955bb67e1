//! The three stages of a run: extraction, preprocessing and analysis.

pub mod analysis;
pub mod extraction;
pub mod preprocessing;

use std::collections::HashSet;

use tracing::warn;

use crate::source::Source;
use crate::task::OutcomeSet;
use crate::worker::JobResult;

pub use analysis::AnalysisCoordinator;
pub use extraction::{CollectorRegistry, ExtractionCoordinator, ScriptCollector, SourceCollector};
pub use preprocessing::PhaseRunner;

/// Keeps the first task per source; outcomes are keyed by source so a
/// second task for the same one could never be recorded.
fn dedup_by_source<T, F>(tasks: Vec<T>, source_of: F) -> Vec<T>
where
    F: Fn(&T) -> Source,
{
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|t| {
            let source = source_of(t);
            let first = seen.insert(source);
            if !first {
                warn!("Dropping duplicate task for {}", source);
            }
            first
        })
        .collect()
}

fn fold_results(results: Vec<JobResult>) -> OutcomeSet {
    let mut outcomes = OutcomeSet::new();
    for result in results {
        outcomes.record(result.source, result.outcome);
    }
    outcomes
}
