use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::source::Source;

/// Terminal result of one unit of work within a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskOutcome {
    Success,
    Failed {
        reason: String,
    },
    TimedOut {
        #[serde(rename = "elapsed_secs", with = "duration_secs")]
        elapsed: Duration,
    },
}

impl TaskOutcome {
    /// A `Failed` outcome; an empty reason is replaced so it is never blank.
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let reason = if reason.trim().is_empty() {
            "unknown error".to_string()
        } else {
            reason
        };
        TaskOutcome::Failed { reason }
    }

    pub fn timed_out(elapsed: Duration) -> Self {
        TaskOutcome::TimedOut { elapsed }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }

    /// Human readable failure description, `None` on success.
    pub fn reason(&self) -> Option<String> {
        match self {
            TaskOutcome::Success => None,
            TaskOutcome::Failed { reason } => Some(reason.clone()),
            TaskOutcome::TimedOut { elapsed } => {
                Some(format!("timed out after {:.1}s", elapsed.as_secs_f64()))
            }
        }
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Success => f.write_str("SUCCESS"),
            TaskOutcome::Failed { reason } => write!(f, "FAILED: {}", reason),
            TaskOutcome::TimedOut { elapsed } => {
                write!(f, "TIMED_OUT after {:.1}s", elapsed.as_secs_f64())
            }
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}

/// Per-source outcomes of one stage.
///
/// An outcome, once recorded, is never replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeSet {
    outcomes: BTreeMap<Source, TaskOutcome>,
}

impl OutcomeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `outcome` for `source`. Returns `false` and keeps the earlier
    /// value when `source` already has one.
    pub fn record(&mut self, source: Source, outcome: TaskOutcome) -> bool {
        if let Some(existing) = self.outcomes.get(&source) {
            warn!(
                source = %source,
                existing = %existing,
                rejected = %outcome,
                "outcome already recorded, ignoring"
            );
            return false;
        }
        self.outcomes.insert(source, outcome);
        true
    }

    pub fn get(&self, source: Source) -> Option<&TaskOutcome> {
        self.outcomes.get(&source)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Source, &TaskOutcome)> {
        self.outcomes.iter().map(|(s, o)| (*s, o))
    }

    pub fn successes(&self) -> impl Iterator<Item = Source> + '_ {
        self.iter().filter(|(_, o)| o.is_success()).map(|(s, _)| s)
    }

    pub fn failures(&self) -> impl Iterator<Item = (Source, &TaskOutcome)> {
        self.iter().filter(|(_, o)| !o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_once() {
        let mut set = OutcomeSet::new();
        assert!(set.record(Source::Reddit, TaskOutcome::timed_out(Duration::from_secs(3))));
        assert!(!set.record(Source::Reddit, TaskOutcome::Success));

        assert_eq!(set.len(), 1);
        assert!(matches!(
            set.get(Source::Reddit),
            Some(TaskOutcome::TimedOut { .. })
        ));
    }

    #[test]
    fn test_counts() {
        let mut set = OutcomeSet::new();
        set.record(Source::Reddit, TaskOutcome::Success);
        set.record(Source::LinkedIn, TaskOutcome::Success);
        set.record(Source::Facebook, TaskOutcome::failed("boom"));

        assert_eq!(set.success_count(), 2);
        assert_eq!(set.failure_count(), 1);
        let failed: Vec<_> = set.failures().map(|(s, _)| s).collect();
        assert_eq!(failed, vec![Source::Facebook]);
    }

    #[test]
    fn test_failed_reason_never_empty() {
        match TaskOutcome::failed("   ") {
            TaskOutcome::Failed { reason } => assert!(!reason.trim().is_empty()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_value(TaskOutcome::failed("missing script")).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["reason"], "missing script");

        let json = serde_json::to_value(TaskOutcome::timed_out(Duration::from_millis(1500))).unwrap();
        assert_eq!(json["status"], "TIMED_OUT");
        assert_eq!(json["elapsed_secs"], 1.5);

        let mut set = OutcomeSet::new();
        set.record(Source::Twitter, TaskOutcome::Success);
        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(json["twitter"]["status"], "SUCCESS");
    }
}
