//! Log lines of the current run, readable incrementally by cursor.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::log_broadcaster::{LogBroadcaster, LogEvent, LogLevel};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub seq: u64,
    #[serde(flatten)]
    pub event: LogEvent,
}

#[derive(Debug, Default)]
struct Inner {
    entries: VecDeque<LogEntry>,
    last_seq: u64,
}

/// Bounded log with monotonically increasing sequence numbers.
///
/// Readers pass the last sequence number they saw and get only newer
/// entries, so concurrent pollers never steal lines from each other.
/// Sequence numbers keep growing across `clear` calls.
#[derive(Debug)]
pub struct RunLog {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl RunLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Appends `event` and returns its sequence number.
    pub fn append(&self, event: LogEvent) -> u64 {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.last_seq += 1;
        let seq = inner.last_seq;
        inner.entries.push_back(LogEntry { seq, event });
        while inner.entries.len() > self.capacity {
            inner.entries.pop_front();
        }
        seq
    }

    /// Entries with a sequence number greater than `cursor`, oldest first.
    pub fn since(&self, cursor: u64) -> Vec<LogEntry> {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner
            .entries
            .iter()
            .filter(|e| e.seq > cursor)
            .cloned()
            .collect()
    }

    pub fn last_seq(&self) -> u64 {
        match self.inner.read() {
            Ok(guard) => guard.last_seq,
            Err(poisoned) => poisoned.into_inner().last_seq,
        }
    }

    /// Drops every entry, keeping the sequence counter.
    pub fn clear(&self) {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.entries.clear();
    }

    /// Appends everything published on `broadcaster` until it is dropped.
    pub fn follow(self: &Arc<Self>, broadcaster: &LogBroadcaster) -> JoinHandle<()> {
        let log = Arc::clone(self);
        let mut receiver = broadcaster.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        log.append(event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log.append(LogEvent::new(
                            LogLevel::Warn,
                            format!("{} log lines dropped", skipped),
                        ));
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new(5000)
    }
}
