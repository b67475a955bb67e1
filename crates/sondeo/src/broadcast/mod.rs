//! Broadcasting of run log lines for the dashboard.

pub mod log_broadcaster;
pub mod run_log;

pub use log_broadcaster::{LogBroadcaster, LogEvent, LogLevel};
pub use run_log::{LogEntry, RunLog};
