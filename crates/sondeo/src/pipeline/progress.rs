use crate::broadcast::{LogBroadcaster, LogEvent, LogLevel};
use crate::source::Source;
use crate::task::TaskOutcome;

use super::context::{RunSummary, Stage};

/// Events emitted by the orchestrator while a run progresses.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Started {
        run_id: String,
        topics: Vec<String>,
        items_per_topic: u32,
    },
    StageStarted {
        stage: Stage,
    },
    /// `source` is `None` for the single preprocessing task.
    TaskFinished {
        stage: Stage,
        source: Option<Source>,
        outcome: TaskOutcome,
        output: String,
    },
    StageFinished {
        stage: Stage,
        successes: usize,
        failures: usize,
    },
    Failed {
        stage: Stage,
        error: String,
    },
    Completed {
        summary: RunSummary,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: RunEvent);
}

/// No-op reporter for unit tests and the CLI.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: RunEvent) {}
}

/// Turns run events into log lines on a `LogBroadcaster`.
pub struct BroadcastProgress {
    broadcaster: LogBroadcaster,
}

impl BroadcastProgress {
    pub fn new(broadcaster: LogBroadcaster) -> Self {
        Self { broadcaster }
    }
}

impl BroadcastProgress {
    fn emit(&self, event: LogEvent) {
        self.broadcaster.send(event);
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: RunEvent) {
        match event {
            RunEvent::Started {
                run_id,
                topics,
                items_per_topic,
            } => {
                self.emit(LogEvent::new(
                    LogLevel::Info,
                    format!(
                        "Run {} started: topics [{}], {} items per topic",
                        run_id,
                        topics.join(", "),
                        items_per_topic
                    ),
                ));
            }
            RunEvent::StageStarted { stage } => {
                self.emit(
                    LogEvent::new(LogLevel::Info, format!("{} started", stage.label()))
                        .in_stage(stage),
                );
            }
            RunEvent::TaskFinished {
                stage,
                source,
                outcome,
                output,
            } => {
                let who = source
                    .map(|s| s.display_name().to_string())
                    .unwrap_or_else(|| stage.label().to_string());
                let level = if outcome.is_success() {
                    LogLevel::Info
                } else {
                    LogLevel::Warn
                };
                self.emit(
                    LogEvent::new(level, format!("{} ({}): {}", who, stage.label(), outcome))
                        .in_stage(stage)
                        .for_source(source),
                );
                for out_line in output.lines().filter(|l| !l.trim().is_empty()) {
                    self.emit(
                        LogEvent::new(LogLevel::Debug, format!("[{}] {}", who, out_line))
                            .in_stage(stage)
                            .for_source(source),
                    );
                }
            }
            RunEvent::StageFinished {
                stage,
                successes,
                failures,
            } => {
                self.emit(
                    LogEvent::new(
                        LogLevel::Info,
                        format!(
                            "{} finished: {} succeeded, {} failed",
                            stage.label(),
                            successes,
                            failures
                        ),
                    )
                    .in_stage(stage),
                );
            }
            RunEvent::Failed { stage, error } => {
                self.emit(
                    LogEvent::new(
                        LogLevel::Error,
                        format!("Run failed during {}: {}", stage.label(), error),
                    )
                    .in_stage(stage),
                );
            }
            RunEvent::Completed { summary } => {
                for line in summary.to_string().lines() {
                    self.emit(LogEvent::new(LogLevel::Info, line).in_stage(summary.final_stage));
                }
            }
        }
    }
}

/// Forwards every event to each wrapped reporter in order.
pub struct FanoutProgress<'a> {
    reporters: Vec<&'a dyn ProgressReporter>,
}

impl<'a> FanoutProgress<'a> {
    pub fn new(reporters: Vec<&'a dyn ProgressReporter>) -> Self {
        Self { reporters }
    }
}

impl ProgressReporter for FanoutProgress<'_> {
    fn report(&self, event: RunEvent) {
        if let Some((last, rest)) = self.reporters.split_last() {
            for reporter in rest {
                reporter.report(event.clone());
            }
            last.report(event);
        }
    }
}
