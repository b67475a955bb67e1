use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ProcessError;
use crate::process::{run_script, Placeholders, ScriptCommand};
use crate::task::TaskOutcome;
use crate::worker::TaskReport;

/// Runs a single external phase script to completion.
pub struct PhaseRunner {
    workdir: PathBuf,
}

impl PhaseRunner {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Non-zero exit fails with the captured stderr as the reason; a timeout
    /// fails with a timeout-specific reason after the child is killed.
    pub async fn run(
        &self,
        script: &ScriptCommand,
        vars: &Placeholders,
        timeout: Duration,
    ) -> TaskOutcome {
        self.run_captured(script, vars, timeout).await.0
    }

    /// Like `run`, also returning the captured output of a successful run.
    pub async fn run_captured(
        &self,
        script: &ScriptCommand,
        vars: &Placeholders,
        timeout: Duration,
    ) -> (TaskOutcome, TaskReport) {
        info!("Running {}", script.program_name());

        match run_script(script, &self.workdir, vars, Some(timeout)).await {
            Ok(output) => {
                debug!(stdout = %output.stdout.trim(), "phase output");
                info!(
                    "{} finished in {:.1}s",
                    script.program_name(),
                    output.elapsed.as_secs_f64()
                );
                let report = TaskReport {
                    stdout: output.stdout,
                    stderr: output.stderr,
                };
                (TaskOutcome::Success, report)
            }
            Err(ProcessError::NonZeroExit { stderr, code, .. }) => {
                warn!("{} exited with {}", script.program_name(), code);
                (TaskOutcome::failed(stderr), TaskReport::default())
            }
            Err(ProcessError::TimedOut { elapsed, .. }) => {
                warn!("{} timed out", script.program_name());
                let reason = format!(
                    "timed out after {:.1}s (limit {}s)",
                    elapsed.as_secs_f64(),
                    timeout.as_secs()
                );
                (TaskOutcome::failed(reason), TaskReport::default())
            }
            Err(e) => (TaskOutcome::failed(e.to_string()), TaskReport::default()),
        }
    }
}
