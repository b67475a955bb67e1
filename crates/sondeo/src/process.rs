//! External script invocation.
//!
//! Every external capability (collectors, the enricher, interpreters) is a
//! script run as a child process. Children always get a null stdin, have
//! their stdout and stderr captured, and are killed when their timeout
//! expires or when the future driving them is dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ProcessError;

/// Longest wait for the output pipes to close once the child has exited.
pub const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// How to launch one external script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCommand {
    /// Program that runs the script (e.g. `python3`). When absent the script
    /// itself is executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    /// Path of the script, relative to the workspace directory.
    pub script: PathBuf,
    /// Arguments; `{topic}`, `{topics}`, `{items}`, `{input}` and `{output}`
    /// are expanded per task.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ScriptCommand {
    pub fn new(interpreter: Option<&str>, script: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            interpreter: interpreter.map(str::to_string),
            script: script.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn python(script: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self::new(Some("python3"), script, args)
    }

    /// Script path resolved against `workdir`.
    pub fn script_path(&self, workdir: &Path) -> PathBuf {
        if self.script.is_absolute() {
            self.script.clone()
        } else {
            workdir.join(&self.script)
        }
    }

    /// Short name for logs.
    pub fn program_name(&self) -> String {
        match &self.interpreter {
            Some(interp) => format!("{} {}", interp, self.script.display()),
            None => self.script.display().to_string(),
        }
    }

    /// Fails with `ScriptNotFound` when the script file does not exist.
    pub fn ensure_exists(&self, workdir: &Path) -> Result<PathBuf, ProcessError> {
        let path = self.script_path(workdir);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ProcessError::ScriptNotFound(path))
        }
    }

    /// Builds the child command with placeholders expanded.
    pub fn to_command(&self, workdir: &Path, vars: &Placeholders) -> Command {
        let script = self.script_path(workdir);
        let mut cmd = match &self.interpreter {
            Some(interp) => {
                let mut c = Command::new(interp);
                c.arg(&script);
                c
            }
            None => Command::new(&script),
        };
        cmd.args(self.args.iter().map(|a| vars.expand(a)))
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Values substituted into `{name}` placeholders of script arguments.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: HashMap<&'static str, String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    pub fn expand(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.values {
            out = out.replace(&format!("{{{}}}", key), value);
        }
        out
    }
}

/// Captured result of a child that exited successfully.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs `command` to completion.
///
/// A non-zero exit becomes `NonZeroExit` carrying the captured stderr (or
/// stdout when stderr is empty). When `timeout` expires the child is killed
/// and reaped before `TimedOut` is returned.
/// After exit the output pipes get `DRAIN_GRACE` to close.
pub async fn run_command(
    mut command: Command,
    program: &str,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ProcessError> {
    let started = Instant::now();
    let mut child = command.spawn().map_err(|e| ProcessError::Spawn {
        program: program.to_string(),
        source: e,
    })?;

    let stdout_task = child.stdout.take().map(spawn_reader);
    let stderr_task = child.stderr.take().map(spawn_reader);

    let status = match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(program, "timed out after {:?}, killing", limit);
                if let Err(e) = child.kill().await {
                    warn!(program, error = %e, "failed to kill timed out child");
                }
                return Err(ProcessError::TimedOut {
                    program: program.to_string(),
                    elapsed: started.elapsed(),
                });
            }
        },
        None => child.wait().await,
    }
    .map_err(|e| ProcessError::Wait {
        program: program.to_string(),
        source: e,
    })?;

    // Background processes may inherit the pipes and outlive the child.
    let drain_deadline = tokio::time::Instant::now() + DRAIN_GRACE;
    let stdout = join_output(stdout_task, drain_deadline, program).await;
    let stderr = join_output(stderr_task, drain_deadline, program).await;
    let elapsed = started.elapsed();

    debug!(program, ?elapsed, %status, "child exited");

    if !status.success() {
        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        let detail = if detail.is_empty() {
            format!("exit status {}", code)
        } else {
            detail
        };
        return Err(ProcessError::NonZeroExit {
            program: program.to_string(),
            code,
            stderr: detail,
        });
    }

    Ok(ProcessOutput {
        stdout,
        stderr,
        elapsed,
    })
}

/// Convenience wrapper: expand `script`, launch it under `workdir`.
pub async fn run_script(
    script: &ScriptCommand,
    workdir: &Path,
    vars: &Placeholders,
    timeout: Option<Duration>,
) -> Result<ProcessOutput, ProcessError> {
    script.ensure_exists(workdir)?;
    let command = script.to_command(workdir, vars);
    run_command(command, &script.program_name(), timeout).await
}

type OutputBuffer = Arc<Mutex<Vec<u8>>>;

/// Reads `reader` into a shared buffer so output seen so far survives an
/// aborted reader.
fn spawn_reader<R>(mut reader: R) -> (OutputBuffer, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buffer = OutputBuffer::default();
    let sink = Arc::clone(&buffer);
    let handle = tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => lock(&sink).extend_from_slice(&chunk[..n]),
            }
        }
    });
    (buffer, handle)
}

fn lock(buffer: &OutputBuffer) -> MutexGuard<'_, Vec<u8>> {
    match buffer.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Waits for a reader until `deadline`, then aborts it and keeps whatever
/// it had read.
async fn join_output(
    reader: Option<(OutputBuffer, JoinHandle<()>)>,
    deadline: tokio::time::Instant,
    program: &str,
) -> String {
    let Some((buffer, mut handle)) = reader else {
        return String::new();
    };
    if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
        warn!(program, "output pipe still open after exit, not waiting for it");
        handle.abort();
    }
    let bytes = lock(&buffer);
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_expand() {
        let vars = Placeholders::new()
            .with("topic", "ram prices")
            .with("items", "20");
        assert_eq!(vars.expand("--topic={topic}"), "--topic=ram prices");
        assert_eq!(vars.expand("{items}/{items}"), "20/20");
        assert_eq!(vars.expand("{unknown}"), "{unknown}");
    }

    #[test]
    fn test_ensure_exists_reports_resolved_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let cmd = ScriptCommand::python("missing.py", &[]);
        match cmd.ensure_exists(dir.path()) {
            Err(ProcessError::ScriptNotFound(path)) => {
                assert_eq!(path, dir.path().join("missing.py"))
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_program_name() {
        let cmd = ScriptCommand::python("pipeline/preprocesamiento.py", &[]);
        assert_eq!(cmd.program_name(), "python3 pipeline/preprocesamiento.py");
        let cmd = ScriptCommand::new(None, "bin/run.sh", &[]);
        assert_eq!(cmd.program_name(), "bin/run.sh");
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;

        fn sh(script: &str) -> (tempfile::TempDir, ScriptCommand) {
            let dir = tempfile::TempDir::new().unwrap();
            std::fs::write(dir.path().join("task.sh"), script).unwrap();
            (dir, ScriptCommand::new(Some("sh"), "task.sh", &["{topic}"]))
        }

        #[tokio::test]
        async fn test_captures_stdout_and_args() {
            let (dir, cmd) = sh("echo \"topic=$1\"\n");
            let vars = Placeholders::new().with("topic", "elections");
            let out = run_script(&cmd, dir.path(), &vars, Some(Duration::from_secs(5)))
                .await
                .unwrap();
            assert_eq!(out.stdout.trim(), "topic=elections");
        }

        #[tokio::test]
        async fn test_non_zero_exit_carries_stderr() {
            let (dir, cmd) = sh("echo 'boom: missing column' >&2\nexit 1\n");
            let err = run_script(&cmd, dir.path(), &Placeholders::new(), None)
                .await
                .unwrap_err();
            match err {
                ProcessError::NonZeroExit { code, stderr, .. } => {
                    assert_eq!(code, "1");
                    assert_eq!(stderr, "boom: missing column");
                }
                other => panic!("unexpected: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_timeout_kills_child() {
            let (dir, cmd) = sh("sleep 30\n");
            let started = Instant::now();
            let err = run_script(
                &cmd,
                dir.path(),
                &Placeholders::new(),
                Some(Duration::from_millis(200)),
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ProcessError::TimedOut { .. }));
            assert!(started.elapsed() < Duration::from_secs(5));
        }

        #[tokio::test]
        async fn test_background_child_does_not_hold_the_caller() {
            let (dir, cmd) = sh("sleep 30 &\necho started\nexit 0\n");
            let started = Instant::now();
            let out = run_script(
                &cmd,
                dir.path(),
                &Placeholders::new(),
                Some(Duration::from_secs(5)),
            )
            .await
            .unwrap();
            assert_eq!(out.stdout.trim(), "started");
            assert!(started.elapsed() < DRAIN_GRACE + Duration::from_secs(2));
        }

        #[tokio::test]
        async fn test_stdin_is_closed() {
            // `read` fails immediately on a null stdin instead of blocking.
            let (dir, cmd) = sh("if read line; then echo got; else echo eof; fi\n");
            let out = run_script(
                &cmd,
                dir.path(),
                &Placeholders::new(),
                Some(Duration::from_secs(5)),
            )
            .await
            .unwrap();
            assert_eq!(out.stdout.trim(), "eof");
        }
    }
}
