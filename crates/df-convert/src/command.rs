//! Builder for running the conversion engine with a deadline.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Default command timeout: 3 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// How long to keep draining stdout/stderr after the child exits. Helpers
/// spawned by the engine can hold the pipes open past its exit.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// What happened to one engine invocation.
#[derive(Debug)]
pub enum SubprocessOutcome {
    /// Exit status 0.
    Success { stdout: String, stderr: String },
    /// The process exited with a non-zero status or was killed by a signal
    /// (`code` is `None` in that case).
    NonZeroExit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The deadline expired; the process was killed and reaped.
    TimedOut { after: Duration },
    /// The process could not be spawned or waited on.
    Crashed(std::io::Error),
}

impl SubprocessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubprocessOutcome::Success { .. })
    }
}

/// A builder for constructing and executing engine invocations.
///
/// # Example
///
/// ```no_run
/// use df_convert::{EngineCommand, SubprocessOutcome};
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # async fn example() {
/// let outcome = EngineCommand::new(PathBuf::from("soffice"))
///     .args(["--headless", "--convert-to", "pdf"])
///     .arg("/tmp/uploads/report.docx")
///     .timeout(Duration::from_secs(180))
///     .run()
///     .await;
/// if let SubprocessOutcome::TimedOut { after } = outcome {
///     eprintln!("gave up after {after:?}");
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EngineCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl EngineCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_timeout(&self) -> Duration {
        self.timeout
    }

    /// File name of the program, for log messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the command to completion or until the timeout expires.
    ///
    /// On Unix the child leads its own process group, and that group is
    /// killed before this returns on every path, so helpers the engine
    /// forked never outlive the call. On timeout the child is also reaped.
    /// If the returned future is dropped early the child is killed as well.
    pub async fn run(&self) -> SubprocessOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so helpers forked by the engine die with it.
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return SubprocessOutcome::Crashed(e),
        };
        let mut group = ProcessGroup(child.id());

        let stdout = child.stdout.take().map(|p| tokio::spawn(read_pipe(p)));
        let stderr = child.stderr.take().map(|p| tokio::spawn(read_pipe(p)));

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                // Leftover helpers would keep working after the slot is
                // released, and would hold the pipes open.
                group.kill();
                let stdout = drain(stdout).await;
                let stderr = drain(stderr).await;
                if status.success() {
                    SubprocessOutcome::Success { stdout, stderr }
                } else {
                    SubprocessOutcome::NonZeroExit {
                        code: status.code(),
                        stdout,
                        stderr,
                    }
                }
            }
            Ok(Err(e)) => {
                terminate(&mut child, &mut group).await;
                abort(stdout);
                abort(stderr);
                SubprocessOutcome::Crashed(e)
            }
            Err(_elapsed) => {
                tracing::warn!(
                    program = %self.program_name(),
                    timeout = ?self.timeout,
                    "Engine exceeded its deadline; killing"
                );
                terminate(&mut child, &mut group).await;
                abort(stdout);
                abort(stderr);
                SubprocessOutcome::TimedOut {
                    after: self.timeout,
                }
            }
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(mut pipe: R) -> Vec<u8> {
    let mut buf = Vec::new();
    // Partial output is still useful for diagnostics.
    let _ = pipe.read_to_end(&mut buf).await;
    buf
}

async fn drain(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).to_string(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

fn abort(handle: Option<JoinHandle<Vec<u8>>>) {
    if let Some(h) = handle {
        h.abort();
    }
}

/// Kill the child (and its process group) and reap it.
async fn terminate(child: &mut Child, group: &mut ProcessGroup) {
    group.kill();

    if let Err(e) = child.start_kill() {
        // Already exited (and possibly reaped) is fine.
        tracing::debug!("start_kill failed: {e}");
    }

    if let Err(e) = child.wait().await {
        tracing::warn!("Failed to reap engine process: {e}");
    }
}

/// The engine's process group, killed at most once and at the latest on drop.
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    fn kill(&mut self) {
        let Some(pgid) = self.0.take() else {
            return;
        };

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
                // ESRCH: the whole group has already exited.
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => tracing::debug!(pgid, "killpg failed: {e}"),
            }
        }

        #[cfg(not(unix))]
        let _ = pgid;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
