//! Subprocess execution with a deadline and cooperative cancellation.
//!
//! Used for the Senior CLI and for Junior's shell tools. Every child leads
//! its own process group. On timeout or cancellation the whole group is
//! killed before returning, and anything the command left running in the
//! background is killed once it exits, so no process outlives the call that
//! started it.

use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    Spawn(std::io::Error),

    #[error("process wait failed: {0}")]
    Wait(std::io::Error),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,
}

/// Captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, as a shell would interleave them on a tty.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}{}", self.stdout, self.stderr),
        }
    }
}

/// Run `cmd` to completion, feeding `stdin` if given.
///
/// Stdout and stderr are always captured. The child is killed if `timeout`
/// elapses or `cancel` fires first.
pub async fn run_process(
    mut cmd: Command,
    stdin: Option<String>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ProcessError> {
    let start = Instant::now();
    let deadline = tokio::time::Instant::now() + timeout;
    prepare(&mut cmd, stdin.is_some());

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    debug!(program = %program, "spawning process");

    let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;
    let pid = child.id();

    // Take the pipes so the child can still be killed while they drain.
    let stdin_handle = match (child.stdin.take(), stdin) {
        (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
            let _ = pipe.write_all(input.as_bytes()).await;
            let _ = pipe.shutdown().await;
        })),
        _ => None,
    };
    let mut stdout_handle = drain(child.stdout.take());
    let mut stderr_handle = drain(child.stderr.take());

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(ProcessError::Wait)?;
            // Background jobs may still hold the pipes open.
            kill_process_group(pid);
            let drained = tokio::time::timeout_at(deadline, async {
                tokio::join!(&mut stdout_handle, &mut stderr_handle)
            })
            .await;
            let (stdout_bytes, stderr_bytes) = match drained {
                Ok((out, err)) => (out.unwrap_or_default(), err.unwrap_or_default()),
                Err(_) => {
                    warn!(program = %program, "output still open at deadline; discarding");
                    abort_io(stdin_handle, stdout_handle, stderr_handle);
                    (Vec::new(), Vec::new())
                }
            };
            let output = ProcessOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code(),
            };
            debug!(
                program = %program,
                exit_code = ?output.exit_code,
                duration_ms = start.elapsed().as_millis() as u64,
                "process completed"
            );
            Ok(output)
        }
        () = tokio::time::sleep_until(deadline) => {
            kill_process_group(pid);
            let _ = child.kill().await;
            abort_io(stdin_handle, stdout_handle, stderr_handle);
            warn!(program = %program, timeout_ms = timeout.as_millis() as u64, "process timed out");
            Err(ProcessError::TimedOut(timeout))
        }
        () = cancel.cancelled() => {
            kill_process_group(pid);
            let _ = child.kill().await;
            abort_io(stdin_handle, stdout_handle, stderr_handle);
            debug!(program = %program, "process cancelled");
            Err(ProcessError::Cancelled)
        }
    }
}

/// Piped stdio, kill on drop, and a fresh process group.
fn prepare(cmd: &mut Command, has_stdin: bool) {
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(if has_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    })
}

/// SIGKILL the process group led by `pid`. A group with no members left is
/// ignored.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|p| libc::pid_t::try_from(p).ok()) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

// ── Line streaming ──────────────────────────────────────────────────

/// A running process whose stdout is consumed one line at a time.
///
/// The timeout covers the whole lifetime, not each line. Dropping the value
/// kills the child.
pub struct ProcessLines {
    program: String,
    child: Child,
    pid: Option<u32>,
    lines: Lines<BufReader<ChildStdout>>,
    stdin: Option<JoinHandle<()>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
    deadline: tokio::time::Instant,
    timeout: Duration,
    cancel: CancellationToken,
}

/// Spawn `cmd` for line-by-line reading of its stdout.
pub fn spawn_lines(
    mut cmd: Command,
    stdin: Option<String>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ProcessLines, ProcessError> {
    prepare(&mut cmd, stdin.is_some());

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    debug!(program = %program, "spawning streaming process");

    let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;
    let pid = child.id();
    let stdin_handle = match (child.stdin.take(), stdin) {
        (Some(mut pipe), Some(input)) => Some(tokio::spawn(async move {
            let _ = pipe.write_all(input.as_bytes()).await;
            let _ = pipe.shutdown().await;
        })),
        _ => None,
    };
    let stderr_handle = drain(child.stderr.take());
    let stdout = child.stdout.take().ok_or_else(|| {
        ProcessError::Spawn(std::io::Error::other("stdout was not captured"))
    })?;

    Ok(ProcessLines {
        program,
        child,
        pid,
        lines: BufReader::new(stdout).lines(),
        stdin: stdin_handle,
        stderr: Some(stderr_handle),
        deadline: tokio::time::Instant::now() + timeout,
        timeout,
        cancel: cancel.clone(),
    })
}

impl ProcessLines {
    /// Next stdout line without its terminator, or `None` at end of output.
    pub async fn next_line(&mut self) -> Result<Option<String>, ProcessError> {
        let timeout = self.timeout;
        let failure = tokio::select! {
            biased;
            () = self.cancel.cancelled() => ProcessError::Cancelled,
            () = tokio::time::sleep_until(self.deadline) => ProcessError::TimedOut(timeout),
            line = self.lines.next_line() => return line.map_err(ProcessError::Wait),
        };
        self.kill().await;
        Err(failure)
    }

    /// Wait for the process to exit once stdout is drained. The returned
    /// output has an empty `stdout`.
    pub async fn finish(mut self) -> Result<ProcessOutput, ProcessError> {
        let timeout = self.timeout;
        let outcome = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ProcessError::Cancelled),
            () = tokio::time::sleep_until(self.deadline) => Err(ProcessError::TimedOut(timeout)),
            status = self.child.wait() => status.map_err(ProcessError::Wait),
        };
        match outcome {
            Ok(status) => {
                kill_process_group(self.pid);
                let stderr = match self.stderr.take() {
                    Some(mut handle) => {
                        match tokio::time::timeout_at(self.deadline, &mut handle).await {
                            Ok(bytes) => bytes.unwrap_or_default(),
                            Err(_) => {
                                handle.abort();
                                Vec::new()
                            }
                        }
                    }
                    None => Vec::new(),
                };
                debug!(program = %self.program, exit_code = ?status.code(), "streaming process completed");
                Ok(ProcessOutput {
                    stdout: String::new(),
                    stderr: String::from_utf8_lossy(&stderr).into_owned(),
                    exit_code: status.code(),
                })
            }
            Err(e) => {
                self.kill().await;
                Err(e)
            }
        }
    }

    async fn kill(&mut self) {
        kill_process_group(self.pid);
        let _ = self.child.kill().await;
        if let Some(h) = self.stdin.take() {
            h.abort();
        }
        if let Some(h) = self.stderr.take() {
            h.abort();
        }
        debug!(program = %self.program, "streaming process killed");
    }
}

fn abort_io(
    stdin: Option<JoinHandle<()>>,
    stdout: JoinHandle<Vec<u8>>,
    stderr: JoinHandle<Vec<u8>>,
) {
    if let Some(h) = stdin {
        h.abort();
    }
    stdout.abort();
    stderr.abort();
}

/// Build a `sh -c` command running in `dir`.
pub fn shell_command(command: &str, dir: &std::path::Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(dir);
    cmd
}
