//! Execution engine.
//!
//! Runs one command with a wall-clock timeout, capturing stdout and stderr
//! separately. Output is drained on background threads so a chatty command
//! cannot block on a full pipe while the harness polls for exit.
//!
//! The deadline covers the whole process group, not just the direct child:
//! a background process that keeps the output pipes open after the child
//! exits counts as still running and is killed when the deadline passes.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::errors::{HarnessError, HarnessResult};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// `ETXTBSY`: a just-written script can still be open for writing in a
/// concurrently forked process.
const TEXT_FILE_BUSY: i32 = 26;
const SPAWN_ATTEMPTS: u32 = 5;
/// How long pipes may stay open once the group has been killed.
const KILL_GRACE: Duration = Duration::from_secs(1);

// ============================================================================
// TYPES
// ============================================================================

/// What to run and where.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub envs: Vec<(String, String)>,
    /// If set, captured stdout is also written here once the command ends.
    pub stdout_sidecar: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            envs: Vec::new(),
            stdout_sidecar: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdout_sidecar(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_sidecar = Some(path.into());
        self
    }
}

/// Outcome of running a command to completion or to its timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Exit code; `None` if the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Short human-readable description of how the command ended.
    pub fn describe(&self) -> String {
        if self.timed_out {
            return format!("timed out after {:.1}s", self.elapsed.as_secs_f64());
        }
        match self.exit_code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Spawns commands with a fixed wall-clock budget.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    timeout: Duration,
}

impl Executor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Runs `spec` and waits for it, killing it when the timeout expires.
    ///
    /// Only a failure to start the process is an `Err`; non-zero exits and
    /// timeouts are reported through the returned [`ExecutionResult`].
    pub fn run(&self, spec: &CommandSpec) -> HarnessResult<ExecutionResult> {
        let start = Instant::now();
        let mut child = spawn(spec)?;
        debug!(program = %spec.program.display(), pid = child.id(), "spawned");

        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let deadline = start.checked_add(self.timeout);
        let (status, mut timed_out) = self.wait_with_timeout(&mut child, deadline, &spec.program)?;

        let output_deadline = if timed_out {
            Instant::now().checked_add(KILL_GRACE)
        } else {
            deadline
        };
        let mut stdout = receive(&stdout_reader, output_deadline);
        let mut stderr = receive(&stderr_reader, output_deadline);
        if !timed_out && (stdout.is_none() || stderr.is_none()) {
            warn!(program = %spec.program.display(), "output still held open after exit; killing process group");
            kill_tree(&mut child);
            timed_out = true;
            let grace = Instant::now().checked_add(KILL_GRACE);
            stdout = stdout.or_else(|| receive(&stdout_reader, grace));
            stderr = stderr.or_else(|| receive(&stderr_reader, grace));
        }
        let elapsed = start.elapsed();
        let stdout = stdout.unwrap_or_default();
        let stderr = stderr.unwrap_or_default();

        if let Some(sidecar) = &spec.stdout_sidecar {
            fs::write(sidecar, &stdout).map_err(|e| HarnessError::io(sidecar, e))?;
        }

        let result = ExecutionResult {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            timed_out,
            elapsed,
        };
        trace!(exit_code = ?result.exit_code, timed_out, elapsed_ms = elapsed.as_millis() as u64, "finished");
        Ok(result)
    }

    fn wait_with_timeout(
        &self,
        child: &mut Child,
        deadline: Option<Instant>,
        program: &Path,
    ) -> HarnessResult<(ExitStatus, bool)> {
        loop {
            if let Some(status) = child.try_wait().map_err(|e| HarnessError::io(program, e))? {
                return Ok((status, false));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(program = %program.display(), timeout_s = self.timeout.as_secs_f64(), "timed out; killing");
                kill_tree(child);
                let status = child.wait().map_err(|e| HarnessError::io(program, e))?;
                return Ok((status, true));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn spawn(spec: &CommandSpec) -> HarnessResult<Child> {
    let mut attempt = 0;
    loop {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .envs(spec.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(e) if e.raw_os_error() == Some(TEXT_FILE_BUSY) && attempt + 1 < SPAWN_ATTEMPTS => {
                attempt += 1;
                thread::sleep(POLL_INTERVAL * attempt);
            }
            Err(source) => {
                return Err(HarnessError::Spawn {
                    program: spec.program.clone(),
                    source,
                })
            }
        }
    }
}

/// Kills the child's whole process group so grandchildren holding the
/// output pipes die with it.
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: plain signal delivery to the group created at spawn time.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

/// Reads `pipe` to EOF on a background thread and hands the bytes back
/// through a channel.
fn drain<R>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = pipe.read_to_end(&mut buf) {
                debug!(error = %e, "output pipe read failed");
            }
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Output of one reader, or `None` if the pipe is still open at `deadline`.
fn receive(reader: &Option<Receiver<Vec<u8>>>, deadline: Option<Instant>) -> Option<Vec<u8>> {
    let Some(rx) = reader else {
        return Some(Vec::new());
    };
    let received = match deadline {
        Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    match received {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_distinguishes_timeout_from_exit() {
        let mut result = ExecutionResult {
            exit_code: Some(3),
            stdout: String::new(),
            stderr: String::new(),
            timed_out: false,
            elapsed: Duration::from_millis(5),
        };
        assert_eq!(result.describe(), "exit status 3");
        assert!(!result.success());

        result.timed_out = true;
        result.exit_code = None;
        result.elapsed = Duration::from_millis(2040);
        assert_eq!(result.describe(), "timed out after 2.0s");
    }

    #[cfg(unix)]
    #[test]
    fn background_process_holding_output_is_killed_at_deadline() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("/bin/sh", tmp.path())
            .arg("-c")
            .arg("sleep 30 &\necho started");
        let executor = Executor::new(Duration::from_secs(1));

        let start = Instant::now();
        let result = executor.run(&spec).unwrap();
        assert!(start.elapsed() < Duration::from_secs(10), "{:?}", start.elapsed());
        assert!(result.timed_out);
        assert!(!result.success());
    }

    #[cfg(unix)]
    #[test]
    fn quick_command_is_not_affected_by_deadline() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("/bin/sh", tmp.path())
            .arg("-c")
            .arg("echo out; echo err >&2");
        let result = Executor::new(Duration::from_secs(10)).run(&spec).unwrap();
        assert!(result.success(), "{result:?}");
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
    }
}
