//! Bridged subprocess lifecycle manager.
//!
//! Spawns the console process, turns its stdout/stderr into line events on
//! two buses and drains a third bus into its stdin:
//!
//! ```text
//! child stdout ──reader──► stdout_line bus ──► listeners
//! child stderr ──reader──► stderr_line bus ──► listeners
//! producers ──► stdin_write bus ──writer──► child stdin
//! ```

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dgbridge_core::{EventBus, ListenerId};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, trace, warn};

/// Default time to wait for the process to exit after SIGINT.
const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for subprocess spawning.
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Executable to run (looked up in `PATH` when not a path).
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory for the process.
    pub working_directory: PathBuf,
    /// Grace period between SIGINT and SIGKILL on stop.
    pub terminate_timeout: Duration,
}

impl SpawnConfig {
    /// Configuration running `program` with `args` in the current directory.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_directory: std::env::current_dir().unwrap_or_default(),
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
        }
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    /// Set the SIGINT grace period.
    #[must_use]
    pub const fn with_terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }
}

/// The three buses of a subprocess.
///
/// Created before the process starts so listeners can register without
/// missing the first lines of output.
#[derive(Debug, Clone, Default)]
pub struct SubprocessBuses {
    /// Lines read from stdout, newline stripped.
    pub stdout_line: EventBus<String>,
    /// Lines read from stderr, newline stripped.
    pub stderr_line: EventBus<String>,
    /// Lines to write to stdin, without trailing newline.
    pub stdin_write: EventBus<String>,
}

/// How the subprocess ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit status, `None` if it could not be collected.
    pub status: Option<ExitStatus>,
}

impl ProcessExit {
    /// Exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }
}

/// Write handle for the subprocess stdin.
///
/// Cloneable; every clone publishes on the same `stdin_write` bus, which is
/// drained by a single writer task so writes never interleave.
#[derive(Debug, Clone)]
pub struct StdinWriter {
    bus: EventBus<String>,
    open: Arc<AtomicBool>,
}

impl StdinWriter {
    /// Writer publishing on `bus`, initially open.
    pub fn for_bus(bus: EventBus<String>) -> Self {
        Self {
            bus,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Queue `line` (a trailing newline is added on write).
    ///
    /// Fails with [`SubprocessError::StdinClosed`] once the process exited,
    /// was stopped, or a previous write failed. A line that reaches no stdin
    /// consumer is reported the same way.
    pub fn write_line(&self, line: impl Into<String>) -> Result<(), SubprocessError> {
        if !self.is_open() || self.bus.broadcast(line.into()) == 0 {
            return Err(SubprocessError::StdinClosed);
        }
        Ok(())
    }

    /// Whether the writer task is still accepting lines.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }
}

/// Manager for a single bridged subprocess.
pub struct SubprocessManager {
    pid: Option<u32>,
    buses: SubprocessBuses,
    stdin: StdinWriter,
    stdin_listener: ListenerId,
    stop_tx: Mutex<Option<oneshot::Sender<()>>>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

impl std::fmt::Debug for SubprocessManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessManager")
            .field("pid", &self.pid)
            .field("stdin_open", &self.stdin.is_open())
            .finish_non_exhaustive()
    }
}

impl SubprocessManager {
    /// Spawn the subprocess with fresh buses.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: SpawnConfig) -> Result<Self, SubprocessError> {
        Self::start_with_buses(config, SubprocessBuses::default())
    }

    /// Spawn the subprocess, publishing on (and draining) the given buses.
    pub fn start_with_buses(
        config: SpawnConfig,
        buses: SubprocessBuses,
    ) -> Result<Self, SubprocessError> {
        let program = config.program.display().to_string();
        if !config.working_directory.is_dir() {
            return Err(SubprocessError::SpawnFailed {
                program,
                reason: format!(
                    "working directory {} does not exist",
                    config.working_directory.display()
                ),
            });
        }

        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .current_dir(&config.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            program = %program,
            args = ?config.args,
            working_dir = %config.working_directory.display(),
            "Spawning subprocess"
        );
        let mut child = cmd.spawn().map_err(|e| SubprocessError::SpawnFailed {
            program: program.clone(),
            reason: e.to_string(),
        })?;
        let pid = child.id();

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(SubprocessError::SpawnFailed {
                program,
                reason: "Failed to capture standard streams".to_string(),
            });
        };

        spawn_line_reader("stdout", stdout, buses.stdout_line.clone());
        spawn_line_reader("stderr", stderr, buses.stderr_line.clone());

        let stdin_writer = StdinWriter::for_bus(buses.stdin_write.clone());
        let stdin_listener = spawn_stdin_writer(stdin, &stdin_writer);

        let (stop_tx, stop_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = watch::channel(None);
        spawn_exit_monitor(ExitMonitor {
            child,
            pid,
            stop_rx,
            exit_tx,
            stdin: stdin_writer.clone(),
            stdin_listener,
            terminate_timeout: config.terminate_timeout,
        });

        info!(pid, "Subprocess started");
        Ok(Self {
            pid,
            buses,
            stdin: stdin_writer,
            stdin_listener,
            stop_tx: Mutex::new(Some(stop_tx)),
            exit_rx,
        })
    }

    /// OS process id, if known.
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Bus of stdout lines.
    pub const fn stdout_line(&self) -> &EventBus<String> {
        &self.buses.stdout_line
    }

    /// Bus of stderr lines.
    pub const fn stderr_line(&self) -> &EventBus<String> {
        &self.buses.stderr_line
    }

    /// Bus drained into stdin.
    pub const fn stdin_write(&self) -> &EventBus<String> {
        &self.buses.stdin_write
    }

    /// A cloneable stdin write handle.
    pub fn stdin_writer(&self) -> StdinWriter {
        self.stdin.clone()
    }

    /// Write one line to the subprocess stdin.
    pub fn write_stdin(&self, line: impl Into<String>) -> Result<(), SubprocessError> {
        self.stdin.write_line(line)
    }

    /// Whether the process has exited.
    pub fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    /// Wait for the process to exit.
    pub async fn wait(&self) -> ProcessExit {
        let mut rx = self.exit_rx.clone();
        rx.wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|exit| *exit)
            .unwrap_or_default()
    }

    /// Terminate the process and release its streams.
    ///
    /// Sends SIGINT, waits for the configured grace period, then kills.
    /// Calling this more than once, or after the process exited, only waits
    /// for the recorded exit.
    pub async fn stop(&self) -> ProcessExit {
        let stop_tx = self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = stop_tx {
            debug!(pid = self.pid, "Stopping subprocess");
            self.stdin.close();
            self.buses.stdin_write.unregister(self.stdin_listener);
            // Err means the monitor already finished: the process exited.
            let _ = tx.send(());
        }
        self.wait().await
    }
}

/// Errors from subprocess operations.
#[derive(Debug, thiserror::Error)]
pub enum SubprocessError {
    #[error("Failed to spawn subprocess {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Subprocess stdin is closed")]
    StdinClosed,
}

/// Decode one raw line: strip `\n` and a preceding `\r`, replace invalid
/// UTF-8.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

fn spawn_line_reader<R>(stream: &'static str, reader: R, bus: EventBus<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = decode_line(&buf);
                    trace!(stream, line = %line, "Subprocess output");
                    bus.broadcast(line);
                }
                Err(e) => {
                    warn!(stream, error = %e, "Failed to read subprocess output");
                    break;
                }
            }
        }
        bus.close();
        debug!(stream, "Subprocess reader finished");
    });
}

fn spawn_stdin_writer(stdin: ChildStdin, writer: &StdinWriter) -> ListenerId {
    let mut listener = writer.bus.register();
    let id = listener.id();
    let writer = writer.clone();
    tokio::spawn(async move {
        let mut stdin = stdin;
        while let Some(line) = listener.recv().await {
            trace!(line = %line, "Writing to subprocess stdin");
            if let Err(e) = write_line(&mut stdin, &line).await {
                warn!(error = %e, "Failed to write to subprocess stdin");
                break;
            }
        }
        writer.close();
        writer.bus.unregister(id);
        debug!("Subprocess stdin writer finished");
    });
    id
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

struct ExitMonitor {
    child: Child,
    pid: Option<u32>,
    stop_rx: oneshot::Receiver<()>,
    exit_tx: watch::Sender<Option<ProcessExit>>,
    stdin: StdinWriter,
    stdin_listener: ListenerId,
    terminate_timeout: Duration,
}

fn spawn_exit_monitor(monitor: ExitMonitor) {
    let ExitMonitor {
        mut child,
        pid,
        stop_rx,
        exit_tx,
        stdin,
        stdin_listener,
        terminate_timeout,
    } = monitor;
    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = stop_rx => terminate(&mut child, pid, terminate_timeout).await,
        };
        let status = match status {
            Ok(status) => {
                info!(pid, ?status, "Subprocess exited");
                Some(status)
            }
            Err(e) => {
                warn!(pid, error = %e, "Error waiting for subprocess");
                None
            }
        };
        stdin.close();
        stdin.bus.unregister(stdin_listener);
        let _ = exit_tx.send(Some(ProcessExit { status }));
    });
}

async fn terminate(
    child: &mut Child,
    pid: Option<u32>,
    timeout: Duration,
) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            // SAFETY: pid is a valid process ID obtained from our own Child handle.
            // kill(2) with SIGINT is safe to call on any owned subprocess.
            #[allow(unsafe_code)]
            #[allow(clippy::cast_possible_wrap)]
            let ret = unsafe { libc::kill(pid as i32, libc::SIGINT) };
            if ret != 0 {
                let err = std::io::Error::last_os_error();
                warn!(pid, error = %err, "Failed to send SIGINT");
            }
        }
    }

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(result) => result,
        Err(_) => {
            warn!(pid, "Timeout waiting for graceful shutdown, killing");
            child.kill().await?;
            child.wait().await
        }
    }
}
