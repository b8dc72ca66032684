//! Subprocess transport speaking over the child's stdio.
//!
//! stdout and stderr are merged into one line stream by two pump threads that
//! feed a single channel. The pumps never interpret lines; there is still only
//! one consumer of the merged stream.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, TransportError};
use crate::line::LineReader;
use crate::{ReadOutcome, Transport, LINE_TERMINATOR};

/// Configuration for launching a line-protocol subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfig {
    /// Executable to run; bare names are resolved through `PATH`
    pub program: PathBuf,
    /// Command-line arguments
    pub args: Vec<String>,
    /// How long a single read waits before reporting [`ReadOutcome::Idle`]
    /// Default: 150 milliseconds
    pub read_timeout: Duration,
}

impl ProcessConfig {
    /// Create a config for `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            read_timeout: Duration::from_millis(150),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub(crate) fn describe(&self) -> String {
        if self.args.is_empty() {
            self.program.display().to_string()
        } else {
            format!("{} {}", self.program.display(), self.args.join(" "))
        }
    }
}

/// Transport backed by a child process.
pub struct ProcessTransport {
    description: String,
    child: Mutex<Child>,
    stdin: Mutex<Option<ChildStdin>>,
    lines: Mutex<mpsc::Receiver<io::Result<String>>>,
    read_timeout: Duration,
    closed: AtomicBool,
}

impl ProcessTransport {
    /// Launch the configured program with piped stdio and no terminal.
    ///
    /// # Errors
    ///
    /// [`TransportError::NotFound`] when an explicit path does not exist or
    /// the program cannot be resolved, [`TransportError::SpawnFailed`] for any
    /// other launch failure.
    pub fn spawn(config: &ProcessConfig) -> Result<Self> {
        if is_explicit_path(&config.program) && !config.program.exists() {
            return Err(TransportError::NotFound(config.program.clone()));
        }

        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(&config.program, e))?;

        let (tx, rx) = mpsc::channel();
        let pumps = (child.stdout.take(), child.stderr.take());
        let stdin = child.stdin.take();

        let started = match pumps {
            (Some(stdout), Some(stderr)) => spawn_pump("stdout", stdout, tx.clone())
                .and_then(|_| spawn_pump("stderr", stderr, tx)),
            _ => Err(io::Error::new(
                io::ErrorKind::Other,
                "child stdio was not captured",
            )),
        };
        if let Err(source) = started {
            let _ = child.kill();
            let _ = child.wait();
            return Err(TransportError::SpawnFailed {
                program: config.program.display().to_string(),
                source,
            });
        }

        tracing::debug!(
            pid = child.id(),
            command = %config.describe(),
            "spawned line-protocol process"
        );

        Ok(Self {
            description: config.describe(),
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            lines: Mutex::new(rx),
            read_timeout: config.read_timeout,
            closed: AtomicBool::new(false),
        })
    }
}

impl Transport for ProcessTransport {
    fn read_line(&self) -> Result<ReadOutcome> {
        let lines = self.lines.lock();
        match lines.recv_timeout(self.read_timeout) {
            Ok(Ok(line)) => Ok(ReadOutcome::Line(line)),
            Ok(Err(e)) => Err(TransportError::Io(e)),
            Err(RecvTimeoutError::Timeout) => Ok(ReadOutcome::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(ReadOutcome::EndOfStream),
        }
    }

    fn write_line(&self, text: &str) -> Result<()> {
        let mut stdin = self.stdin.lock();
        let pipe = stdin.as_mut().ok_or(TransportError::Closed)?;
        let mut framed = String::with_capacity(text.len() + LINE_TERMINATOR.len());
        framed.push_str(text);
        framed.push_str(LINE_TERMINATOR);
        pipe.write_all(framed.as_bytes())?;
        pipe.flush()?;
        Ok(())
    }

    fn is_alive(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        matches!(self.child.lock().try_wait(), Ok(None))
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropping stdin first lets a well-behaved child see EOF.
        drop(self.stdin.lock().take());

        let mut child = self.child.lock();
        if let Err(e) = child.kill() {
            tracing::trace!("kill on closed process: {}", e);
        }
        match child.wait() {
            Ok(status) => tracing::debug!(%status, "line-protocol process reaped"),
            Err(e) => tracing::debug!("failed to reap line-protocol process: {}", e),
        }
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_explicit_path(program: &Path) -> bool {
    program.components().count() > 1
}

fn spawn_error(program: &Path, source: io::Error) -> TransportError {
    if source.kind() == io::ErrorKind::NotFound {
        TransportError::NotFound(program.to_path_buf())
    } else {
        TransportError::SpawnFailed {
            program: program.display().to_string(),
            source,
        }
    }
}

fn spawn_pump<R>(
    name: &'static str,
    source: R,
    tx: mpsc::Sender<io::Result<String>>,
) -> io::Result<thread::JoinHandle<()>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(format!("cec-bridge-{name}"))
        .spawn(move || {
            let mut reader = LineReader::new(source);
            loop {
                match reader.read_line() {
                    Ok(Some(line)) => {
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
            tracing::trace!(stream = name, "pump finished");
        })
}
