//! The `ffprobe` producer process.
//!
//! [`ProbeCommand`] builds the `ffprobe` invocation that prints one JSON
//! object per video frame, and [`ProbeProcess`] owns the running child. The
//! child's stdout is handed to the analysis; its stderr is drained on a
//! dedicated thread for the whole run so `ffprobe` can never stall on a full
//! diagnostic pipe. Drained lines are logged at debug level and the last
//! few are kept for error reports.
//!
//! # Example
//!
//! ```no_run
//! use gopstat::ProbeCommand;
//!
//! let command = ProbeCommand::new("input.mp4");
//! println!("{command}");
//!
//! let mut process = command.spawn()?;
//! let stdout = process.take_stdout().expect("stdout is piped");
//! // ... read frames from `stdout` ...
//! drop(stdout);
//! process.finish()?;
//! # Ok::<(), gopstat::GopStatError>(())
//! ```

use std::collections::VecDeque;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{BufRead, BufReader};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::error::GopStatError;

/// Program run when neither [`ProbeCommand::with_program`] nor
/// [`PROGRAM_ENV`] says otherwise.
pub const DEFAULT_PROGRAM: &str = "ffprobe";

/// Environment variable overriding the probe program path.
pub const PROGRAM_ENV: &str = "GOPSTAT_FFPROBE";

/// Number of trailing diagnostic lines kept for error reports.
const DIAGNOSTIC_TAIL_LINES: usize = 32;

/// An `ffprobe` invocation listing video frame metadata as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    program: String,
    source: String,
}

impl ProbeCommand {
    /// Probe `source`, a file path or URL.
    pub fn new(source: impl Into<String>) -> Self {
        let program = std::env::var(PROGRAM_ENV)
            .ok()
            .filter(|program| !program.is_empty())
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());

        Self {
            program,
            source: source.into(),
        }
    }

    /// Run `program` instead of `ffprobe` from `PATH`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// The program that will be run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The media path or URL being probed.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The argument list passed to the program.
    pub fn arguments(&self) -> Vec<String> {
        [
            "-v",
            "error",
            "-show_entries",
            "frame",
            "-select_streams",
            "v",
            "-print_format",
            "json",
            self.source.as_str(),
        ]
        .iter()
        .map(|argument| argument.to_string())
        .collect()
    }

    /// Build the command with stdout and stderr piped.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    /// Start the process and begin draining its diagnostic output.
    ///
    /// # Errors
    ///
    /// Returns [`GopStatError::ProbeSpawn`] if the program cannot be started.
    pub fn spawn(&self) -> Result<ProbeProcess, GopStatError> {
        log::debug!("Running {self}");
        let spawn_error = |reason: String| GopStatError::ProbeSpawn {
            program: self.program.clone(),
            reason,
        };

        let mut child = self
            .to_command()
            .spawn()
            .map_err(|error| spawn_error(error.to_string()))?;

        let stdout = child.stdout.take();
        let diagnostics = match child.stderr.take() {
            Some(stderr) => match drain_diagnostics(stderr) {
                Ok(handle) => Some(handle),
                Err(error) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(spawn_error(format!("failed to start stderr reader: {error}")));
                }
            },
            None => None,
        };

        Ok(ProbeProcess {
            child,
            stdout,
            diagnostics,
            finished: false,
        })
    }
}

impl Display for ProbeCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{} {}", self.program, self.arguments().join(" "))
    }
}

/// A running probe process.
///
/// Dropping a process that was neither finished nor killed kills it.
pub struct ProbeProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    diagnostics: Option<JoinHandle<VecDeque<String>>>,
    finished: bool,
}

impl ProbeProcess {
    /// Take the frame stream. Returns `None` after the first call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Process id of the child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns [`GopStatError::ProbeFailed`] with the tail of the diagnostic
    /// output when the process exits unsuccessfully.
    pub fn finish(mut self) -> Result<(), GopStatError> {
        self.stdout = None;
        let status = self.child.wait()?;
        self.finished = true;
        let diagnostics = self.join_diagnostics();

        if status.success() {
            log::debug!("Probe process {} exited successfully", self.child.id());
            Ok(())
        } else {
            Err(GopStatError::ProbeFailed {
                status,
                diagnostics: if diagnostics.is_empty() {
                    "no diagnostic output".to_string()
                } else {
                    diagnostics.into_iter().collect::<Vec<_>>().join("\n")
                },
            })
        }
    }

    /// Stop the process without checking its exit status.
    pub fn kill(mut self) -> Result<(), GopStatError> {
        self.stdout = None;
        self.terminate()?;
        self.join_diagnostics();
        Ok(())
    }

    fn terminate(&mut self) -> Result<(), GopStatError> {
        if self.finished {
            return Ok(());
        }
        log::debug!("Killing probe process {}", self.child.id());
        // Killing an already exited child fails harmlessly; `wait` reaps it.
        let _ = self.child.kill();
        self.child.wait()?;
        self.finished = true;
        Ok(())
    }

    fn join_diagnostics(&mut self) -> VecDeque<String> {
        match self.diagnostics.take().map(JoinHandle::join) {
            Some(Ok(lines)) => lines,
            Some(Err(_)) => {
                log::warn!("Probe diagnostic reader panicked");
                VecDeque::new()
            }
            None => VecDeque::new(),
        }
    }
}

impl Drop for ProbeProcess {
    fn drop(&mut self) {
        self.stdout = None;
        if let Err(error) = self.terminate() {
            log::warn!("Failed to stop probe process: {error}");
        }
        self.join_diagnostics();
    }
}

/// Read `stderr` line by line until it closes, keeping the last lines.
fn drain_diagnostics(stderr: ChildStderr) -> std::io::Result<JoinHandle<VecDeque<String>>> {
    thread::Builder::new()
        .name("ffprobe-stderr".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut tail = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = String::from_utf8_lossy(&line).trim_end().to_string();
                        if text.is_empty() {
                            continue;
                        }
                        log::debug!("ffprobe: {text}");
                        if tail.len() == DIAGNOSTIC_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(text);
                    }
                    Err(error) => {
                        log::warn!("Failed to read probe diagnostics: {error}");
                        break;
                    }
                }
            }
            tail
        })
}
