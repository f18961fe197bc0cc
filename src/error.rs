//! Error types for the `gopstat` crate.
//!
//! This module defines [`GopStatError`], the unified error type returned by all
//! fallible operations in the crate. End of input is reported through the
//! dedicated [`GopStatError::EndOfStream`] variant so callers can tell a
//! finished stream apart from a broken one.

use std::{io::Error as IoError, process::ExitStatus};

use thiserror::Error;

/// The unified error type for all `gopstat` operations.
///
/// Every public method that can fail returns `Result<T, GopStatError>`.
/// Variants carry enough context (the offending buffer, byte offset or
/// process diagnostics) to trace a problem back to the producer of the
/// frame stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GopStatError {
    /// The input stream is exhausted or was closed.
    ///
    /// This is the normal way for an analysis to end and is not a failure.
    #[error("End of frame stream")]
    EndOfStream,

    /// An expected delimiter or terminator was not found in the input.
    #[error("Record framing error at byte {offset}: {reason}")]
    RecordFraming {
        /// What the decoder expected and what it found instead.
        reason: String,
        /// Number of input bytes consumed when the error was detected.
        offset: u64,
    },

    /// A record buffer does not conform to the frame schema.
    #[error("Failed to decode frame record ({reason}): {record}")]
    RecordDecode {
        /// Underlying parser message, naming the offending field when known.
        reason: String,
        /// The offending record buffer, lossily converted to UTF-8.
        record: String,
    },

    /// The chunk duration threshold is not a positive, finite number.
    #[error("Chunk duration must be a positive number of seconds, got {0}")]
    InvalidChunkDuration(f64),

    /// The probe process could not be started.
    #[error("Failed to start {program}: {reason}")]
    ProbeSpawn {
        /// Program that was executed.
        program: String,
        /// Underlying reason the spawn failed.
        reason: String,
    },

    /// The probe process exited unsuccessfully.
    #[error("Probe process exited with {status}: {diagnostics}")]
    ProbeFailed {
        /// Exit status reported by the operating system.
        status: ExitStatus,
        /// The last lines the process wrote to its diagnostic stream.
        diagnostics: String,
    },

    /// An I/O error occurred while reading the frame stream.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl GopStatError {
    /// Returns `true` for [`GopStatError::EndOfStream`].
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, GopStatError::EndOfStream)
    }
}
