//! Analysis configuration.
//!
//! [`AnalysisOptions`] is a builder that threads the chunk threshold, the
//! decoder's record size limit and an optional progress callback into an
//! analysis run. Nothing is held in global state.
//!
//! # Example
//!
//! ```
//! use gopstat::AnalysisOptions;
//!
//! let options = AnalysisOptions::new()
//!     .with_chunk_max_duration(6.0)
//!     .with_max_record_len(16 * 1024);
//! assert_eq!(options.chunk_max_duration(), 6.0);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::aggregate::DEFAULT_CHUNK_MAX_DURATION;
use crate::decoder::DEFAULT_MAX_RECORD_LEN;
use crate::progress::{NoOpProgress, ProgressCallback};

/// Smallest accepted record size limit.
const MIN_RECORD_LEN: usize = 1024;

/// Configuration for an analysis run.
///
/// A default-constructed value uses a 10 second chunk threshold, a 64 KiB
/// record limit and no progress reporting.
#[derive(Clone)]
pub struct AnalysisOptions {
    /// Chunk duration threshold in seconds. Validated when the run starts.
    pub(crate) chunk_max_duration: f64,
    /// Upper bound for one record buffer.
    pub(crate) max_record_len: usize,
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
}

impl Debug for AnalysisOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("AnalysisOptions")
            .field("chunk_max_duration", &self.chunk_max_duration)
            .field("max_record_len", &self.max_record_len)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            chunk_max_duration: DEFAULT_CHUNK_MAX_DURATION,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
        }
    }

    /// Set the chunk duration threshold, in seconds.
    ///
    /// A chunk closes once its accumulated duration strictly exceeds this
    /// value. Must be positive and finite; otherwise the analysis fails with
    /// [`GopStatError::InvalidChunkDuration`](crate::GopStatError::InvalidChunkDuration).
    #[must_use]
    pub fn with_chunk_max_duration(mut self, seconds: f64) -> Self {
        self.chunk_max_duration = seconds;
        self
    }

    /// Set the largest accepted record buffer, in bytes.
    ///
    /// Clamped to a minimum of 1 KiB.
    #[must_use]
    pub fn with_max_record_len(mut self, bytes: usize) -> Self {
        self.max_record_len = bytes.max(MIN_RECORD_LEN);
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how often the progress callback fires.
    ///
    /// A value of 1 means every frame. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The chunk duration threshold, in seconds.
    pub fn chunk_max_duration(&self) -> f64 {
        self.chunk_max_duration
    }

    /// The largest accepted record buffer, in bytes.
    pub fn max_record_len(&self) -> usize {
        self.max_record_len
    }
}
