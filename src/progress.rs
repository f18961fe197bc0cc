//! Progress reporting.
//!
//! This module provides [`ProgressCallback`] for monitoring a running
//! analysis and [`ProgressInfo`] for progress snapshots. The total number of
//! frames is never known up front, so progress is reported as counters only.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gopstat::{AnalysisOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{} frames, {} GOPs after {:?}", info.frames, info.gops, info.elapsed);
//!     }
//! }
//!
//! let options = AnalysisOptions::new()
//!     .with_progress(Arc::new(PrintProgress))
//!     .with_batch_size(250);
//! ```

use std::time::{Duration, Instant};

/// A snapshot of analysis progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled
/// by [`AnalysisOptions::with_batch_size`](crate::AnalysisOptions::with_batch_size).
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frame records decoded so far.
    pub frames: u64,
    /// GOP reports emitted so far.
    pub gops: u64,
    /// Chunks closed so far.
    pub chunks: u64,
    /// Bytes consumed from the input stream.
    pub bytes_consumed: u64,
    /// Effective timestamp of the latest frame, in seconds.
    pub current_timestamp: Option<f64>,
    /// Wall-clock time since the analysis started.
    pub elapsed: Duration,
}

/// Trait for receiving progress updates during an analysis.
///
/// Progress callbacks are infallible: they observe but cannot halt the
/// analysis.
pub trait ProgressCallback: Send + Sync {
    /// Called every `batch_size` frames.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. Used when no callback is set.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks when to fire the callback.
pub(crate) struct ProgressTracker {
    started: Instant,
    batch_size: u64,
    since_last: u64,
}

impl ProgressTracker {
    pub(crate) fn new(batch_size: u64) -> Self {
        Self {
            started: Instant::now(),
            batch_size: batch_size.max(1),
            since_last: 0,
        }
    }

    /// Count one frame; returns `true` when a report is due.
    pub(crate) fn tick(&mut self) -> bool {
        self.since_last += 1;
        if self.since_last >= self.batch_size {
            self.since_last = 0;
            true
        } else {
            false
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
