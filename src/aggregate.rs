//! Group of Pictures and chunk bitrate aggregation.
//!
//! [`BitrateAggregator`] folds a sequence of [`FrameRecord`]s into
//! [`GopReport`]s. Frames are accumulated into the current Group of Pictures
//! until the next intra-coded frame closes it; closed GOPs are accumulated
//! into a chunk until the chunk's duration exceeds the configured threshold;
//! each closed chunk updates the running stream statistics.
//!
//! The fold is deterministic: the same frames and threshold always produce
//! the same reports. A trailing, unclosed GOP or chunk is never reported.
//!
//! # Example
//!
//! ```
//! use gopstat::{BitrateAggregator, FrameRecord, PictureType};
//!
//! let frame = |time: f64, size: u64, pict_type: PictureType| FrameRecord {
//!     pkt_pts_time: time,
//!     pkt_size: size,
//!     pict_type,
//!     ..FrameRecord::default()
//! };
//!
//! let mut aggregator = BitrateAggregator::new(10.0)?;
//! assert!(aggregator.push(&frame(1.0, 4096, PictureType::I)).is_none());
//! assert!(aggregator.push(&frame(2.0, 1024, PictureType::P)).is_none());
//!
//! let report = aggregator.push(&frame(3.0, 4096, PictureType::I)).unwrap();
//! assert_eq!(report.gop.begin_time, 1.0);
//! assert_eq!(report.gop.duration, 2.0);
//! assert_eq!(report.gop.bytes, 5120);
//! assert_eq!(report.gop.kbps, 20.0);
//! # Ok::<(), gopstat::GopStatError>(())
//! ```

use crate::error::GopStatError;
use crate::frame::FrameRecord;
use crate::report::{ChunkReport, ChunkStatistics, GopReport, GopStatistics, StreamSummary};
use crate::statistics::RunningStatistics;

/// Begin time of the GOP before the first keyframe. Larger than any real
/// timestamp, so the first keyframe yields a negative duration and no report.
const GOP_BEGIN_SENTINEL: f64 = i32::MAX as f64;

/// Default chunk duration threshold, in seconds.
pub const DEFAULT_CHUNK_MAX_DURATION: f64 = 10.0;

/// Kibibits per second for `bytes` transferred over `seconds`.
fn kbps(bytes: u64, seconds: f64) -> f64 {
    bytes as f64 * 8.0 / 1024.0 / seconds
}

#[derive(Debug, Clone, Copy)]
struct GopAccumulator {
    begin_time: f64,
    bytes: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ChunkAccumulator {
    bytes: u64,
    duration: f64,
}

/// Data held by the aggregator that no report has covered yet.
///
/// Returned by [`BitrateAggregator::finish`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingAggregate {
    /// Begin time of the open GOP, `None` if no keyframe was seen.
    pub gop_begin_time: Option<f64>,
    /// Bytes accumulated in the open GOP.
    pub gop_bytes: u64,
    /// Bytes of closed GOPs not yet part of a reported chunk.
    pub chunk_bytes: u64,
    /// Duration of closed GOPs not yet part of a reported chunk.
    pub chunk_duration: f64,
}

/// Incremental frame → GOP → chunk → stream reducer.
#[derive(Debug, Clone)]
pub struct BitrateAggregator {
    chunk_max_duration: f64,
    gop: GopAccumulator,
    chunk: ChunkAccumulator,
    statistics: RunningStatistics,
    frames_seen: u64,
    gops_reported: u64,
}

impl BitrateAggregator {
    /// Create an aggregator that closes a chunk once its duration strictly
    /// exceeds `chunk_max_duration` seconds.
    ///
    /// # Errors
    ///
    /// Returns [`GopStatError::InvalidChunkDuration`] unless the threshold is
    /// finite and greater than zero.
    pub fn new(chunk_max_duration: f64) -> Result<Self, GopStatError> {
        if !chunk_max_duration.is_finite() || chunk_max_duration <= 0.0 {
            return Err(GopStatError::InvalidChunkDuration(chunk_max_duration));
        }

        Ok(Self {
            chunk_max_duration,
            gop: GopAccumulator {
                begin_time: GOP_BEGIN_SENTINEL,
                bytes: 0,
            },
            chunk: ChunkAccumulator::default(),
            statistics: RunningStatistics::new(),
            frames_seen: 0,
            gops_reported: 0,
        })
    }

    /// Feed one frame.
    ///
    /// Returns a report when the frame is intra-coded and closes a Group of
    /// Pictures with a positive duration. The frame's own bytes are counted
    /// towards the GOP it opens.
    pub fn push(&mut self, frame: &FrameRecord) -> Option<GopReport> {
        self.frames_seen += 1;
        let time = frame.timestamp();

        let report = if frame.pict_type.is_intra() {
            let report = self.close_gop(time);
            self.gop = GopAccumulator {
                begin_time: time,
                bytes: 0,
            };
            report
        } else {
            None
        };

        self.gop.bytes += frame.pkt_size;
        report
    }

    fn close_gop(&mut self, time: f64) -> Option<GopReport> {
        let duration = time - self.gop.begin_time;
        // Also rejects NaN.
        if !(duration > 0.0) {
            if self.gop.begin_time != GOP_BEGIN_SENTINEL {
                log::debug!(
                    "Skipping GOP at {:.3} s with non-positive duration {duration:.3} s",
                    self.gop.begin_time
                );
            }
            return None;
        }

        let gop = GopStatistics {
            begin_time: self.gop.begin_time,
            duration,
            bytes: self.gop.bytes,
            kbps: kbps(self.gop.bytes, duration),
        };
        self.gops_reported += 1;

        self.chunk.bytes += gop.bytes;
        self.chunk.duration += gop.duration;

        let chunk = (self.chunk.duration > self.chunk_max_duration).then(|| self.close_chunk());

        Some(GopReport { gop, chunk })
    }

    fn close_chunk(&mut self) -> ChunkReport {
        let chunk = ChunkStatistics {
            duration: self.chunk.duration,
            bytes: self.chunk.bytes,
            kbps: kbps(self.chunk.bytes, self.chunk.duration),
        };
        self.chunk = ChunkAccumulator::default();

        self.statistics.update(chunk.kbps);
        let stream = StreamSummary {
            count: self.statistics.count(),
            mean_kbps: self.statistics.mean(),
            standard_deviation: self.statistics.standard_deviation(),
            coefficient_of_variation: self.statistics.coefficient_of_variation(),
        };
        log::debug!(
            "Chunk {} closed: {:.3} s, {} b, {:.3} k/s",
            stream.count,
            chunk.duration,
            chunk.bytes,
            chunk.kbps
        );

        ChunkReport { chunk, stream }
    }

    /// The configured chunk duration threshold, in seconds.
    pub fn chunk_max_duration(&self) -> f64 {
        self.chunk_max_duration
    }

    /// Running statistics over all reported chunk bitrates.
    pub fn statistics(&self) -> &RunningStatistics {
        &self.statistics
    }

    /// Number of frames pushed so far.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Number of GOP reports emitted so far.
    pub fn gops_reported(&self) -> u64 {
        self.gops_reported
    }

    /// Data not covered by any report yet.
    pub fn pending(&self) -> PendingAggregate {
        PendingAggregate {
            gop_begin_time: (self.gop.begin_time != GOP_BEGIN_SENTINEL)
                .then_some(self.gop.begin_time),
            gop_bytes: self.gop.bytes,
            chunk_bytes: self.chunk.bytes,
            chunk_duration: self.chunk.duration,
        }
    }

    /// End the fold.
    ///
    /// Nothing is emitted for the open GOP or chunk; their contents are
    /// returned so the caller can account for them.
    pub fn finish(self) -> PendingAggregate {
        self.pending()
    }
}
