//! The decode → parse → aggregate pipeline.
//!
//! [`analyze`] drives a [`RecordDecoder`] over any reader, parses each
//! record, feeds video frames to a [`BitrateAggregator`] and hands every
//! report to a [`ReportSink`]. The run ends successfully at the end of the
//! stream and stops at the first framing, decode or sink error.
//!
//! [`analyze_source`] does the same with the stdout of an `ffprobe` process.
//!
//! # Example
//!
//! ```
//! use gopstat::{AnalysisOptions, GopReport, analyze};
//!
//! let input = r#"{"frames": [
//!     {"media_type": "video", "pkt_pts_time": "0.0", "pkt_size": "1000", "pict_type": "I"},
//!     {"media_type": "video", "pkt_pts_time": "1.0", "pkt_size": "24", "pict_type": "P"},
//!     {"media_type": "video", "pkt_pts_time": "2.0", "pkt_size": "1000", "pict_type": "I"}
//! ]}"#;
//!
//! let mut reports: Vec<GopReport> = Vec::new();
//! let summary = analyze(input.as_bytes(), &AnalysisOptions::new(), &mut reports)?;
//! assert_eq!(summary.frames, 3);
//! assert_eq!(reports.len(), 1);
//! assert_eq!(reports[0].gop.bytes, 1024);
//! assert_eq!(summary.pending.gop_bytes, 1000);
//! # Ok::<(), gopstat::GopStatError>(())
//! ```

use std::io::{BufReader, Read};
use std::time::Duration;

use crate::aggregate::{BitrateAggregator, PendingAggregate};
use crate::config::AnalysisOptions;
use crate::decoder::RecordDecoder;
use crate::error::GopStatError;
use crate::frame::FrameRecord;
use crate::probe::ProbeCommand;
use crate::progress::{ProgressInfo, ProgressTracker};
use crate::report::ReportSink;
use crate::statistics::RunningStatistics;

/// Outcome of a completed analysis.
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    /// Records decoded, including skipped ones.
    pub frames: u64,
    /// Records skipped because they describe a non-video frame.
    pub skipped_frames: u64,
    /// GOP reports emitted.
    pub gops: u64,
    /// Chunk bitrate statistics over the whole run.
    pub statistics: RunningStatistics,
    /// Trailing data that closed no GOP or chunk and was not reported.
    pub pending: PendingAggregate,
    /// Bytes consumed from the input.
    pub bytes_consumed: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl AnalysisSummary {
    /// Number of chunks closed.
    pub fn chunks(&self) -> u64 {
        self.statistics.count()
    }
}

/// Analyze a stream holding one JSON array of frame records.
///
/// # Errors
///
/// - [`GopStatError::InvalidChunkDuration`] for a bad threshold in `options`.
/// - [`GopStatError::RecordFraming`] or [`GopStatError::RecordDecode`] when
///   the input does not have the expected shape.
/// - Any error returned by `sink`, and I/O errors from `reader`.
///
/// End of input is not an error.
pub fn analyze<R, S>(
    reader: R,
    options: &AnalysisOptions,
    sink: &mut S,
) -> Result<AnalysisSummary, GopStatError>
where
    R: Read,
    S: ReportSink + ?Sized,
{
    let mut aggregator = BitrateAggregator::new(options.chunk_max_duration)?;
    let mut decoder =
        RecordDecoder::with_max_record_len(BufReader::new(reader), options.max_record_len);
    let mut tracker = ProgressTracker::new(options.batch_size);
    let mut skipped_frames: u64 = 0;

    log::debug!("Starting analysis ({options:?})");

    loop {
        let record = match decoder.read_record() {
            Ok(record) => record,
            Err(GopStatError::EndOfStream) => break,
            Err(error) => return Err(error),
        };
        let frame = FrameRecord::from_slice(&record)?;

        if frame.is_video() {
            if let Some(report) = aggregator.push(&frame) {
                sink.on_report(&report)?;
            }
        } else {
            skipped_frames += 1;
            log::debug!("Skipping {} frame record", frame.media_type);
        }

        if tracker.tick() {
            options.progress.on_progress(&ProgressInfo {
                frames: decoder.records_read(),
                gops: aggregator.gops_reported(),
                chunks: aggregator.statistics().count(),
                bytes_consumed: decoder.bytes_consumed(),
                current_timestamp: Some(frame.timestamp()),
                elapsed: tracker.elapsed(),
            });
        }
    }

    let summary = AnalysisSummary {
        frames: decoder.records_read(),
        skipped_frames,
        gops: aggregator.gops_reported(),
        statistics: *aggregator.statistics(),
        pending: aggregator.finish(),
        bytes_consumed: decoder.bytes_consumed(),
        elapsed: tracker.elapsed(),
    };

    if summary.pending.gop_bytes > 0 || summary.pending.chunk_bytes > 0 {
        log::info!(
            "Discarding unclosed data at end of stream: GOP {} b, chunk {} b over {:.3} s",
            summary.pending.gop_bytes,
            summary.pending.chunk_bytes,
            summary.pending.chunk_duration
        );
    }
    log::debug!(
        "Analysis finished: {} frames, {} GOPs, {} chunks in {:?}",
        summary.frames,
        summary.gops,
        summary.chunks(),
        summary.elapsed
    );

    Ok(summary)
}

/// Run `command` and analyze its output.
///
/// The process is killed if the analysis stops with an error, and waited
/// for otherwise.
///
/// # Errors
///
/// Everything [`analyze`] returns, plus [`GopStatError::ProbeSpawn`] and
/// [`GopStatError::ProbeFailed`].
pub fn analyze_source<S>(
    command: &ProbeCommand,
    options: &AnalysisOptions,
    sink: &mut S,
) -> Result<AnalysisSummary, GopStatError>
where
    S: ReportSink + ?Sized,
{
    let mut process = command.spawn()?;
    let stdout = process
        .take_stdout()
        .ok_or_else(|| GopStatError::ProbeSpawn {
            program: command.program().to_string(),
            reason: "stdout was not captured".to_string(),
        })?;

    match analyze(stdout, options, sink) {
        Ok(summary) => {
            process.finish()?;
            Ok(summary)
        }
        Err(error) => {
            if let Err(kill_error) = process.kill() {
                log::warn!("Failed to stop probe process: {kill_error}");
            }
            Err(error)
        }
    }
}
