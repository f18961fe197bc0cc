//! # gopstat
//!
//! Streaming bitrate statistics per Group of Pictures.
//!
//! `gopstat` reads the per-frame metadata that
//! `ffprobe -show_entries frame -print_format json` prints, one record at a
//! time, and reports the bitrate of every Group of Pictures, of fixed-length
//! chunks of whole GOPs, and the running mean and spread of the chunk
//! bitrates. The frame stream is never buffered in full, so live and
//! arbitrarily long inputs work.
//!
//! ## Quick Start
//!
//! ### Analyze a file through ffprobe
//!
//! ```no_run
//! use gopstat::{AnalysisOptions, ProbeCommand, TextSink, analyze_source};
//!
//! let options = AnalysisOptions::new().with_chunk_max_duration(10.0);
//! let mut sink = TextSink::new(std::io::stdout());
//! let summary = analyze_source(&ProbeCommand::new("input.mp4"), &options, &mut sink)?;
//! println!("{} GOPs, {} chunks", summary.gops, summary.chunks());
//! # Ok::<(), gopstat::GopStatError>(())
//! ```
//!
//! ### Drive the aggregator directly
//!
//! ```no_run
//! use std::io::stdin;
//!
//! use gopstat::{BitrateAggregator, FrameRecord, RecordDecoder};
//!
//! let mut aggregator = BitrateAggregator::new(10.0)?;
//! for record in RecordDecoder::new(stdin().lock()) {
//!     let frame = FrameRecord::from_slice(&record?)?;
//!     if let Some(report) = aggregator.push(&frame) {
//!         println!("{report}");
//!     }
//! }
//! # Ok::<(), gopstat::GopStatError>(())
//! ```
//!
//! ## Pipeline
//!
//! - [`RecordDecoder`] splits the byte stream into flat record buffers
//! - [`FrameRecord`] decodes one buffer
//! - [`BitrateAggregator`] folds frames into [`GopReport`]s
//! - a [`ReportSink`] consumes the reports
//!
//! End of input is reported as [`GopStatError::EndOfStream`], distinct from
//! framing and decode failures.

pub mod aggregate;
pub mod analysis;
pub mod config;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod probe;
pub mod progress;
pub mod report;
pub mod statistics;

pub use aggregate::{BitrateAggregator, DEFAULT_CHUNK_MAX_DURATION, PendingAggregate};
pub use analysis::{AnalysisSummary, analyze, analyze_source};
pub use config::AnalysisOptions;
pub use decoder::{DEFAULT_MAX_RECORD_LEN, RecordDecoder};
pub use error::GopStatError;
pub use frame::{FrameRecord, PictureType};
pub use probe::{ProbeCommand, ProbeProcess};
pub use progress::{ProgressCallback, ProgressInfo};
pub use report::{
    ChunkReport, ChunkStatistics, Event, GopReport, GopStatistics, JsonLinesSink, ReportSink,
    StreamSummary, TextSink,
};
pub use statistics::RunningStatistics;
