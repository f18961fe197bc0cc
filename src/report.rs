//! Bitrate events and report sinks.
//!
//! The aggregation engine emits one [`GopReport`] per closed Group of
//! Pictures. When that GOP also closes a chunk the report carries a
//! [`ChunkReport`] with the chunk bitrate and the updated stream-wide
//! [`StreamSummary`].
//!
//! Reports are handed to a [`ReportSink`]. [`TextSink`] writes the classic
//! one-line-per-GOP format, [`JsonLinesSink`] writes one JSON object per
//! line.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::{Error as IoError, Write};

use serde::Serialize;

use crate::error::GopStatError;

/// Bitrate of one closed Group of Pictures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GopStatistics {
    /// Timestamp of the keyframe that opened the GOP, in seconds.
    pub begin_time: f64,
    /// Time until the next keyframe, in seconds.
    pub duration: f64,
    /// Total packet bytes of the GOP's frames.
    pub bytes: u64,
    /// Kibibits per second.
    pub kbps: f64,
}

/// Bitrate of one closed chunk (a run of whole GOPs).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkStatistics {
    /// Summed duration of the chunk's GOPs, in seconds.
    pub duration: f64,
    /// Summed bytes of the chunk's GOPs.
    pub bytes: u64,
    /// Kibibits per second.
    pub kbps: f64,
}

/// Stream-wide spread of chunk bitrates seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StreamSummary {
    /// Number of chunks included.
    pub count: u64,
    /// Mean chunk bitrate in kibibits per second.
    pub mean_kbps: f64,
    /// Population standard deviation of chunk bitrates.
    pub standard_deviation: f64,
    /// Standard deviation divided by the mean.
    pub coefficient_of_variation: f64,
}

/// A closed chunk together with the stream summary it updated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkReport {
    /// The chunk that was closed.
    pub chunk: ChunkStatistics,
    /// Stream summary including this chunk.
    pub stream: StreamSummary,
}

/// Everything emitted when a keyframe closes a Group of Pictures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GopReport {
    /// The Group of Pictures that was closed.
    pub gop: GopStatistics,
    /// Present when the GOP pushed the chunk past its duration threshold.
    #[serde(flatten)]
    pub chunk: Option<ChunkReport>,
}

/// A single emitted event, in emission order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// A Group of Pictures was closed.
    Gop(GopStatistics),
    /// A chunk was closed.
    Chunk(ChunkStatistics),
    /// The stream summary was updated by a closed chunk.
    Summary(StreamSummary),
}

impl GopReport {
    /// Flatten the report into its GOP, chunk and summary events.
    pub fn events(&self) -> impl Iterator<Item = Event> + '_ {
        std::iter::once(Event::Gop(self.gop)).chain(
            self.chunk
                .iter()
                .flat_map(|chunk| [Event::Chunk(chunk.chunk), Event::Summary(chunk.stream)]),
        )
    }
}

impl Display for GopReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "@{:8.3} gop[{:6.3} s, {:7} b, {:8.3} k/s]",
            self.gop.begin_time, self.gop.duration, self.gop.bytes, self.gop.kbps
        )?;
        if let Some(ChunkReport { chunk, stream }) = &self.chunk {
            write!(
                f,
                ", chunk[{:6.3} s, {:7} b, {:8.3} k/s], all[{:8.3} k/s, {:7.3} sd, {:5.3} cv]",
                chunk.duration,
                chunk.bytes,
                chunk.kbps,
                stream.mean_kbps,
                stream.standard_deviation,
                stream.coefficient_of_variation
            )?;
        }
        Ok(())
    }
}

/// Consumer of [`GopReport`]s.
pub trait ReportSink {
    /// Called once per closed Group of Pictures, in stream order.
    fn on_report(&mut self, report: &GopReport) -> Result<(), GopStatError>;
}

/// Collects reports in memory.
impl ReportSink for Vec<GopReport> {
    fn on_report(&mut self, report: &GopReport) -> Result<(), GopStatError> {
        self.push(*report);
        Ok(())
    }
}

/// Writes one formatted line per report.
pub struct TextSink<W> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    /// Write report lines to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for TextSink<W> {
    fn on_report(&mut self, report: &GopReport) -> Result<(), GopStatError> {
        writeln!(self.writer, "{report}")?;
        Ok(())
    }
}

/// Writes one JSON object per report, newline separated.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Write JSON lines to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn on_report(&mut self, report: &GopReport) -> Result<(), GopStatError> {
        serde_json::to_writer(&mut self.writer, report).map_err(IoError::from)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}
