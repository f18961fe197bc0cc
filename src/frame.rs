//! Per-frame metadata records.
//!
//! This module defines [`FrameRecord`], the decoded form of one object from
//! `ffprobe -show_entries frame -print_format json`, and [`PictureType`].
//!
//! ffprobe prints some numeric fields as JSON numbers and others as strings
//! (`"pkt_size": "1234"`), so every numeric field accepts both. Missing
//! fields default to zero. A string that is not a finite decimal number,
//! including ffprobe's `"N/A"` marker, `"NaN"` and `"inf"`, is a decode
//! error.
//!
//! # Example
//!
//! ```
//! use gopstat::{FrameRecord, PictureType};
//!
//! let frame = FrameRecord::from_slice(
//!     br#"{"media_type": "video", "pkt_pts_time": "1.5", "pkt_size": "2048", "pict_type": "I"}"#,
//! )?;
//! assert_eq!(frame.pict_type, PictureType::I);
//! assert_eq!(frame.pkt_size, 2048);
//! assert_eq!(frame.timestamp(), 1.5);
//! # Ok::<(), gopstat::GopStatError>(())
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::de::{Deserialize, Deserializer, Error as DeError};

use crate::error::GopStatError;

/// Picture coding type of a frame, as reported in ffprobe's `pict_type`.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(from = "String")]
pub enum PictureType {
    /// Intra-coded picture. Marks a Group of Pictures boundary.
    I,
    /// Predicted picture.
    P,
    /// Bi-directionally predicted picture.
    B,
    /// S(GMC)-VOP (MPEG-4).
    S,
    /// Switching intra picture (H.264).
    SI,
    /// Switching predicted picture (H.264).
    SP,
    /// BI type (VC-1).
    BI,
    /// No type reported (`?` or an empty field).
    #[default]
    Unknown,
    /// Any other stream-specific code.
    Other(String),
}

impl PictureType {
    /// Returns `true` for intra-coded pictures, the Group of Pictures
    /// boundary marker.
    pub fn is_intra(&self) -> bool {
        matches!(self, PictureType::I)
    }

    /// The code ffprobe uses for this picture type.
    pub fn as_str(&self) -> &str {
        match self {
            PictureType::I => "I",
            PictureType::P => "P",
            PictureType::B => "B",
            PictureType::S => "S",
            PictureType::SI => "SI",
            PictureType::SP => "SP",
            PictureType::BI => "BI",
            PictureType::Unknown => "?",
            PictureType::Other(code) => code,
        }
    }
}

impl From<&str> for PictureType {
    fn from(code: &str) -> Self {
        match code {
            "I" => PictureType::I,
            "P" => PictureType::P,
            "B" => PictureType::B,
            "S" => PictureType::S,
            "SI" => PictureType::SI,
            "SP" => PictureType::SP,
            "BI" => PictureType::BI,
            "" | "?" => PictureType::Unknown,
            other => PictureType::Other(other.to_string()),
        }
    }
}

impl From<String> for PictureType {
    fn from(code: String) -> Self {
        PictureType::from(code.as_str())
    }
}

impl Display for PictureType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Metadata for one decoded video frame.
///
/// Times are in seconds, timestamps and durations without a `_time` suffix
/// are in stream time-base ticks.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct FrameRecord {
    /// Media type of the stream the frame belongs to (`"video"`).
    pub media_type: String,
    /// Whether the decoder flagged the frame as a keyframe.
    #[serde(deserialize_with = "flag")]
    pub key_frame: bool,
    /// Presentation timestamp in ticks.
    #[serde(alias = "pts", deserialize_with = "number")]
    pub pkt_pts: i64,
    /// Presentation time in seconds.
    #[serde(alias = "pts_time", deserialize_with = "number")]
    pub pkt_pts_time: f64,
    /// Decode timestamp in ticks.
    #[serde(deserialize_with = "number")]
    pub pkt_dts: i64,
    /// Decode time in seconds.
    #[serde(deserialize_with = "number")]
    pub pkt_dts_time: f64,
    /// Best-effort timestamp in ticks.
    #[serde(deserialize_with = "number")]
    pub best_effort_timestamp: i64,
    /// Best-effort time in seconds.
    #[serde(deserialize_with = "number")]
    pub best_effort_timestamp_time: f64,
    /// Packet duration in ticks.
    #[serde(deserialize_with = "number")]
    pub pkt_duration: i64,
    /// Packet duration in seconds.
    #[serde(deserialize_with = "number")]
    pub pkt_duration_time: f64,
    /// Byte offset of the packet in the input.
    #[serde(deserialize_with = "number")]
    pub pkt_pos: i64,
    /// Packet size in bytes.
    #[serde(deserialize_with = "number")]
    pub pkt_size: u64,
    /// Frame width in pixels.
    #[serde(deserialize_with = "number")]
    pub width: u32,
    /// Frame height in pixels.
    #[serde(deserialize_with = "number")]
    pub height: u32,
    /// Pixel format name (e.g. `"yuv420p"`).
    pub pix_fmt: String,
    /// Sample aspect ratio (e.g. `"1:1"`).
    pub sample_aspect_ratio: String,
    /// Picture coding type.
    pub pict_type: PictureType,
    /// Picture number in bitstream order.
    #[serde(deserialize_with = "number")]
    pub coded_picture_number: u64,
    /// Picture number in display order.
    #[serde(deserialize_with = "number")]
    pub display_picture_number: u64,
    /// Whether the frame is interlaced.
    #[serde(deserialize_with = "flag")]
    pub interlaced_frame: bool,
    /// Whether the top field is displayed first.
    #[serde(deserialize_with = "flag")]
    pub top_field_first: bool,
    /// How many extra fields the picture should be displayed for.
    #[serde(deserialize_with = "number")]
    pub repeat_pict: i32,
}

impl FrameRecord {
    /// Decode one record buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GopStatError::RecordDecode`] when the buffer is not a valid
    /// JSON object or a field has the wrong type, for example a non-numeric
    /// string in a numeric field.
    pub fn from_slice(buffer: &[u8]) -> Result<Self, GopStatError> {
        serde_json::from_slice(buffer).map_err(|error| GopStatError::RecordDecode {
            reason: error.to_string(),
            record: String::from_utf8_lossy(buffer).into_owned(),
        })
    }

    /// The effective timestamp of the frame, in seconds.
    ///
    /// Presentation time when it is non-zero, decode time otherwise.
    pub fn timestamp(&self) -> f64 {
        if self.pkt_pts_time != 0.0 {
            self.pkt_pts_time
        } else {
            self.pkt_dts_time
        }
    }

    /// Returns `true` unless the record names a media type other than video.
    pub fn is_video(&self) -> bool {
        self.media_type.is_empty() || self.media_type == "video"
    }
}

impl FromStr for FrameRecord {
    type Err = GopStatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(s.as_bytes())
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum NumberOrText<T> {
    Number(T),
    Text(String),
}

/// Accept a JSON number or a string holding a finite decimal number.
fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    let text = match NumberOrText::<T>::deserialize(deserializer)? {
        NumberOrText::Number(value) => return Ok(value),
        NumberOrText::Text(text) => text,
    };

    // `f64::from_str` also takes "NaN", "inf" and "infinity".
    let digits = text.trim();
    let decimal = digits
        .bytes()
        .all(|byte| byte.is_ascii_digit() || matches!(byte, b'+' | b'-' | b'.' | b'e' | b'E'));
    if !decimal {
        return Err(D::Error::custom(format!("invalid number {text:?}")));
    }
    digits
        .parse()
        .map_err(|error| D::Error::custom(format!("invalid number {text:?}: {error}")))
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Number(i64),
    Text(String),
}

/// Accept `0`/`1`, `true`/`false`, or either as a string.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Number(value) => Ok(value != 0),
        Flag::Text(text) => match text.trim() {
            "1" | "true" => Ok(true),
            "0" | "false" => Ok(false),
            other => Err(D::Error::custom(format!("invalid flag {other:?}"))),
        },
    }
}
