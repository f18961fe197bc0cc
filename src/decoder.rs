//! Incremental record framing.
//!
//! This module provides [`RecordDecoder`], which splits a byte stream holding
//! one JSON array of flat objects into individual record buffers without
//! reading the whole array into memory. Each yielded buffer starts with `{`
//! and ends with the matching `}`.
//!
//! # Flat records only
//!
//! A record ends at the first `}` after its opening `{`. This holds for
//! `ffprobe -show_entries frame` output restricted to scalar fields, but not
//! for schemas with nested objects or arrays (for example `side_data_list`).
//! The decoder checks every buffer and reports a nested value as
//! [`GopStatError::RecordFraming`] instead of returning a mis-split record.
//! String values containing `{`, `[` or `}` are not supported either.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//!
//! use gopstat::RecordDecoder;
//!
//! let input = Cursor::new(r#"{"frames": [{"pkt_size": "10"}, {"pkt_size": "20"}]}"#);
//! let records: Vec<Vec<u8>> = RecordDecoder::new(input).collect::<Result<_, _>>()?;
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[1], br#"{"pkt_size": "20"}"#);
//! # Ok::<(), gopstat::GopStatError>(())
//! ```

use std::io::{BufRead, Read};
use std::iter::FusedIterator;

use crate::error::GopStatError;

/// Default upper bound for a single record buffer, in bytes.
pub const DEFAULT_MAX_RECORD_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Nothing consumed yet; the opening `[` has not been seen.
    AwaitingArray,
    /// Inside the array, positioned before the next record.
    InArray,
    /// A record was returned; the `,` or `]` after it is still unread.
    AfterRecord,
    /// The array was closed, the input ended, or an error occurred.
    Finished,
}

/// A lazy splitter of an unbounded JSON array into flat record buffers.
///
/// Reading is destructive: the decoder consumes its reader and cannot be
/// restarted. Once [`GopStatError::EndOfStream`] or any other error has been
/// returned, every later call returns `EndOfStream`.
pub struct RecordDecoder<R> {
    reader: R,
    state: DecoderState,
    max_record_len: usize,
    /// Bytes consumed from the reader so far.
    offset: u64,
    records_read: u64,
}

impl<R: BufRead> RecordDecoder<R> {
    /// Create a decoder with the default record size limit.
    pub fn new(reader: R) -> Self {
        Self::with_max_record_len(reader, DEFAULT_MAX_RECORD_LEN)
    }

    /// Create a decoder that rejects records longer than `max_record_len`
    /// bytes.
    pub fn with_max_record_len(reader: R, max_record_len: usize) -> Self {
        log::debug!("Creating RecordDecoder (max_record_len={max_record_len})");
        Self {
            reader,
            state: DecoderState::AwaitingArray,
            max_record_len: max_record_len.max(1),
            offset: 0,
            records_read: 0,
        }
    }

    /// Number of complete records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Number of bytes consumed from the underlying reader.
    pub fn bytes_consumed(&self) -> u64 {
        self.offset
    }

    /// Give back the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read the next record buffer.
    ///
    /// On the first call, everything up to and including the first `[` is
    /// skipped. Afterwards each call consumes the `,` or `]` that followed
    /// the previous record and returns the bytes of the next `{ ... }`
    /// object. A record is returned as soon as its `}` has been read, so a
    /// live producer never has to start the next record first.
    ///
    /// # Errors
    ///
    /// - [`GopStatError::EndOfStream`] when the array is closed or the input
    ///   is exhausted, including in the middle of a record.
    /// - [`GopStatError::RecordFraming`] when an unexpected byte is found
    ///   where a delimiter belongs, the record holds a nested value, or the
    ///   record exceeds the size limit.
    /// - [`GopStatError::IoError`] when the reader fails.
    pub fn read_record(&mut self) -> Result<Vec<u8>, GopStatError> {
        if self.state == DecoderState::Finished {
            return Err(GopStatError::EndOfStream);
        }

        let result = self.read_record_inner();
        match &result {
            Ok(_) => {
                self.records_read += 1;
                self.state = DecoderState::AfterRecord;
            }
            Err(_) => self.state = DecoderState::Finished,
        }
        result
    }

    fn read_record_inner(&mut self) -> Result<Vec<u8>, GopStatError> {
        match self.state {
            DecoderState::AwaitingArray => self.open_array()?,
            DecoderState::AfterRecord => {
                if !self.consume_delimiter()? {
                    return Err(GopStatError::EndOfStream);
                }
            }
            DecoderState::InArray | DecoderState::Finished => {}
        }
        self.state = DecoderState::InArray;

        match self.skip_whitespace()? {
            Some(b'{') => {}
            Some(b']') => {
                self.consume(1);
                log::debug!("Frame array closed after {} records", self.records_read);
                return Err(GopStatError::EndOfStream);
            }
            Some(other) => {
                return Err(self.framing(format!(
                    "expected '{{' or ']' before record, found {:?}",
                    other as char
                )));
            }
            None => return Err(GopStatError::EndOfStream),
        }

        self.read_object()
    }

    /// Skip everything up to and including the first `[`.
    fn open_array(&mut self) -> Result<(), GopStatError> {
        let mut saw_content = false;
        loop {
            let (skipped, found) = {
                let buffer = self.reader.fill_buf()?;
                if buffer.is_empty() {
                    if saw_content {
                        return Err(self.framing("input ended before '['".to_string()));
                    }
                    return Err(GopStatError::EndOfStream);
                }
                match buffer.iter().position(|&byte| byte == b'[') {
                    Some(index) => {
                        saw_content |= !buffer[..index].iter().all(u8::is_ascii_whitespace);
                        (index + 1, true)
                    }
                    None => {
                        saw_content |= !buffer.iter().all(u8::is_ascii_whitespace);
                        (buffer.len(), false)
                    }
                }
            };
            self.consume(skipped);
            if found {
                return Ok(());
            }
        }
    }

    /// Read one object, from its `{` up to and including the first `}`.
    fn read_object(&mut self) -> Result<Vec<u8>, GopStatError> {
        let limit = self.max_record_len as u64;
        let mut record = Vec::new();
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'}', &mut record)?;
        self.offset += read as u64;

        if record.last() != Some(&b'}') {
            if read as u64 >= limit {
                return Err(self.framing(format!(
                    "record exceeds {} bytes without a closing '}}'",
                    self.max_record_len
                )));
            }
            log::warn!(
                "Frame stream ended inside a record; discarding {} trailing bytes",
                record.len()
            );
            return Err(GopStatError::EndOfStream);
        }

        if record[1..].iter().any(|&byte| byte == b'{' || byte == b'[') {
            return Err(self.framing(format!(
                "record contains a nested value: {}",
                String::from_utf8_lossy(&record)
            )));
        }

        Ok(record)
    }

    /// Consume the single `,` or `]` that follows a record.
    ///
    /// Returns `false` when the array was closed or the input ended.
    fn consume_delimiter(&mut self) -> Result<bool, GopStatError> {
        match self.skip_whitespace()? {
            Some(b',') => {
                self.consume(1);
                Ok(true)
            }
            Some(b']') => {
                self.consume(1);
                log::debug!("Frame array closed after {} records", self.records_read);
                Ok(false)
            }
            Some(other) => Err(self.framing(format!(
                "expected ',' or ']' after record, found {:?}",
                other as char
            ))),
            None => Ok(false),
        }
    }

    /// Skip ASCII whitespace and peek at the next byte without consuming it.
    fn skip_whitespace(&mut self) -> Result<Option<u8>, GopStatError> {
        loop {
            let (skipped, next) = {
                let buffer = self.reader.fill_buf()?;
                if buffer.is_empty() {
                    return Ok(None);
                }
                match buffer.iter().position(|byte| !byte.is_ascii_whitespace()) {
                    Some(index) => (index, Some(buffer[index])),
                    None => (buffer.len(), None),
                }
            };
            self.consume(skipped);
            if next.is_some() {
                return Ok(next);
            }
        }
    }

    fn consume(&mut self, amount: usize) {
        self.reader.consume(amount);
        self.offset += amount as u64;
    }

    fn framing(&self, reason: String) -> GopStatError {
        GopStatError::RecordFraming {
            reason,
            offset: self.offset,
        }
    }
}

impl<R: BufRead> Iterator for RecordDecoder<R> {
    type Item = Result<Vec<u8>, GopStatError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_record() {
            Ok(record) => Some(Ok(record)),
            Err(GopStatError::EndOfStream) => None,
            Err(error) => Some(Err(error)),
        }
    }
}

impl<R: BufRead> FusedIterator for RecordDecoder<R> {}
