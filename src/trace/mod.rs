// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Binary cache-trace decoding.
//!
//! Traces are flat files of fixed-width little-endian records. The
//! estimators only consume the key; the remaining fields are carried for
//! tooling (and future TTL-aware variants).

use crate::{Error, Key};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Read;
use std::io::Write;

/// On-disk trace record layout
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Format {
    /// 25-byte records: `timestamp: u64, command: u8, key: u64, size: u32,
    /// ttl: u32`
    #[default]
    Kia,

    /// 21-byte records: same fields as Kia with a 32-bit timestamp
    Sari,
}

impl Format {
    /// Returns the size of one record in bytes.
    #[must_use]
    pub fn record_size(self) -> usize {
        match self {
            Self::Kia => 25,
            Self::Sari => 21,
        }
    }
}

/// A single decoded trace record
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Record {
    /// Wall-clock timestamp assigned by the trace collector
    pub timestamp: u64,

    /// Collector-specific command byte (get, set, delete, ...)
    pub command: u8,

    /// Accessed key
    pub key: Key,

    /// Object size in bytes
    pub size: u32,

    /// Time-to-live in seconds, 0 for none
    pub ttl: u32,
}

impl Record {
    /// Deserializes one record from a reader.
    ///
    /// # Errors
    ///
    /// Returns error, if an I/O error occurs.
    pub fn decode_from<R: Read>(reader: &mut R, format: Format) -> crate::Result<Self> {
        let timestamp = match format {
            Format::Kia => reader.read_u64::<LittleEndian>()?,
            Format::Sari => u64::from(reader.read_u32::<LittleEndian>()?),
        };

        Ok(Self {
            timestamp,
            command: reader.read_u8()?,
            key: reader.read_u64::<LittleEndian>()?,
            size: reader.read_u32::<LittleEndian>()?,
            ttl: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Serializes one record into a writer.
    ///
    /// # Errors
    ///
    /// Returns error, if an I/O error occurs.
    pub fn encode_into<W: Write>(&self, writer: &mut W, format: Format) -> crate::Result<()> {
        match format {
            Format::Kia => writer.write_u64::<LittleEndian>(self.timestamp)?,
            Format::Sari => {
                // Sari timestamps are 32-bit; saturate instead of wrapping
                let timestamp = u32::try_from(self.timestamp).unwrap_or(u32::MAX);
                writer.write_u32::<LittleEndian>(timestamp)?;
            }
        }

        writer.write_u8(self.command)?;
        writer.write_u64::<LittleEndian>(self.key)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        writer.write_u32::<LittleEndian>(self.ttl)?;

        Ok(())
    }
}

/// Streaming record reader over any byte source
///
/// Yields records until the source is exhausted. A source ending in the
/// middle of a record yields [`Error::TruncatedTrace`]; trailing bytes that
/// never started a record do too.
pub struct RecordReader<R> {
    inner: R,
    format: Format,
    buf: Box<[u8]>,
}

impl<R: Read> RecordReader<R> {
    /// Creates a record reader for the given format.
    pub fn new(inner: R, format: Format) -> Self {
        Self {
            inner,
            format,
            buf: vec![0; format.record_size()].into_boxed_slice(),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = crate::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut filled = 0;

        while filled < self.buf.len() {
            #[expect(clippy::expect_used, reason = "filled never exceeds the buffer length")]
            let spare = self.buf.get_mut(filled..).expect("fill offset should be in range");

            match self.inner.read(spare) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Some(Err(e.into())),
            }
        }

        if filled == 0 {
            return None;
        }
        if filled < self.buf.len() {
            return Some(Err(Error::TruncatedTrace));
        }

        let mut slice: &[u8] = &self.buf;
        Some(Record::decode_from(&mut slice, self.format))
    }
}

/// Decodes `length` records starting at record offset `start` from a raw
/// trace buffer.
///
/// Trailing bytes that do not fill a whole record are ignored, matching the
/// memory-mapped readers this format comes from.
///
/// # Errors
///
/// Returns error, if the window exceeds the number of whole records in the
/// buffer.
pub fn decode_window(
    bytes: &[u8],
    format: Format,
    start: usize,
    length: usize,
) -> crate::Result<Vec<Record>> {
    let record_size = format.record_size();
    let num_records = bytes.len() / record_size;

    if start.saturating_add(length) > num_records {
        return Err(Error::InvalidConfig("window exceeds the trace length"));
    }

    let window = bytes
        .get(start * record_size..(start + length) * record_size)
        .ok_or(Error::InvalidConfig("window exceeds the trace length"))?;

    window
        .chunks_exact(record_size)
        .map(|mut chunk| Record::decode_from(&mut chunk, format))
        .collect()
}
