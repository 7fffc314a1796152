//! Sequential access to source records.
//!
//! [`CsvRecordStream`] reads a delimited file one record at a time and decodes
//! every field to UTF-8; the header is just the first record. [`MemoryRecordSource`]
//! serves records from a vector and is what tests and benchmarks feed the loader.

use std::{
    collections::VecDeque,
    io::Read,
    path::{Path, PathBuf},
};

use csv::ByteRecord;
use log::debug;

use crate::{
    error::{SeedError, SeedResult},
    io_utils::{self, EncodingPolicy},
};

/// One source line as ordered text fields.
pub type RawRecord = Vec<String>;

pub trait RecordSource {
    /// Returns the next record, or `None` once the stream is exhausted or closed.
    fn next_record(&mut self) -> SeedResult<Option<RawRecord>>;

    /// Releases the underlying stream. Calling it more than once is harmless.
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    /// Number of records in the whole source, header included, when it can be
    /// known up front.
    fn total_records(&self) -> SeedResult<Option<u64>> {
        Ok(None)
    }
}

pub struct CsvRecordStream<R: Read> {
    reader: Option<csv::Reader<R>>,
    path: Option<PathBuf>,
    delimiter: u8,
    policy: EncodingPolicy,
    record: ByteRecord,
    records_read: u64,
}

impl CsvRecordStream<Box<dyn Read>> {
    pub fn open(path: &Path, delimiter: u8, policy: EncodingPolicy) -> SeedResult<Self> {
        let reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        debug!("Opened record stream for {path:?}");
        let mut stream = Self::with_reader(reader, delimiter, policy);
        stream.path = Some(path.to_path_buf());
        Ok(stream)
    }
}

impl<R: Read> CsvRecordStream<R> {
    pub fn from_reader(reader: R, delimiter: u8, policy: EncodingPolicy) -> Self {
        Self::with_reader(io_utils::open_csv_reader(reader, delimiter), delimiter, policy)
    }

    fn with_reader(reader: csv::Reader<R>, delimiter: u8, policy: EncodingPolicy) -> Self {
        Self {
            reader: Some(reader),
            path: None,
            delimiter,
            policy,
            record: ByteRecord::new(),
            records_read: 0,
        }
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

impl<R: Read> RecordSource for CsvRecordStream<R> {
    fn next_record(&mut self) -> SeedResult<Option<RawRecord>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let more = reader
            .read_byte_record(&mut self.record)
            .map_err(|source| SeedError::Source {
                record: self.records_read + 1,
                source,
            })?;
        if !more {
            return Ok(None);
        }
        let first = self.records_read == 0;
        self.records_read += 1;
        let fields = self
            .record
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let field = if first && idx == 0 {
                    io_utils::strip_utf8_bom(field)
                } else {
                    field
                };
                io_utils::decode_field(field, self.policy)
            })
            .collect();
        Ok(Some(fields))
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Closed record stream after {} record(s)", self.records_read);
        }
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    fn total_records(&self) -> SeedResult<Option<u64>> {
        match &self.path {
            Some(path) => count_records(path, self.delimiter).map(Some),
            None => Ok(None),
        }
    }
}

/// Counts the records of a delimited file without decoding them.
pub fn count_records(path: &Path, delimiter: u8) -> SeedResult<u64> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let mut record = ByteRecord::new();
    let mut total = 0u64;
    while reader
        .read_byte_record(&mut record)
        .map_err(|source| SeedError::Source {
            record: total + 1,
            source,
        })?
    {
        total += 1;
    }
    Ok(total)
}

/// Serves records from memory.
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    records: VecDeque<RawRecord>,
    closed: bool,
    served: usize,
}

impl MemoryRecordSource {
    pub fn new<I, R, S>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: records
                .into_iter()
                .map(|record| record.into_iter().map(Into::into).collect())
                .collect(),
            closed: false,
            served: 0,
        }
    }

    pub fn served(&self) -> usize {
        self.served
    }

    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

impl RecordSource for MemoryRecordSource {
    fn next_record(&mut self) -> SeedResult<Option<RawRecord>> {
        if self.closed {
            return Ok(None);
        }
        let next = self.records.pop_front();
        if next.is_some() {
            self.served += 1;
        }
        Ok(next)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn total_records(&self) -> SeedResult<Option<u64>> {
        Ok(Some((self.served + self.records.len()) as u64))
    }
}
