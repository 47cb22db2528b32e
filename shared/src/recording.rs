//! Session recording format.
//!
//! A recording is a plain sequence of records, each a 16-byte header
//! (`timestamp_us: u64`, `length: u64`, little-endian as bincode lays them
//! out) followed by `length` raw frame bytes exactly as received.

use crate::wire::MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

pub const RECORD_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub timestamp_us: u64,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp_us: u64,
    pub frame: Vec<u8>,
}

fn invalid_data<E>(e: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, e)
}

pub fn write_record<W: Write>(writer: &mut W, timestamp_us: u64, frame: &[u8]) -> io::Result<()> {
    let header = RecordHeader {
        timestamp_us,
        length: frame.len() as u64,
    };
    let bytes = bincode::serialize(&header).map_err(invalid_data)?;
    writer.write_all(&bytes)?;
    writer.write_all(frame)?;
    Ok(())
}

/// Iterates over the records of a recording.
///
/// A clean end of input between records ends the iteration; a record cut
/// short yields one `UnexpectedEof` error and then ends it.
pub struct RecordReader<R> {
    reader: R,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    fn read_header(&mut self) -> io::Result<Option<RecordHeader>> {
        let mut buf = [0u8; RECORD_HEADER_SIZE];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let header: RecordHeader = bincode::deserialize(&buf).map_err(invalid_data)?;
        Ok(Some(header))
    }

    fn read_record(&mut self) -> io::Result<Option<Record>> {
        let header = match self.read_header()? {
            Some(header) => header,
            None => return Ok(None),
        };
        if header.length > MAX_FRAME_SIZE as u64 {
            return Err(invalid_data(format!("record of {} bytes", header.length)));
        }
        let mut frame = vec![0u8; header.length as usize];
        self.reader.read_exact(&mut frame)?;
        Ok(Some(Record {
            timestamp_us: header.timestamp_us,
            frame,
        }))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = io::Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        write_record(&mut buf, 0x0102, &[9, 8, 7]).unwrap();
        assert_eq!(buf.len(), RECORD_HEADER_SIZE + 3);
        assert_eq!(&buf[..8], &0x0102u64.to_le_bytes());
        assert_eq!(&buf[8..16], &3u64.to_le_bytes());
        assert_eq!(&buf[16..], &[9, 8, 7]);
    }

    #[test]
    fn test_read_back_records() {
        let mut buf = Vec::new();
        write_record(&mut buf, 10, &[0, 0, b'p']).unwrap();
        write_record(&mut buf, 25, &[0, 0, b'v', 1]).unwrap();

        let records: Vec<Record> = RecordReader::new(Cursor::new(buf))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].timestamp_us, 10);
        assert_eq!(records[1].frame, vec![0, 0, b'v', 1]);
    }

    #[test]
    fn test_truncated_record_ends_iteration() {
        let mut buf = Vec::new();
        write_record(&mut buf, 10, &[0, 0, b'p']).unwrap();
        write_record(&mut buf, 20, &[0, 0, b'p', 1, 2]).unwrap();
        buf.truncate(buf.len() - 2);

        let mut reader = RecordReader::new(Cursor::new(buf));
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_oversized_record_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u64.to_le_bytes());
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        let mut reader = RecordReader::new(Cursor::new(buf));
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
