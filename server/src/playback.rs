//! Recorded sessions and their delivery schedule.

use log::{info, warn};
use shared::packet::HEADER_SIZE;
use shared::recording::{Record, RecordReader};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Frames due sooner than this are held back and sent together with the
/// next frame that needs a wait.
pub const BATCH_THRESHOLD_US: i64 = 33_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedFrame {
    /// Offset from the first frame of the recording.
    pub offset_us: u64,
    pub frame: Vec<u8>,
}

/// A recording loaded into memory with timestamps rebased to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recording {
    frames: Vec<TimedFrame>,
}

impl Recording {
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let recording = Self::read(BufReader::new(file))?;
        info!(
            "loaded {} frames spanning {} ms from {}",
            recording.len(),
            recording.duration_us() / 1000,
            path.as_ref().display()
        );
        Ok(recording)
    }

    /// Read records until the input ends. A damaged tail is logged and the
    /// frames before it are kept.
    pub fn read<R: Read>(reader: R) -> io::Result<Self> {
        let mut records = Vec::new();
        for record in RecordReader::new(reader) {
            match record {
                Ok(record) => records.push(record),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    warn!("recording truncated after {} records", records.len());
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Self::from_records(records))
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = Record>,
    {
        let mut first_us = None;
        let frames = records
            .into_iter()
            .filter(|record| record.frame.len() >= HEADER_SIZE)
            .map(|record| {
                let base = *first_us.get_or_insert(record.timestamp_us);
                TimedFrame {
                    offset_us: record.timestamp_us.saturating_sub(base),
                    frame: record.frame,
                }
            })
            .collect();
        Self { frames }
    }

    pub fn frames(&self) -> &[TimedFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn duration_us(&self) -> u64 {
        self.frames.last().map(|frame| frame.offset_us).unwrap_or(0)
    }
}

/// Groups frames that are due close together into one write burst.
#[derive(Debug, Default)]
pub struct Batcher {
    pending: Vec<Vec<u8>>,
}

impl Batcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer the next frame, due `wait_us` from now (negative if late).
    ///
    /// Returns the burst to send once the frame is due, held frames first,
    /// or `None` if the frame was held back.
    pub fn push(&mut self, frame: Vec<u8>, wait_us: i64) -> Option<Vec<Vec<u8>>> {
        self.pending.push(frame);
        if wait_us > BATCH_THRESHOLD_US {
            Some(std::mem::take(&mut self.pending))
        } else {
            None
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Everything still held at the end of the recording.
    pub fn finish(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.pending)
    }
}
