//! Session recording and local playback.
//!
//! The recorder appends every received frame to a file in the shared
//! recording format. Playback feeds a recording back into the frame queue
//! at its original pacing, so the rest of the client cannot tell it apart
//! from a live connection.

use crate::network::{CancellationToken, FrameQueue};
use log::{info, warn};
use shared::recording::{write_record, RecordReader};
use std::fs::File;
use std::io::{self, BufWriter, Cursor, Write};
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Appends received frames to a recording file.
pub struct Recorder {
    writer: BufWriter<File>,
    records: u64,
}

impl Recorder {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path.as_ref())?;
        info!("recording frames to {}", path.as_ref().display());
        Ok(Self {
            writer: BufWriter::new(file),
            records: 0,
        })
    }

    pub fn record(&mut self, timestamp_us: u64, frame: &[u8]) -> io::Result<()> {
        write_record(&mut self.writer, timestamp_us, frame)?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("failed to flush recording: {}", e);
        }
    }
}

/// Play a recording into `queue`, sleeping between frames so they arrive
/// with their recorded spacing. Returns the number of frames queued.
///
/// Stops early when `cancel` is set, and cancels it once the recording is
/// exhausted so the tick loop winds down.
pub async fn play_file<P: AsRef<Path>>(
    path: P,
    queue: FrameQueue,
    cancel: CancellationToken,
) -> io::Result<usize> {
    let data = tokio::fs::read(path.as_ref()).await?;
    info!(
        "playing {} ({} bytes)",
        path.as_ref().display(),
        data.len()
    );

    let start = Instant::now();
    let mut first_us = None;
    let mut played = 0;
    for record in RecordReader::new(Cursor::new(data)) {
        if cancel.is_cancelled() {
            break;
        }
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("recording ends early: {}", e);
                break;
            }
        };

        let base = *first_us.get_or_insert(record.timestamp_us);
        let offset = record.timestamp_us.saturating_sub(base);
        sleep_until(start + Duration::from_micros(offset)).await;
        queue.push(record.frame);
        played += 1;
    }

    info!("playback finished after {} frames", played);
    cancel.cancel();
    Ok(played)
}
