//! Viewer session bookkeeping for the replay server
//!
//! This module tracks every connection the replay server is streaming to:
//! - Viewer admission against a capacity limit
//! - Login details reported by the viewer
//! - Delivery counters for frames sent and control bytes received
//!
//! Sessions are independent; each viewer gets the whole recording from the
//! start, so the manager only needs to know who is connected.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected viewer and its delivery statistics
#[derive(Debug)]
pub struct Viewer {
    /// Unique viewer identifier assigned by the server
    pub id: u32,
    /// Remote address of the connection
    pub addr: SocketAddr,
    /// When the connection was admitted
    pub connected_at: Instant,
    /// Nickname from the login packet, once received
    pub nickname: Option<String>,
    /// Frames written to the viewer so far
    pub frames_sent: u64,
    /// Control messages received from the viewer
    pub controls_received: u64,
}

impl Viewer {
    /// Creates a new viewer with the given ID and address
    ///
    /// The viewer starts without a nickname and with zeroed counters; both
    /// are filled in as the handshake and stream progress.
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            nickname: None,
            frames_sent: 0,
            controls_received: 0,
        }
    }

    /// Time since the viewer was admitted
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Tracks all viewers and enforces the connection limit
///
/// The manager is shared between the accept loop and every viewer task, so
/// the server keeps it behind an async lock and holds that lock only for
/// the short bookkeeping calls below.
pub struct ViewerManager {
    /// Connected viewers indexed by their ID
    viewers: HashMap<u32, Viewer>,
    /// Next ID handed to an admitted viewer
    next_viewer_id: u32,
    /// Maximum number of concurrent viewers
    max_viewers: usize,
}

impl ViewerManager {
    /// Creates a new viewer manager with the specified capacity limit
    ///
    /// Viewer IDs start from 1 and increment for each admitted connection.
    pub fn new(max_viewers: usize) -> Self {
        Self {
            viewers: HashMap::new(),
            next_viewer_id: 1,
            max_viewers,
        }
    }

    /// Attempts to admit a new connection
    ///
    /// Returns Some(viewer_id) if successful, None if the server is at
    /// capacity.
    pub fn add_viewer(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.viewers.len() >= self.max_viewers {
            return None;
        }

        let viewer_id = self.next_viewer_id;
        self.next_viewer_id += 1;

        info!("Viewer {} connected from {}", viewer_id, addr);
        self.viewers.insert(viewer_id, Viewer::new(viewer_id, addr));

        Some(viewer_id)
    }

    /// Removes a viewer once its session ends
    ///
    /// Returns true if the viewer was found and removed.
    pub fn remove_viewer(&mut self, viewer_id: &u32) -> bool {
        match self.viewers.remove(viewer_id) {
            Some(viewer) => {
                info!(
                    "Viewer {} disconnected after {:.1}s, {} frames sent, {} controls received",
                    viewer.id,
                    viewer.connected_for().as_secs_f32(),
                    viewer.frames_sent,
                    viewer.controls_received
                );
                true
            }
            None => false,
        }
    }

    /// Records the nickname from the viewer's login packet
    pub fn set_nickname(&mut self, viewer_id: u32, nickname: String) {
        if let Some(viewer) = self.viewers.get_mut(&viewer_id) {
            info!("Viewer {} logged in as '{}'", viewer_id, nickname);
            viewer.nickname = Some(nickname);
        }
    }

    /// Adds to the count of frames written to a viewer
    pub fn record_sent(&mut self, viewer_id: u32, frames: usize) {
        if let Some(viewer) = self.viewers.get_mut(&viewer_id) {
            viewer.frames_sent += frames as u64;
        }
    }

    /// Counts one control message received from a viewer
    pub fn record_control(&mut self, viewer_id: u32) {
        if let Some(viewer) = self.viewers.get_mut(&viewer_id) {
            viewer.controls_received += 1;
        }
    }

    /// Returns the viewer with the given ID, if connected
    pub fn get_viewer(&self, viewer_id: u32) -> Option<&Viewer> {
        self.viewers.get(&viewer_id)
    }

    /// Returns the current number of connected viewers
    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }

    /// Returns the maximum number of viewers allowed
    pub fn capacity(&self) -> usize {
        self.max_viewers
    }
}
