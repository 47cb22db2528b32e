//! Replay server network layer: accepts TCP viewers and streams a recording
//! to each of them at its recorded pace

use crate::client_manager::ViewerManager;
use crate::playback::{Batcher, Recording};
use log::{debug, error, info, warn};
use rand::Rng;
use shared::packet::{LoginRequest, CHALLENGE_FRAME_SIZE, HEADER_SIZE, HELLO};
use shared::secret::solve;
use shared::wire::{read_frame, write_frame};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::{sleep, sleep_until, Instant};

/// Build a `'6'` challenge frame with a random lowercase body.
pub fn challenge_frame<R: Rng>(rng: &mut R) -> [u8; CHALLENGE_FRAME_SIZE] {
    let mut frame = [0u8; CHALLENGE_FRAME_SIZE];
    frame[2] = b'6';
    for byte in frame[HEADER_SIZE..].iter_mut() {
        *byte = rng.gen_range(b'a'..=b'z');
    }
    frame
}

async fn expect_frame<S>(stream: &mut S, what: &str) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    read_frame(stream).await?.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("viewer left before sending {}", what),
        )
    })
}

/// Server side of the connection handshake.
///
/// Expects the hello byte. When `challenge` is given it is sent, the
/// viewer's answer is checked and the login frame is read here. Without a
/// challenge the viewer only logs in after its first game frame, so the
/// login arrives with the control stream and `None` is returned.
pub async fn handshake<S>(
    stream: &mut S,
    challenge: Option<[u8; CHALLENGE_FRAME_SIZE]>,
) -> io::Result<Option<LoginRequest>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let hello = expect_frame(stream, "hello").await?;
    if hello != [HELLO] {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected hello {:?}", hello),
        ));
    }

    let challenge = match challenge {
        Some(challenge) => challenge,
        None => return Ok(None),
    };

    write_frame(stream, &challenge).await?;
    stream.flush().await?;
    let response = expect_frame(stream, "challenge response").await?;
    if response[..] != solve(&challenge)[..] {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "wrong challenge response",
        ));
    }

    let login = expect_frame(stream, "login").await?;
    LoginRequest::decode(&login)
        .map(Some)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed login frame"))
}

/// Control messages are at most two bytes, so anything longer that parses
/// as a login is one.
fn late_login(frame: &[u8]) -> Option<LoginRequest> {
    if frame.len() > 2 {
        LoginRequest::decode(frame)
    } else {
        None
    }
}

async fn write_batch<W>(writer: &mut W, batch: &[Vec<u8>]) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    for frame in batch {
        write_frame(writer, frame).await?;
    }
    if !batch.is_empty() {
        writer.flush().await?;
    }
    Ok(batch.len())
}

/// Write every frame of `recording` to `writer`, keeping the recorded
/// spacing. Frames due close together go out in one burst.
///
/// Returns the number of frames written.
pub async fn stream_recording<W>(writer: &mut W, recording: &Recording) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let start = Instant::now();
    let mut batcher = Batcher::new();
    let mut sent = 0;

    for timed in recording.frames() {
        let due = start + Duration::from_micros(timed.offset_us);
        let now = Instant::now();
        let wait_us = if due > now {
            (due - now).as_micros() as i64
        } else {
            -((now - due).as_micros() as i64)
        };

        if let Some(batch) = batcher.push(timed.frame.clone(), wait_us) {
            sleep_until(due).await;
            sent += write_batch(writer, &batch).await?;
        }
    }

    sent += write_batch(writer, &batcher.finish()).await?;
    Ok(sent)
}

/// Reads control frames from a viewer until it disconnects.
async fn drain_controls(
    mut reader: OwnedReadHalf,
    viewer_id: u32,
    viewers: Arc<RwLock<ViewerManager>>,
) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => match late_login(&frame) {
                Some(login) => viewers.write().await.set_nickname(viewer_id, login.nickname),
                None => {
                    debug!("Viewer {} control {:?}", viewer_id, frame);
                    viewers.write().await.record_control(viewer_id);
                }
            },
            Ok(None) => break,
            Err(e) => {
                debug!("Viewer {} read failed: {}", viewer_id, e);
                break;
            }
        }
    }
}

async fn serve_viewer(
    mut stream: TcpStream,
    viewer_id: u32,
    recording: Arc<Recording>,
    viewers: Arc<RwLock<ViewerManager>>,
    challenge: bool,
) -> io::Result<()> {
    stream.set_nodelay(true)?;

    let challenge = if challenge {
        Some(challenge_frame(&mut rand::thread_rng()))
    } else {
        None
    };
    if let Some(login) = handshake(&mut stream, challenge).await? {
        viewers.write().await.set_nickname(viewer_id, login.nickname);
    }

    let (reader, mut writer) = stream.into_split();
    let drain = tokio::spawn(drain_controls(reader, viewer_id, Arc::clone(&viewers)));

    let result = stream_recording(&mut writer, &recording).await;
    drain.abort();

    let sent = result?;
    viewers.write().await.record_sent(viewer_id, sent);
    info!("Viewer {} reached the end of the recording", viewer_id);
    writer.shutdown().await
}

/// Replay server streaming one recording to every viewer that connects
pub struct Server {
    listener: TcpListener,
    recording: Arc<Recording>,
    viewers: Arc<RwLock<ViewerManager>>,
    challenge: bool,
}

impl Server {
    pub async fn new(
        addr: &str,
        recording: Recording,
        max_viewers: usize,
        challenge: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "Replay server listening on {} ({} frames, challenge {})",
            listener.local_addr()?,
            recording.len(),
            if challenge { "on" } else { "off" }
        );

        Ok(Server {
            listener,
            recording: Arc::new(recording),
            viewers: Arc::new(RwLock::new(ViewerManager::new(max_viewers))),
            challenge,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn viewers(&self) -> Arc<RwLock<ViewerManager>> {
        Arc::clone(&self.viewers)
    }

    /// Admits a connection and spawns its session task
    async fn spawn_viewer(&self, stream: TcpStream, addr: SocketAddr) {
        let viewer_id = {
            let mut viewers = self.viewers.write().await;
            viewers.add_viewer(addr)
        };
        let viewer_id = match viewer_id {
            Some(id) => id,
            None => {
                warn!("Rejecting {}: server full", addr);
                return;
            }
        };

        let recording = Arc::clone(&self.recording);
        let viewers = Arc::clone(&self.viewers);
        let challenge = self.challenge;
        tokio::spawn(async move {
            if let Err(e) =
                serve_viewer(stream, viewer_id, recording, Arc::clone(&viewers), challenge).await
            {
                warn!("Viewer {} session failed: {}", viewer_id, e);
            }
            viewers.write().await.remove_viewer(&viewer_id);
        });
    }

    /// Accepts viewers until Ctrl+C
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.spawn_viewer(stream, addr).await,
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            sleep(Duration::from_millis(10)).await;
                        }
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
