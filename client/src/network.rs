use crate::decoder::PacketDecoder;
use crate::game::GameState;
use crate::input::{AutopilotInput, ControlSender, InputSource};
use crate::motion::MotionExtrapolator;
use crate::rendering::{LogRenderer, Renderer, Snapshot};
use crate::replay::{play_file, Recorder};
use crate::view::ViewMapper;
use log::{debug, error, info, warn};
use shared::packet::{LoginRequest, CHALLENGE_FRAME_SIZE, HEADER_SIZE, HELLO};
use shared::secret::solve;
use shared::wire::{read_frame, write_frame};
use shared::{uptime_us, DRAW_PERIOD, SEND_PERIOD_MIN};
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::time::interval;

/// Period of the pointer sweep used by the headless autopilot.
const AUTOPILOT_PERIOD_US: u64 = 8_000_000;

/// Frames handed from the reader task to the tick loop.
///
/// The reader only pushes; the tick loop drains everything at once and
/// decodes outside the lock.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    inner: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Vec<u8>>> {
        // a panicking producer leaves the queue itself intact
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, frame: Vec<u8>) {
        self.lock().push_back(frame);
    }

    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Shared stop flag, checked between ticks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub nickname: String,
    pub skin: u8,
    pub record_file: Option<PathBuf>,
    pub play_file: Option<PathBuf>,
    pub width: i32,
    pub height: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:8080".to_string(),
            nickname: String::new(),
            skin: 0,
            record_file: None,
            play_file: None,
            width: 800,
            height: 600,
        }
    }
}

/// Run the connection handshake on a fresh stream.
///
/// Sends the hello byte, answers the challenge if the server issues one,
/// then logs in. A first frame that is not a challenge is returned so the
/// caller can feed it to the game like any other frame.
pub async fn connect<S>(stream: &mut S, login: &LoginRequest) -> io::Result<Option<Vec<u8>>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_frame(stream, &[HELLO]).await?;

    let first = read_frame(stream)
        .await?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "closed during handshake"))?;

    let pending = if first.len() >= HEADER_SIZE && first[2] == b'6' {
        let challenge: &[u8; CHALLENGE_FRAME_SIZE] = first.as_slice().try_into().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("challenge of {} bytes", first.len()),
            )
        })?;
        write_frame(stream, &solve(challenge)).await?;
        debug!("challenge answered");
        None
    } else {
        debug!("no challenge, first frame kept for the game");
        Some(first)
    };

    write_frame(stream, &login.encode()).await?;
    info!("logged in as '{}' with skin {}", login.nickname, login.skin);
    Ok(pending)
}

/// Pump frames from the server into `queue` until the stream ends.
///
/// Frames shorter than a header are dropped here. The token is cancelled
/// when the stream ends or fails.
pub async fn read_frames<R>(
    mut reader: R,
    queue: FrameQueue,
    mut recorder: Option<Recorder>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    while !cancel.is_cancelled() {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => {
                if frame.len() < HEADER_SIZE {
                    warn!("dropping {} byte frame", frame.len());
                    continue;
                }
                let failed = match recorder.as_mut() {
                    Some(recorder) => recorder.record(uptime_us(), &frame).err(),
                    None => None,
                };
                if let Some(e) = failed {
                    error!("recording stopped: {}", e);
                    recorder = None;
                }
                queue.push(frame);
            }
            Ok(None) => {
                info!("server closed the connection");
                break;
            }
            Err(e) => {
                error!("error receiving frame: {}", e);
                break;
            }
        }
    }
    cancel.cancel();
}

/// Everything the tick loop owns: the world model and the stages that
/// read and write it.
pub struct ClientContext {
    pub state: GameState,
    pub decoder: PacketDecoder,
    pub motion: MotionExtrapolator,
    pub sender: ControlSender,
    pub mapper: ViewMapper,
    pub queue: FrameQueue,
}

impl ClientContext {
    pub fn new(mapper: ViewMapper, queue: FrameQueue) -> Self {
        Self {
            state: GameState::new(),
            decoder: PacketDecoder::new(),
            motion: MotionExtrapolator::new(),
            sender: ControlSender::new(),
            mapper,
            queue,
        }
    }

    /// Decode everything queued so far. Returns the number of frames.
    pub fn consume_frames(&mut self, now_us: u64) -> usize {
        let frames = self.queue.drain();
        for frame in &frames {
            self.decoder.handle(&mut self.state, frame, now_us);
        }
        frames.len()
    }

    /// One render tick: decode, extrapolate, capture, then clean up.
    pub fn tick(&mut self, now_us: u64) -> Snapshot {
        self.consume_frames(now_us);
        self.state.refresh_view();

        let at_us = now_us + self.state.ping.network_delay_us();
        self.motion.advance(&mut self.state, at_us);
        let snapshot = Snapshot::capture(&self.state, &self.motion, at_us);

        self.state.maintain();
        self.state.has_data = false;
        snapshot
    }
}

/// A running client: either connected to a server or replaying a file.
pub struct Client {
    config: ClientConfig,
    context: ClientContext,
    input: Box<dyn InputSource + Send>,
    renderer: Box<dyn Renderer + Send>,
    writer: Option<Arc<tokio::sync::Mutex<OwnedWriteHalf>>>,
    cancel: CancellationToken,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        if config.width <= 0 || config.height <= 0 {
            return Err(format!("invalid viewport {}x{}", config.width, config.height).into());
        }
        let mapper = ViewMapper::new(config.width, config.height);
        Ok(Client {
            context: ClientContext::new(mapper, FrameQueue::new()),
            input: Box::new(AutopilotInput::new(mapper, AUTOPILOT_PERIOD_US)),
            renderer: Box::new(LogRenderer::new()),
            writer: None,
            cancel: CancellationToken::new(),
            config,
        })
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer + Send>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_input(mut self, input: Box<dyn InputSource + Send>) -> Self {
        self.input = input;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    async fn start_network(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("connecting to {}", self.config.server);
        let mut stream = TcpStream::connect(&self.config.server).await?;
        stream.set_nodelay(true)?;

        let login = LoginRequest::new(self.config.skin, &self.config.nickname);
        let pending = connect(&mut stream, &login).await?;

        let mut recorder = match &self.config.record_file {
            Some(path) => Some(Recorder::create(path)?),
            None => None,
        };
        if let Some(frame) = pending {
            if let Some(recorder) = recorder.as_mut() {
                recorder.record(uptime_us(), &frame)?;
            }
            self.context.queue.push(frame);
        }

        let (reader, writer) = stream.into_split();
        self.writer = Some(Arc::new(tokio::sync::Mutex::new(writer)));
        tokio::spawn(read_frames(
            reader,
            self.context.queue.clone(),
            recorder,
            self.cancel.clone(),
        ));
        Ok(())
    }

    async fn send_controls(&mut self) {
        let writer = match &self.writer {
            Some(writer) => writer.clone(),
            None => return,
        };
        let now_us = uptime_us();
        let sample = self.input.sample(now_us);
        let ctx = &mut self.context;
        let messages = ctx.sender.poll(&mut ctx.state, &ctx.mapper, &sample, now_us);
        if messages.is_empty() {
            return;
        }

        let mut writer = writer.lock().await;
        for message in messages {
            if let Err(e) = write_frame(&mut *writer, &message.encode()).await {
                error!("error sending control: {}", e);
                self.cancel.cancel();
                return;
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        match self.config.play_file.clone() {
            Some(path) => {
                let queue = self.context.queue.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    if let Err(e) = play_file(&path, queue, cancel.clone()).await {
                        error!("playback failed: {}", e);
                        cancel.cancel();
                    }
                });
            }
            None => self.start_network().await?,
        }

        let mut render_interval = interval(DRAW_PERIOD);
        let mut send_interval = interval(SEND_PERIOD_MIN);

        while !self.cancel.is_cancelled() && self.renderer.is_open() {
            tokio::select! {
                _ = render_interval.tick() => {
                    let snapshot = self.context.tick(uptime_us());
                    self.renderer.render(&snapshot);
                },

                _ = send_interval.tick() => {
                    self.send_controls().await;
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted, shutting down");
                    self.cancel.cancel();
                },
            }
        }

        // frames that arrived after the last tick
        let snapshot = self.context.tick(uptime_us());
        self.renderer.render(&snapshot);
        info!(
            "client stopped: {} frames applied, {} dropped",
            self.context.decoder.applied, self.context.decoder.dropped
        );
        Ok(())
    }
}
