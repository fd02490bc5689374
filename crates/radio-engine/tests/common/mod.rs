#![allow(dead_code)]

//! In-memory stand-ins for the platform collaborators.

use std::sync::{Arc, Mutex, MutexGuard};

use radio_engine::frame::{FrameHandle, FrameScheduler};
use radio_engine::media::{FrequencySource, GraphActivation, GraphContext, MediaEvent, MediaOutput, ReadyState};
use radio_engine::render::BarSurface;
use radio_engine::{PlaybackEngine, PlaybackError, Renderer, Session, SessionEvent, SessionSettings};
use radio_proto::protocol::{Command, SessionSnapshot, Station};
use radio_proto::state::MemoryStore;
use tokio::sync::{broadcast, mpsc};

pub const FFT_SIZE: usize = 256;

// ── output ────────────────────────────────────────────────────────────────────

/// Everything the fake output was asked to do, plus knobs for its answers.
#[derive(Debug)]
pub struct OutputLog {
    pub loads: Vec<String>,
    pub plays: usize,
    pub pauses: usize,
    pub volumes: Vec<f32>,
    pub graphs_built: usize,
    pub resumes: usize,
    pub suspended: bool,
    pub ready: ReadyState,
    /// Rejection returned by the next `play`.
    pub fail_next_play: Option<PlaybackError>,
    /// Byte level every analyser bin reports.
    pub level: u8,
    pub shut_down: bool,
}

impl Default for OutputLog {
    fn default() -> Self {
        Self {
            loads: Vec::new(),
            plays: 0,
            pauses: 0,
            volumes: Vec::new(),
            graphs_built: 0,
            resumes: 0,
            suspended: true,
            ready: ReadyState::HaveNothing,
            fail_next_play: None,
            level: 200,
            shut_down: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct OutputProbe(Arc<Mutex<OutputLog>>);

impl OutputProbe {
    pub fn log(&self) -> MutexGuard<'_, OutputLog> {
        self.0.lock().unwrap()
    }
}

pub struct FakeOutput {
    probe: OutputProbe,
    activation: GraphActivation,
}

impl FakeOutput {
    pub fn new(activation: GraphActivation) -> (Self, OutputProbe) {
        let probe = OutputProbe::default();
        (
            Self {
                probe: probe.clone(),
                activation,
            },
            probe,
        )
    }
}

pub struct FakeContext(OutputProbe);

impl GraphContext for FakeContext {
    fn is_suspended(&self) -> bool {
        self.0.log().suspended
    }

    async fn resume(&mut self) -> Result<(), PlaybackError> {
        let mut log = self.0.log();
        log.suspended = false;
        log.resumes += 1;
        Ok(())
    }
}

pub struct FakeAnalyser {
    bins: usize,
    probe: OutputProbe,
}

impl FrequencySource for FakeAnalyser {
    fn bin_count(&self) -> usize {
        self.bins
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        out.fill(self.probe.log().level);
    }
}

impl MediaOutput for FakeOutput {
    type Context = FakeContext;
    type Analyser = FakeAnalyser;

    fn activation(&self) -> GraphActivation {
        self.activation
    }

    fn connect_graph(&mut self, fft_size: usize) -> Result<(FakeContext, FakeAnalyser), PlaybackError> {
        self.probe.log().graphs_built += 1;
        Ok((
            FakeContext(self.probe.clone()),
            FakeAnalyser {
                bins: fft_size / 2,
                probe: self.probe.clone(),
            },
        ))
    }

    async fn load(&mut self, src: &str) -> Result<(), PlaybackError> {
        self.probe.log().loads.push(src.to_string());
        Ok(())
    }

    async fn play(&mut self) -> Result<(), PlaybackError> {
        let mut log = self.probe.log();
        log.plays += 1;
        match log.fail_next_play.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn pause(&mut self) {
        self.probe.log().pauses += 1;
    }

    async fn set_volume(&mut self, volume: f32) {
        self.probe.log().volumes.push(volume);
    }

    fn ready_state(&self) -> ReadyState {
        self.probe.log().ready
    }

    async fn shutdown(&mut self) {
        self.probe.log().shut_down = true;
    }
}

// ── frames ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SchedulerLog {
    next: u64,
    pub live: Vec<FrameHandle>,
    pub requested: usize,
    pub cancelled: usize,
    pub max_live: usize,
}

/// Frames fire only when the test says so.
#[derive(Clone, Default)]
pub struct ManualScheduler(Arc<Mutex<SchedulerLog>>);

impl ManualScheduler {
    pub fn log(&self) -> MutexGuard<'_, SchedulerLog> {
        self.0.lock().unwrap()
    }

    pub fn live(&self) -> usize {
        self.log().live.len()
    }

    /// Remove and return the oldest outstanding frame, as if it fired.
    pub fn take_live(&self) -> Option<FrameHandle> {
        let mut log = self.log();
        if log.live.is_empty() {
            None
        } else {
            Some(log.live.remove(0))
        }
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let mut log = self.log();
        log.next += 1;
        log.requested += 1;
        let handle = FrameHandle(log.next);
        log.live.push(handle);
        log.max_live = log.max_live.max(log.live.len());
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut log = self.log();
        log.cancelled += 1;
        log.live.retain(|h| *h != handle);
    }
}

// ── harness ───────────────────────────────────────────────────────────────────

pub type TestSession = Session<FakeOutput, BarSurface, ManualScheduler, MemoryStore>;

pub struct Harness {
    pub session: TestSession,
    pub output: OutputProbe,
    pub frames: ManualScheduler,
    pub surface: BarSurface,
    pub tx: mpsc::Sender<SessionEvent>,
    pub rx: mpsc::Receiver<SessionEvent>,
    pub snapshots: broadcast::Receiver<SessionSnapshot>,
}

pub fn stations(names: &[&str]) -> Vec<Station> {
    names
        .iter()
        .map(|n| Station::new(*n, format!("http://{}", n.to_lowercase())))
        .collect()
}

pub async fn harness(names: &[&str]) -> Harness {
    harness_with(names, MemoryStore::default(), GraphActivation::UserGesture).await
}

pub async fn harness_with(names: &[&str], prefs: MemoryStore, activation: GraphActivation) -> Harness {
    let (output, probe) = FakeOutput::new(activation);
    let frames = ManualScheduler::default();
    let surface = BarSurface::new();
    let (tx, rx) = mpsc::channel(64);
    let (snapshot_tx, snapshots) = broadcast::channel(64);

    let mut session = Session::new(
        PlaybackEngine::new(output, FFT_SIZE),
        stations(names),
        Renderer::new(surface.clone(), frames.clone()),
        prefs,
        SessionSettings::default(),
        tx.clone(),
        snapshot_tx,
    );
    session.start().await;
    session
        .handle_event(SessionEvent::Resize {
            width: 64.0,
            height: 20.0,
            pixel_ratio: 2.0,
        })
        .await;

    Harness {
        session,
        output: probe,
        frames,
        surface,
        tx,
        rx,
        snapshots,
    }
}

impl Harness {
    pub async fn media(&mut self, event: MediaEvent) {
        self.session.handle_event(SessionEvent::Media(event)).await;
    }

    pub async fn command(&mut self, cmd: Command) {
        self.session.handle_event(SessionEvent::Command(cmd)).await;
    }

    /// Deliver the outstanding frame, if any.  Returns whether one fired.
    pub async fn fire_frame(&mut self) -> bool {
        match self.frames.take_live() {
            Some(handle) => {
                self.session.handle_event(SessionEvent::Frame(handle)).await;
                true
            }
            None => false,
        }
    }

    /// Toggle play and confirm it from the output side.
    pub async fn start_playing(&mut self) {
        self.command(Command::TogglePlay).await;
        self.media(MediaEvent::Play).await;
    }

    /// Wait for the next event the session posted to itself and process it.
    pub async fn pump(&mut self) -> Option<SessionEvent> {
        let event = self.rx.recv().await?;
        self.session.handle_event(event.clone()).await;
        Some(event)
    }

    pub fn loads(&self) -> Vec<String> {
        self.output.log().loads.clone()
    }

    pub fn plays(&self) -> usize {
        self.output.log().plays
    }
}
