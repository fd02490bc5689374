//! Session coordinator: single-owner event loop for the player.
//!
//! Every input (commands from the key map or HTTP API, output lifecycle
//! events, fired frames, stall checks, resizes) arrives as a `SessionEvent`
//! on one ordered queue.  `Session` owns the engine, the station controller,
//! the renderer and the preference store exclusively; no other task touches
//! them.  After each processed event a `SessionSnapshot` is published on a
//! `tokio::sync::broadcast` channel when anything visible changed.

use std::collections::VecDeque;
use std::time::Duration;

use radio_proto::config::PlayerConfig;
use radio_proto::protocol::{Command, PlaybackState, SessionSnapshot, Station};
use radio_proto::state::{load_station_index, load_volume, save_volume, PreferenceStore};
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::frame::{FrameHandle, FrameScheduler};
use crate::media::{MediaEvent, MediaOutput};
use crate::playback::{Effect, PlaybackEngine};
use crate::render::{Renderer, Surface};
use crate::station::StationController;

/// Volume change per `VolumeUp` / `VolumeDown`.
pub const VOLUME_STEP: f32 = 0.05;

// ── SessionEvent ──────────────────────────────────────────────────────────────

/// All inputs into the session loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A user action from any presentation layer.
    Command(Command),
    /// Lifecycle event from the audio output, in emission order.
    Media(MediaEvent),
    /// A scheduled display frame fired.
    Frame(FrameHandle),
    /// The stall grace window armed with this generation elapsed.
    StallCheck(u64),
    /// The drawing area changed size (CSS pixels).
    Resize {
        width: f32,
        height: f32,
        pixel_ratio: f32,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub default_volume: f32,
    pub stall_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&PlayerConfig::default())
    }
}

impl From<&PlayerConfig> for SessionSettings {
    fn from(config: &PlayerConfig) -> Self {
        Self {
            default_volume: config.default_volume.clamp(0.0, 1.0),
            stall_grace: Duration::from_millis(config.stall_grace_ms),
        }
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct Session<O, S, F, P>
where
    O: MediaOutput,
{
    engine: PlaybackEngine<O>,
    stations: StationController,
    renderer: Renderer<S, F>,
    prefs: P,
    volume: f32,
    settings: SessionSettings,
    /// Used to post stall checks back into our own queue.
    event_tx: mpsc::Sender<SessionEvent>,
    /// Pending stall checks with their deadlines.  Each stall arms its own.
    stall_timers: Vec<(Instant, AbortHandle)>,
    snapshot_tx: broadcast::Sender<SessionSnapshot>,
    rev: u64,
    /// Last published snapshot (to avoid redundant broadcasts).
    last_published: Option<SessionSnapshot>,
}

impl<O, S, F, P> Session<O, S, F, P>
where
    O: MediaOutput,
    S: Surface,
    F: FrameScheduler,
    P: PreferenceStore,
{
    pub fn new(
        engine: PlaybackEngine<O>,
        stations: Vec<Station>,
        renderer: Renderer<S, F>,
        prefs: P,
        settings: SessionSettings,
        event_tx: mpsc::Sender<SessionEvent>,
        snapshot_tx: broadcast::Sender<SessionSnapshot>,
    ) -> Self {
        Self {
            engine,
            stations: StationController::new(stations),
            renderer,
            prefs,
            volume: settings.default_volume,
            settings,
            event_tx,
            stall_timers: Vec::new(),
            snapshot_tx,
            rev: 0,
            last_published: None,
        }
    }

    /// Restore preferences, preload the saved station without playing it and
    /// draw the idle picture.
    pub async fn start(&mut self) {
        let saved = load_station_index(&self.prefs, self.stations.len());
        self.stations.restore(saved);

        self.volume = load_volume(&self.prefs).unwrap_or(self.settings.default_volume);
        self.engine.set_volume(self.volume).await;
        info!(
            "Session: {} stations, index {:?}, volume {:.2}",
            self.stations.len(),
            self.stations.current_index(),
            self.volume
        );

        if let Some(station) = self.stations.current_station().cloned() {
            let effects = self.engine.load_station(&station).await;
            self.apply(effects).await;
        }

        self.engine.prepare_graph();
        self.draw();
        self.publish();
    }

    /// Run the event loop.  Returns when a `Shutdown` event is received or
    /// every sender is gone.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<SessionEvent>) {
        info!("Session: starting event loop");

        loop {
            match event_rx.recv().await {
                None => {
                    info!("Session: event channel closed, shutting down");
                    break;
                }
                Some(SessionEvent::Shutdown) => {
                    info!("Session: shutdown requested");
                    break;
                }
                Some(event) => self.handle_event(event).await,
            }
        }

        event_rx.close();
        self.teardown().await;
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Command(cmd) => {
                info!("Session: command {:?}", cmd);
                self.handle_command(cmd).await;
            }
            SessionEvent::Media(media) => {
                debug!("Session: media event {:?}", media);
                let effects = self.engine.handle_event(&media);
                self.apply(effects).await;
            }
            SessionEvent::Frame(handle) => {
                if self.renderer.accept_frame(handle) {
                    self.draw();
                    if self.engine.is_playing() {
                        self.renderer.schedule_next();
                    }
                }
            }
            SessionEvent::StallCheck(generation) => {
                let now = Instant::now();
                self.stall_timers.retain(|(due, _)| *due > now);
                let effects = self.engine.check_stall(generation);
                self.apply(effects).await;
            }
            SessionEvent::Resize {
                width,
                height,
                pixel_ratio,
            } => {
                self.renderer.resize(width, height, pixel_ratio);
                self.draw();
            }
            SessionEvent::Shutdown => {}
        }
        self.publish();
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::TogglePlay => self.toggle_play().await,
            Command::Next => self.next_track().await,
            Command::Prev => self.prev_track().await,
            Command::SwitchStation { index } => self.switch_station(index).await,
            Command::Volume { value } => self.set_volume(value).await,
            Command::VolumeUp => self.volume_up().await,
            Command::VolumeDown => self.volume_down().await,
        }
    }

    // ── exposed actions ───────────────────────────────────────────────────────

    pub async fn toggle_play(&mut self) {
        if self.engine.wants_playback() {
            let effects = self.engine.pause().await;
            self.apply(effects).await;
        } else if self.stations.current_station().is_some() {
            let effects = self.engine.play().await;
            self.apply(effects).await;
        }
    }

    pub async fn next_track(&mut self) {
        if let Some(effects) = self
            .stations
            .next_track(&mut self.engine, &mut self.prefs)
            .await
        {
            self.apply(effects).await;
        }
    }

    pub async fn prev_track(&mut self) {
        if let Some(effects) = self
            .stations
            .prev_track(&mut self.engine, &mut self.prefs)
            .await
        {
            self.apply(effects).await;
        }
    }

    pub async fn switch_station(&mut self, index: usize) {
        match self
            .stations
            .switch_station(index, &mut self.engine, &mut self.prefs)
            .await
        {
            Some(effects) => self.apply(effects).await,
            None => debug!("Session: ignoring switch to missing station {}", index),
        }
    }

    pub async fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;
        self.engine.set_volume(volume).await;
        if let Err(e) = save_volume(&mut self.prefs, volume) {
            warn!("Session: failed to persist volume: {}", e);
        }
    }

    pub async fn volume_up(&mut self) {
        self.set_volume(step_volume(self.volume, VOLUME_STEP)).await;
    }

    pub async fn volume_down(&mut self) {
        self.set_volume(step_volume(self.volume, -VOLUME_STEP)).await;
    }

    // ── observables ───────────────────────────────────────────────────────────

    pub fn current_station(&self) -> Option<&Station> {
        self.stations.current_station()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.stations.current_index()
    }

    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.state()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn stations(&self) -> &[Station] {
        self.stations.stations()
    }

    pub fn engine(&self) -> &PlaybackEngine<O> {
        &self.engine
    }

    pub fn renderer(&self) -> &Renderer<S, F> {
        &self.renderer
    }

    pub fn prefs(&self) -> &P {
        &self.prefs
    }

    pub fn has_stall_timer(&self) -> bool {
        !self.stall_timers.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            rev: self.rev,
            state: self.engine.state(),
            is_playing: self.engine.is_playing(),
            current_index: self.stations.current_index(),
            current_station: self.stations.current_station().cloned(),
            volume: self.volume,
        }
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    /// Carry out engine effects in order.  Advancing to the next station can
    /// yield more effects; they join the back of the queue.
    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::StartFrames => {
                    self.draw();
                    self.renderer.schedule_next();
                }
                Effect::StopFrames => {
                    self.renderer.stop();
                    self.cancel_stall_timers();
                    self.draw();
                }
                Effect::AdvanceStation => {
                    info!("Session: track ended, advancing");
                    if let Some(more) = self
                        .stations
                        .next_track(&mut self.engine, &mut self.prefs)
                        .await
                    {
                        queue.extend(more);
                    }
                }
                Effect::ArmStallCheck { generation } => self.arm_stall_check(generation),
            }
        }
    }

    fn draw(&mut self) {
        let sample = self.engine.sample();
        self.renderer.render_frame(&sample);
    }

    fn arm_stall_check(&mut self, generation: u64) {
        let tx = self.event_tx.clone();
        let grace = self.settings.stall_grace;
        debug!("Session: stall check {} armed for {:?}", generation, grace);
        let task = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(SessionEvent::StallCheck(generation)).await;
        });
        self.stall_timers.push((Instant::now() + grace, task.abort_handle()));
    }

    fn cancel_stall_timers(&mut self) {
        for (_, timer) in self.stall_timers.drain(..) {
            timer.abort();
        }
    }

    fn publish(&mut self) {
        let mut snapshot = self.snapshot();
        if self.last_published.as_ref() == Some(&snapshot) {
            return;
        }
        self.rev += 1;
        snapshot.rev = self.rev;
        let _ = self.snapshot_tx.send(snapshot.clone());
        self.last_published = Some(snapshot);
    }

    async fn teardown(&mut self) {
        info!("Session: teardown");
        self.renderer.stop();
        self.cancel_stall_timers();
        self.engine.shutdown().await;
        self.publish();
    }
}

fn step_volume(volume: f32, delta: f32) -> f32 {
    ((volume + delta) * 100.0).round() / 100.0
}
