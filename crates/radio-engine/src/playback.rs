//! Playback engine: owns the audio output, its lazily built analysis graph
//! and the playback state machine.
//!
//! The output's event stream is the ground truth for state.  Commands only
//! request changes; `handle_event` applies them via [`transition`].  Every
//! failure is absorbed here and expressed as a state change, so callers never
//! see a `PlaybackError`.

use radio_proto::protocol::{PlaybackState, Station};
use tracing::{debug, info, warn};

use crate::analyzer::{IdlePattern, Sample, SpectrumAnalyzer};
use crate::error::PlaybackError;
use crate::media::{GraphActivation, GraphContext, MediaEvent, MediaOutput, ReadyState};

/// Work the engine asks its owner to do after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Draw now and keep drawing every frame.
    StartFrames,
    /// Cancel the pending frame and draw one idle frame.
    StopFrames,
    /// The current source ended; move to the next station.
    AdvanceStation,
    /// Re-check buffering after the stall grace window.
    ArmStallCheck { generation: u64 },
}

/// The state machine.  `generation` tags any stall check it arms.
pub fn transition(
    state: PlaybackState,
    event: &MediaEvent,
    generation: u64,
) -> (PlaybackState, Option<Effect>) {
    use PlaybackState::*;

    match event {
        MediaEvent::Play if state.is_playing() => (Playing, None),
        MediaEvent::Play => (Playing, Some(Effect::StartFrames)),

        MediaEvent::Playing if state == Stalled => (Playing, None),
        MediaEvent::Playing => (state, None),

        // a pause for a source that never started is stale (left over from
        // a load) and must not clobber the new request
        MediaEvent::Pause if state.is_playing() => (Paused, Some(Effect::StopFrames)),
        MediaEvent::Pause => (state, None),

        MediaEvent::Ended => (state, Some(Effect::AdvanceStation)),

        MediaEvent::Error(_) | MediaEvent::Abort => (Errored, Some(Effect::StopFrames)),

        MediaEvent::Stalled => match state {
            Playing => (Stalled, Some(Effect::ArmStallCheck { generation })),
            Loading => (Loading, Some(Effect::ArmStallCheck { generation })),
            _ => (state, None),
        },
    }
}

/// `source → analyser → destination`, built at most once.
pub struct AudioGraph<O: MediaOutput> {
    context: O::Context,
    analyzer: SpectrumAnalyzer<O::Analyser>,
}

pub struct PlaybackEngine<O: MediaOutput> {
    output: O,
    state: PlaybackState,
    graph: Option<AudioGraph<O>>,
    idle: IdlePattern,
    fft_size: usize,
    /// The user wants sound.  Survives station switches and track ends.
    play_intent: bool,
    /// Bumped whenever an armed stall check must be ignored.
    stall_generation: u64,
}

impl<O: MediaOutput> PlaybackEngine<O> {
    pub fn new(output: O, fft_size: usize) -> Self {
        Self {
            output,
            state: PlaybackState::Idle,
            graph: None,
            idle: IdlePattern::new(fft_size / 2),
            fft_size,
            play_intent: false,
            stall_generation: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn wants_playback(&self) -> bool {
        self.play_intent
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    pub fn stall_generation(&self) -> u64 {
        self.stall_generation
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    // ── graph ─────────────────────────────────────────────────────────────────

    fn ensure_graph(&mut self) -> Result<&mut AudioGraph<O>, PlaybackError> {
        let graph = match self.graph.take() {
            Some(graph) => graph,
            None => {
                let (context, node) = self.output.connect_graph(self.fft_size)?;
                let analyzer = SpectrumAnalyzer::new(node);
                info!("Engine: audio graph built ({} bins)", analyzer.bin_count());
                AudioGraph { context, analyzer }
            }
        };
        Ok(self.graph.insert(graph))
    }

    /// Build the graph ahead of the first play when the platform allows it.
    pub fn prepare_graph(&mut self) {
        if self.output.activation() != GraphActivation::Immediate {
            debug!("Engine: graph deferred until first play");
            return;
        }
        if let Err(e) = self.ensure_graph() {
            warn!("Engine: eager graph construction failed: {}", e);
        }
    }

    // ── commands ──────────────────────────────────────────────────────────────

    /// Point the output at `station` without starting it.
    pub async fn load_station(&mut self, station: &Station) -> Vec<Effect> {
        self.stall_generation += 1;
        match self.output.load(&station.src).await {
            Ok(()) => {
                info!("Engine: loaded '{}'", station.name);
                self.state = PlaybackState::Idle;
            }
            Err(e) => {
                warn!("Engine: load of '{}' failed: {}", station.name, e);
                self.state = PlaybackState::Errored;
            }
        }
        vec![Effect::StopFrames]
    }

    pub async fn play(&mut self) -> Vec<Effect> {
        self.play_intent = true;
        match self.start().await {
            Ok(()) => {
                if !self.state.is_playing() {
                    self.state = PlaybackState::Loading;
                }
                Vec::new()
            }
            Err(e) => {
                warn!("Engine: play rejected: {}", e);
                self.state = e.fallback_state();
                self.play_intent = false;
                self.stall_generation += 1;
                vec![Effect::StopFrames]
            }
        }
    }

    async fn start(&mut self) -> Result<(), PlaybackError> {
        let graph = self.ensure_graph()?;
        if graph.context.is_suspended() {
            graph.context.resume().await?;
        }
        self.output.play().await
    }

    /// Request a pause.  The state follows the resulting `Pause` event,
    /// except for a source that never started, which goes straight to idle.
    pub async fn pause(&mut self) -> Vec<Effect> {
        self.play_intent = false;
        self.stall_generation += 1;
        self.output.pause().await;
        if self.state == PlaybackState::Loading {
            self.state = PlaybackState::Idle;
            return vec![Effect::StopFrames];
        }
        Vec::new()
    }

    pub async fn set_volume(&mut self, volume: f32) {
        self.output.set_volume(volume.clamp(0.0, 1.0)).await;
    }

    // ── events ────────────────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: &MediaEvent) -> Vec<Effect> {
        let (next, effect) = transition(self.state, event, self.stall_generation);
        if next != self.state {
            debug!("Engine: {:?} -> {:?} on {:?}", self.state, next, event);
        }

        match next {
            PlaybackState::Errored if self.state != PlaybackState::Errored => {
                warn!("Engine: playback failed on {:?}", event);
                self.play_intent = false;
                self.stall_generation += 1;
            }
            PlaybackState::Paused => self.play_intent = false,
            PlaybackState::Playing => self.play_intent = true,
            _ => {}
        }
        self.state = next;
        effect.into_iter().collect()
    }

    /// The single delayed stall check.  Fails playback when the output still
    /// cannot play ahead; stale generations are ignored.
    pub fn check_stall(&mut self, generation: u64) -> Vec<Effect> {
        if generation != self.stall_generation {
            debug!("Engine: ignoring stale stall check {}", generation);
            return Vec::new();
        }
        if !matches!(self.state, PlaybackState::Stalled | PlaybackState::Loading) {
            return Vec::new();
        }

        let ready = self.output.ready_state();
        if ready < ReadyState::HaveFutureData {
            warn!("Engine: no recovery from stall (ready state {:?})", ready);
            self.state = PlaybackState::Errored;
            self.play_intent = false;
            self.stall_generation += 1;
            return vec![Effect::StopFrames];
        }

        if self.state == PlaybackState::Stalled {
            self.state = PlaybackState::Playing;
        }
        Vec::new()
    }

    /// Analyzer sample for the current frame: live data while playing, the
    /// idle filler otherwise.
    pub fn sample(&mut self) -> Sample<'_> {
        let active = self.state.is_playing();
        match self.graph.as_mut() {
            Some(graph) => graph.analyzer.sample(active),
            None => self.idle.sample(),
        }
    }

    pub async fn shutdown(&mut self) {
        self.play_intent = false;
        self.stall_generation += 1;
        self.output.shutdown().await;
        self.state = PlaybackState::Idle;
    }
}
