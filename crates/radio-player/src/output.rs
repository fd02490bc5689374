//! mpv as the engine's audio output.
//!
//! mpv is observation driven: on every fresh connection we observe core-idle,
//! pause and paused-for-cache, and an `EventTranslator` turns the resulting
//! property changes and end-file events into `MediaEvent`s posted to the
//! session queue in arrival order.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use radio_engine::fft::FftAnalyser;
use radio_engine::{GraphActivation, MediaEvent, MediaOutput, PlaybackError, ReadyState, SessionEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBS_CORE_IDLE, OBS_PAUSE, OBS_PAUSED_FOR_CACHE};
use crate::pcm_tap::PcmTap;

// ── EventTranslator ───────────────────────────────────────────────────────────

/// Folds raw mpv notifications into lifecycle events.
///
/// The first value mpv reports for each observed property is a baseline, not
/// a change, and produces no event.
#[derive(Debug, Default)]
pub struct EventTranslator {
    pause: Option<bool>,
    core_idle: Option<bool>,
    paused_for_cache: Option<bool>,
    ready: ReadyState,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready
    }

    pub fn translate(&mut self, evt: &MpvEvent) -> Option<MediaEvent> {
        if let Some((id, data)) = evt.as_property_change() {
            let Some(value) = data.as_bool() else {
                return None;
            };
            return match id {
                OBS_PAUSE => self.on_pause(value),
                OBS_CORE_IDLE => self.on_core_idle(value),
                OBS_PAUSED_FOR_CACHE => self.on_paused_for_cache(value),
                _ => None,
            };
        }

        match evt.event_name()? {
            "start-file" => {
                self.ready = ReadyState::HaveNothing;
                None
            }
            "file-loaded" => {
                self.ready = ReadyState::HaveMetadata;
                None
            }
            "end-file" => {
                self.ready = ReadyState::HaveNothing;
                match evt.end_reason()? {
                    "eof" => Some(MediaEvent::Ended),
                    "error" => {
                        let detail = evt
                            .raw
                            .get("file_error")
                            .and_then(|v| v.as_str())
                            .unwrap_or("playback error");
                        Some(MediaEvent::Error(detail.to_string()))
                    }
                    "quit" => Some(MediaEvent::Abort),
                    // "stop" / "redirect": replaced by a new loadfile
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn on_pause(&mut self, paused: bool) -> Option<MediaEvent> {
        let prev = self.pause.replace(paused);
        if prev.is_none() || prev == Some(paused) {
            return None;
        }
        if paused {
            Some(MediaEvent::Pause)
        } else if self.core_idle == Some(false) {
            self.ready = ReadyState::HaveEnoughData;
            Some(MediaEvent::Play)
        } else {
            // unpaused but nothing decoding yet; core-idle reports the start
            None
        }
    }

    fn on_core_idle(&mut self, idle: bool) -> Option<MediaEvent> {
        let prev = self.core_idle.replace(idle);
        if prev.is_none() || prev == Some(idle) {
            return None;
        }
        if !idle && self.pause == Some(false) && self.paused_for_cache != Some(true) {
            self.ready = ReadyState::HaveEnoughData;
            return Some(MediaEvent::Play);
        }
        None
    }

    fn on_paused_for_cache(&mut self, waiting: bool) -> Option<MediaEvent> {
        let prev = self.paused_for_cache.replace(waiting);
        if prev.is_none() || prev == Some(waiting) {
            return None;
        }
        if waiting {
            self.ready = ReadyState::HaveCurrentData;
            Some(MediaEvent::Stalled)
        } else {
            self.ready = ReadyState::HaveEnoughData;
            Some(MediaEvent::Playing)
        }
    }
}

// ── MpvOutput ─────────────────────────────────────────────────────────────────

pub struct MpvOutput {
    driver: MpvDriver,
    /// Live handle to the mpv IO tasks.  `None` when mpv is not yet connected.
    handle: Option<MpvHandle>,
    /// Session queue that receives translated events.
    session_tx: mpsc::Sender<SessionEvent>,
    /// Last ready state seen by the translator of the live connection.
    ready: Arc<AtomicU8>,
    tap: PcmTap,
    current_src: Option<String>,
    volume: f32,
}

impl MpvOutput {
    pub fn new(session_tx: mpsc::Sender<SessionEvent>, tap: PcmTap) -> Self {
        Self {
            driver: MpvDriver::new(),
            handle: None,
            session_tx,
            ready: Arc::new(AtomicU8::new(ReadyState::HaveNothing.as_u8())),
            tap,
            current_src: None,
            volume: 1.0,
        }
    }

    /// Handle to a live mpv, spawning one when needed.  A respawned mpv gets
    /// the current source reloaded (paused).
    async fn ensure_handle(&mut self) -> anyhow::Result<MpvHandle> {
        if self.handle.is_some() && !self.driver.process_alive() {
            warn!("mpv: process died, dropping handle");
            self.handle = None;
        }
        if let Some(handle) = &self.handle {
            return Ok(handle.clone());
        }

        // Single channel + single forwarder task for this connection.
        let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(64);
        let session_tx = self.session_tx.clone();
        let ready = Arc::clone(&self.ready);
        tokio::spawn(async move {
            let mut translator = EventTranslator::new();
            while let Some(evt) = event_rx.recv().await {
                let media = translator.translate(&evt);
                ready.store(translator.ready_state().as_u8(), Ordering::Relaxed);
                if let Some(media) = media {
                    debug!("mpv: {:?}", media);
                    if session_tx.send(SessionEvent::Media(media)).await.is_err() {
                        break;
                    }
                }
            }
        });

        self.driver.last_volume = self.volume;
        let handle = self.driver.spawn_and_connect(event_tx).await?;
        handle.observe_playback_properties().await;
        self.ready.store(ReadyState::HaveNothing.as_u8(), Ordering::Relaxed);

        if let Some(src) = &self.current_src {
            info!("mpv: reloading {} on fresh process", src);
            handle.load_stream(src).await?;
        }
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

impl MediaOutput for MpvOutput {
    type Context = PcmTap;
    type Analyser = FftAnalyser;

    fn activation(&self) -> GraphActivation {
        // no autoplay policy outside a browser
        GraphActivation::Immediate
    }

    fn connect_graph(&mut self, fft_size: usize) -> Result<(PcmTap, FftAnalyser), PlaybackError> {
        let analyser = FftAnalyser::new(fft_size, self.tap.ring().clone());
        Ok((self.tap.clone(), analyser))
    }

    async fn load(&mut self, src: &str) -> Result<(), PlaybackError> {
        self.current_src = Some(src.to_string());
        self.tap.retarget(src);
        let handle = self.ensure_handle().await.map_err(PlaybackError::from)?;
        handle.set_pause(true).await.map_err(PlaybackError::from)?;
        self.ready.store(ReadyState::HaveNothing.as_u8(), Ordering::Relaxed);
        handle
            .load_stream(src)
            .await
            .map_err(|e| PlaybackError::Network(e.to_string()))
    }

    async fn play(&mut self) -> Result<(), PlaybackError> {
        let handle = self.ensure_handle().await.map_err(PlaybackError::from)?;
        // after an error or end of stream mpv drops the file
        if let Some(src) = &self.current_src {
            if handle.idle_active().await.unwrap_or(false) {
                debug!("mpv: idle, reloading {}", src);
                handle
                    .load_stream(src)
                    .await
                    .map_err(|e| PlaybackError::Network(e.to_string()))?;
            }
        }
        handle.set_pause(false).await.map_err(PlaybackError::from)
    }

    async fn pause(&mut self) {
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.set_pause(true).await {
                warn!("mpv: pause failed: {}", e);
            }
        }
    }

    async fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.driver.last_volume = volume;
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.set_volume(volume).await {
                warn!("mpv: set volume failed: {}", e);
            }
        }
    }

    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready.load(Ordering::Relaxed))
    }

    async fn shutdown(&mut self) {
        info!("mpv: shutting down");
        self.tap.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.quit().await;
        }
        self.driver.kill().await;
    }
}
