//! PCM capture feeding the FFT analyser.
//!
//! ffmpeg decodes the current source to mono s16le on stdout; samples land in
//! a shared `PcmRing`.  The tap starts suspended and only captures once the
//! engine resumes it, mirroring an audio context that needs activation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use radio_engine::fft::PcmRing;
use radio_engine::{GraphContext, PlaybackError};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

const SAMPLE_RATE: u32 = 44100;
const CHUNK_SAMPLES: usize = 1024;
/// About one second of audio.
const RING_CAPACITY: usize = 44100;

struct TapState {
    src: Option<String>,
    suspended: bool,
    task: Option<AbortHandle>,
}

struct Inner {
    ring: PcmRing,
    state: Mutex<TapState>,
}

/// Cloneable handle; clones control the same capture.
#[derive(Clone)]
pub struct PcmTap {
    inner: Arc<Inner>,
}

impl Default for PcmTap {
    fn default() -> Self {
        Self::new()
    }
}

impl PcmTap {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                ring: PcmRing::new(RING_CAPACITY),
                state: Mutex::new(TapState {
                    src: None,
                    suspended: true,
                    task: None,
                }),
            }),
        }
    }

    pub fn ring(&self) -> &PcmRing {
        &self.inner.ring
    }

    fn state(&self) -> std::sync::MutexGuard<'_, TapState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Follow a new source.  A running capture restarts on it.
    pub fn retarget(&self, src: &str) {
        let mut state = self.state();
        state.src = Some(src.to_string());
        if !state.suspended {
            self.restart(&mut state);
        }
    }

    /// Stop capturing and suspend.
    pub fn stop(&self) {
        let mut state = self.state();
        state.suspended = true;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        self.inner.ring.clear();
    }

    fn restart(&self, state: &mut TapState) {
        if let Some(task) = state.task.take() {
            task.abort();
        }
        self.inner.ring.clear();
        let Some(src) = state.src.clone() else {
            return;
        };
        let ring = self.inner.ring.clone();
        let task = tokio::spawn(async move {
            info!("pcm: capturing {}", src);
            if let Err(e) = run_ffmpeg_capture(&src, &ring).await {
                warn!("pcm: capture of {} ended: {}", src, e);
            } else {
                debug!("pcm: capture of {} finished", src);
            }
        });
        state.task = Some(task.abort_handle());
    }
}

impl GraphContext for PcmTap {
    fn is_suspended(&self) -> bool {
        self.state().suspended
    }

    async fn resume(&mut self) -> Result<(), PlaybackError> {
        let mut state = self.state();
        if state.suspended {
            state.suspended = false;
            self.restart(&mut state);
        }
        Ok(())
    }
}

/// Spawn ffmpeg, decode mono s16le PCM and append it to `ring` until the
/// stream ends.
async fn run_ffmpeg_capture(url: &str, ring: &PcmRing) -> anyhow::Result<()> {
    use tokio::io::AsyncReadExt;
    use tokio::process::Command;

    let rate = SAMPLE_RATE.to_string();
    let ffmpeg_bin =
        radio_proto::platform::find_ffmpeg_binary().unwrap_or_else(|| PathBuf::from("ffmpeg"));
    let mut child = Command::new(ffmpeg_bin)
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-fflags",
            "nobuffer",
            "-flags",
            "low_delay",
            "-probesize",
            "64k",
            "-analyzeduration",
            "200000",
            "-i",
            url,
            "-vn",
            "-ac",
            "1",
            "-ar",
            &rate,
            "-f",
            "s16le",
            "pipe:1",
        ])
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("ffmpeg stdout not captured"))?;
    let mut buf = vec![0u8; CHUNK_SAMPLES * 2];
    let mut carry: Option<u8> = None;
    let mut samples: Vec<f32> = Vec::with_capacity(CHUNK_SAMPLES + 1);

    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        decode_s16le(&buf[..n], &mut carry, &mut samples);
        ring.push_samples(&samples);
        samples.clear();
    }

    let status = child.wait().await?;
    if !status.success() {
        anyhow::bail!("ffmpeg exited: {}", status);
    }
    Ok(())
}

/// Decode little-endian i16 samples to `[-1, 1)`.  A trailing odd byte is
/// kept in `carry` for the next read.
fn decode_s16le(bytes: &[u8], carry: &mut Option<u8>, out: &mut Vec<f32>) {
    let mut rest = bytes;
    if let Some(lo) = carry.take() {
        match rest.split_first() {
            Some((&hi, tail)) => {
                out.push(f32::from(i16::from_le_bytes([lo, hi])) / 32768.0);
                rest = tail;
            }
            None => {
                *carry = Some(lo);
                return;
            }
        }
    }
    let mut pairs = rest.chunks_exact(2);
    for pair in &mut pairs {
        out.push(f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0);
    }
    if let [odd] = pairs.remainder() {
        *carry = Some(*odd);
    }
}
