//! Mirrored frequency-bar renderer.

use std::sync::{Arc, Mutex, PoisonError};

use crate::analyzer::Sample;
use crate::frame::{FrameHandle, FrameScheduler};

/// Bars grow from this fraction of the surface height even at silence.
const FLOOR: f32 = 0.1;
/// Share of the height a full-scale magnitude adds on top of the floor.
const SPAN: f32 = 0.7;
/// Drawn bar width relative to the slot width, so neighbours overlap.
const WIDTH_SCALE: f32 = 1.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsla {
    pub h: f32,
    pub s: f32,
    pub l: f32,
    pub a: f32,
}

impl Hsla {
    /// Bar colour for a falloff factor in `[0, 1]`.
    pub fn for_falloff(factor: f32) -> Self {
        Self {
            h: 185.0,
            s: 0.38,
            l: 0.70 + factor * 0.05,
            a: 0.85,
        }
    }

    pub fn to_rgb(self) -> (u8, u8, u8) {
        let c = (1.0 - (2.0 * self.l - 1.0).abs()) * self.s;
        let hp = (self.h.rem_euclid(360.0)) / 60.0;
        let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
        let (r, g, b) = match hp as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = self.l - c / 2.0;
        let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        (to_byte(r), to_byte(g), to_byte(b))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub color: Hsla,
}

/// A 2D drawing surface in device pixels.
pub trait Surface {
    /// Match the container size scaled by the device pixel ratio.
    fn resize(&mut self, css_width: f32, css_height: f32, pixel_ratio: f32);
    /// Current size in device pixels.
    fn size(&self) -> (f32, f32);
    fn clear(&mut self);
    fn fill_rect(&mut self, rect: BarRect);
}

/// Lay out two mirrored bars for every even bin below the midpoint of
/// `values`.  Heights taper from the centre outward.
pub fn bar_layout(width: f32, height: f32, values: &[f32]) -> Vec<BarRect> {
    let bins = values.len();
    let center = bins / 2;
    if center == 0 || width <= 0.0 || height <= 0.0 {
        return Vec::new();
    }
    let slot = width / bins as f32;
    let mut rects = Vec::with_capacity(center);

    for i in (0..center).step_by(2) {
        let factor = 1.0 - i as f32 / center as f32;
        let bar_height = ((values[i] / 255.0) * height * SPAN + height * FLOOR) * factor;
        let color = Hsla::for_falloff(factor);
        let y = height - bar_height;

        rects.push(BarRect {
            x: width / 2.0 - slot * (i as f32 + 1.0),
            y,
            width: slot * WIDTH_SCALE,
            height: bar_height,
            color,
        });
        rects.push(BarRect {
            x: width / 2.0 + i as f32 * slot,
            y,
            width: slot * WIDTH_SCALE,
            height: bar_height,
            color,
        });
    }
    rects
}

/// Owns the surface and the single outstanding frame handle.
pub struct Renderer<S, F> {
    surface: S,
    scheduler: F,
    pending: Option<FrameHandle>,
}

impl<S: Surface, F: FrameScheduler> Renderer<S, F> {
    pub fn new(surface: S, scheduler: F) -> Self {
        Self {
            surface,
            scheduler,
            pending: None,
        }
    }

    pub fn resize(&mut self, css_width: f32, css_height: f32, pixel_ratio: f32) {
        let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        self.surface
            .resize(css_width.max(0.0), css_height.max(0.0), ratio);
    }

    /// Clear and redraw from `sample`.  Drawing the same sample twice
    /// produces the same picture.
    pub fn render_frame(&mut self, sample: &Sample<'_>) {
        let (width, height) = self.surface.size();
        self.surface.clear();
        for rect in bar_layout(width, height, sample.smoothed) {
            self.surface.fill_rect(rect);
        }
    }

    /// Replace any pending frame with a fresh one.
    pub fn schedule_next(&mut self) {
        self.stop();
        self.pending = Some(self.scheduler.request_frame());
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel_frame(handle);
        }
    }

    /// Consume a fired frame.  Returns false for a stale handle, which must
    /// not draw.
    pub fn accept_frame(&mut self, handle: FrameHandle) -> bool {
        if self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn scheduler(&self) -> &F {
        &self.scheduler
    }
}

/// Last drawn frame, as shared with a presentation layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceFrame {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
    pub bars: Vec<BarRect>,
    pub clears: u64,
}

/// In-memory surface.  Clones share the same frame.
#[derive(Debug, Clone, Default)]
pub struct BarSurface {
    frame: Arc<Mutex<SurfaceFrame>>,
}

impl BarSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SurfaceFrame {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Surface for BarSurface {
    fn resize(&mut self, css_width: f32, css_height: f32, pixel_ratio: f32) {
        let mut frame = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        frame.width = (css_width * pixel_ratio).floor();
        frame.height = (css_height * pixel_ratio).floor();
        frame.pixel_ratio = pixel_ratio;
    }

    fn size(&self) -> (f32, f32) {
        let frame = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        (frame.width, frame.height)
    }

    fn clear(&mut self) {
        let mut frame = self.frame.lock().unwrap_or_else(PoisonError::into_inner);
        frame.bars.clear();
        frame.clears += 1;
    }

    fn fill_rect(&mut self, rect: BarRect) {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bars
            .push(rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::IdlePattern;

    #[derive(Default)]
    struct CountingScheduler {
        next: u64,
        live: Vec<FrameHandle>,
        cancelled: Vec<FrameHandle>,
    }

    impl FrameScheduler for CountingScheduler {
        fn request_frame(&mut self) -> FrameHandle {
            self.next += 1;
            let handle = FrameHandle(self.next);
            self.live.push(handle);
            handle
        }

        fn cancel_frame(&mut self, handle: FrameHandle) {
            self.live.retain(|h| *h != handle);
            self.cancelled.push(handle);
        }
    }

    #[test]
    fn test_layout_is_mirrored_around_center() {
        let values: Vec<f32> = (0..128).map(|i| (i * 2) as f32).collect();
        let rects = bar_layout(256.0, 100.0, &values);
        assert_eq!(rects.len(), 64);

        for pair in rects.chunks(2) {
            let (left, right) = (pair[0], pair[1]);
            assert_eq!(left.height, right.height);
            assert_eq!(left.color, right.color);
            let slot = 256.0 / 128.0;
            assert!((128.0 - (left.x + slot) - (right.x - 128.0)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_equal_values_taper_outward() {
        let rects = bar_layout(256.0, 100.0, &[255.0; 128]);
        // centre bar at full scale: (0.7 + 0.1) * height
        assert!((rects[0].height - 80.0).abs() < 1e-4);
        assert_eq!(rects[0].y, 100.0 - rects[0].height);
        for w in rects.chunks(2).collect::<Vec<_>>().windows(2) {
            assert!(w[1][0].height < w[0][0].height);
            assert!(w[1][0].color.l < w[0][0].color.l);
        }
    }

    #[test]
    fn test_silence_still_draws_floor() {
        let rects = bar_layout(128.0, 50.0, &[0.0; 64]);
        assert!((rects[0].height - 5.0).abs() < 1e-4);
        assert!(rects.iter().all(|r| r.height > 0.0));
    }

    #[test]
    fn test_render_clears_previous_frame() {
        let surface = BarSurface::new();
        let mut renderer = Renderer::new(surface.clone(), CountingScheduler::default());
        renderer.resize(64.0, 20.0, 2.0);
        let idle = IdlePattern::new(128);

        renderer.render_frame(&idle.sample());
        let first = surface.snapshot();
        renderer.render_frame(&idle.sample());
        let second = surface.snapshot();

        assert_eq!((first.width, first.height), (128.0, 40.0));
        assert_eq!(first.bars, second.bars);
        assert_eq!(second.bars.len(), 64);
        assert_eq!(second.clears, 2);
    }

    #[test]
    fn test_single_outstanding_frame() {
        let mut renderer = Renderer::new(BarSurface::new(), CountingScheduler::default());
        renderer.schedule_next();
        renderer.schedule_next();
        renderer.schedule_next();
        assert_eq!(renderer.scheduler().live.len(), 1);

        let live = renderer.scheduler().live[0];
        assert!(!renderer.accept_frame(FrameHandle(1)));
        assert!(renderer.accept_frame(live));
        assert!(!renderer.is_scheduled());

        renderer.schedule_next();
        renderer.stop();
        assert!(renderer.scheduler().live.is_empty());
        assert!(!renderer.is_scheduled());
    }

    #[test]
    fn test_hsla_to_rgb() {
        assert_eq!(Hsla { h: 0.0, s: 1.0, l: 0.5, a: 1.0 }.to_rgb(), (255, 0, 0));
        let (r, g, b) = Hsla::for_falloff(1.0).to_rgb();
        assert!(g > r && b > r);
    }
}
