//! Spectrum component: rasterises the shared bar surface into cells.
//!
//! The session draws into a `BarSurface` in device pixels; each terminal
//! column samples the tallest bar under its centre and fills from the
//! bottom with eighth blocks.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Borders},
    Frame,
};

use radio_engine::render::{BarSurface, SurfaceFrame};

use crate::{app_state::AppState, component::Component, theme::style_unfocused_border};

const EIGHTHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One rasterised column: filled height in cell rows and the bar colour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub rows: f32,
    pub rgb: (u8, u8, u8),
}

pub struct Spectrum {
    surface: BarSurface,
    /// Inner area of the last draw, used to size the surface.
    area: Rect,
}

impl Spectrum {
    pub fn new(surface: BarSurface) -> Self {
        Self {
            surface,
            area: Rect::default(),
        }
    }

    pub fn inner_area(&self) -> Rect {
        self.area
    }

    /// Number of frames the session has drawn so far.
    pub fn clears(&self) -> u64 {
        self.surface.snapshot().clears
    }
}

impl Component for Spectrum {
    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, _state: &AppState) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(style_unfocused_border());
        let inner = block.inner(area);
        frame.render_widget(block, area);
        self.area = inner;

        let snapshot = self.surface.snapshot();
        let columns = rasterise(&snapshot, inner.width, inner.height);
        paint(frame.buffer_mut(), inner, &columns);
    }
}

/// Column heights for a `cols` x `rows` cell grid.
pub fn rasterise(frame: &SurfaceFrame, cols: u16, rows: u16) -> Vec<Column> {
    if cols == 0 || rows == 0 || frame.width <= 0.0 || frame.height <= 0.0 {
        return Vec::new();
    }
    let px_per_col = frame.width / cols as f32;
    let px_per_row = frame.height / rows as f32;

    (0..cols)
        .map(|c| {
            let x = (c as f32 + 0.5) * px_per_col;
            let tallest = frame
                .bars
                .iter()
                .filter(|b| x >= b.x && x < b.x + b.width)
                .max_by(|a, b| a.height.total_cmp(&b.height));
            match tallest {
                Some(bar) => Column {
                    rows: (bar.height / px_per_row).min(rows as f32),
                    rgb: bar.color.to_rgb(),
                },
                None => Column {
                    rows: 0.0,
                    rgb: (0, 0, 0),
                },
            }
        })
        .collect()
}

/// Glyph for the cell `level_from_bottom` rows above the floor of a column
/// filled `rows` high.
pub fn cell_glyph(rows: f32, level_from_bottom: u16) -> char {
    let fill = (rows - level_from_bottom as f32).clamp(0.0, 1.0);
    EIGHTHS[(fill * 8.0).round() as usize]
}

fn paint(buf: &mut Buffer, area: Rect, columns: &[Column]) {
    for (c, col) in columns.iter().enumerate() {
        let (r, g, b) = col.rgb;
        let style = Style::default().fg(Color::Rgb(r, g, b));
        for row in 0..area.height {
            let glyph = cell_glyph(col.rows, area.height - 1 - row);
            if glyph == ' ' {
                continue;
            }
            let pos = (area.x + c as u16, area.y + row);
            if let Some(cell) = buf.cell_mut(pos) {
                cell.set_char(glyph).set_style(style);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radio_engine::render::{bar_layout, BarRect, Hsla};

    fn frame_with(bars: Vec<BarRect>) -> SurfaceFrame {
        SurfaceFrame {
            width: 80.0,
            height: 40.0,
            pixel_ratio: 2.0,
            bars,
            clears: 1,
        }
    }

    fn bar(x: f32, width: f32, height: f32) -> BarRect {
        BarRect {
            x,
            y: 40.0 - height,
            width,
            height,
            color: Hsla::for_falloff(1.0),
        }
    }

    #[test]
    fn test_empty_surface_gives_no_columns() {
        assert!(rasterise(&SurfaceFrame::default(), 10, 5).is_empty());
        assert!(rasterise(&frame_with(vec![]), 0, 5).is_empty());
    }

    #[test]
    fn test_tallest_bar_wins_column() {
        let cols = rasterise(&frame_with(vec![bar(0.0, 20.0, 10.0), bar(0.0, 20.0, 30.0)]), 4, 4);
        // 20 px per column, 10 px per row
        assert_eq!(cols[0].rows, 3.0);
        assert_eq!(cols[1].rows, 0.0);
    }

    #[test]
    fn test_height_is_capped_to_grid() {
        let cols = rasterise(&frame_with(vec![bar(0.0, 80.0, 400.0)]), 2, 4);
        assert!(cols.iter().all(|c| c.rows == 4.0));
    }

    #[test]
    fn test_partial_cell_uses_eighths() {
        assert_eq!(cell_glyph(2.5, 0), '█');
        assert_eq!(cell_glyph(2.5, 2), '▄');
        assert_eq!(cell_glyph(2.5, 3), ' ');
    }

    #[test]
    fn test_idle_layout_peaks_at_centre() {
        // idle filler level across 64 bins, drawn into 80x40 px
        let values = vec![20.0; 64];
        let f = frame_with(bar_layout(80.0, 40.0, &values));
        let cols = rasterise(&f, 40, 10);
        assert_eq!(cols.len(), 40);
        // centre columns carry the full-factor bars, edges taper off
        assert!(cols[19].rows > 1.0);
        assert!(cols[20].rows > 1.0);
        assert!(cols[19].rows > cols[1].rows);
    }
}
