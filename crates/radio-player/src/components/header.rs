//! Header component: 2-row top bar.
//!
//! Row 1: status icon, current station, state label | clock.
//! Row 2: volume gauge | station position.
//!
//! Not focusable.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use chrono::{DateTime, Local};

use crate::{
    app_state::AppState,
    component::Component,
    theme::{state_color, state_icon, C_MUTED, C_PRIMARY, C_SECONDARY},
};

const VOLUME_CELLS: usize = 20;

pub struct Header;

impl Header {
    pub fn new() -> Self {
        Self
    }
}

impl Component for Header {
    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        let clock = fmt_clock(&state.now);
        let clock_w = clock.chars().count() as u16 + 1;

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1)])
            .split(area);

        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(clock_w)])
            .split(rows[0]);

        frame.render_widget(Paragraph::new(build_title(state)), top[0]);
        frame.render_widget(
            Paragraph::new(Span::styled(clock, Style::default().fg(C_SECONDARY))),
            top[1],
        );

        if rows[1].height > 0 {
            frame.render_widget(Paragraph::new(build_volume(state)), rows[1]);
        }
    }
}

fn build_title(state: &AppState) -> Line<'static> {
    let snap = &state.snapshot;
    let color = state_color(snap.state);
    let name = snap
        .current_station
        .as_ref()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "no station".to_string());

    Line::from(vec![
        Span::raw(" "),
        Span::styled(state_icon(snap.state), Style::default().fg(color)),
        Span::raw("  "),
        Span::styled(name, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {}", snap.state.label()), Style::default().fg(C_MUTED)),
    ])
}

fn build_volume(state: &AppState) -> Line<'static> {
    let snap = &state.snapshot;
    let position = match snap.current_index {
        Some(i) => format!("  {}/{}", i + 1, state.stations.len()),
        None => String::new(),
    };
    Line::from(vec![
        Span::styled(" vol ", Style::default().fg(C_MUTED)),
        Span::styled(volume_gauge(snap.volume, VOLUME_CELLS), Style::default().fg(C_PRIMARY)),
        Span::styled(
            format!(" {:>3}%", (snap.volume * 100.0).round() as u8),
            Style::default().fg(C_SECONDARY),
        ),
        Span::styled(position, Style::default().fg(C_MUTED)),
    ])
}

/// `HH:MM` in 24h followed by the weekday name.
pub fn fmt_clock(now: &DateTime<Local>) -> String {
    now.format("%H:%M %A").to_string()
}

fn volume_gauge(volume: f32, cells: usize) -> String {
    let filled = ((volume.clamp(0.0, 1.0) * cells as f32).round() as usize).min(cells);
    format!("{}{}", "━".repeat(filled), "─".repeat(cells - filled))
}
