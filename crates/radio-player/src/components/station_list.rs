//! StationList component: left pane with the `/` filter.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
    Frame,
};

use radio_proto::protocol::{Command, Station};
use unicode_width::UnicodeWidthStr;

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    theme::{
        state_color, state_icon, style_focused_border, style_muted, style_secondary,
        style_selected_focused, style_unfocused_border, C_PRIMARY, C_SECONDARY,
    },
    widgets::filter_input::{FilterAction, FilterInput},
};

const PAGE: usize = 10;

pub struct StationList {
    pub filter_input: FilterInput,
    /// Applied query (kept after the filter bar closes).
    query: String,
    /// Original station indices that match `query`, in list order.
    visible: Vec<usize>,
    /// Position within `visible`.
    selected: usize,
    list_state: ListState,
}

impl StationList {
    pub fn new(state: &AppState) -> Self {
        let mut list = Self {
            filter_input: FilterInput::new("station name or url…"),
            query: String::new(),
            visible: Vec::new(),
            selected: 0,
            list_state: ListState::default(),
        };
        list.rebuild(state);
        if let Some(idx) = state.snapshot.current_index {
            list.select_by_station_idx(idx);
        }
        list
    }

    /// Re-apply the query, keeping the selected station when it still matches.
    fn rebuild(&mut self, state: &AppState) {
        let keep = self.selected_station_idx();
        let q = self.query.to_lowercase();
        self.visible = state
            .stations
            .iter()
            .enumerate()
            .filter(|(_, s)| station_matches(s, &q))
            .map(|(i, _)| i)
            .collect();
        self.selected = 0;
        if let Some(idx) = keep {
            self.select_by_station_idx(idx);
        }
    }

    /// Select the station by original index, if it is visible.
    pub fn select_by_station_idx(&mut self, idx: usize) {
        if let Some(pos) = self.visible.iter().position(|&i| i == idx) {
            self.selected = pos;
        }
    }

    /// Original index of the selected row.
    pub fn selected_station_idx(&self) -> Option<usize> {
        self.visible.get(self.selected).copied()
    }

    pub fn is_filter_active(&self) -> bool {
        self.filter_input.is_active()
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    fn move_by(&mut self, delta: isize) {
        if self.visible.is_empty() {
            return;
        }
        let last = self.visible.len() as isize - 1;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
    }

    fn render_item(&self, station: &Station, orig_idx: usize, width: usize, state: &AppState) -> ListItem<'static> {
        let snap = &state.snapshot;
        let is_current = state.is_current(orig_idx);
        let (icon, icon_color) = if is_current {
            (state_icon(snap.state), state_color(snap.state))
        } else {
            (" ", C_SECONDARY)
        };
        let name_style = if is_current {
            Style::default()
                .fg(state_color(snap.state))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(C_PRIMARY)
        };

        let mut spans = vec![
            Span::raw(" "),
            Span::styled(icon, Style::default().fg(icon_color)),
            Span::raw("  "),
            Span::styled(station.name.clone(), name_style),
        ];
        // Show the stream host when there is room for it.
        let used = 4 + station.name.width();
        let host = stream_host(&station.src);
        if used + 2 + host.width() <= width {
            spans.push(Span::raw("  "));
            spans.push(Span::styled(host.to_string(), style_muted()));
        }
        ListItem::new(Line::from(spans))
    }
}

impl Component for StationList {
    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if self.filter_input.is_active() {
            match key.code {
                KeyCode::Up => self.move_by(-1),
                KeyCode::Down => self.move_by(1),
                _ => match self.filter_input.handle_key(key) {
                    FilterAction::Changed(q) => {
                        self.query = q;
                        self.rebuild(state);
                    }
                    FilterAction::Confirmed => return vec![Action::CloseFilter],
                    FilterAction::Cancelled => {
                        self.query.clear();
                        self.rebuild(state);
                        return vec![Action::CloseFilter];
                    }
                },
            }
            return Vec::new();
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.move_by(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_by(1),
            KeyCode::PageUp => self.move_by(-(PAGE as isize)),
            KeyCode::PageDown => self.move_by(PAGE as isize),
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => self.selected = self.visible.len().saturating_sub(1),
            KeyCode::Enter => {
                if let Some(index) = self.selected_station_idx() {
                    return vec![Action::SendCommand(Command::SwitchStation { index })];
                }
            }
            KeyCode::Char('/') => {
                self.filter_input.activate();
                return vec![Action::OpenFilter];
            }
            _ => {}
        }
        Vec::new()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let border = if focused {
            style_focused_border()
        } else {
            style_unfocused_border()
        };
        let title = if self.query.is_empty() {
            format!(" Stations ({}) ", state.stations.len())
        } else {
            format!(" Stations ({}/{}) ", self.visible.len(), state.stations.len())
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(Span::styled(title, style_secondary()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let show_filter = self.filter_input.is_active() || !self.query.is_empty();
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(if show_filter { 1 } else { 0 }),
            ])
            .split(inner);

        if state.stations.is_empty() {
            frame.render_widget(
                ratatui::widgets::Paragraph::new(Span::styled(" no stations loaded", style_muted())),
                parts[0],
            );
        } else {
            let width = parts[0].width as usize;
            let items: Vec<ListItem> = self
                .visible
                .iter()
                .filter_map(|&i| state.stations.get(i).map(|s| self.render_item(s, i, width, state)))
                .collect();
            let highlight = if focused {
                style_selected_focused()
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            let list = List::new(items).highlight_style(highlight);
            self.list_state
                .select(if self.visible.is_empty() { None } else { Some(self.selected) });
            frame.render_stateful_widget(list, parts[0], &mut self.list_state);
        }

        if show_filter {
            self.filter_input.draw(frame, parts[1]);
        }
    }
}

fn station_matches(station: &Station, q: &str) -> bool {
    q.is_empty()
        || station.name.to_lowercase().contains(q)
        || station.src.to_lowercase().contains(q)
}

/// Host part of a stream URL, or the whole string for anything else.
fn stream_host(src: &str) -> &str {
    let rest = src.split_once("://").map(|(_, r)| r).unwrap_or(src);
    rest.split('/').next().unwrap_or(rest)
}
