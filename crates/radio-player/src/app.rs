//! App: terminal front-end event loop.
//!
//! Architecture:
//! - `App` owns the components and `AppState` (read-only data for components).
//! - Background tasks feed keyboard events and session snapshots into one
//!   `AppMessage` channel.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Commands flow to the session through its `SessionEvent` queue.

use std::io;
use std::time::Duration;

use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use radio_engine::render::BarSurface;
use radio_engine::SessionEvent;
use radio_proto::protocol::{Command, SessionSnapshot, Station};

use crate::{
    action::Action,
    app_state::AppState,
    component::Component,
    components::{header::Header, spectrum::Spectrum, station_list::StationList},
    theme::C_BG,
    widgets::status_bar::{self, InputMode},
};

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    Snapshot(SessionSnapshot),
}

/// Redraw cadence while the spectrum is animating.
const RENDER_FPS: u64 = 30;

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    state: AppState,
    header: Header,
    station_list: StationList,
    spectrum: Spectrum,
    session_tx: mpsc::Sender<SessionEvent>,
    pixel_ratio: f32,
    /// Spectrum area last reported to the session.
    reported_area: Option<Rect>,
    /// Surface frame count at the last draw.
    drawn_frames: u64,
    should_quit: bool,
}

impl App {
    pub fn new(
        stations: Vec<Station>,
        snapshot: SessionSnapshot,
        surface: BarSurface,
        session_tx: mpsc::Sender<SessionEvent>,
        pixel_ratio: f32,
    ) -> Self {
        let state = AppState::new(stations, snapshot);
        let station_list = StationList::new(&state);
        Self {
            state,
            header: Header::new(),
            station_list,
            spectrum: Spectrum::new(surface),
            session_tx,
            pixel_ratio,
            reported_area: None,
            drawn_frames: 0,
            should_quit: false,
        }
    }

    pub async fn run(mut self, mut snapshot_rx: broadcast::Receiver<SessionSnapshot>) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(256);

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        // Polls with a timeout so the thread notices when the loop is gone.
        tokio::task::spawn_blocking(move || loop {
            if event_tx.is_closed() {
                break;
            }
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => match event::read() {
                    Ok(ev) => {
                        if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {}
                Err(_) => break,
            }
        });

        // ── Background task: session snapshots ────────────────────────────────
        let snap_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match snapshot_rx.recv().await {
                    Ok(snapshot) => {
                        if snap_tx.send(AppMessage::Snapshot(snapshot)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("snapshot receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // ── Periodic timers ───────────────────────────────────────────────────
        let mut render_tick = tokio::time::interval(Duration::from_millis(1000 / RENDER_FPS));
        render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut clock_tick = tokio::time::interval(Duration::from_secs(1));
        clock_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                self.drawn_frames = self.spectrum.clears();
                terminal.draw(|f| self.draw(f))?;
                self.report_spectrum_size();
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    needs_redraw = self.handle_message(msg).await;
                }

                _ = render_tick.tick() => {
                    // only when the session drew something new
                    needs_redraw = self.spectrum.clears() != self.drawn_frames;
                }

                _ = clock_tick.tick() => {
                    let now = chrono::Local::now();
                    needs_redraw = now.format("%H:%M").to_string()
                        != self.state.now.format("%H:%M").to_string();
                    self.state.now = now;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        info!("App: leaving terminal");
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        Ok(())
    }

    /// Returns whether a redraw is needed.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                if key.kind != KeyEventKind::Press {
                    return false;
                }
                for action in self.handle_key(key) {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Resize(_, _)) => true,
            AppMessage::Event(_) => false,
            AppMessage::Snapshot(snapshot) => {
                let moved = snapshot.current_index != self.state.snapshot.current_index;
                self.state.snapshot = snapshot;
                if moved {
                    if let Some(idx) = self.state.snapshot.current_index {
                        self.station_list.select_by_station_idx(idx);
                    }
                }
                true
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if let Some(action) = global_key_action(key, self.state.input_mode) {
            return vec![action];
        }
        self.station_list.handle_key(key, &self.state)
    }

    async fn dispatch(&mut self, action: Action) {
        match action {
            Action::SendCommand(cmd) => {
                debug!("App: sending {:?}", cmd);
                if self.session_tx.send(SessionEvent::Command(cmd)).await.is_err() {
                    warn!("App: session is gone, quitting");
                    self.should_quit = true;
                }
            }
            Action::OpenFilter => self.state.input_mode = InputMode::Filter,
            Action::CloseFilter => self.state.input_mode = InputMode::Normal,
            Action::Quit => self.should_quit = true,
        }
    }

    /// Tell the session when the spectrum pane changed size.
    fn report_spectrum_size(&mut self) {
        let area = self.spectrum.inner_area();
        if self.reported_area == Some(area) {
            return;
        }
        // cells are about twice as tall as they are wide
        let event = SessionEvent::Resize {
            width: area.width as f32,
            height: area.height as f32 * 2.0,
            pixel_ratio: self.pixel_ratio,
        };
        match self.session_tx.try_send(event) {
            Ok(()) => self.reported_area = Some(area),
            Err(e) => debug!("App: resize deferred: {}", e),
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        // ── Outer layout: header | body | statusbar ──────────────────────────
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        self.header.draw(frame, outer[0], false, &self.state);
        status_bar::draw_keys_bar(frame, outer[2], self.state.input_mode);

        // ── Body: station list | spectrum ─────────────────────────────────────
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
            .split(outer[1]);

        self.station_list.draw(frame, body[0], true, &self.state);
        self.spectrum.draw(frame, body[1], false, &self.state);
    }
}

/// Keys handled before the focused component sees them.  While the filter
/// has focus only Ctrl-C is global, so Space and the arrows reach the text
/// input instead of the player.
fn global_key_action(key: KeyEvent, mode: InputMode) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }
    if mode != InputMode::Normal {
        return None;
    }
    let cmd = match key.code {
        KeyCode::Char('q') => return Some(Action::Quit),
        KeyCode::Char(' ') => Command::TogglePlay,
        KeyCode::Right => Command::Next,
        KeyCode::Left => Command::Prev,
        KeyCode::Char('+') | KeyCode::Char('=') => Command::VolumeUp,
        KeyCode::Char('-') => Command::VolumeDown,
        _ => return None,
    };
    Some(Action::SendCommand(cmd))
}
