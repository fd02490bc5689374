use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use radio_engine::SessionEvent;
use radio_proto::protocol::{Command, PlaybackState, SessionSnapshot, Station};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, RwLock};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
struct HttpState {
    stations: Arc<Vec<Station>>,
    /// Latest snapshot seen on the session broadcast.
    latest: Arc<RwLock<SessionSnapshot>>,
    event_tx: mpsc::Sender<SessionEvent>,
}

#[derive(Serialize)]
struct ApiState {
    stations: Vec<StationInfo>,
    current_station: Option<usize>,
    state: PlaybackState,
    is_playing: bool,
    volume: f32,
    rev: u64,
}

#[derive(Serialize)]
struct StationInfo {
    idx: usize,
    name: String,
    src: String,
}

pub fn start_server(
    bind_address: String,
    port: u16,
    stations: Vec<Station>,
    initial: SessionSnapshot,
    mut snapshot_rx: broadcast::Receiver<SessionSnapshot>,
    event_tx: mpsc::Sender<SessionEvent>,
) -> tokio::task::JoinHandle<()> {
    let app_state = HttpState {
        stations: Arc::new(stations),
        latest: Arc::new(RwLock::new(initial)),
        event_tx,
    };

    // Keep `latest` current.
    let latest = Arc::clone(&app_state.latest);
    tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(snapshot) => *latest.write().await = snapshot,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("HTTP API: snapshot receiver lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    tokio::spawn(async move {
        let app = router(app_state);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    })
}

fn router(app_state: HttpState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/toggle", get(toggle).post(toggle))
        .route("/api/next", get(next_station).post(next_station))
        .route("/api/prev", get(prev_station).post(prev_station))
        .route("/api/station/:idx", get(switch_station).post(switch_station))
        .route("/api/volume/:pct", get(set_volume).post(set_volume))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

async fn get_state(State(state): State<HttpState>) -> Json<ApiState> {
    let snapshot = state.latest.read().await.clone();

    let stations = state
        .stations
        .iter()
        .enumerate()
        .map(|(idx, s)| StationInfo {
            idx,
            name: s.name.clone(),
            src: s.src.clone(),
        })
        .collect();

    Json(ApiState {
        stations,
        current_station: snapshot.current_index,
        state: snapshot.state,
        is_playing: snapshot.is_playing,
        volume: snapshot.volume,
        rev: snapshot.rev,
    })
}

async fn send(state: &HttpState, cmd: Command) -> StatusCode {
    if state.event_tx.send(SessionEvent::Command(cmd)).await.is_err() {
        error!("HTTP API: session queue closed");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

async fn toggle(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Toggle play");
    send(&state, Command::TogglePlay).await
}

async fn next_station(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Next station");
    send(&state, Command::Next).await
}

async fn prev_station(State(state): State<HttpState>) -> StatusCode {
    info!("HTTP API: Previous station");
    send(&state, Command::Prev).await
}

async fn switch_station(State(state): State<HttpState>, Path(idx): Path<usize>) -> StatusCode {
    if idx >= state.stations.len() {
        return StatusCode::NOT_FOUND;
    }
    info!("HTTP API: Switch to station {}", idx);
    send(&state, Command::SwitchStation { index: idx }).await
}

async fn set_volume(State(state): State<HttpState>, Path(pct): Path<i32>) -> StatusCode {
    let value = (pct as f32 / 100.0).clamp(0.0, 1.0);
    info!("HTTP API: Set volume to {}%", pct);
    send(&state, Command::Volume { value }).await
}
