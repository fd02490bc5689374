mod common;

use std::time::Duration;

use common::*;
use radio_engine::analyzer::IDLE_LEVEL;
use radio_engine::media::{GraphActivation, MediaEvent, ReadyState};
use radio_engine::render::bar_layout;
use radio_engine::{PlaybackError, SessionEvent};
use radio_proto::protocol::{Command, PlaybackState};
use radio_proto::state::{MemoryStore, PreferenceStore, STATION_KEY, VOLUME_KEY};

fn idle_bars(h: &Harness) -> Vec<radio_engine::render::BarRect> {
    let frame = h.surface.snapshot();
    bar_layout(frame.width, frame.height, &[f32::from(IDLE_LEVEL); FFT_SIZE / 2])
}

// ── startup ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_startup_restores_preferences_without_playing() {
    let mut prefs = MemoryStore::default();
    prefs.set(STATION_KEY, "2").unwrap();
    prefs.set(VOLUME_KEY, "0.4").unwrap();
    let h = harness_with(&["A", "B", "C"], prefs, GraphActivation::UserGesture).await;

    assert_eq!(h.session.current_index(), Some(2));
    assert_eq!(h.session.current_station().map(|s| s.name.as_str()), Some("C"));
    assert_eq!(h.session.volume(), 0.4);
    assert_eq!(h.loads(), ["http://c"]);
    assert_eq!(h.plays(), 0);
    assert_eq!(h.output.log().volumes, [0.4]);
    assert!(!h.session.is_playing());
    assert_eq!(h.frames.live(), 0);
}

#[tokio::test]
async fn test_startup_ignores_bad_saved_values() {
    let mut prefs = MemoryStore::default();
    prefs.set(STATION_KEY, "9").unwrap();
    prefs.set(VOLUME_KEY, "loud").unwrap();
    let h = harness_with(&["A", "B", "C"], prefs, GraphActivation::UserGesture).await;

    assert_eq!(h.session.current_index(), Some(0));
    assert_eq!(h.session.volume(), 1.0);
}

#[tokio::test]
async fn test_startup_clamps_saved_volume() {
    let mut prefs = MemoryStore::default();
    prefs.set(VOLUME_KEY, "1.7").unwrap();
    let h = harness_with(&["A"], prefs, GraphActivation::UserGesture).await;
    assert_eq!(h.session.volume(), 1.0);
}

#[tokio::test]
async fn test_startup_draws_idle_picture() {
    let h = harness(&["A", "B"]).await;
    let frame = h.surface.snapshot();
    assert_eq!((frame.width, frame.height), (128.0, 40.0));
    assert_eq!(frame.bars, idle_bars(&h));
}

// ── audio graph ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_graph_is_built_lazily_once() {
    let mut h = harness(&["A", "B"]).await;
    assert!(!h.session.engine().has_graph());

    h.start_playing().await;
    assert_eq!(h.output.log().graphs_built, 1);
    assert_eq!(h.output.log().resumes, 1);

    h.command(Command::TogglePlay).await;
    h.media(MediaEvent::Pause).await;
    h.start_playing().await;
    h.command(Command::Next).await;

    let log = h.output.log();
    assert_eq!(log.graphs_built, 1);
    assert_eq!(log.resumes, 1);
}

#[tokio::test]
async fn test_suspended_graph_is_resumed_on_play() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    h.command(Command::TogglePlay).await;
    h.media(MediaEvent::Pause).await;

    h.output.log().suspended = true;
    h.start_playing().await;
    assert_eq!(h.output.log().resumes, 2);
    assert_eq!(h.output.log().graphs_built, 1);
}

#[tokio::test]
async fn test_eager_graph_when_platform_allows() {
    let h = harness_with(&["A"], MemoryStore::default(), GraphActivation::Immediate).await;
    assert!(h.session.engine().has_graph());
    assert_eq!(h.output.log().graphs_built, 1);
    assert_eq!(h.plays(), 0);
}

// ── station switching ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_switch_station_loads_exactly_once() {
    for i in 0..3 {
        let mut h = harness(&["A", "B", "C"]).await;
        let before = h.loads().len();
        h.session.switch_station(i).await;

        let loads = h.loads();
        let src = h.session.stations()[i].src.clone();
        assert_eq!(h.session.current_index(), Some(i));
        assert_eq!(loads.len(), before + 1);
        assert_eq!(loads.last(), Some(&src));
    }
}

#[tokio::test]
async fn test_switch_station_out_of_range_is_noop() {
    let mut h = harness(&["A", "B", "C"]).await;
    let loads = h.loads();
    h.command(Command::SwitchStation { index: 5 }).await;

    assert_eq!(h.session.current_index(), Some(0));
    assert_eq!(h.loads(), loads);
    assert_eq!(h.session.prefs().get(STATION_KEY), None);
}

#[tokio::test]
async fn test_switch_persists_index() {
    let mut h = harness(&["A", "B", "C"]).await;
    h.session.switch_station(2).await;
    assert_eq!(h.session.prefs().get(STATION_KEY).as_deref(), Some("2"));
}

#[tokio::test]
async fn test_next_wraps_around() {
    for start in 0..4 {
        let mut h = harness(&["A", "B", "C", "D"]).await;
        h.session.switch_station(start).await;
        for _ in 0..4 {
            h.command(Command::Next).await;
        }
        assert_eq!(h.session.current_index(), Some(start));
    }
}

#[tokio::test]
async fn test_prev_wraps_around() {
    for start in 0..4 {
        let mut h = harness(&["A", "B", "C", "D"]).await;
        h.session.switch_station(start).await;
        for _ in 0..4 {
            h.command(Command::Prev).await;
        }
        assert_eq!(h.session.current_index(), Some(start));
    }
}

#[tokio::test]
async fn test_next_while_playing_requests_play_again() {
    let mut h = harness(&["A", "B", "C"]).await;
    h.start_playing().await;
    assert_eq!(h.session.state(), PlaybackState::Playing);
    let plays = h.plays();

    h.command(Command::Next).await;

    assert_eq!(h.session.current_index(), Some(1));
    assert_eq!(h.loads().last().map(String::as_str), Some("http://b"));
    assert_eq!(h.plays(), plays + 1);
    assert!(h.session.engine().wants_playback());

    h.media(MediaEvent::Play).await;
    assert!(h.session.is_playing());
}

#[tokio::test]
async fn test_prev_from_first_wraps_to_last() {
    let mut h = harness(&["A", "B", "C"]).await;
    h.command(Command::Prev).await;
    assert_eq!(h.session.current_index(), Some(2));
    assert_eq!(h.loads().last().map(String::as_str), Some("http://c"));
}

#[tokio::test]
async fn test_switch_while_stopped_stays_stopped() {
    let mut h = harness(&["A", "B", "C"]).await;
    h.session.switch_station(1).await;
    assert_eq!(h.plays(), 0);
    // loading a source alone never enters Loading
    assert_eq!(h.session.state(), PlaybackState::Idle);
    assert!(!h.session.is_playing());
    assert!(!h.session.engine().wants_playback());

    h.start_playing().await;
    h.command(Command::TogglePlay).await;
    h.media(MediaEvent::Pause).await;
    let plays = h.plays();
    h.session.switch_station(2).await;
    assert_eq!(h.plays(), plays);
    assert_eq!(h.session.state(), PlaybackState::Idle);
    assert!(!h.session.is_playing());
}

#[tokio::test]
async fn test_failed_restart_after_switch_is_absorbed() {
    let mut h = harness(&["A", "B", "C"]).await;
    h.start_playing().await;
    h.output.log().fail_next_play = Some(PlaybackError::Network("refused".into()));

    h.session.switch_station(2).await;

    assert_eq!(h.session.current_index(), Some(2));
    assert_eq!(h.session.state(), PlaybackState::Errored);
    assert!(!h.session.is_playing());
    assert_eq!(h.frames.live(), 0);
    assert_eq!(h.surface.snapshot().bars, idle_bars(&h));
}

#[tokio::test]
async fn test_blocked_autoplay_reverts_to_idle() {
    let mut h = harness(&["A"]).await;
    h.output.log().fail_next_play = Some(PlaybackError::NotAllowed("gesture required".into()));
    h.command(Command::TogglePlay).await;

    assert_eq!(h.session.state(), PlaybackState::Idle);
    assert!(!h.session.engine().wants_playback());

    // a second press tries again
    h.start_playing().await;
    assert_eq!(h.session.state(), PlaybackState::Playing);
}

#[tokio::test]
async fn test_empty_station_list_is_inert() {
    let mut h = harness(&[]).await;
    h.command(Command::Next).await;
    h.command(Command::Prev).await;
    h.command(Command::SwitchStation { index: 0 }).await;
    h.command(Command::TogglePlay).await;

    assert_eq!(h.session.current_index(), None);
    assert!(h.session.current_station().is_none());
    assert!(h.loads().is_empty());
    assert_eq!(h.plays(), 0);
}

// ── lifecycle events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ended_advances_exactly_once() {
    let mut h = harness(&["A", "B", "C"]).await;
    h.start_playing().await;
    let loads = h.loads().len();
    let plays = h.plays();

    h.media(MediaEvent::Ended).await;

    assert_eq!(h.session.current_index(), Some(1));
    assert_eq!(h.loads().len(), loads + 1);
    assert_eq!(h.plays(), plays + 1);
}

#[tokio::test]
async fn test_ended_on_last_station_wraps() {
    let mut h = harness(&["A", "B"]).await;
    h.session.switch_station(1).await;
    h.start_playing().await;
    h.media(MediaEvent::Ended).await;
    assert_eq!(h.session.current_index(), Some(0));
}

#[tokio::test]
async fn test_pause_event_stops_frames_and_shows_idle() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    assert_eq!(h.frames.live(), 1);
    assert_ne!(h.surface.snapshot().bars, idle_bars(&h));

    h.command(Command::TogglePlay).await;
    assert_eq!(h.output.log().pauses, 1);
    // the event, not the call, changes the state
    assert_eq!(h.session.state(), PlaybackState::Playing);

    h.media(MediaEvent::Pause).await;
    assert_eq!(h.session.state(), PlaybackState::Paused);
    assert_eq!(h.frames.live(), 0);
    assert_eq!(h.surface.snapshot().bars, idle_bars(&h));
}

#[tokio::test]
async fn test_error_and_abort_stop_playback() {
    for event in [MediaEvent::Error("decode".into()), MediaEvent::Abort] {
        let mut h = harness(&["A"]).await;
        h.start_playing().await;
        h.media(event).await;

        assert_eq!(h.session.state(), PlaybackState::Errored);
        assert!(!h.session.is_playing());
        assert!(!h.session.engine().wants_playback());
        assert_eq!(h.frames.live(), 0);
        assert_eq!(h.surface.snapshot().bars, idle_bars(&h));
    }
}

#[tokio::test]
async fn test_stale_frame_does_not_draw() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    let stale = h.frames.log().live[0];
    h.command(Command::TogglePlay).await;
    h.media(MediaEvent::Pause).await;

    let clears = h.surface.snapshot().clears;
    h.session.handle_event(SessionEvent::Frame(stale)).await;
    assert_eq!(h.surface.snapshot().clears, clears);
    assert_eq!(h.frames.live(), 0);
}

// ── stall grace window ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_stall_without_recovery_fails_after_grace() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    h.output.log().ready = ReadyState::HaveCurrentData;

    h.media(MediaEvent::Stalled).await;
    assert_eq!(h.session.state(), PlaybackState::Stalled);
    assert!(h.session.is_playing());
    assert!(h.session.has_stall_timer());

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(h.session.state(), PlaybackState::Stalled);

    let event = h.pump().await;
    assert!(matches!(event, Some(SessionEvent::StallCheck(_))));
    assert_eq!(h.session.state(), PlaybackState::Errored);
    assert!(!h.session.is_playing());
    assert_eq!(h.frames.live(), 0);
    assert_eq!(h.surface.snapshot().bars, idle_bars(&h));
}

#[tokio::test(start_paused = true)]
async fn test_stall_with_recovery_is_harmless() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    h.media(MediaEvent::Stalled).await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    h.output.log().ready = ReadyState::HaveEnoughData;
    h.media(MediaEvent::Playing).await;
    assert_eq!(h.session.state(), PlaybackState::Playing);

    let event = h.pump().await;
    assert!(matches!(event, Some(SessionEvent::StallCheck(_))));
    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert!(h.session.is_playing());
    assert_eq!(h.frames.live(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stall_check_only_inspects_ready_state_once() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    h.media(MediaEvent::Stalled).await;
    // buffered enough by the time the single check runs, without a
    // `Playing` event
    h.output.log().ready = ReadyState::HaveFutureData;

    h.pump().await;
    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert!(!h.session.has_stall_timer());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_stall_does_not_rearm() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    h.media(MediaEvent::Stalled).await;
    tokio::time::sleep(Duration::from_secs(3)).await;
    h.media(MediaEvent::Stalled).await;

    // the first check still lands 5 s after the first stall
    tokio::time::sleep(Duration::from_millis(2_100)).await;
    let event = tokio::time::timeout(Duration::from_millis(1), h.pump()).await;
    assert!(event.is_ok());
    assert_eq!(h.session.state(), PlaybackState::Errored);
}

#[tokio::test(start_paused = true)]
async fn test_second_stall_keeps_first_check() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    h.output.log().ready = ReadyState::HaveCurrentData;

    h.media(MediaEvent::Stalled).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.media(MediaEvent::Playing).await;
    assert_eq!(h.session.state(), PlaybackState::Playing);
    tokio::time::sleep(Duration::from_secs(2)).await;
    h.media(MediaEvent::Stalled).await;
    assert_eq!(h.session.state(), PlaybackState::Stalled);

    // t=5.1: the check from the first stall is due
    let event = tokio::time::timeout(Duration::from_millis(2_100), h.pump()).await;
    assert!(matches!(event, Ok(Some(SessionEvent::StallCheck(_)))));
    assert_eq!(h.session.state(), PlaybackState::Errored);
    assert!(!h.session.is_playing());

    // failing aborted the check from the second stall
    assert!(!h.session.has_stall_timer());
    let late = tokio::time::timeout(Duration::from_secs(5), h.pump()).await;
    assert!(late.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_pause_invalidates_pending_stall_check() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    h.media(MediaEvent::Stalled).await;
    let generation = h.session.engine().stall_generation();

    h.command(Command::TogglePlay).await;
    h.media(MediaEvent::Pause).await;
    assert!(!h.session.has_stall_timer());

    // a check that was already queued is ignored
    h.session.handle_event(SessionEvent::StallCheck(generation)).await;
    assert_eq!(h.session.state(), PlaybackState::Paused);
}

// ── frame invariant ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_at_most_one_frame_outstanding() {
    let mut h = harness(&["A", "B", "C"]).await;

    fn check(h: &Harness) {
        assert!(h.frames.live() <= 1);
        assert_eq!(h.frames.live() == 1, h.session.is_playing());
    }

    h.start_playing().await;
    check(&h);
    for _ in 0..5 {
        assert!(h.fire_frame().await);
        check(&h);
    }
    h.media(MediaEvent::Play).await;
    check(&h);
    h.command(Command::Next).await;
    check(&h);
    h.media(MediaEvent::Play).await;
    check(&h);
    h.media(MediaEvent::Stalled).await;
    check(&h);
    h.fire_frame().await;
    check(&h);
    h.media(MediaEvent::Playing).await;
    check(&h);
    h.command(Command::SwitchStation { index: 0 }).await;
    h.command(Command::SwitchStation { index: 2 }).await;
    check(&h);
    h.media(MediaEvent::Play).await;
    h.media(MediaEvent::Error("network".into())).await;
    check(&h);
    h.start_playing().await;
    h.media(MediaEvent::Ended).await;
    check(&h);
    h.media(MediaEvent::Play).await;
    h.command(Command::TogglePlay).await;
    h.media(MediaEvent::Pause).await;
    check(&h);
    assert!(!h.fire_frame().await);

    assert_eq!(h.frames.log().max_live, 1);
}

#[tokio::test]
async fn test_frames_draw_live_samples_while_playing() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    let first = h.surface.snapshot().bars[0].height;
    h.fire_frame().await;
    let second = h.surface.snapshot().bars[0].height;
    // smoothing pulls bars toward the live level frame by frame
    assert!(second > first);
}

// ── volume ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_volume_is_clamped_and_persisted() {
    let mut h = harness(&["A"]).await;

    h.command(Command::Volume { value: 1.4 }).await;
    assert_eq!(h.session.volume(), 1.0);
    assert_eq!(h.session.prefs().get(VOLUME_KEY).as_deref(), Some("1"));

    h.command(Command::Volume { value: -0.2 }).await;
    assert_eq!(h.session.volume(), 0.0);
    assert_eq!(h.session.prefs().get(VOLUME_KEY).as_deref(), Some("0"));
    assert_eq!(h.output.log().volumes.last(), Some(&0.0));
}

#[tokio::test]
async fn test_volume_steps() {
    let mut h = harness(&["A"]).await;
    h.command(Command::Volume { value: 0.5 }).await;
    h.command(Command::VolumeUp).await;
    assert_eq!(h.session.volume(), 0.55);
    h.command(Command::VolumeDown).await;
    h.command(Command::VolumeDown).await;
    assert_eq!(h.session.volume(), 0.45);

    h.command(Command::Volume { value: 1.0 }).await;
    h.command(Command::VolumeUp).await;
    assert_eq!(h.session.volume(), 1.0);
}

// ── observers and teardown ────────────────────────────────────────────────────

#[tokio::test]
async fn test_snapshots_follow_changes() {
    let mut h = harness(&["A", "B"]).await;
    while h.snapshots.try_recv().is_ok() {}

    h.command(Command::Next).await;
    let snap = h.snapshots.try_recv().unwrap();
    assert_eq!(snap.current_index, Some(1));
    assert_eq!(snap.current_station.map(|s| s.name), Some("B".to_string()));
    assert!(!snap.is_playing);

    // nothing visible changed
    h.command(Command::SwitchStation { index: 7 }).await;
    assert!(h.snapshots.try_recv().is_err());

    h.start_playing().await;
    let mut last = None;
    while let Ok(s) = h.snapshots.try_recv() {
        last = Some(s);
    }
    let last = last.unwrap();
    assert!(last.is_playing);
    assert_eq!(last.state, PlaybackState::Playing);
    assert!(last.rev > snap.rev);
}

#[tokio::test]
async fn test_shutdown_tears_everything_down() {
    let mut h = harness(&["A"]).await;
    h.start_playing().await;
    h.media(MediaEvent::Stalled).await;
    assert_eq!(h.frames.live(), 1);

    let Harness {
        session,
        output,
        frames,
        tx,
        rx,
        ..
    } = h;
    tx.send(SessionEvent::Shutdown).await.unwrap();
    session.run(rx).await;

    assert!(output.log().shut_down);
    assert_eq!(frames.live(), 0);
    assert!(tx.send(SessionEvent::Shutdown).await.is_err());
}
