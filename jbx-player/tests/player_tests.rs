//! Player behavior tests against the scriptable fake backend.

use jbx_player::backend::fake::{FakeBackend, FakeBackendHandle};
use jbx_player::backend::DeviceState;
use jbx_player::library::{NoAutoControl, NullLibrary};
use jbx_player::queue::{MemoryQueue, PlaybackQueue, QueueEntry};
use jbx_player::signals::StreamSignal;
use jbx_player::{Player, PlayerSettings};
use jbx_common::events::PlayerEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;

const URL_A: &str = "file:///music/a.mp3";
const URL_B: &str = "file:///music/b.mp3";
const URL_C: &str = "file:///music/c.mp3";

struct Harness {
    player: Player,
    backend: FakeBackendHandle,
    signals: UnboundedReceiver<StreamSignal>,
    events: broadcast::Receiver<PlayerEvent>,
}

fn harness_with(urls: &[&str], tweak: impl FnOnce(&mut PlayerSettings)) -> Harness {
    jbx_common::logging::init_for_tests();
    let (backend, handle) = FakeBackend::new("audioout");
    let mut settings = PlayerSettings::default();
    // Predictable amplitudes unless a test opts back in.
    settings.av_enabled = false;
    settings.volume = 255;
    tweak(&mut settings);

    let mut player = Player::new(
        Box::new(backend),
        Box::new(MemoryQueue::from_urls(urls.iter().copied())),
        Arc::new(NullLibrary),
        Box::new(NoAutoControl),
        settings,
    );
    let signals = player.take_signal_receiver().unwrap();
    let events = player.subscribe_events();
    Harness {
        player,
        backend: handle,
        signals,
        events,
    }
}

fn harness(urls: &[&str]) -> Harness {
    harness_with(urls, |_| {})
}

impl Harness {
    /// Drain pending signals into the player, as the control loop would.
    fn pump(&mut self) {
        while let Ok(signal) = self.signals.try_recv() {
            self.player.receive_signal(signal);
        }
    }

    fn drain_events(&mut self) -> Vec<PlayerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}

#[test]
fn play_starts_the_first_track_and_opens_the_device() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();

    assert!(h.player.is_playing());
    assert_eq!(h.backend.stream_count(), 1);
    assert_eq!(h.backend.last_stream().unwrap().url(), URL_A);
    assert_eq!(h.backend.device_state(), DeviceState::Playing);
    assert_eq!(h.player.current_url().as_deref(), Some(URL_A));

    let events = h.drain_events();
    assert!(matches!(
        events.first(),
        Some(PlayerEvent::TrackChanged { queue_position: 0, .. })
    ));
}

#[test]
fn play_with_empty_queue_stays_stopped() {
    let mut h = harness(&[]);
    h.player.play(0).unwrap();
    assert!(h.player.is_stopped());
    assert_eq!(h.backend.stream_count(), 0);
}

#[test]
fn play_with_seek_starts_at_the_offset() {
    let mut h = harness(&[URL_A]);
    h.player.play(30_000).unwrap();
    // The fake seeds reported elapsed time with the creation offset.
    assert_eq!(h.player.time().elapsed_ms, Some(30_000));
}

#[test]
fn crossfade_triggers_exactly_at_lead_time() {
    // total 200 s, crossfade 10 s, end offset 3 s: trigger at 187 s.
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();

    a.set_time(Some(200_000), Some(186_999));
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 1, "one ms early must not trigger");

    a.set_time(Some(200_000), Some(187_000));
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 2);
    assert_eq!(h.backend.last_stream().unwrap().url(), URL_B);
    assert_eq!(h.player.trashed_stream_count(), 1);
    assert_eq!(h.player.current_url().as_deref(), Some(URL_B));
    assert!(h.player.is_playing(), "at most one primary, still playing");
}

#[test]
fn crossfade_does_not_retrigger_while_new_stream_has_no_timing() {
    let mut h = harness(&[URL_A, URL_B, URL_C]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();
    a.set_time(Some(200_000), Some(190_000));
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 2);

    // The new primary reports no timing yet; further ticks do nothing.
    h.player.one_second_tick();
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 2);
    assert_eq!(h.player.trashed_stream_count(), 1);
}

#[test]
fn short_tracks_are_never_crossfaded() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();

    // 15 s < 2 * 10 s crossfade.
    a.set_time(Some(15_000), Some(14_500));
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 1);
}

#[test]
fn unknown_timing_blocks_crossfading() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();

    a.set_time(None, Some(500_000));
    h.player.one_second_tick();
    a.set_time(Some(200_000), None);
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 1);
}

#[test]
fn video_streams_are_never_crossfaded() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();

    a.send_video_detected();
    a.send_video_detected();
    a.set_time(Some(200_000), Some(199_000));
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 1);

    // Detection is announced exactly once.
    let videos = h
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, PlayerEvent::VideoDetected { .. }))
        .count();
    assert_eq!(videos, 1);
}

#[test]
fn faded_out_stream_is_destroyed_after_reaching_silence() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();
    a.set_time(Some(200_000), Some(190_000));
    h.player.one_second_tick();
    assert_eq!(h.player.trashed_stream_count(), 1);

    // Render 11 s of audio through the fading stream: the 10 s fade
    // finishes and the auto-delete signal fires exactly once.
    a.push_buffer(11 * 44_100, 44_100, 2);
    a.push_buffer(4_410, 44_100, 2);
    h.pump();

    assert_eq!(h.player.trashed_stream_count(), 0);
    assert!(a.is_destroyed());
}

#[test]
fn natural_end_advances_to_the_next_track() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();

    a.send_eos();
    h.pump();

    assert!(a.is_destroyed());
    assert_eq!(h.backend.stream_count(), 2);
    assert_eq!(h.player.current_url().as_deref(), Some(URL_B));
    assert!(h.player.is_playing());
}

#[test]
fn end_of_queue_stops_and_announces_it() {
    let mut h = harness(&[URL_A]);
    h.player.play(0).unwrap();
    h.drain_events();

    h.backend.last_stream().unwrap().send_eos();
    h.pump();

    assert!(h.player.is_stopped());
    assert_eq!(h.backend.device_state(), DeviceState::Closed);
    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, PlayerEvent::StoppedByEndOfQueue { .. })));
}

#[test]
fn stale_end_of_stream_from_trashed_stream_is_ignored() {
    let mut h = harness(&[URL_A, URL_B, URL_C]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();
    a.set_time(Some(200_000), Some(190_000));
    h.player.one_second_tick();
    assert_eq!(h.player.current_url().as_deref(), Some(URL_B));

    // The trashed stream finishes naturally; this must not advance again.
    a.send_eos();
    h.pump();
    assert_eq!(h.player.current_url().as_deref(), Some(URL_B));
    assert_eq!(h.backend.stream_count(), 2);
}

#[test]
fn failing_track_is_skipped_and_remembered() {
    let mut h = harness(&[URL_A, URL_B, URL_C]);
    h.backend.fail_creation_of(URL_B);
    h.player.play(0).unwrap();
    h.drain_events();

    h.backend.last_stream().unwrap().send_eos();
    h.pump();

    // B failed, C plays; the position walked through B anyway.
    assert_eq!(h.player.current_url().as_deref(), Some(URL_C));
    let changes: Vec<usize> = h
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            PlayerEvent::TrackChanged { queue_position, .. } => Some(queue_position),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![1, 2]);
}

#[test]
fn all_tracks_failing_ends_in_a_clean_stop() {
    let mut h = harness(&[URL_A, URL_B, URL_C]);
    h.backend.fail_creation_of(URL_B);
    h.backend.fail_creation_of(URL_C);
    h.player.play(0).unwrap();

    h.backend.last_stream().unwrap().send_eos();
    h.pump();

    assert!(h.player.is_stopped());
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, PlayerEvent::StoppedByEndOfQueue { .. })));
}

#[test]
fn previously_failed_track_blocks_the_crossfade() {
    let mut h = harness(&[URL_A, URL_B]);
    h.backend.fail_creation_of(URL_B);
    h.player.play(0).unwrap();

    // Seed the failed set through a jump that cannot create its stream,
    // then go back and restart A.
    h.player.goto_abs_pos(1, false).unwrap();
    assert!(h.player.is_stopped());
    h.player.goto_abs_pos(0, false).unwrap();
    h.player.play(0).unwrap();

    let a = h.backend.last_stream().unwrap();
    assert_eq!(a.url(), URL_A);
    a.set_time(Some(200_000), Some(190_000));
    let before = h.backend.stream_count();
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), before, "failed URL must defer the crossfade");
    assert_eq!(h.player.current_url().as_deref(), Some(URL_A));
}

#[test]
fn stop_after_this_track_parks_the_position() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    h.player.set_stop_after_this_track(true);

    h.backend.last_stream().unwrap().send_eos();
    h.pump();

    assert!(h.player.is_stopped());
    assert!(!h.player.stop_after_this_track(), "flag is one-shot");
}

#[test]
fn pause_and_resume_keep_the_stream() {
    let mut h = harness(&[URL_A]);
    h.player.play(0).unwrap();
    h.player.pause();
    assert!(h.player.is_paused());
    assert_eq!(h.backend.device_state(), DeviceState::Paused);
    assert_eq!(h.backend.stream_count(), 1);

    h.player.play(0).unwrap();
    assert!(h.player.is_playing());
    assert_eq!(h.backend.device_state(), DeviceState::Playing);
    assert_eq!(h.backend.stream_count(), 1, "resume must not recreate the stream");
}

#[test]
fn paused_player_never_crossfades() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();
    h.player.pause();

    a.set_time(Some(200_000), Some(190_000));
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 1);
}

#[test]
fn stop_destroys_everything_and_closes_the_device() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();
    a.set_time(Some(200_000), Some(190_000));
    h.player.one_second_tick();
    assert_eq!(h.player.trashed_stream_count(), 1);

    h.player.stop();
    assert!(h.player.is_stopped());
    assert_eq!(h.player.trashed_stream_count(), 0);
    assert_eq!(h.backend.device_state(), DeviceState::Closed);
    assert!(h.backend.streams().iter().all(|s| s.is_destroyed()));
}

#[test]
fn goto_while_playing_fades_the_old_stream_out() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();

    h.player.goto_abs_pos(1, true).unwrap();
    assert_eq!(h.player.current_url().as_deref(), Some(URL_B));
    assert_eq!(h.player.trashed_stream_count(), 1);
    assert!(!a.is_destroyed(), "old stream fades, not a hard cut");
}

#[test]
fn goto_without_fade_cuts_hard() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();

    h.player.goto_abs_pos(1, false).unwrap();
    assert!(a.is_destroyed());
    assert_eq!(h.player.trashed_stream_count(), 0);
}

#[test]
fn goto_while_stopped_only_moves_the_position() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.goto_abs_pos(1, false).unwrap();
    assert!(h.player.is_stopped());
    assert_eq!(h.backend.stream_count(), 0);

    h.player.play(0).unwrap();
    assert_eq!(h.player.current_url().as_deref(), Some(URL_B));
}

#[test]
fn goto_while_paused_stops_at_the_new_position() {
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    h.player.pause();

    h.player.goto_abs_pos(1, false).unwrap();
    assert!(h.player.is_stopped());
    assert_eq!(h.backend.device_state(), DeviceState::Closed);
}

#[test]
fn goto_while_paused_reclaims_fading_streams() {
    let mut h = harness(&[URL_A, URL_B, URL_C]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();
    h.player.goto_abs_pos(1, true).unwrap();
    assert_eq!(h.player.trashed_stream_count(), 1);

    // Pausing freezes rendering, so A's fade-out can never finish on its
    // own; jumping away must reclaim it instead of leaking it.
    h.player.pause();
    h.player.goto_abs_pos(2, false).unwrap();

    assert!(h.player.is_stopped());
    assert_eq!(h.player.trashed_stream_count(), 0);
    assert!(a.is_destroyed());
    assert_eq!(h.backend.device_state(), DeviceState::Closed);

    h.player.play(0).unwrap();
    assert_eq!(h.player.current_url().as_deref(), Some(URL_C));
}

#[test]
fn goto_out_of_range_is_an_error() {
    let mut h = harness(&[URL_A]);
    assert!(h.player.goto_abs_pos(5, false).is_err());
}

#[test]
fn seek_is_forwarded_to_the_stream() {
    let mut h = harness(&[URL_A]);
    h.player.play(0).unwrap();
    h.player.seek_abs(42_000);
    assert_eq!(h.backend.last_stream().unwrap().last_seek(), Some(42_000));
    assert_eq!(h.player.time().elapsed_ms, Some(42_000));
}

#[test]
fn volume_scales_samples_in_the_pipeline() {
    let mut h = harness(&[URL_A]);
    h.player.set_main_volume(128);
    h.player.play(0).unwrap();

    let buf = h.backend.last_stream().unwrap().push_buffer(32, 44_100, 2);
    let expected = 0.5 * 128.0 / 255.0;
    assert!((buf[0] - expected).abs() < 1e-3, "got {}", buf[0]);
}

#[test]
fn managed_volume_goes_to_the_device_not_the_pipeline() {
    jbx_common::logging::init_for_tests();
    let (backend, handle) = FakeBackend::new("audioout");
    let backend = backend.with_managed_volume();
    let mut settings = PlayerSettings::default();
    settings.av_enabled = false;
    settings.volume = 128;
    let mut player = Player::new(
        Box::new(backend),
        Box::new(MemoryQueue::from_urls([URL_A])),
        Arc::new(NullLibrary),
        Box::new(NoAutoControl),
        settings,
    );
    player.play(0).unwrap();

    let gain = handle.device_gain();
    assert!((gain - 128.0 / 255.0).abs() < 1e-3, "device gain {}", gain);

    let buf = handle.last_stream().unwrap().push_buffer(32, 44_100, 2);
    assert!((buf[0] - 0.5).abs() < 1e-6, "pipeline must not scale twice");
}

#[test]
fn mute_restores_the_previous_volume() {
    let mut h = harness(&[URL_A]);
    h.player.set_main_volume(100);
    h.player.set_main_volume_mute(true);
    assert!(h.player.is_muted());
    assert_eq!(h.player.main_volume(), 0);
    assert_eq!(h.player.persistent_volume(), 100);

    // Muting twice is idempotent.
    h.player.set_main_volume_mute(true);
    h.player.set_main_volume_mute(false);
    assert!(!h.player.is_muted());
    assert_eq!(h.player.main_volume(), 100);
}

#[test]
fn unmuting_a_tiny_backup_restores_the_default() {
    let mut h = harness(&[URL_A]);
    h.player.set_main_volume(5);
    h.player.set_main_volume_mute(true);
    h.player.set_main_volume_mute(false);
    assert_eq!(h.player.main_volume(), 240);
}

#[test]
fn preview_plays_and_finishes_independently() {
    let mut h = harness(&[URL_A]);
    h.player.play(0).unwrap();
    h.player.toggle_preview(URL_C).unwrap();
    assert!(h.player.is_previewing());
    assert_eq!(h.backend.stream_count(), 2);

    let preview = h.backend.last_stream().unwrap();
    assert_eq!(preview.url(), URL_C);
    preview.send_eos();
    h.pump();

    assert!(!h.player.is_previewing());
    assert!(preview.is_destroyed());
    assert!(h.player.is_playing(), "primary unaffected by preview end");
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, PlayerEvent::PreviewFinished { .. })));
}

#[test]
fn toggling_the_same_preview_stops_it() {
    let mut h = harness(&[URL_A]);
    h.player.toggle_preview(URL_C).unwrap();
    let first = h.backend.last_stream().unwrap();
    h.player.toggle_preview(URL_C).unwrap();
    assert!(!h.player.is_previewing());
    assert!(first.is_destroyed());
}

#[test]
fn deferred_creation_failure_ends_without_created() {
    // A stream whose creation completes asynchronously and fails reports
    // end-of-stream without ever delivering Created; the player advances.
    let mut h = harness(&[URL_A, URL_B]);
    h.backend.defer_creation_of(URL_A);
    h.player.play(0).unwrap();
    assert!(h.player.is_playing());

    h.backend.streams()[0].send_eos();
    h.pump();
    assert_eq!(h.player.current_url().as_deref(), Some(URL_B));
}

#[test]
fn resume_snapshot_roundtrips_through_a_new_player() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".player-resume");

    let mut h = harness(&[URL_A, URL_B, URL_C]);
    h.player.play(0).unwrap();
    h.backend.last_stream().unwrap().send_eos();
    h.pump();
    // Now on B; give it a known position.
    h.backend.last_stream().unwrap().set_time(Some(200_000), Some(61_000));
    h.player.save_resume(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("resumeversion=2\n"));
    assert!(contents.contains("playing=61000\n"));
    assert!(contents.contains(&format!("url={}\n", URL_B)));
    // Write metadata lands in a footer after the last entry.
    let last_url = contents.rfind("url=").unwrap();
    assert!(contents.rfind("created=").unwrap() > last_url);
    assert!(contents.rfind("\nms=").unwrap() > last_url);

    let mut h2 = harness(&[]);
    h2.player.load_resume(&path).unwrap();
    assert!(h2.player.is_stopped(), "no autoplay by default");

    h2.player.play(0).unwrap();
    assert_eq!(h2.player.current_url().as_deref(), Some(URL_B));
}

#[test]
fn played_entries_are_filtered_out_when_saving() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".player-resume");

    let mut h = harness(&[URL_A, URL_B, URL_C]);
    h.player.play(0).unwrap();
    h.backend.last_stream().unwrap().send_eos();
    h.pump();
    h.player.save_resume(&path).unwrap();

    // A is played and not current, so it never reaches the file; B is
    // played but on air and survives.
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(!contents.contains(URL_A));
    assert!(contents.contains(URL_B));
    assert!(contents.contains(URL_C));

    let mut h2 = harness(&[]);
    h2.player.load_resume(&path).unwrap();
    h2.player.play(0).unwrap();
    assert_eq!(h2.player.current_url().as_deref(), Some(URL_B));
}

#[test]
fn played_entries_are_kept_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".player-resume");

    let mut h = harness_with(&[URL_A, URL_B], |s| s.resume_load_played = true);
    h.player.play(0).unwrap();
    h.backend.last_stream().unwrap().send_eos();
    h.pump();
    h.player.save_resume(&path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains(URL_A));
    assert!(contents.contains(URL_B));
}

#[test]
fn resume_autostarts_at_the_saved_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".player-resume");
    std::fs::write(
        &path,
        format!("resumeversion=2\nplayed=1\nplaying=5000\nurl={}\nurl={}\n", URL_A, URL_B),
    )
    .unwrap();

    let mut h = harness_with(&[], |s| s.resume_start_playback = true);
    h.player.load_resume(&path).unwrap();
    assert!(h.player.is_playing());
    assert_eq!(h.player.current_url().as_deref(), Some(URL_A));
    assert_eq!(h.player.time().elapsed_ms, Some(5_000));
}

#[test]
fn resume_of_a_stopped_session_stays_stopped() {
    // playing=-1 records a session that was not rendering when saved;
    // even with autostart on, loading it must not begin playback.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".player-resume");
    std::fs::write(
        &path,
        format!("resumeversion=2\nplaying=-1\nurl={}\nurl={}\n", URL_A, URL_B),
    )
    .unwrap();

    let mut h = harness_with(&[], |s| s.resume_start_playback = true);
    h.player.load_resume(&path).unwrap();
    assert!(h.player.is_stopped());
    assert_eq!(h.backend.stream_count(), 0);

    // The position was still restored for a later manual start.
    h.player.play(0).unwrap();
    assert_eq!(h.player.current_url().as_deref(), Some(URL_A));
}

#[test]
fn missing_resume_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut h = harness(&[]);
    assert!(h.player.load_resume(&dir.path().join("absent")).is_ok());
}

#[test]
fn enqueue_time_sums_known_durations() {
    let mut queue = MemoryQueue::new();
    let mut e1 = QueueEntry::new(URL_A);
    e1.playtime_ms = Some(180_000);
    let mut e2 = QueueEntry::new(URL_B);
    e2.playtime_ms = Some(200_000);
    queue.enqueue(e1);
    queue.enqueue(e2);
    queue.enqueue(QueueEntry::new(URL_C));

    let (backend, handle) = FakeBackend::new("audioout");
    let mut settings = PlayerSettings::default();
    settings.av_enabled = false;
    let mut player = Player::new(
        Box::new(backend),
        Box::new(queue),
        Arc::new(NullLibrary),
        Box::new(NoAutoControl),
        settings,
    );
    player.play(0).unwrap();
    handle.last_stream().unwrap().set_time(Some(180_000), Some(60_000));

    // 120 s left of A, 200 s of B, and the 180 s assumption for C.
    assert_eq!(player.enqueue_time_ms(), 120_000 + 200_000 + 180_000);
}

#[test]
fn end_to_end_crossfade_scenario() {
    // A: 180 s on air at 167 s, B: 200 s. Lead time 13 s means the
    // crossfade starts exactly now; A fades into the trash and B goes on
    // air at position 1.
    let mut h = harness(&[URL_A, URL_B]);
    h.player.play(0).unwrap();
    let a = h.backend.last_stream().unwrap();
    h.drain_events();

    a.set_time(Some(180_000), Some(166_999));
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 1);

    a.set_time(Some(180_000), Some(167_000));
    h.player.one_second_tick();
    assert_eq!(h.backend.stream_count(), 2);
    let b = h.backend.last_stream().unwrap();
    assert_eq!(b.url(), URL_B);
    assert_eq!(h.player.trashed_stream_count(), 1);
    assert!(matches!(
        h.drain_events().first(),
        Some(PlayerEvent::TrackChanged { queue_position: 1, .. })
    ));

    // A renders through its fade and is destroyed.
    a.push_buffer(11 * 44_100, 44_100, 2);
    a.push_buffer(4_410, 44_100, 2);
    h.pump();
    assert!(a.is_destroyed());
    assert_eq!(h.player.trashed_stream_count(), 0);

    // B finishes; the queue is exhausted and playback stops cleanly.
    b.set_time(Some(200_000), Some(200_000));
    b.send_eos();
    h.pump();
    assert!(h.player.is_stopped());
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, PlayerEvent::StoppedByEndOfQueue { .. })));
}
