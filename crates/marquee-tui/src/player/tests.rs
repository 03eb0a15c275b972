use std::sync::{Arc, Mutex};

use marquee_proto::catalog::CatalogError;
use marquee_proto::model::{
    Media, MediaItem, MediaType, Part, PlaybackInfo, RatingKey, StreamProtocol, TimelineState,
};

use super::*;
use crate::engine::{EngineError, EngineEvent, EngineHost, EngineState, MediaEngine, TrackKind};

#[derive(Debug, Clone, PartialEq)]
enum Cmd {
    Play { url: String, direct: bool, hint: u32 },
    Pause,
    Resume,
    Stop,
    Seek(u64),
    SeekRelative(i64),
    SetTrack(TrackKind, Option<u64>),
    Cycle(TrackKind),
    Stats,
}

#[derive(Clone, Default)]
struct RecordingEngine {
    log: Arc<Mutex<Vec<Cmd>>>,
}

impl RecordingEngine {
    fn push(&self, cmd: Cmd) {
        self.log.lock().unwrap().push(cmd);
    }
}

impl MediaEngine for RecordingEngine {
    fn init(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
    fn cleanup(&mut self) {}
    fn play(&mut self, url: &str, is_direct: bool, hint_bitrate: u32) {
        self.push(Cmd::Play {
            url: url.to_string(),
            direct: is_direct,
            hint: hint_bitrate,
        });
    }
    fn pause(&mut self) {
        self.push(Cmd::Pause);
    }
    fn resume(&mut self) {
        self.push(Cmd::Resume);
    }
    fn stop(&mut self) {
        self.push(Cmd::Stop);
    }
    fn seek(&mut self, position_ms: u64) {
        self.push(Cmd::Seek(position_ms));
    }
    fn seek_relative(&mut self, delta_ms: i64) {
        self.push(Cmd::SeekRelative(delta_ms));
    }
    fn set_track(&mut self, kind: TrackKind, id: Option<u64>) {
        self.push(Cmd::SetTrack(kind, id));
    }
    fn cycle_track(&mut self, kind: TrackKind) {
        self.push(Cmd::Cycle(kind));
    }
    fn toggle_stats(&mut self) {
        self.push(Cmd::Stats);
    }
}

struct Rig {
    host: EngineHost<RecordingEngine>,
    log: Arc<Mutex<Vec<Cmd>>>,
    ctl: PlaybackController<RecordingEngine>,
}

impl Rig {
    fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    fn with_config(config: ControllerConfig) -> Self {
        let engine = RecordingEngine::default();
        let log = Arc::clone(&engine.log);
        let host = EngineHost::new(engine);
        let lease = host.acquire().unwrap();
        Self {
            host,
            log,
            ctl: PlaybackController::new(lease, config),
        }
    }

    fn cmds(&self) -> Vec<Cmd> {
        self.log.lock().unwrap().clone()
    }

    fn clear(&self) {
        self.log.lock().unwrap().clear();
    }
}

fn item(key: u64, duration: u64, view_offset: u64) -> MediaItem {
    MediaItem {
        rating_key: RatingKey(key),
        title: format!("Item {}", key),
        media_type: MediaType::Movie,
        duration,
        view_offset,
        media: vec![Media {
            bitrate: 8000,
            parts: vec![Part {
                key: format!("/library/parts/{}/file.mkv", key),
                ..Default::default()
            }],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn episode(key: u64, parent: u64, index: u32) -> MediaItem {
    MediaItem {
        media_type: MediaType::Episode,
        parent_rating_key: RatingKey(parent),
        index,
        ..item(key, 1_800_000, 0)
    }
}

fn direct() -> PlaybackInfo {
    PlaybackInfo {
        direct_playable: true,
        playback_url: "http://srv/file.mkv".into(),
        protocol: StreamProtocol::Http,
        ..Default::default()
    }
}

fn adaptive(session: &str) -> PlaybackInfo {
    PlaybackInfo {
        playback_url: format!("http://srv/start.m3u8?session={}", session),
        protocol: StreamProtocol::Hls,
        session_id: session.into(),
        ..Default::default()
    }
}

fn decision_id(effects: &[Effect]) -> RequestId {
    effects
        .iter()
        .find_map(|e| match e {
            Effect::FetchDecision { id, .. } => Some(*id),
            _ => None,
        })
        .expect("no decision request")
}

fn decision_offset(effects: &[Effect]) -> u64 {
    effects
        .iter()
        .find_map(|e| match e {
            Effect::FetchDecision { query, .. } => Some(query.offset_ms),
            _ => None,
        })
        .expect("no decision request")
}

fn reports(effects: &[Effect]) -> Vec<&marquee_proto::model::TimelineReport> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::ReportTimeline { report, .. } => Some(report),
            _ => None,
        })
        .collect()
}

/// Start an adaptive session positioned at `offset` and playing.
fn adaptive_rig(duration: u64, offset: u64) -> Rig {
    let mut rig = Rig::new();
    let mut fx = rig.ctl.start(PlaybackRequest::new(item(1, duration, offset)).with_quality(4000, None));
    if offset > 0 {
        fx = rig.ctl.choose_resume(true);
    }
    let id = decision_id(&fx);
    rig.ctl.on_decision(id, Ok(adaptive("s1")));
    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Playing));
    rig.clear();
    rig
}

#[test]
fn test_resume_prompt_then_resume_offset() {
    let mut rig = Rig::new();
    let fx = rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 1_800_000)));
    assert_eq!(rig.ctl.phase(), &SessionPhase::AwaitingResume);
    match &fx[..] {
        [Effect::PromptResume(p)] => {
            assert_eq!(p.resume_label, "Resume from 30:00");
            assert_eq!(p.restart_label, "Start from beginning");
        }
        other => panic!("unexpected effects {:?}", other),
    }

    let fx = rig.ctl.choose_resume(true);
    assert_eq!(decision_offset(&fx), 1_800_000);
    assert_eq!(rig.ctl.session().unwrap().start_offset_ms, 1_800_000);
}

#[test]
fn test_start_from_beginning() {
    let mut rig = Rig::new();
    rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 1_800_000)));
    let fx = rig.ctl.choose_resume(false);
    assert_eq!(decision_offset(&fx), 0);
}

#[test]
fn test_no_prompt_without_view_offset() {
    let mut rig = Rig::new();
    let fx = rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0)));
    assert!(matches!(fx[..], [Effect::FetchDecision { .. }]));
    assert_eq!(rig.ctl.phase(), &SessionPhase::Negotiating);
    // a stray answer to a prompt that was never shown changes nothing
    assert!(rig.ctl.choose_resume(true).is_empty());
}

#[test]
fn test_item_without_media_fails() {
    let mut rig = Rig::new();
    let mut bare = item(1, 0, 0);
    bare.media.clear();
    let fx = rig.ctl.start(PlaybackRequest::new(bare));
    assert_eq!(fx, vec![Effect::ShowError("No media available for playback".into())]);
}

#[test]
fn test_stale_decision_is_dropped() {
    let mut rig = Rig::new();
    let fx = rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0)).with_quality(4000, None));
    let a = decision_id(&fx);
    rig.ctl.on_decision(a, Ok(adaptive("s1")));
    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Playing));

    let fx = rig.ctl.seek_forward();
    let Effect::ScheduleSeekFlush { token, .. } = fx[0] else {
        panic!("expected flush schedule");
    };
    let b = decision_id(&rig.ctl.flush_seek(token));
    assert_ne!(a, b);
    rig.clear();

    // the answer to A arrives late: nothing changes
    assert!(rig.ctl.on_decision(a, Ok(adaptive("late"))).is_empty());
    assert!(rig.cmds().is_empty());
    assert_eq!(rig.ctl.session().unwrap().session_id, "s1");

    rig.ctl.on_decision(b, Ok(adaptive("s2")));
    assert_eq!(rig.ctl.session().unwrap().session_id, "s2");
    assert!(matches!(rig.cmds()[..], [Cmd::Play { .. }]));
}

#[test]
fn test_older_decision_resolving_after_newer_request_is_dropped() {
    let mut rig = adaptive_rig(3_600_000, 0);
    let Effect::ScheduleSeekFlush { token, .. } = rig.ctl.seek_forward()[0] else {
        panic!("expected flush schedule");
    };
    let a = decision_id(&rig.ctl.flush_seek(token));

    // a second burst while A is still unresolved
    let Effect::ScheduleSeekFlush { token, .. } = rig.ctl.seek_forward()[0] else {
        panic!("expected flush schedule");
    };
    let b = decision_id(&rig.ctl.flush_seek(token));
    assert_ne!(a, b);
    rig.clear();

    assert!(rig.ctl.on_decision(a, Ok(adaptive("late"))).is_empty());
    assert!(rig.cmds().is_empty());
    assert!(rig.ctl.session().unwrap().restarting);

    rig.ctl.on_decision(b, Ok(adaptive("s3")));
    assert_eq!(rig.ctl.session().unwrap().session_id, "s3");
    assert_eq!(rig.ctl.session().unwrap().start_offset_ms, 20_000);
    assert!(matches!(rig.cmds()[..], [Cmd::Play { .. }]));
}

#[test]
fn test_closed_player_decision_never_reaches_next_player() {
    let mut first = Rig::new();
    let a = decision_id(&first.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0))));
    first.ctl.close();
    first.clear();

    let lease = first.host.acquire().unwrap();
    let mut second = PlaybackController::new(lease, ControllerConfig::default());
    let b = decision_id(&second.start(PlaybackRequest::new(item(2, 3_600_000, 0))));
    assert_ne!(a, b);

    let mut late = direct();
    late.playback_url = "http://srv/ITEM-ONE.mkv".into();
    assert!(second.on_decision(a, Ok(late)).is_empty());
    assert_eq!(second.phase(), &SessionPhase::Negotiating);
    assert!(first.cmds().is_empty());

    second.on_decision(b, Ok(direct()));
    assert_eq!(second.phase(), &SessionPhase::Streaming(StreamMode::Direct));
    assert!(matches!(
        &first.cmds()[..],
        [Cmd::Play { url, .. }] if url == "http://srv/file.mkv"
    ));
    second.teardown();
}

#[test]
fn test_seek_flush_from_closed_player_is_ignored() {
    let mut old = adaptive_rig(3_600_000, 0);
    let Effect::ScheduleSeekFlush { token: stale, .. } = old.ctl.seek_forward()[0] else {
        panic!("expected flush schedule");
    };
    old.ctl.close();

    let mut rig = adaptive_rig(3_600_000, 0);
    let Effect::ScheduleSeekFlush { token, .. } = rig.ctl.seek_forward()[0] else {
        panic!("expected flush schedule");
    };
    assert_ne!(stale, token);
    assert!(rig.ctl.flush_seek(stale).is_empty());
    assert!(rig.cmds().is_empty());
    assert!(!rig.ctl.flush_seek(token).is_empty());
}

#[test]
fn test_direct_play_hints_bitrate_and_seeks_on_first_playing() {
    let mut rig = Rig::new();
    rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 900_000)));
    let id = decision_id(&rig.ctl.choose_resume(true));
    rig.ctl.on_decision(id, Ok(direct()));
    assert_eq!(rig.ctl.phase(), &SessionPhase::Streaming(StreamMode::Direct));
    assert_eq!(
        rig.cmds(),
        vec![Cmd::Play {
            url: "http://srv/file.mkv".into(),
            direct: true,
            hint: 8000
        }]
    );
    rig.clear();

    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Buffering));
    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Playing));
    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Paused));
    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Playing));
    assert_eq!(rig.cmds(), vec![Cmd::Seek(900_000)], "resume seek fires once");
}

#[test]
fn test_adaptive_play_has_no_hint_or_resume_seek() {
    let mut rig = Rig::new();
    rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 900_000)).with_quality(2000, None));
    let fx = rig.ctl.choose_resume(true);
    assert!(matches!(&fx[..], [Effect::FetchDecision { query, .. }] if query.force_transcode));
    rig.ctl.on_decision(decision_id(&fx), Ok(adaptive("s1")));
    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Playing));
    assert!(matches!(rig.cmds()[..], [Cmd::Play { direct: false, hint: 0, .. }]));
}

#[test]
fn test_adaptive_seeks_coalesce_into_one_restart() {
    let mut rig = adaptive_rig(3_600_000, 60_000);
    rig.ctl.on_engine_event(EngineEvent::Progress {
        position_ms: 5_000,
        duration_ms: 0,
    });

    let first = rig.ctl.seek_forward();
    assert_eq!(first.len(), 1);
    let Effect::ScheduleSeekFlush { token, delay } = first[0] else {
        panic!("expected flush schedule");
    };
    assert_eq!(delay, SEEK_COALESCE);
    assert!(rig.ctl.seek_forward().is_empty());
    assert!(rig.ctl.seek_forward().is_empty());
    assert!(rig.cmds().is_empty(), "no engine seek in adaptive mode");

    let fx = rig.ctl.flush_seek(token);
    assert_eq!(decision_offset(&fx), 95_000);
    assert_eq!(rig.cmds(), vec![Cmd::Stop]);
    assert_eq!(rig.ctl.status_label(), "Seeking...");

    // a second flush for the same burst is a no-op
    assert!(rig.ctl.flush_seek(token).is_empty());
}

#[test]
fn test_adaptive_seek_clamps_to_bounds() {
    let mut rig = adaptive_rig(3_600_000, 3_590_000);
    rig.ctl.on_engine_event(EngineEvent::Progress {
        position_ms: 5_000,
        duration_ms: 10_000,
    });
    rig.ctl.seek_by(30_000);
    assert_eq!(decision_offset(&rig.ctl.flush_seek(1)), 3_599_000);

    let mut rig = adaptive_rig(3_600_000, 5_000);
    rig.ctl.seek_by(-30_000);
    assert_eq!(decision_offset(&rig.ctl.flush_seek(1)), 0);
}

#[test]
fn test_zero_net_seek_does_nothing() {
    let mut rig = adaptive_rig(3_600_000, 60_000);
    rig.ctl.seek_forward();
    rig.ctl.seek_backward();
    assert!(rig.ctl.flush_seek(1).is_empty());
    assert!(rig.cmds().is_empty());
}

#[test]
fn test_restart_failure_reports_seek_failed() {
    let mut rig = adaptive_rig(3_600_000, 0);
    rig.ctl.seek_forward();
    let id = decision_id(&rig.ctl.flush_seek(1));
    let fx = rig.ctl.on_decision(id, Err(CatalogError::Status(500)));
    assert_eq!(
        fx,
        vec![Effect::ShowError("Seek failed: server returned status 500".into())]
    );
    assert!(matches!(rig.ctl.phase(), SessionPhase::Failed(_)));
}

#[test]
fn test_direct_seek_goes_to_engine() {
    let mut rig = Rig::new();
    let id = decision_id(&rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0))));
    rig.ctl.on_decision(id, Ok(direct()));
    rig.clear();
    assert!(rig.ctl.seek_forward().is_empty());
    assert!(rig.ctl.seek_backward().is_empty());
    assert_eq!(rig.cmds(), vec![Cmd::SeekRelative(10_000), Cmd::SeekRelative(-10_000)]);
}

#[test]
fn test_seek_while_mode_unknown_is_dropped() {
    let mut rig = Rig::new();
    rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0)));
    assert!(rig.ctl.seek_forward().is_empty());
    assert!(rig.cmds().is_empty());
}

#[test]
fn test_reported_position_adds_offset_only_in_adaptive() {
    let mut rig = adaptive_rig(3_600_000, 600_000);
    rig.ctl.on_engine_event(EngineEvent::Progress {
        position_ms: 12_000,
        duration_ms: 0,
    });
    let fx = rig.ctl.timeline_tick();
    let r = reports(&fx);
    assert_eq!(r.len(), 1);
    assert_eq!(r[0].position_ms, 612_000);
    assert_eq!(r[0].state, TimelineState::Playing);
    assert_eq!(r[0].duration_ms, 3_600_000);
    assert_eq!(r[0].session_id, "s1");

    let mut rig = Rig::new();
    let id = decision_id(&rig.ctl.start(PlaybackRequest::new(item(2, 0, 0))));
    rig.ctl.on_decision(id, Ok(direct()));
    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Paused));
    rig.ctl.on_engine_event(EngineEvent::Progress {
        position_ms: 12_000,
        duration_ms: 1_000_000,
    });
    let fx = rig.ctl.timeline_tick();
    let r = reports(&fx);
    assert_eq!(r[0].position_ms, 12_000);
    assert_eq!(r[0].state, TimelineState::Paused);
    assert_eq!(r[0].duration_ms, 1_000_000, "engine duration when the item has none");
    assert_eq!(rig.ctl.time_label(), "00:12 / 16:40");
}

#[test]
fn test_no_timeline_report_before_streaming() {
    let mut rig = Rig::new();
    rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0)));
    assert!(rig.ctl.timeline_tick().is_empty());
}

#[test]
fn test_osd_hides_after_idle_ticks_while_playing() {
    let mut rig = adaptive_rig(3_600_000, 0);
    for _ in 0..4 {
        assert!(!rig.ctl.osd_tick());
    }
    assert!(rig.ctl.osd_tick());
    assert!(!rig.ctl.osd().visible());

    rig.ctl.touch();
    assert!(rig.ctl.osd().visible());
    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Paused));
    for _ in 0..10 {
        rig.ctl.osd_tick();
    }
    assert!(rig.ctl.osd().visible());
}

#[test]
fn test_teardown_emits_single_stopped_report() {
    let mut rig = adaptive_rig(3_600_000, 600_000);
    rig.ctl.on_engine_event(EngineEvent::Progress {
        position_ms: 30_000,
        duration_ms: 0,
    });
    let fx = rig.ctl.close();
    assert_eq!(fx.first(), Some(&Effect::CancelTimers));
    assert_eq!(fx.last(), Some(&Effect::Exit));
    let r = reports(&fx);
    assert_eq!(r.len(), 1);
    assert_eq!(r[0].state, TimelineState::Stopped);
    assert_eq!(r[0].position_ms, 630_000);
    assert_eq!(rig.cmds(), vec![Cmd::Stop]);

    assert_eq!(rig.ctl.close(), vec![Effect::Exit]);
    assert!(rig.ctl.teardown().is_empty());
    assert!(!rig.ctl.osd_tick());
    assert!(rig.ctl.timeline_tick().is_empty());
    assert!(!rig.host.is_leased(), "lease is returned on teardown");
}

#[test]
fn test_late_responses_after_teardown_are_ignored() {
    let mut rig = Rig::new();
    let id = decision_id(&rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0))));
    rig.ctl.teardown();
    rig.clear();
    assert!(rig.ctl.on_decision(id, Ok(direct())).is_empty());
    assert!(rig.cmds().is_empty());
    assert!(rig.ctl.on_engine_event(EngineEvent::Error("boom".into())).is_empty());
}

#[test]
fn test_second_controller_cannot_lease_engine() {
    let rig = Rig::new();
    assert!(rig.host.acquire().is_err());
}

#[test]
fn test_engine_error_and_acknowledge() {
    let mut rig = adaptive_rig(3_600_000, 0);
    let fx = rig.ctl.on_engine_event(EngineEvent::Error("loading failed".into()));
    assert_eq!(fx, vec![Effect::ShowError("Playback Error: loading failed".into())]);
    let fx = rig.ctl.acknowledge_error();
    assert_eq!(fx.last(), Some(&Effect::Exit));
}

#[test]
fn test_start_failures() {
    let mut rig = Rig::new();
    let id = decision_id(&rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0))));
    let fx = rig.ctl.on_decision(id, Err(CatalogError::NoServer));
    assert_eq!(fx, vec![Effect::ShowError("Transcode failed: no server selected".into())]);

    let mut rig = Rig::new();
    let id = decision_id(&rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0))));
    let fx = rig.ctl.on_decision(
        id,
        Ok(PlaybackInfo {
            playback_url: String::new(),
            ..direct()
        }),
    );
    assert_eq!(fx, vec![Effect::ShowError("Could not determine playback URL".into())]);
}

#[test]
fn test_autoplay_next_episode_uses_its_view_offset() {
    let mut rig = Rig::new();
    let id = decision_id(&rig.ctl.start(PlaybackRequest::new(episode(10, 99, 3))));
    rig.ctl.on_decision(id, Ok(direct()));

    // a stop-induced end is not the end of the episode
    assert!(rig.ctl.on_engine_event(EngineEvent::EndOfFile { reached_eof: false }).is_empty());

    let fx = rig.ctl.on_engine_event(EngineEvent::EndOfFile { reached_eof: true });
    let (cid, parent) = match &fx[..] {
        [Effect::FetchChildren { id, parent }] => (*id, *parent),
        other => panic!("unexpected effects {:?}", other),
    };
    assert_eq!(parent, RatingKey(99));

    let mut next = episode(11, 99, 4);
    next.title = "The Next One".into();
    next.view_offset = 120_000;
    let fx = rig.ctl.on_children(cid, Ok(vec![episode(9, 99, 2), next, episode(12, 99, 5)]));
    assert_eq!(fx[0], Effect::Notify("Playing next: The Next One".into()));
    assert_eq!(decision_offset(&fx), 120_000);
    assert_eq!(rig.ctl.item().unwrap().rating_key, RatingKey(11));
}

#[test]
fn test_autoplay_without_next_episode_exits() {
    let mut rig = Rig::new();
    let id = decision_id(&rig.ctl.start(PlaybackRequest::new(episode(10, 99, 3))));
    rig.ctl.on_decision(id, Ok(direct()));
    let fx = rig.ctl.on_engine_event(EngineEvent::EndOfFile { reached_eof: true });
    let Effect::FetchChildren { id: cid, .. } = fx[0] else {
        panic!("expected children fetch");
    };
    let fx = rig.ctl.on_children(cid, Ok(vec![episode(9, 99, 2)]));
    assert_eq!(fx[0], Effect::Notify("No more episodes".into()));
    assert_eq!(fx.last(), Some(&Effect::Exit));
}

#[test]
fn test_movie_end_or_autoplay_off_exits() {
    let mut rig = Rig::new();
    let id = decision_id(&rig.ctl.start(PlaybackRequest::new(item(1, 3_600_000, 0))));
    rig.ctl.on_decision(id, Ok(direct()));
    let fx = rig.ctl.on_engine_event(EngineEvent::EndOfFile { reached_eof: true });
    assert_eq!(fx.last(), Some(&Effect::Exit));

    let mut rig = Rig::with_config(ControllerConfig {
        autoplay_next: false,
        ..ControllerConfig::default()
    });
    let id = decision_id(&rig.ctl.start(PlaybackRequest::new(episode(10, 99, 3))));
    rig.ctl.on_decision(id, Ok(direct()));
    let fx = rig.ctl.on_engine_event(EngineEvent::EndOfFile { reached_eof: true });
    assert!(!fx.iter().any(|e| matches!(e, Effect::FetchChildren { .. })));
    assert_eq!(fx.last(), Some(&Effect::Exit));
}

#[test]
fn test_track_controls() {
    let mut rig = adaptive_rig(3_600_000, 0);
    assert_eq!(rig.ctl.cycle_audio(), vec![Effect::Notify("Audio track cycled".into())]);
    assert_eq!(rig.ctl.cycle_subtitles(), vec![Effect::Notify("Subtitles cycled".into())]);
    rig.ctl.set_track(TrackKind::Subtitle, None);
    rig.ctl.toggle_stats();
    assert!(rig.ctl.stats_visible());
    rig.ctl.toggle_pause();
    assert_eq!(
        rig.cmds(),
        vec![
            Cmd::Cycle(TrackKind::Audio),
            Cmd::Cycle(TrackKind::Subtitle),
            Cmd::SetTrack(TrackKind::Subtitle, None),
            Cmd::Stats,
            Cmd::Pause,
        ]
    );
    rig.ctl.on_engine_event(EngineEvent::StateChanged(EngineState::Paused));
    rig.clear();
    rig.ctl.toggle_pause();
    assert_eq!(rig.cmds(), vec![Cmd::Resume]);
}
