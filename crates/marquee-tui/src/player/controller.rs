use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use marquee_proto::catalog::CatalogError;
use marquee_proto::config::PlaybackSettings;
use marquee_proto::model::{format_clock, MediaItem, PlaybackInfo, TimelineState};
use tracing::{debug, error, info, warn};

use super::osd::OsdState;
use super::session::{
    clamp_seek_target, timeline_state, Effect, PlaybackRequest, PlaybackSession, RequestId,
    ResumePrompt, SessionPhase, StreamMode,
};
use crate::engine::{EngineLease, EngineState, MediaEngine, TrackKind};

/// Window in which adaptive seek presses are folded into one restart.
pub const SEEK_COALESCE: Duration = Duration::from_millis(500);
pub const OSD_TICK: Duration = Duration::from_secs(1);
pub const TIMELINE_TICK: Duration = Duration::from_secs(10);

/// Request ids and seek tokens are unique across every controller.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn next_token() -> u64 {
    NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    pub seek_increment_ms: i64,
    pub autoplay_next: bool,
    pub osd_timeout_ticks: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            seek_increment_ms: 10_000,
            autoplay_next: true,
            osd_timeout_ticks: 5,
        }
    }
}

impl From<&PlaybackSettings> for ControllerConfig {
    fn from(p: &PlaybackSettings) -> Self {
        Self {
            seek_increment_ms: i64::from(p.seek_increment_secs) * 1000,
            autoplay_next: p.autoplay_next,
            osd_timeout_ticks: p.osd_timeout_secs,
        }
    }
}

/// Drives one playback attempt from negotiation to teardown.
///
/// Everything here runs on the UI loop.  Engine commands go out directly
/// through the lease; anything asynchronous comes back as [`Effect`]s for
/// the caller to run, and their results are fed back in through
/// `on_decision` / `on_children` tagged with the [`RequestId`] they were
/// issued under.  Responses for any other id are dropped.
pub struct PlaybackController<E: MediaEngine> {
    engine: Option<EngineLease<E>>,
    config: ControllerConfig,
    phase: SessionPhase,
    session: Option<PlaybackSession>,
    engine_state: EngineState,

    pending_decision: Option<RequestId>,
    pending_children: Option<RequestId>,

    seek_delta_ms: i64,
    seek_pending: bool,
    seek_token: u64,

    osd: OsdState,
    stats_visible: bool,
    torn_down: bool,
}

impl<E: MediaEngine> PlaybackController<E> {
    pub fn new(engine: EngineLease<E>, config: ControllerConfig) -> Self {
        let osd = OsdState::new(config.osd_timeout_ticks);
        Self {
            engine: Some(engine),
            config,
            phase: SessionPhase::Idle,
            session: None,
            engine_state: EngineState::Stopped,
            pending_decision: None,
            pending_children: None,
            seek_delta_ms: 0,
            seek_pending: false,
            seek_token: 0,
            osd,
            stats_visible: false,
            torn_down: false,
        }
    }

    // ---- accessors ---------------------------------------------------------

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn item(&self) -> Option<&MediaItem> {
        self.session.as_ref().map(PlaybackSession::item)
    }

    pub fn engine_state(&self) -> EngineState {
        self.engine_state
    }

    pub fn osd(&self) -> &OsdState {
        &self.osd
    }

    pub fn stats_visible(&self) -> bool {
        self.stats_visible
    }

    pub fn title(&self) -> String {
        self.item().map(MediaItem::display_title).unwrap_or_default()
    }

    pub fn status_label(&self) -> &'static str {
        if self.session.as_ref().is_some_and(|s| s.restarting) {
            return "Seeking...";
        }
        if self.phase == SessionPhase::Negotiating {
            return "Loading...";
        }
        match self.engine_state {
            EngineState::Stopped => "Stopped",
            EngineState::Playing => "Playing",
            EngineState::Paused => "Paused",
            EngineState::Buffering => "Buffering...",
        }
    }

    /// (absolute position, total duration) in ms.
    pub fn progress(&self) -> (u64, u64) {
        self.session
            .as_ref()
            .map_or((0, 0), |s| (s.last_position_ms, s.total_duration()))
    }

    pub fn time_label(&self) -> String {
        let (pos, total) = self.progress();
        format!("{} / {}", format_clock(pos), format_clock(total))
    }

    // ---- lifecycle ---------------------------------------------------------

    pub fn start(&mut self, request: PlaybackRequest) -> Vec<Effect> {
        if self.torn_down {
            return Vec::new();
        }
        if !request.item.is_playable() {
            return self.fail("No media available for playback".to_string());
        }
        info!(
            "player: start {} ({}), bitrate={} resolution={:?}",
            request.item.title, request.item.rating_key, request.max_bitrate, request.resolution
        );
        let view_offset = request.item.view_offset;
        self.session = Some(PlaybackSession::new(request));
        if view_offset > 0 {
            self.phase = SessionPhase::AwaitingResume;
            return vec![Effect::PromptResume(ResumePrompt::for_offset(view_offset))];
        }
        self.negotiate()
    }

    /// Answer to the resume prompt.
    pub fn choose_resume(&mut self, resume: bool) -> Vec<Effect> {
        if self.torn_down || self.phase != SessionPhase::AwaitingResume {
            return Vec::new();
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.start_offset_ms = if resume { session.request.item.view_offset } else { 0 };
        session.last_position_ms = session.start_offset_ms;
        self.negotiate()
    }

    fn negotiate(&mut self) -> Vec<Effect> {
        let id = self.next_id();
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let query = session.decision_query();
        debug!(
            "player: decision {:?} for {} at {}ms (transcode={})",
            id, query.rating_key, query.offset_ms, query.force_transcode
        );
        self.pending_decision = Some(id);
        self.phase = SessionPhase::Negotiating;
        vec![Effect::FetchDecision { id, query }]
    }

    pub fn on_decision(&mut self, id: RequestId, result: Result<PlaybackInfo, CatalogError>) -> Vec<Effect> {
        if self.torn_down || self.pending_decision != Some(id) {
            debug!("player: dropping stale decision {:?}", id);
            return Vec::new();
        }
        self.pending_decision = None;
        let restarting = self.session.as_ref().is_some_and(|s| s.restarting);

        let info = match result {
            Ok(info) => info,
            Err(e) => {
                let msg = if restarting {
                    format!("Seek failed: {}", e)
                } else {
                    format!("Transcode failed: {}", e)
                };
                return self.fail(msg);
            }
        };
        if info.playback_url.is_empty() {
            return self.fail("Could not determine playback URL".to_string());
        }

        let mode = if info.is_direct() { StreamMode::Direct } else { StreamMode::Adaptive };
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        session.mode = Some(mode);
        session.session_id = info.session_id;
        session.restarting = false;
        session.engine_position_ms = 0;
        session.pending_resume_seek =
            (mode == StreamMode::Direct && session.start_offset_ms > 0).then_some(session.start_offset_ms);
        let hint = match mode {
            StreamMode::Direct => session.request.source_bitrate(),
            StreamMode::Adaptive => 0,
        };
        info!(
            "player: {:?} stream (direct={} transcode={})",
            mode, info.direct_play_decision, info.transcode_decision
        );

        if let Some(engine) = self.engine.as_deref_mut() {
            engine.play(&info.playback_url, mode == StreamMode::Direct, hint);
        }
        self.phase = SessionPhase::Streaming(mode);
        self.osd.show();
        Vec::new()
    }

    pub fn on_engine_event(&mut self, event: crate::engine::EngineEvent) -> Vec<Effect> {
        use crate::engine::EngineEvent;

        if self.torn_down {
            return Vec::new();
        }
        match event {
            EngineEvent::StateChanged(state) => {
                self.engine_state = state;
                if state == EngineState::Playing {
                    let offset = self.session.as_mut().and_then(|s| s.pending_resume_seek.take());
                    if let (Some(offset), Some(engine)) = (offset, self.engine.as_deref_mut()) {
                        debug!("player: resume seek to {}ms", offset);
                        engine.seek(offset);
                    }
                } else {
                    self.osd.show();
                }
                Vec::new()
            }
            EngineEvent::Progress { position_ms, duration_ms } => {
                if let Some(session) = self.session.as_mut().filter(|s| s.mode.is_some() && !s.restarting) {
                    session.engine_position_ms = position_ms;
                    session.engine_duration_ms = duration_ms;
                    session.last_position_ms = session.absolute_position();
                }
                Vec::new()
            }
            EngineEvent::Error(msg) => {
                if matches!(self.phase, SessionPhase::Failed(_)) {
                    return Vec::new();
                }
                self.fail(format!("Playback Error: {}", msg))
            }
            EngineEvent::EndOfFile { reached_eof } => {
                if !reached_eof || !matches!(self.phase, SessionPhase::Streaming(_)) {
                    return Vec::new();
                }
                self.on_finished()
            }
        }
    }

    fn on_finished(&mut self) -> Vec<Effect> {
        self.phase = SessionPhase::Ended;
        let Some(item) = self.item() else {
            return self.close();
        };
        if !self.config.autoplay_next || !item.is_episode() || !item.parent_rating_key.is_set() {
            return self.close();
        }
        let parent = item.parent_rating_key;
        let id = self.next_id();
        self.pending_children = Some(id);
        vec![Effect::FetchChildren { id, parent }]
    }

    pub fn on_children(&mut self, id: RequestId, result: Result<Vec<MediaItem>, CatalogError>) -> Vec<Effect> {
        if self.torn_down || self.pending_children != Some(id) {
            debug!("player: dropping stale children {:?}", id);
            return Vec::new();
        }
        self.pending_children = None;

        let children = match result {
            Ok(children) => children,
            Err(e) => {
                error!("player: failed to load next episode: {}", e);
                return self.close();
            }
        };
        let Some(session) = self.session.as_ref() else {
            return self.close();
        };
        let wanted = session.item().index + 1;
        let next = children.into_iter().find(|c| c.index == wanted && c.is_playable());
        let Some(next) = next else {
            let mut effects = vec![Effect::Notify("No more episodes".to_string())];
            effects.extend(self.close());
            return effects;
        };

        let title = next.display_title();
        info!("player: autoplay {} ({})", title, next.rating_key);
        let mut request = session.request.clone();
        request.item = next;
        request.media_index = 0;
        let view_offset = request.item.view_offset;
        let mut fresh = PlaybackSession::new(request);
        fresh.start_offset_ms = view_offset;
        fresh.last_position_ms = view_offset;
        self.session = Some(fresh);
        self.engine_state = EngineState::Stopped;

        let mut effects = vec![Effect::Notify(format!("Playing next: {}", title))];
        effects.extend(self.negotiate());
        effects
    }

    // ---- transport ---------------------------------------------------------

    pub fn toggle_pause(&mut self) {
        if self.torn_down {
            return;
        }
        if let Some(engine) = self.engine.as_deref_mut() {
            match self.engine_state {
                EngineState::Playing => engine.pause(),
                EngineState::Paused => engine.resume(),
                _ => {}
            }
        }
        self.osd.show();
    }

    pub fn seek_forward(&mut self) -> Vec<Effect> {
        self.seek_by(self.config.seek_increment_ms)
    }

    pub fn seek_backward(&mut self) -> Vec<Effect> {
        self.seek_by(-self.config.seek_increment_ms)
    }

    /// Direct streams seek in place; adaptive ones accumulate until the
    /// flush scheduled by the first press of a burst.
    pub fn seek_by(&mut self, delta_ms: i64) -> Vec<Effect> {
        if self.torn_down || !matches!(self.phase, SessionPhase::Streaming(_) | SessionPhase::Negotiating) {
            return Vec::new();
        }
        self.osd.show();
        match self.session.as_ref().and_then(|s| s.mode) {
            None => {
                debug!("player: seek dropped, stream mode not known yet");
                Vec::new()
            }
            Some(StreamMode::Direct) => {
                if let Some(engine) = self.engine.as_deref_mut() {
                    engine.seek_relative(delta_ms);
                }
                Vec::new()
            }
            Some(StreamMode::Adaptive) => {
                self.seek_delta_ms += delta_ms;
                if self.seek_pending {
                    return Vec::new();
                }
                self.seek_pending = true;
                self.seek_token = next_token();
                vec![Effect::ScheduleSeekFlush {
                    token: self.seek_token,
                    delay: SEEK_COALESCE,
                }]
            }
        }
    }

    /// Restart the adaptive stream at the accumulated offset.
    pub fn flush_seek(&mut self, token: u64) -> Vec<Effect> {
        if self.torn_down || !self.seek_pending || token != self.seek_token {
            return Vec::new();
        }
        self.seek_pending = false;
        let delta = std::mem::take(&mut self.seek_delta_ms);
        if delta == 0 {
            return Vec::new();
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let target = clamp_seek_target(
            session.start_offset_ms,
            session.engine_position_ms,
            delta,
            session.request.item.duration,
        );
        debug!("player: adaptive seek {:+}ms -> {}ms", delta, target);
        session.start_offset_ms = target;
        session.engine_position_ms = 0;
        session.last_position_ms = target;
        session.restarting = true;

        if let Some(engine) = self.engine.as_deref_mut() {
            engine.stop();
        }
        self.osd.show();
        self.negotiate()
    }

    pub fn cycle_audio(&mut self) -> Vec<Effect> {
        self.cycle(TrackKind::Audio, "Audio track cycled")
    }

    pub fn cycle_subtitles(&mut self) -> Vec<Effect> {
        self.cycle(TrackKind::Subtitle, "Subtitles cycled")
    }

    fn cycle(&mut self, kind: TrackKind, note: &str) -> Vec<Effect> {
        if self.torn_down {
            return Vec::new();
        }
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.cycle_track(kind);
        }
        self.osd.show();
        vec![Effect::Notify(note.to_string())]
    }

    pub fn set_track(&mut self, kind: TrackKind, id: Option<u64>) {
        if self.torn_down {
            return;
        }
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.set_track(kind, id);
        }
    }

    pub fn toggle_osd(&mut self) {
        if !self.torn_down {
            self.osd.toggle();
        }
    }

    pub fn toggle_stats(&mut self) {
        if self.torn_down {
            return;
        }
        self.stats_visible = !self.stats_visible;
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.toggle_stats();
        }
        self.osd.show();
    }

    /// Any key press while the player is up.
    pub fn touch(&mut self) {
        if !self.torn_down {
            self.osd.show();
        }
    }

    // ---- ticks -------------------------------------------------------------

    /// Returns true when the OSD was hidden by this tick.
    pub fn osd_tick(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.osd.tick(self.engine_state == EngineState::Playing)
    }

    pub fn timeline_tick(&mut self) -> Vec<Effect> {
        if self.torn_down || !matches!(self.phase, SessionPhase::Streaming(_)) {
            return Vec::new();
        }
        let id = self.next_id();
        let state = timeline_state(self.engine_state);
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let position = session.absolute_position();
        session.last_position_ms = position;
        vec![Effect::ReportTimeline {
            id,
            report: session.report(state, position),
        }]
    }

    // ---- exit --------------------------------------------------------------

    /// Back out of the player.
    pub fn close(&mut self) -> Vec<Effect> {
        let mut effects = self.teardown();
        effects.push(Effect::Exit);
        effects
    }

    /// Dismissing the error dialog leaves the player.
    pub fn acknowledge_error(&mut self) -> Vec<Effect> {
        self.close()
    }

    /// Stops the engine, releases the lease and emits the final `stopped`
    /// report.  Idempotent; every later call on the controller is a no-op.
    pub fn teardown(&mut self) -> Vec<Effect> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        self.pending_decision = None;
        self.pending_children = None;
        self.seek_pending = false;
        self.seek_delta_ms = 0;

        let mut effects = vec![Effect::CancelTimers];
        if let Some(mut engine) = self.engine.take() {
            engine.stop();
        }
        let id = self.next_id();
        if let Some(session) = self.session.as_ref().filter(|s| s.mode.is_some()) {
            effects.push(Effect::ReportTimeline {
                id,
                report: session.report(TimelineState::Stopped, session.last_position_ms),
            });
        }
        if !matches!(self.phase, SessionPhase::Failed(_)) {
            self.phase = SessionPhase::Ended;
        }
        self.engine_state = EngineState::Stopped;
        effects
    }

    fn fail(&mut self, msg: String) -> Vec<Effect> {
        error!("player: {}", msg);
        self.phase = SessionPhase::Failed(msg.clone());
        self.osd.show();
        vec![Effect::ShowError(msg)]
    }

    fn next_id(&mut self) -> RequestId {
        RequestId(next_token())
    }
}

impl<E: MediaEngine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        if !self.torn_down {
            warn!("player: controller dropped without teardown");
            if let Some(engine) = self.engine.as_deref_mut() {
                engine.stop();
            }
        }
    }
}
