use marquee_proto::model::{format_clock, DecisionQuery, MediaItem, TimelineReport, TimelineState};
use std::time::Duration;

use crate::engine::EngineState;

/// What the user asked to watch, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub item: MediaItem,
    /// kbps; 0 keeps the original quality.
    pub max_bitrate: u32,
    pub resolution: Option<String>,
    pub media_index: usize,
    pub force_transcode: bool,
}

impl PlaybackRequest {
    pub fn new(item: MediaItem) -> Self {
        Self {
            item,
            max_bitrate: 0,
            resolution: None,
            media_index: 0,
            force_transcode: false,
        }
    }

    pub fn with_quality(mut self, max_bitrate: u32, resolution: Option<String>) -> Self {
        self.max_bitrate = max_bitrate;
        self.resolution = resolution;
        self
    }

    /// Any bitrate cap implies a transcode.
    pub fn forces_transcode(&self) -> bool {
        self.force_transcode || self.max_bitrate > 0
    }

    /// Source bitrate to hint the engine with for a direct file.
    pub fn source_bitrate(&self) -> u32 {
        self.item
            .media_version(self.media_index)
            .map_or(0, |m| m.bitrate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Original file; seeks go straight to the engine.
    Direct,
    /// Server transcode; positions are relative to `start_offset_ms` and a
    /// seek restarts the stream.
    Adaptive,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    AwaitingResume,
    Negotiating,
    Streaming(StreamMode),
    Ended,
    Failed(String),
}

/// Identity stamped on every async request the controller issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePrompt {
    pub offset_ms: u64,
    pub resume_label: String,
    pub restart_label: String,
}

impl ResumePrompt {
    pub fn for_offset(offset_ms: u64) -> Self {
        Self {
            offset_ms,
            resume_label: format!("Resume from {}", format_clock(offset_ms)),
            restart_label: "Start from beginning".to_string(),
        }
    }
}

/// Work the controller needs done outside its own synchronous state.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    PromptResume(ResumePrompt),
    FetchDecision { id: RequestId, query: DecisionQuery },
    FetchChildren { id: RequestId, parent: marquee_proto::model::RatingKey },
    /// Best effort; failures are only logged.
    ReportTimeline { id: RequestId, report: TimelineReport },
    /// Call `flush_seek(token)` after `delay`.
    ScheduleSeekFlush { token: u64, delay: Duration },
    /// Stop the OSD and timeline ticks and drop any scheduled seek flush.
    CancelTimers,
    Notify(String),
    ShowError(String),
    /// Leave the player view.
    Exit,
}

/// Per-attempt playback data.  Replaced in place when autoplay moves on.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub request: PlaybackRequest,
    pub start_offset_ms: u64,
    pub mode: Option<StreamMode>,
    pub session_id: String,
    /// As reported by the engine (relative in adaptive mode).
    pub engine_position_ms: u64,
    pub engine_duration_ms: u64,
    /// Last absolute position shown or reported.
    pub last_position_ms: u64,
    /// Absolute offset to seek to once a direct file starts playing.
    pub pending_resume_seek: Option<u64>,
    pub restarting: bool,
}

impl PlaybackSession {
    pub fn new(request: PlaybackRequest) -> Self {
        Self {
            request,
            start_offset_ms: 0,
            mode: None,
            session_id: String::new(),
            engine_position_ms: 0,
            engine_duration_ms: 0,
            last_position_ms: 0,
            pending_resume_seek: None,
            restarting: false,
        }
    }

    pub fn item(&self) -> &MediaItem {
        &self.request.item
    }

    /// Engine position mapped onto the item's own timeline.
    pub fn absolute_position(&self) -> u64 {
        match self.mode {
            Some(StreamMode::Adaptive) => self.start_offset_ms + self.engine_position_ms,
            _ => self.engine_position_ms,
        }
    }

    /// Item duration, falling back to what the engine reports.
    pub fn total_duration(&self) -> u64 {
        if self.request.item.duration > 0 {
            self.request.item.duration
        } else {
            self.engine_duration_ms
        }
    }

    pub fn decision_query(&self) -> DecisionQuery {
        DecisionQuery {
            rating_key: self.request.item.rating_key,
            max_bitrate: self.request.max_bitrate,
            resolution: self.request.resolution.clone(),
            force_transcode: self.request.forces_transcode(),
            offset_ms: self.start_offset_ms,
            media_index: self.request.media_index,
        }
    }

    pub fn report(&self, state: TimelineState, position_ms: u64) -> TimelineReport {
        TimelineReport {
            rating_key: self.request.item.rating_key,
            position_ms,
            state,
            duration_ms: self.total_duration(),
            session_id: self.session_id.clone(),
        }
    }
}

pub fn timeline_state(state: EngineState) -> TimelineState {
    match state {
        EngineState::Playing => TimelineState::Playing,
        EngineState::Paused => TimelineState::Paused,
        EngineState::Buffering => TimelineState::Buffering,
        EngineState::Stopped => TimelineState::Stopped,
    }
}

/// New absolute offset for an adaptive restart: never negative, and one
/// second short of the end when the jump overshoots a known duration.
pub fn clamp_seek_target(start_offset_ms: u64, position_ms: u64, delta_ms: i64, duration_ms: u64) -> u64 {
    let target = start_offset_ms as i64 + position_ms as i64 + delta_ms;
    let target = target.max(0) as u64;
    if duration_ms > 0 && target > duration_ms {
        duration_ms.saturating_sub(1000)
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resume_prompt_labels() {
        let prompt = ResumePrompt::for_offset(1_800_000);
        assert_eq!(prompt.resume_label, "Resume from 30:00");
        assert_eq!(prompt.restart_label, "Start from beginning");
    }

    #[test]
    fn test_clamp_seek_target() {
        assert_eq!(clamp_seek_target(60_000, 5_000, 30_000, 3_600_000), 95_000);
        assert_eq!(clamp_seek_target(5_000, 1_000, -30_000, 3_600_000), 0);
        assert_eq!(clamp_seek_target(3_590_000, 5_000, 30_000, 3_600_000), 3_599_000);
        // unknown duration: no upper clamp
        assert_eq!(clamp_seek_target(3_590_000, 5_000, 30_000, 0), 3_625_000);
    }

    #[test]
    fn test_bitrate_implies_transcode() {
        let request = PlaybackRequest::new(MediaItem::default()).with_quality(4000, None);
        assert!(request.forces_transcode());
        assert!(!PlaybackRequest::new(MediaItem::default()).forces_transcode());
    }

    #[test]
    fn test_absolute_position_by_mode() {
        let mut session = PlaybackSession::new(PlaybackRequest::new(MediaItem::default()));
        session.start_offset_ms = 600_000;
        session.engine_position_ms = 12_000;
        session.mode = Some(StreamMode::Direct);
        assert_eq!(session.absolute_position(), 12_000);
        session.mode = Some(StreamMode::Adaptive);
        assert_eq!(session.absolute_position(), 612_000);
    }
}
