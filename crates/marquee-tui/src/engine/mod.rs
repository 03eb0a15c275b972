//! Media engine boundary.
//!
//! The player controller only sees [`MediaEngine`]: fire-and-forget commands
//! going in, [`EngineEvent`]s coming back through an mpsc channel that the UI
//! loop drains.  Nothing engine-side ever touches controller state directly.

pub mod lease;
pub mod mpv;

pub use lease::{EngineBusy, EngineHost, EngineLease};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Stopped,
    Buffering,
    Playing,
    Paused,
}

impl EngineState {
    pub fn label(&self) -> &'static str {
        match self {
            EngineState::Stopped => "Stopped",
            EngineState::Buffering => "Buffering",
            EngineState::Playing => "Playing",
            EngineState::Paused => "Paused",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Subtitle,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    Progress { position_ms: u64, duration_ms: u64 },
    Error(String),
    EndOfFile { reached_eof: bool },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("mpv binary not found (set MPV_PATH or install mpv)")]
    BinaryNotFound,
    #[error("engine already running")]
    AlreadyRunning,
}

/// Commands are asynchronous: the engine reports the resulting state later
/// through [`EngineEvent`]s.
pub trait MediaEngine: Send {
    fn init(&mut self) -> Result<(), EngineError>;
    fn cleanup(&mut self);

    /// `hint_bitrate` is the source bitrate in kbps for direct files, 0 otherwise.
    fn play(&mut self, url: &str, is_direct: bool, hint_bitrate: u32);
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, position_ms: u64);
    fn seek_relative(&mut self, delta_ms: i64);

    /// `None` disables the track kind.
    fn set_track(&mut self, kind: TrackKind, id: Option<u64>);
    fn cycle_track(&mut self, kind: TrackKind);

    fn toggle_stats(&mut self) {}
}
