//! Playback session controller.
//!
//! One [`PlaybackController`] per player view.  It owns the engine lease for
//! its lifetime, negotiates the stream with the catalog, maps engine
//! positions onto the item's timeline and reports progress back.

pub mod controller;
pub mod osd;
pub mod session;

pub use controller::{ControllerConfig, PlaybackController, OSD_TICK, SEEK_COALESCE, TIMELINE_TICK};
pub use osd::{media_profile, OsdState};
pub use session::{
    Effect, PlaybackRequest, PlaybackSession, RequestId, ResumePrompt, SessionPhase, StreamMode,
};

#[cfg(test)]
mod tests;
