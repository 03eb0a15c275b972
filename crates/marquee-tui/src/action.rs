//! Action enum: all user-initiated intents and internal events.

use marquee_proto::model::MediaItem;

use crate::engine::TrackKind;
use crate::grid::Direction;

/// Unique identifier for a focusable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Sections,
    Browse,
    Detail,
    Player,
    HelpOverlay,
}

/// Which top-level view is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Detail,
    Player,
}

/// Transport and overlay commands handled by the playback controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    TogglePause,
    SeekForward,
    SeekBackward,
    ToggleOsd,
    ToggleStats,
    CycleAudio,
    CycleSubtitles,
    SetTrack(TrackKind, Option<u64>),
    Resume(bool),
    AcknowledgeError,
    Close,
    /// Any other key while the player is up; keeps the OSD alive.
    Touch,
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone)]
pub enum Action {
    // ── Navigation ───────────────────────────────────────────────────────────
    FocusNext,
    FocusPrev,
    FocusPane(ComponentId),
    /// A directional move left the focused grid.
    FocusEscaped(ComponentId, Direction),
    Back,

    // ── Catalog ──────────────────────────────────────────────────────────────
    OpenSection(usize),
    OpenDetail(MediaItem),
    RequestNextPage,
    Refresh,

    // ── Playback ─────────────────────────────────────────────────────────────
    Play { item: MediaItem, media_index: usize },
    Player(PlayerAction),

    // ── System ───────────────────────────────────────────────────────────────
    ToggleHelp,
    Quit,
    Resize(u16, u16),
    Noop,
}
