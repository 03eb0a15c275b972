//! Catalog data model shared by the catalog client, the settings store and the TUI.
//!
//! Field names follow the media server's JSON (camelCase, `Media`/`Part`/`Stream`
//! arrays) so responses deserialize straight into these types.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identity of a catalog item.  The server sends it as a string in most
/// payloads and as a number in a few, so deserialization accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct RatingKey(pub u64);

impl RatingKey {
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for RatingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for RatingKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de_u64_lenient(deserializer).map(RatingKey)
    }
}

/// Accepts `123`, `"123"` and `null` (→ 0).
pub fn de_u64_lenient<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
        Null(()),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
        Raw::Null(()) => Ok(0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Movie,
    Show,
    Season,
    Episode,
    Trailer,
    Clip,
    #[serde(other)]
    Other,
}

/// Kind of an elementary stream inside a media part (server `streamType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    #[default]
    Unknown,
}

impl<'de> Deserialize<'de> for StreamKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match de_u64_lenient(deserializer)? {
            1 => StreamKind::Video,
            2 => StreamKind::Audio,
            3 => StreamKind::Subtitle,
            _ => StreamKind::Unknown,
        })
    }
}

impl Serialize for StreamKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let code = match self {
            StreamKind::Video => 1,
            StreamKind::Audio => 2,
            StreamKind::Subtitle => 3,
            StreamKind::Unknown => 0,
        };
        serializer.serialize_u8(code)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stream {
    pub id: u64,
    pub stream_type: StreamKind,
    pub codec: String,
    pub language: String,
    pub display_title: String,
    pub selected: bool,
    #[serde(rename = "default")]
    pub is_default: bool,
    pub channels: u32,
    pub bitrate: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    pub id: u64,
    pub key: String,
    pub duration: u64,
    pub file: String,
    pub size: u64,
    pub container: String,
    #[serde(rename = "Stream")]
    pub streams: Vec<Stream>,
}

/// One media version of an item (a 4K and a 1080p copy are two `Media`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Media {
    pub id: u64,
    pub duration: u64,
    /// kbps
    pub bitrate: u32,
    pub width: u32,
    pub height: u32,
    pub video_resolution: String,
    pub video_codec: String,
    pub audio_codec: String,
    pub audio_channels: u32,
    pub container: String,
    pub edition_title: String,
    #[serde(rename = "Part")]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaItem {
    pub rating_key: RatingKey,
    pub key: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    pub edition_title: String,
    pub summary: String,
    pub thumb: String,
    pub art: String,
    pub year: u32,
    /// Milliseconds.
    pub duration: u64,
    /// Stored watch position in milliseconds; 0 when unwatched.
    pub view_offset: u64,
    pub view_count: u32,
    pub parent_rating_key: RatingKey,
    pub grandparent_rating_key: RatingKey,
    /// Episode number within its season (or season number within its show).
    pub index: u32,
    pub parent_index: u32,
    pub parent_title: String,
    pub grandparent_title: String,
    pub leaf_count: u32,
    pub viewed_leaf_count: u32,
    #[serde(rename = "Media")]
    pub media: Vec<Media>,
}

impl MediaItem {
    pub fn is_episode(&self) -> bool {
        self.media_type == MediaType::Episode
    }

    /// Title with the edition suffix the player shows in its top bar.
    pub fn display_title(&self) -> String {
        if self.edition_title.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {} Edition", self.title, self.edition_title)
        }
    }

    /// Subtitle line for cards: "S1 · E4" for episodes, the year otherwise.
    pub fn card_subtitle(&self) -> String {
        match self.media_type {
            MediaType::Episode => format!("S{} · E{}", self.parent_index, self.index),
            MediaType::Show | MediaType::Season if self.leaf_count > 0 => {
                format!("{} episodes", self.leaf_count)
            }
            _ if self.year > 0 => self.year.to_string(),
            _ => String::new(),
        }
    }

    /// Media version at `index`, falling back to the first one.
    pub fn media_version(&self, index: usize) -> Option<&Media> {
        self.media.get(index).or_else(|| self.media.first())
    }

    /// True when at least one version has a playable part.
    pub fn is_playable(&self) -> bool {
        self.media.iter().any(|m| !m.parts.is_empty())
    }

    /// Fraction watched in 0.0..=1.0, if the duration is known.
    pub fn watched_fraction(&self) -> Option<f64> {
        (self.duration > 0).then(|| (self.view_offset as f64 / self.duration as f64).clamp(0.0, 1.0))
    }
}

/// A library section (Movies, TV Shows, …).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Library {
    #[serde(deserialize_with = "de_u64_lenient")]
    pub key: u64,
    pub uuid: String,
    #[serde(rename = "type")]
    pub library_type: String,
    pub title: String,
    pub thumb: String,
}

/// A page of library items plus the server-side total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPage {
    pub items: Vec<MediaItem>,
    pub total_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamProtocol {
    /// Original file served byte-for-byte; seekable in place.
    #[default]
    Http,
    /// Server-transcoded segmented stream; seeks restart the session.
    Hls,
}

/// Result of asking the server how an item should be delivered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackInfo {
    pub direct_playable: bool,
    pub playback_url: String,
    pub protocol: StreamProtocol,
    pub session_id: String,
    pub general_decision: String,
    pub direct_play_decision: String,
    pub transcode_decision: String,
}

impl PlaybackInfo {
    pub fn is_direct(&self) -> bool {
        self.protocol == StreamProtocol::Http
    }
}

/// Parameters of one playback-decision request.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionQuery {
    pub rating_key: RatingKey,
    /// kbps; 0 keeps the original quality.
    pub max_bitrate: u32,
    /// e.g. "720p"; `None` keeps the original resolution.
    pub resolution: Option<String>,
    pub force_transcode: bool,
    pub offset_ms: u64,
    pub media_index: usize,
}

/// Coarse playback state reported to the server timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineState {
    Playing,
    Paused,
    Buffering,
    Stopped,
}

impl TimelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineState::Playing => "playing",
            TimelineState::Paused => "paused",
            TimelineState::Buffering => "buffering",
            TimelineState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for TimelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timeline report.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineReport {
    pub rating_key: RatingKey,
    pub position_ms: u64,
    pub state: TimelineState,
    pub duration_ms: u64,
    pub session_id: String,
}

/// Format milliseconds as `h:mm:ss`, or `mm:ss` under an hour.
pub fn format_clock(ms: u64) -> String {
    let total = ms / 1000;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}
