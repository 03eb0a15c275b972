use marquee_proto::model::Media;

/// On-screen display visibility as a saturating idle counter.
///
/// Ticks arrive once a second.  Input or any non-playing state calls
/// [`OsdState::show`], which also resets the counter; reaching the
/// threshold while playing hides the OSD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsdState {
    visible: bool,
    idle_ticks: u32,
    threshold: u32,
}

impl OsdState {
    pub fn new(threshold: u32) -> Self {
        Self {
            visible: true,
            idle_ticks: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    pub fn show(&mut self) {
        self.visible = true;
        self.idle_ticks = 0;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn toggle(&mut self) {
        if self.visible {
            self.hide();
        } else {
            self.show();
        }
    }

    /// Returns true when this tick hid the OSD.
    pub fn tick(&mut self, playing: bool) -> bool {
        if !self.visible {
            return false;
        }
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.idle_ticks >= self.threshold && playing {
            self.visible = false;
            return true;
        }
        false
    }
}

/// Rows of the stats overlay for a media version.
pub fn media_profile(media: Option<&Media>) -> Vec<(&'static str, String)> {
    let Some(m) = media else {
        return vec![("Media", "unknown".to_string())];
    };
    let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    let mut rows = vec![
        ("Container", or_dash(&m.container)),
        ("Video", or_dash(&m.video_codec)),
        ("Audio", or_dash(&m.audio_codec)),
    ];
    if m.width > 0 && m.height > 0 {
        rows.push(("Resolution", format!("{}x{}", m.width, m.height)));
    } else if !m.video_resolution.is_empty() {
        rows.push(("Resolution", m.video_resolution.clone()));
    }
    if m.bitrate > 0 {
        rows.push(("Bitrate", format!("{} kbps", m.bitrate)));
    }
    if m.audio_channels > 0 {
        rows.push(("Channels", m.audio_channels.to_string()));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hides_after_threshold_only_while_playing() {
        let mut osd = OsdState::new(5);
        for _ in 0..4 {
            assert!(!osd.tick(true));
        }
        assert!(osd.tick(true));
        assert!(!osd.visible());

        osd.show();
        for _ in 0..10 {
            osd.tick(false);
        }
        assert!(osd.visible(), "paused playback keeps the OSD up");
        assert!(osd.tick(true));
    }

    #[test]
    fn test_show_resets_counter() {
        let mut osd = OsdState::new(5);
        osd.tick(true);
        osd.tick(true);
        osd.show();
        assert_eq!(osd.idle_ticks(), 0);
    }

    #[test]
    fn test_hidden_osd_does_not_count() {
        let mut osd = OsdState::new(2);
        osd.toggle();
        assert!(!osd.visible());
        assert!(!osd.tick(true));
        assert_eq!(osd.idle_ticks(), 0);
    }

    #[test]
    fn test_profile_rows() {
        let media = Media {
            container: "mkv".into(),
            video_codec: "hevc".into(),
            width: 3840,
            height: 2160,
            bitrate: 24000,
            ..Default::default()
        };
        let rows = media_profile(Some(&media));
        assert!(rows.contains(&("Resolution", "3840x2160".to_string())));
        assert!(rows.contains(&("Bitrate", "24000 kbps".to_string())));
        assert!(rows.contains(&("Audio", "-".to_string())));
        assert_eq!(media_profile(None).len(), 1);
    }
}
