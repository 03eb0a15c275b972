//! DetailPane: one item's summary, media versions and the play entry point.

use marquee_proto::catalog::CatalogError;
use marquee_proto::model::{format_clock, Media, MediaItem, RatingKey};
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};
use tracing::debug;

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::theme::{style_muted, style_secondary, C_ACCENT, C_ERROR, C_PRIMARY, C_SELECTION_BG};
use crate::widgets::pane_chrome::{pane_chrome, Badge};
use crate::widgets::progress_bar::draw_progress;

pub struct DetailPane {
    item: Option<MediaItem>,
    media_index: usize,
    /// Full metadata requested and not yet back.
    loading: bool,
    error: Option<String>,
}

impl DetailPane {
    pub fn new() -> Self {
        Self {
            item: None,
            media_index: 0,
            loading: false,
            error: None,
        }
    }

    pub fn item(&self) -> Option<&MediaItem> {
        self.item.as_ref()
    }

    pub fn media_index(&self) -> usize {
        self.media_index
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Show the browse copy of `item` right away; full metadata follows.
    pub fn open(&mut self, item: MediaItem) {
        self.item = Some(item);
        self.media_index = 0;
        self.loading = true;
        self.error = None;
    }

    /// A refetch of the shown item is on its way.
    pub fn mark_loading(&mut self) {
        if self.item.is_some() {
            self.loading = true;
        }
    }

    /// Replace the shown item with fetched metadata.  Results for an item
    /// no longer shown are dropped.
    pub fn apply_metadata(&mut self, key: RatingKey, result: Result<MediaItem, CatalogError>) {
        if self.item.as_ref().map(|i| i.rating_key) != Some(key) {
            debug!("detail: dropping metadata for {}", key);
            return;
        }
        self.loading = false;
        match result {
            Ok(item) => {
                if self.media_index >= item.media.len() {
                    self.media_index = 0;
                }
                self.item = Some(item);
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    fn versions(&self) -> &[Media] {
        self.item.as_ref().map_or(&[], |i| i.media.as_slice())
    }
}

impl Default for DetailPane {
    fn default() -> Self {
        Self::new()
    }
}

/// "1080" reads as "1080p"; named resolutions such as "4k" or "sd" are upcased.
fn resolution_label(resolution: &str) -> String {
    match resolution.parse::<u32>() {
        Ok(_) => format!("{}p", resolution),
        Err(_) => resolution.to_uppercase(),
    }
}

fn version_label(media: &Media) -> String {
    let mut parts = Vec::new();
    if !media.edition_title.is_empty() {
        parts.push(media.edition_title.clone());
    }
    if !media.video_resolution.is_empty() {
        parts.push(resolution_label(&media.video_resolution));
    }
    if !media.video_codec.is_empty() {
        parts.push(media.video_codec.to_uppercase());
    }
    if !media.audio_codec.is_empty() {
        let channels = if media.audio_channels > 0 {
            format!(" {}ch", media.audio_channels)
        } else {
            String::new()
        };
        parts.push(format!("{}{}", media.audio_codec.to_uppercase(), channels));
    }
    if media.bitrate > 0 {
        parts.push(format!("{} kbps", media.bitrate));
    }
    if parts.is_empty() {
        "Original".to_string()
    } else {
        parts.join(" · ")
    }
}

impl Component for DetailPane {
    fn id(&self) -> ComponentId {
        ComponentId::Detail
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.media_index = self.media_index.saturating_sub(1);
                Vec::new()
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let n = self.versions().len();
                if self.media_index + 1 < n {
                    self.media_index += 1;
                }
                Vec::new()
            }
            KeyCode::Enter | KeyCode::Char('p') => match &self.item {
                Some(item) if item.is_playable() => vec![Action::Play {
                    item: item.clone(),
                    media_index: self.media_index,
                }],
                _ => Vec::new(),
            },
            KeyCode::Esc | KeyCode::Backspace => vec![Action::Back],
            _ => Vec::new(),
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, _state: &AppState) {
        let badge = self.loading.then_some(Badge {
            text: "loading",
            color: C_ACCENT,
        });
        let block = pane_chrome("Details", None, focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        let Some(item) = &self.item else {
            frame.render_widget(Paragraph::new("Nothing selected").style(style_muted()), inner);
            return;
        };

        let versions = item.media.len().max(1) as u16;
        let [head, progress, summary, list] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(2),
            Constraint::Length(versions + 1),
        ])
        .areas(inner);

        let mut meta = Vec::new();
        if item.year > 0 {
            meta.push(item.year.to_string());
        }
        if item.duration > 0 {
            meta.push(format_clock(item.duration));
        }
        let sub = item.card_subtitle();
        if !sub.is_empty() {
            meta.push(sub);
        }
        let head_lines = vec![
            Line::from(Span::styled(
                item.display_title(),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(meta.join("  ·  "), style_secondary())),
            match &self.error {
                Some(e) => Line::from(Span::styled(
                    format!("Could not load details: {}", e),
                    Style::default().fg(C_ERROR),
                )),
                None => Line::default(),
            },
        ];
        frame.render_widget(Paragraph::new(head_lines), head);

        if item.view_offset > 0 && item.duration > 0 {
            draw_progress(frame, progress, item.view_offset, item.duration);
        }

        frame.render_widget(
            Paragraph::new(item.summary.as_str())
                .style(style_secondary())
                .wrap(Wrap { trim: true }),
            summary,
        );

        let mut lines = vec![Line::from(Span::styled("Versions", style_muted()))];
        if item.media.is_empty() {
            lines.push(Line::from(Span::styled("  no playable media", style_muted())));
        }
        for (i, media) in item.media.iter().enumerate() {
            let selected = i == self.media_index;
            let marker = if selected { "▶ " } else { "  " };
            let style = if selected {
                Style::default().fg(C_ACCENT).bg(C_SELECTION_BG)
            } else {
                style_secondary()
            };
            lines.push(Line::from(Span::styled(format!("{}{}", marker, version_label(media)), style)));
        }
        frame.render_widget(Paragraph::new(lines), list);
    }
}
