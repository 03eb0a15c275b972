//! PlayerView: full-screen playback surface: OSD, stats and dialogs.
//!
//! The view holds no playback state of its own.  The App copies what it
//! needs out of the controller into a [`PlayerSnapshot`] before each draw;
//! keys turn into [`PlayerAction`]s for the App to route back.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Alignment, Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame,
};

use crate::action::{Action, ComponentId, PlayerAction};
use crate::app_state::AppState;
use crate::component::Component;
use crate::engine::{EngineState, MediaEngine, TrackKind};
use crate::player::{media_profile, PlaybackController, ResumePrompt};
use crate::theme::{
    style_muted, style_secondary, C_ACCENT, C_BUFFERING, C_ERROR, C_OSD_BG, C_PLAYING, C_PRIMARY,
    C_SELECTION_BG,
};
use crate::widgets::progress_bar::draw_progress;

/// Everything the view draws, copied out of the controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSnapshot {
    pub title: String,
    pub status: &'static str,
    pub engine_state: Option<EngineState>,
    pub position_ms: u64,
    pub total_ms: u64,
    pub time_label: String,
    pub osd_visible: bool,
    pub stats: Option<Vec<(&'static str, String)>>,
}

impl PlayerSnapshot {
    pub fn capture<E: MediaEngine>(ctl: &PlaybackController<E>) -> Self {
        let (position_ms, total_ms) = ctl.progress();
        let stats = ctl.stats_visible().then(|| {
            let media = ctl
                .session()
                .and_then(|s| s.item().media_version(s.request.media_index));
            let mut rows = media_profile(media);
            rows.push(("State", ctl.engine_state().label().to_string()));
            rows
        });
        Self {
            title: ctl.title(),
            status: ctl.status_label(),
            engine_state: Some(ctl.engine_state()),
            position_ms,
            total_ms,
            time_label: ctl.time_label(),
            osd_visible: ctl.osd().visible(),
            stats,
        }
    }
}

enum Dialog {
    Resume { prompt: ResumePrompt, resume: bool },
    Error(String),
}

pub struct PlayerView {
    snapshot: PlayerSnapshot,
    dialog: Option<Dialog>,
}

impl PlayerView {
    pub fn new() -> Self {
        Self {
            snapshot: PlayerSnapshot::default(),
            dialog: None,
        }
    }

    pub fn set_snapshot(&mut self, snapshot: PlayerSnapshot) {
        self.snapshot = snapshot;
    }

    pub fn snapshot(&self) -> &PlayerSnapshot {
        &self.snapshot
    }

    pub fn prompt_resume(&mut self, prompt: ResumePrompt) {
        self.dialog = Some(Dialog::Resume { prompt, resume: true });
    }

    pub fn show_error(&mut self, message: String) {
        self.dialog = Some(Dialog::Error(message));
    }

    pub fn has_dialog(&self) -> bool {
        self.dialog.is_some()
    }

    /// Forget dialogs and the last snapshot when the player closes.
    pub fn reset(&mut self) {
        self.dialog = None;
        self.snapshot = PlayerSnapshot::default();
    }

    fn dialog_key(&mut self, key: KeyEvent) -> Option<Vec<Action>> {
        let dialog = self.dialog.as_mut()?;
        let out = match dialog {
            Dialog::Resume { resume, .. } => match key.code {
                KeyCode::Up | KeyCode::Down | KeyCode::Tab | KeyCode::Char('j' | 'k') => {
                    *resume = !*resume;
                    Vec::new()
                }
                KeyCode::Enter => {
                    let choice = *resume;
                    self.dialog = None;
                    vec![Action::Player(PlayerAction::Resume(choice))]
                }
                KeyCode::Esc | KeyCode::Backspace => {
                    self.dialog = None;
                    vec![Action::Player(PlayerAction::Close)]
                }
                _ => Vec::new(),
            },
            Dialog::Error(_) => match key.code {
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => {
                    self.dialog = None;
                    vec![Action::Player(PlayerAction::AcknowledgeError)]
                }
                _ => Vec::new(),
            },
        };
        Some(out)
    }

    fn draw_osd(&self, frame: &mut Frame, area: Rect) {
        let s = &self.snapshot;
        let [top, _, bottom] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!(" {}", s.title),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            )))
            .style(Style::default().bg(C_OSD_BG)),
            top,
        );

        frame.render_widget(Block::default().style(Style::default().bg(C_OSD_BG)), bottom);
        let [status_row, bar_row, _] = Layout::vertical([Constraint::Length(1); 3]).areas(bottom);
        let status_color = match s.engine_state {
            Some(EngineState::Playing) => C_PLAYING,
            Some(EngineState::Buffering) => C_BUFFERING,
            _ => C_ACCENT,
        };
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(format!(" {}", s.status), Style::default().fg(status_color)),
                Span::raw("  "),
                Span::styled(s.time_label.as_str(), style_secondary()),
            ])),
            status_row,
        );
        let bar = Rect {
            x: bar_row.x + 1,
            width: bar_row.width.saturating_sub(2),
            ..bar_row
        };
        draw_progress(frame, bar, s.position_ms, s.total_ms);
    }

    fn draw_stats(&self, frame: &mut Frame, area: Rect, rows: &[(&'static str, String)]) {
        let height = rows.len() as u16 + 2;
        let rect = Rect {
            x: area.x + 1,
            y: area.y + 2,
            width: area.width.min(40).saturating_sub(2),
            height: height.min(area.height.saturating_sub(2)),
        };
        let lines: Vec<Line> = rows
            .iter()
            .map(|(k, v)| {
                Line::from(vec![
                    Span::styled(format!("{:<11}", k), style_muted()),
                    Span::raw(v.as_str()),
                ])
            })
            .collect();
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(style_muted())
                    .title(" Stream "),
            ),
            rect,
        );
    }

    fn draw_dialog(&self, frame: &mut Frame, area: Rect, dialog: &Dialog) {
        let [row] = Layout::vertical([Constraint::Length(6)]).flex(Flex::Center).areas(area);
        let [rect] = Layout::horizontal([Constraint::Length(44)]).flex(Flex::Center).areas(row);
        frame.render_widget(Clear, rect);

        let (title, color, lines) = match dialog {
            Dialog::Resume { prompt, resume } => {
                let option = |label: &str, on: bool| {
                    let style = if on {
                        Style::default().fg(C_ACCENT).bg(C_SELECTION_BG).add_modifier(Modifier::BOLD)
                    } else {
                        style_secondary()
                    };
                    Line::from(Span::styled(format!(" {} {} ", if on { "▶" } else { " " }, label), style))
                };
                (
                    " Resume ",
                    C_ACCENT,
                    vec![
                        Line::default(),
                        option(&prompt.resume_label, *resume),
                        option(&prompt.restart_label, !*resume),
                    ],
                )
            }
            Dialog::Error(message) => (
                " Playback ",
                C_ERROR,
                vec![
                    Line::default(),
                    Line::from(Span::styled(message.as_str(), Style::default().fg(C_ERROR))),
                    Line::from(Span::styled("Enter to close", style_muted())),
                ],
            ),
        };
        frame.render_widget(
            Paragraph::new(lines).alignment(Alignment::Center).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(color))
                    .title(title),
            ),
            rect,
        );
    }
}

impl Default for PlayerView {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for PlayerView {
    fn id(&self) -> ComponentId {
        ComponentId::Player
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        if let Some(out) = self.dialog_key(key) {
            return out;
        }
        let action = match key.code {
            KeyCode::Char(' ') => PlayerAction::TogglePause,
            KeyCode::Right | KeyCode::Char('l') => PlayerAction::SeekForward,
            KeyCode::Left | KeyCode::Char('h') => PlayerAction::SeekBackward,
            KeyCode::Char('a') => PlayerAction::CycleAudio,
            KeyCode::Char('s') => PlayerAction::CycleSubtitles,
            KeyCode::Char('S') => PlayerAction::SetTrack(TrackKind::Subtitle, None),
            KeyCode::Char('o') => PlayerAction::ToggleOsd,
            KeyCode::Char('i') => PlayerAction::ToggleStats,
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => PlayerAction::Close,
            _ => PlayerAction::Touch,
        };
        vec![Action::Player(action)]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, _state: &AppState) {
        frame.render_widget(Block::default().style(Style::default().bg(Color::Black)), area);
        if self.snapshot.osd_visible || self.dialog.is_some() {
            self.draw_osd(frame, area);
        }
        if let Some(rows) = &self.snapshot.stats {
            self.draw_stats(frame, area, rows);
        }
        if let Some(dialog) = &self.dialog {
            self.draw_dialog(frame, area, dialog);
        }
    }
}
