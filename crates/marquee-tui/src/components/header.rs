//! Header component: 1-row top bar.
//!
//! Left: app name, server, signed-in user.  Right: current section and its
//! loading state.  Not focusable.

use ratatui::crossterm::event::KeyEvent;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::{
    action::{Action, ComponentId, Screen},
    app_state::AppState,
    component::Component,
    theme::{C_ACCENT, C_BUFFERING, C_ERROR, C_MUTED, C_PRIMARY, C_SECONDARY},
};

pub struct Header;

impl Header {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

fn build_left(state: &AppState) -> Line<'_> {
    let mut spans = vec![
        Span::styled(" ▣ marquee", Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD)),
        Span::styled("  │  ", Style::default().fg(C_MUTED)),
        Span::styled(state.server_name.as_str(), Style::default().fg(C_PRIMARY)),
    ];
    if !state.username.is_empty() {
        spans.push(Span::styled(
            format!("  @{}", state.username),
            Style::default().fg(C_SECONDARY),
        ));
    }
    Line::from(spans)
}

fn build_right(state: &AppState) -> Line<'_> {
    if let Some(err) = &state.sections_error {
        return Line::from(Span::styled(format!("✗ {} ", err), Style::default().fg(C_ERROR)));
    }
    if state.sections_loading {
        return Line::from(Span::styled("loading libraries… ", Style::default().fg(C_BUFFERING)));
    }
    let where_ = match (state.screen, state.section()) {
        (Screen::Player, _) => "now playing".to_string(),
        (_, Some(lib)) => lib.title.clone(),
        (_, None) => format!("{} libraries", state.sections.len()),
    };
    Line::from(Span::styled(format!("{} ", where_), Style::default().fg(C_SECONDARY)))
}

impl Component for Header {
    fn id(&self) -> ComponentId {
        ComponentId::Sections
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        if area.height == 0 {
            return;
        }
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);
        frame.render_widget(Paragraph::new(build_left(state)), left);
        frame.render_widget(
            Paragraph::new(build_right(state)).alignment(Alignment::Right),
            right,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_proto::model::Library;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_right_side_follows_state() {
        let mut st = AppState::new("Den".into(), "ana".into(), 50);
        assert!(text(&build_right(&st)).contains("loading"));

        st.sections_loading = false;
        st.sections = vec![Library {
            key: 1,
            title: "Movies".into(),
            ..Default::default()
        }];
        assert_eq!(text(&build_right(&st)), "1 libraries ");
        st.current_section = Some(0);
        assert_eq!(text(&build_right(&st)), "Movies ");

        st.sections_error = Some("not authorized; sign in again".into());
        assert!(text(&build_right(&st)).starts_with("✗ not authorized"));
        assert!(text(&build_left(&st)).contains("@ana"));
    }
}
