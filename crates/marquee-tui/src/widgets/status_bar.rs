//! Status bar: bottom line with the current screen and its keybindings.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::action::Screen;
use crate::theme::{C_ACCENT, C_MUTED};

pub fn keys_for(screen: Screen) -> &'static str {
    match screen {
        Screen::Home => " ←↑↓→/hjkl move  Enter open  Tab panes  r refresh  ? help  q quit",
        Screen::Detail => " ↑↓ version  Enter play  Esc back  ? help  q quit",
        Screen::Player => {
            " Space pause  ←→ seek  a audio  s subs  S subs off  o OSD  i info  Esc stop"
        }
    }
}

fn label_for(screen: Screen) -> &'static str {
    match screen {
        Screen::Home => "BROWSE",
        Screen::Detail => "DETAIL",
        Screen::Player => "PLAYER",
    }
}

pub fn draw_keys_bar(frame: &mut Frame, area: Rect, screen: Screen) {
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", label_for(screen)),
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(keys_for(screen), Style::default().fg(C_MUTED)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
