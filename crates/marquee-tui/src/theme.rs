//! Color palette and style constants for the marquee TUI.

use ratatui::style::{Color, Modifier, Style};

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(16, 16, 20);
pub const C_ACCENT: Color = Color::Rgb(229, 160, 13);
pub const C_PLAYING: Color = Color::Rgb(80, 200, 120);
pub const C_BUFFERING: Color = Color::Rgb(255, 184, 80);
pub const C_ERROR: Color = Color::Rgb(255, 80, 80);
pub const C_MUTED: Color = Color::Rgb(72, 72, 88);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_SELECTION_BG: Color = Color::Rgb(36, 32, 24);
pub const C_PANEL_BORDER: Color = Color::Rgb(40, 40, 52);
pub const C_PANEL_BORDER_FOCUSED: Color = Color::Rgb(229, 160, 13);
pub const C_NUMBER_HINT: Color = Color::Rgb(90, 90, 115);
pub const C_CARD_BG: Color = Color::Rgb(26, 26, 34);
pub const C_SKELETON: Color = Color::Rgb(34, 34, 44);
pub const C_WATCHED: Color = Color::Rgb(229, 160, 13);
pub const C_TOAST_INFO: Color = Color::Rgb(80, 160, 220);
pub const C_TOAST_SUCCESS: Color = Color::Rgb(80, 200, 120);
pub const C_TOAST_WARNING: Color = Color::Rgb(255, 184, 80);
pub const C_TOAST_ERROR: Color = Color::Rgb(255, 95, 95);
pub const C_OSD_BG: Color = Color::Rgb(10, 10, 14);

// ── Predefined styles ─────────────────────────────────────────────────────────

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY)
}

pub fn style_muted() -> Style {
    Style::default().fg(C_MUTED)
}

pub fn style_card(focused: bool) -> Style {
    if focused {
        Style::default()
            .bg(C_SELECTION_BG)
            .fg(C_PRIMARY)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(C_CARD_BG).fg(C_PRIMARY)
    }
}

pub fn style_focused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER_FOCUSED)
}

pub fn style_unfocused_border() -> Style {
    Style::default().fg(C_PANEL_BORDER)
}
