pub mod browse_grid;
pub mod detail;
pub mod header;
pub mod help_overlay;
pub mod player_view;
pub mod section_row;

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::Rect;
use unicode_width::UnicodeWidthChar;

use crate::grid::{Axis, CellFrame, Direction};

/// Screen rect of a live grid cell inside `area`.  Cells that start in the
/// leading prefetch margin are skipped; cells running past the trailing edge
/// are clipped.
pub fn cell_rect(area: Rect, axis: Axis, frame: CellFrame) -> Option<Rect> {
    if frame.main < 0 {
        return None;
    }
    let main = frame.main as u32;
    let (area_main, area_cross) = match axis {
        Axis::Vertical { .. } => (area.height as u32, area.width as u32),
        Axis::Horizontal => (area.width as u32, area.height as u32),
    };
    if main >= area_main || frame.cross >= area_cross {
        return None;
    }
    let main_len = frame.main_extent.min(area_main - main) as u16;
    let cross_len = frame.cross_extent.min(area_cross - frame.cross) as u16;
    let rect = match axis {
        Axis::Vertical { .. } => Rect {
            x: area.x + frame.cross as u16,
            y: area.y + main as u16,
            width: cross_len,
            height: main_len,
        },
        Axis::Horizontal => Rect {
            x: area.x + main as u16,
            y: area.y + frame.cross as u16,
            width: main_len,
            height: cross_len,
        },
    };
    (rect.width > 0 && rect.height > 0).then_some(rect)
}

/// Cut `text` to `width` display columns, ending in `…` when shortened.
pub fn truncate(text: &str, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let total: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Arrow keys and vi keys as grid directions.
pub fn key_direction(key: &KeyEvent) -> Option<Direction> {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(Direction::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(Direction::Down),
        KeyCode::Left | KeyCode::Char('h') => Some(Direction::Left),
        KeyCode::Right | KeyCode::Char('l') => Some(Direction::Right),
        _ => None,
    }
}
