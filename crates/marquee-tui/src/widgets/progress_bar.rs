//! Smooth Unicode progress bar widget.

use marquee_proto::model::format_clock;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::{C_ACCENT, C_MUTED, C_SECONDARY};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Fraction in 0.0..=1.0; 0 when the total is unknown.
pub fn fraction(position_ms: u64, total_ms: u64) -> f64 {
    if total_ms == 0 {
        return 0.0;
    }
    (position_ms as f64 / total_ms as f64).clamp(0.0, 1.0)
}

/// Bar glyphs for `progress` over `width` cells, eighth-cell resolution.
pub fn bar_glyphs(progress: f64, width: usize) -> String {
    let eighths = (progress.clamp(0.0, 1.0) * width as f64 * 8.0) as usize;
    let full = eighths / 8;
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width * 3);
    for _ in 0..full.min(width) {
        bar.push('█');
    }
    if full < width {
        bar.push(BLOCKS[partial]);
        for _ in (full + 1)..width {
            bar.push(' ');
        }
    }
    bar
}

/// Position bar with `mm:ss` labels on both sides.
pub fn draw_progress(frame: &mut Frame, area: Rect, position_ms: u64, total_ms: u64) {
    if area.width < 4 || area.height == 0 {
        return;
    }

    let left = format_clock(position_ms);
    let right = if total_ms > 0 { format_clock(total_ms) } else { String::new() };
    let label_w = (left.len() + right.len() + 2) as u16;
    let bar_w = area.width.saturating_sub(label_w).max(4) as usize;

    let spans = vec![
        Span::styled(format!("{} ", left), Style::default().fg(C_SECONDARY)),
        Span::styled(bar_glyphs(fraction(position_ms, total_ms), bar_w), Style::default().fg(C_ACCENT)),
        Span::styled(format!(" {}", right), Style::default().fg(C_MUTED)),
    ];
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        assert_eq!(fraction(30, 0), 0.0);
        assert_eq!(fraction(50, 100), 0.5);
        assert_eq!(fraction(150, 100), 1.0);
    }

    #[test]
    fn test_bar_width_is_stable() {
        for p in [0.0, 0.13, 0.5, 0.99, 1.0] {
            assert_eq!(bar_glyphs(p, 10).chars().count(), 10);
        }
        assert_eq!(bar_glyphs(1.0, 4), "████");
        assert_eq!(bar_glyphs(0.5, 4), "██  ");
    }
}
