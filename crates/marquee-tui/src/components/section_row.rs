//! SectionRow: horizontal recycling list of library sections.

use marquee_proto::model::Library;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::{cell_rect, key_direction, truncate};
use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::grid::{
    Direction, FocusTarget, GridCell, GridDataSource, GridLayout, Overlay, RecyclingGrid, ReusePool,
};
use crate::theme::{style_card, style_muted, C_ACCENT, C_ERROR, C_PANEL_BORDER};

pub const SECTION_CELL: &str = "section";
const CHIP_WIDTH: u32 = 22;

#[derive(Debug, Default)]
pub struct SectionCell {
    index: Option<usize>,
    library: Option<Library>,
}

impl SectionCell {
    pub fn library(&self) -> Option<&Library> {
        self.library.as_ref()
    }
}

impl GridCell for SectionCell {
    fn reuse_identifier(&self) -> &'static str {
        SECTION_CELL
    }

    fn index(&self) -> Option<usize> {
        self.index
    }

    fn set_index(&mut self, index: Option<usize>) {
        self.index = index;
    }

    fn prepare_for_reuse(&mut self) {
        self.library = None;
    }
}

#[derive(Debug, Default)]
pub struct SectionSource {
    sections: Vec<Library>,
    selected: Option<usize>,
}

impl SectionSource {
    pub fn new(sections: Vec<Library>) -> Self {
        Self {
            sections,
            selected: None,
        }
    }

    pub fn take_selected(&mut self) -> Option<usize> {
        self.selected.take()
    }
}

impl GridDataSource for SectionSource {
    type Cell = SectionCell;

    fn item_count(&self) -> usize {
        self.sections.len()
    }

    fn cell_for_row(&mut self, pool: &mut ReusePool<SectionCell>, index: usize) -> Option<SectionCell> {
        let library = self.sections.get(index)?.clone();
        let mut cell = pool.dequeue(SECTION_CELL)?;
        cell.library = Some(library);
        Some(cell)
    }

    fn on_item_selected(&mut self, index: usize) {
        self.selected = Some(index);
    }

    fn clear_data(&mut self) {
        self.sections.clear();
        self.selected = None;
    }
}

pub struct SectionRow {
    grid: RecyclingGrid<SectionSource>,
    focus: Option<usize>,
}

impl SectionRow {
    pub fn new() -> Self {
        let mut layout = GridLayout::horizontal();
        layout.estimated_extent = CHIP_WIDTH;
        let mut grid = RecyclingGrid::new(layout);
        grid.register_cell(SECTION_CELL, Box::new(SectionCell::default));
        grid.show_skeleton(4);
        Self { grid, focus: None }
    }

    pub fn set_sections(&mut self, sections: Vec<Library>) {
        let empty = sections.is_empty();
        self.grid.set_data_source(Some(SectionSource::new(sections)));
        self.focus = (!empty).then_some(0);
        if empty {
            self.grid.set_empty("No libraries on this server");
        }
    }

    pub fn set_error(&mut self, message: &str) {
        self.grid.clear_data();
        self.focus = None;
        self.grid.set_error(message);
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn grid(&self) -> &RecyclingGrid<SectionSource> {
        &self.grid
    }

    fn move_focus(&mut self, direction: Direction) -> Vec<Action> {
        let Some(current) = self.focus.or_else(|| self.grid.default_focus()) else {
            return Vec::new();
        };
        match self.grid.next_cell_focus(current, direction) {
            FocusTarget::Cell(i) => {
                self.focus = Some(i);
                Vec::new()
            }
            FocusTarget::Parent(d) => vec![Action::FocusEscaped(ComponentId::Sections, d)],
        }
    }
}

impl Default for SectionRow {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SectionRow {
    fn id(&self) -> ComponentId {
        ComponentId::Sections
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        if let Some(direction) = key_direction(&key) {
            return self.move_focus(direction);
        }
        match key.code {
            KeyCode::Enter => {
                let Some(index) = self.focus else {
                    return Vec::new();
                };
                self.grid.select(index);
                match self.grid.source_mut().and_then(SectionSource::take_selected) {
                    Some(i) => vec![Action::OpenSection(i)],
                    None => Vec::new(),
                }
            }
            KeyCode::Home => {
                self.grid.scroll_to(0);
                self.focus = self.grid.default_focus();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        self.grid.set_viewport(area.width as u32, area.height as u32);

        match self.grid.overlay().clone() {
            Overlay::Skeleton(n) => {
                let chip = Block::default().borders(Borders::ALL).border_style(style_muted());
                for i in 0..n as u16 {
                    let x = i * (CHIP_WIDTH as u16 + 2);
                    if x + CHIP_WIDTH as u16 > area.width {
                        break;
                    }
                    frame.render_widget(
                        chip.clone(),
                        Rect::new(area.x + x, area.y, CHIP_WIDTH as u16, area.height),
                    );
                }
                return;
            }
            Overlay::Empty(msg) => {
                frame.render_widget(Paragraph::new(msg).style(Style::default().fg(C_PANEL_BORDER)), area);
                return;
            }
            Overlay::Error(msg) => {
                frame.render_widget(Paragraph::new(msg).style(Style::default().fg(C_ERROR)), area);
                return;
            }
            Overlay::None => {}
        }

        let axis = self.grid.layout().axis;
        for (index, cell, cell_frame) in self.grid.visible_cells() {
            let Some(rect) = cell_rect(area, axis, cell_frame) else {
                continue;
            };
            let Some(library) = cell.library() else {
                continue;
            };
            let is_focus = focused && self.focus == Some(index);
            let is_current = state.current_section == Some(index);
            let mut border = if is_focus { Style::default().fg(C_ACCENT) } else { style_muted() };
            if is_current {
                border = border.add_modifier(Modifier::BOLD);
            }
            let label = truncate(&library.title, rect.width.saturating_sub(2) as usize);
            let chip = Paragraph::new(Line::from(label))
                .alignment(Alignment::Center)
                .style(style_card(is_focus))
                .block(Block::default().borders(Borders::ALL).border_style(border));
            frame.render_widget(chip, rect);
        }
    }
}
