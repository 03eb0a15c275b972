//! Recycling grid: a sliding window of live cells over a virtual item range.
//!
//! Only lines that intersect the viewport (plus a prefetch margin) hold a
//! bound cell.  Everything else lives in a [`ReusePool`] keyed by reuse
//! identifier, so scrolling through thousands of items touches a handful of
//! cells.  [`RecyclingGrid::recycle`] is called on every draw and is a fixed
//! point once the window matches the viewport.

pub mod cell;
pub mod layout;
pub mod navigation;
pub mod pool;


use std::collections::HashMap;

pub use cell::{GridCell, GridDataSource};
pub use layout::{Axis, GridLayout, LineLayout};
pub use navigation::{Direction, FocusTarget};
pub use pool::{CellFactory, ReusePool};

/// Transient full-grid state drawn instead of (or over) the cells.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Overlay {
    #[default]
    None,
    /// Placeholder cards while the first page loads.
    Skeleton(usize),
    Empty(String),
    Error(String),
}

/// Position of a live cell relative to the viewport origin.  `main` is
/// negative for cells in the leading prefetch margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellFrame {
    pub main: i32,
    pub main_extent: u32,
    pub cross: u32,
    pub cross_extent: u32,
}

pub struct RecyclingGrid<S: GridDataSource> {
    layout: GridLayout,
    source: Option<S>,
    pool: ReusePool<S::Cell>,
    lines: LineLayout,
    cells: HashMap<usize, S::Cell>,
    /// Inclusive index range covered by the window.
    window: Option<(usize, usize)>,
    item_count: usize,
    scroll: u32,
    /// (main, cross); `None` until the first layout.
    viewport: Option<(u32, u32)>,
    next_page: Option<Box<dyn FnMut() + Send>>,
    page_armed: bool,
    overlay: Overlay,
}

impl<S: GridDataSource> RecyclingGrid<S> {
    pub fn new(layout: GridLayout) -> Self {
        let lines = LineLayout::new(&layout);
        Self {
            layout,
            source: None,
            pool: ReusePool::new(),
            lines,
            cells: HashMap::new(),
            window: None,
            item_count: 0,
            scroll: 0,
            viewport: None,
            next_page: None,
            page_armed: true,
            overlay: Overlay::None,
        }
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    pub fn source_mut(&mut self) -> Option<&mut S> {
        self.source.as_mut()
    }

    /// Swap the data source; returns the previous one.
    pub fn set_data_source(&mut self, source: Option<S>) -> Option<S> {
        self.detach_all();
        let old = std::mem::replace(&mut self.source, source);
        self.item_count = 0;
        self.lines = LineLayout::new(&self.layout);
        self.reload_data();
        old
    }

    pub fn register_cell(&mut self, identifier: &'static str, factory: CellFactory<S::Cell>) {
        self.pool.register(identifier, factory);
    }

    pub fn dequeue_reusable_cell(&mut self, identifier: &str) -> Option<S::Cell> {
        self.pool.dequeue(identifier)
    }

    /// Throw away the window and rebuild it from the top.
    pub fn reload_data(&mut self) {
        if self.viewport.is_none() {
            return;
        }
        self.detach_all();
        self.scroll = 0;
        self.page_armed = true;
        self.item_count = self.source.as_ref().map_or(0, S::item_count);
        self.lines = LineLayout::new(&self.layout);
        self.extend_lines();
        if self.item_count > 0 {
            self.overlay = Overlay::None;
        }
        self.recycle();
    }

    /// Pick up items appended to the source without touching live cells.
    pub fn notify_data_changed(&mut self) {
        let Some(source) = &self.source else {
            return;
        };
        if self.viewport.is_none() {
            return;
        }
        let new_count = source.item_count();
        if new_count < self.item_count {
            self.reload_data();
            return;
        }
        if new_count == self.item_count {
            return;
        }

        let old_lines = self.lines.len();
        self.item_count = new_count;
        // the old last line may have been partial
        self.lines.truncate(old_lines.saturating_sub(1));
        self.extend_lines();
        self.page_armed = true;
        self.overlay = Overlay::None;

        if let Some((min, max)) = self.window {
            let line = self.layout.line_of(max);
            if line + 1 == old_lines {
                let end = self.layout.indices_of(line, new_count).end;
                for index in max + 1..end {
                    self.materialize(index);
                }
                self.window = Some((min, end - 1));
                if let Some((main, _)) = self.viewport {
                    self.check_next_page(line, main);
                }
            }
        }
        self.recycle();
    }

    pub fn on_next_page(&mut self, callback: impl FnMut() + Send + 'static) {
        self.next_page = Some(Box::new(callback));
    }

    pub fn force_request_next_page(&mut self) {
        if let Some(cb) = self.next_page.as_mut() {
            cb();
        }
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn show_skeleton(&mut self, count: usize) {
        self.overlay = Overlay::Skeleton(count);
    }

    pub fn set_empty(&mut self, message: impl Into<String>) {
        self.overlay = Overlay::Empty(message.into());
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.overlay = Overlay::Error(message.into());
    }

    pub fn clear_overlay(&mut self) {
        self.overlay = Overlay::None;
    }

    /// Drop all items: the source forgets its data and every cell is pooled.
    pub fn clear_data(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.clear_data();
        }
        self.detach_all();
        self.item_count = 0;
        self.scroll = 0;
        self.page_armed = true;
        self.lines = LineLayout::new(&self.layout);
    }

    pub fn cancel_all_pending_images(&mut self) {
        for cell in self.cells.values_mut() {
            cell.cancel_pending();
        }
    }

    pub fn set_viewport(&mut self, main: u32, cross: u32) {
        let first = self.viewport.is_none();
        self.viewport = Some((main, cross));
        if first {
            self.reload_data();
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
            self.recycle();
        }
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }

    pub fn scroll_offset(&self) -> u32 {
        self.scroll
    }

    pub fn content_extent(&self) -> u32 {
        self.lines.total_extent()
    }

    pub fn max_scroll(&self) -> u32 {
        let main = self.viewport.map_or(0, |(m, _)| m);
        self.lines.total_extent().saturating_sub(main)
    }

    pub fn scroll_to(&mut self, offset: u32) {
        self.scroll = offset.min(self.max_scroll());
        self.recycle();
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let target = (self.scroll as i64 + delta as i64).clamp(0, self.max_scroll() as i64);
        self.scroll_to(target as u32);
    }

    /// Scroll the minimum amount that brings `index`'s line fully into view.
    pub fn scroll_to_index(&mut self, index: usize) {
        let Some((main, _)) = self.viewport else {
            return;
        };
        if index >= self.item_count {
            return;
        }
        let line = self.layout.line_of(index);
        let leading = self.lines.leading(line);
        let trailing = self.lines.trailing(line);
        if line == 0 {
            self.scroll_to(0);
        } else if leading < self.scroll {
            self.scroll_to(leading);
        } else if trailing > self.scroll + main {
            if line + 1 == self.lines.len() {
                self.scroll_to(self.max_scroll());
            } else {
                self.scroll_to(trailing - main);
            }
        } else {
            self.recycle();
        }
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    pub fn visible_range(&self) -> Option<(usize, usize)> {
        self.window
    }

    pub fn live_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, index: usize) -> Option<&S::Cell> {
        self.cells.get(&index)
    }

    pub fn cell_mut(&mut self, index: usize) -> Option<&mut S::Cell> {
        self.cells.get_mut(&index)
    }

    /// Live cells in index order with their frames.
    pub fn visible_cells(&self) -> Vec<(usize, &S::Cell, CellFrame)> {
        let (Some((min, max)), Some((_, cross))) = (self.window, self.viewport) else {
            return Vec::new();
        };
        (min..=max)
            .filter_map(|index| {
                let cell = self.cells.get(&index)?;
                let line = self.layout.line_of(index);
                let (cross_offset, cross_extent) =
                    self.layout.cross_frame(index % self.layout.span(), cross);
                let frame = CellFrame {
                    main: self.lines.leading(line) as i32 - self.scroll as i32,
                    main_extent: self.lines.extent(line),
                    cross: cross_offset,
                    cross_extent,
                };
                Some((index, cell, frame))
            })
            .collect()
    }

    pub fn select(&mut self, index: usize) {
        if index >= self.item_count {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            source.on_item_selected(index);
        }
    }

    /// Resolve a directional move from `index`, scrolling the target into view.
    pub fn next_cell_focus(&mut self, index: usize, direction: Direction) -> FocusTarget {
        match navigation::neighbour(self.layout.axis, self.item_count, index, direction) {
            Some(target) => {
                self.scroll_to_index(target);
                if self.cells.contains_key(&target) {
                    FocusTarget::Cell(target)
                } else {
                    FocusTarget::Parent(direction)
                }
            }
            None => FocusTarget::Parent(direction),
        }
    }

    /// First live cell whose line starts inside the viewport.
    pub fn default_focus(&self) -> Option<usize> {
        let (min, max) = self.window?;
        (min..=max)
            .filter(|i| self.cells.contains_key(i))
            .find(|&i| self.lines.leading(self.layout.line_of(i)) >= self.scroll)
            .or_else(|| (min..=max).find(|i| self.cells.contains_key(i)))
    }

    /// Bring the window in line with the viewport.
    pub fn recycle(&mut self) {
        let Some((main, _)) = self.viewport else {
            return;
        };
        if self.source.is_none() || self.item_count == 0 {
            return;
        }
        let count = self.item_count;
        let line_count = self.lines.len();
        let span = self.layout.span();

        while let Some((min, max)) = self.window {
            let line = self.layout.line_of(min);
            if self.line_wanted(line, main) {
                break;
            }
            self.evict_line(line);
            let last = self.layout.line_of(max);
            self.window = (line < last).then(|| ((line + 1) * span, max));
        }

        while let Some((min, max)) = self.window {
            let line = self.layout.line_of(max);
            if self.line_wanted(line, main) {
                break;
            }
            self.evict_line(line);
            let first = self.layout.line_of(min);
            self.window = (line > first).then(|| (min, line * span - 1));
        }

        if self.window.is_none() {
            let start = self.scroll.saturating_sub(self.layout.margin());
            let Some(line) = self.lines.line_at(start) else {
                return;
            };
            if !self.line_wanted(line, main) {
                return;
            }
            let range = self.layout.indices_of(line, count);
            self.materialize_line(line);
            self.window = Some((range.start, range.end - 1));
            self.check_next_page(line, main);
        }

        while let Some((min, max)) = self.window {
            let line = self.layout.line_of(min);
            if line == 0 || !self.line_wanted(line - 1, main) {
                break;
            }
            self.materialize_line(line - 1);
            self.window = Some(((line - 1) * span, max));
        }

        while let Some((min, max)) = self.window {
            let line = self.layout.line_of(max) + 1;
            if line >= line_count || !self.line_wanted(line, main) {
                break;
            }
            self.materialize_line(line);
            self.window = Some((min, self.layout.indices_of(line, count).end - 1));
            self.check_next_page(line, main);
        }
    }

    fn line_wanted(&self, line: usize, main: u32) -> bool {
        let margin = self.layout.margin() as i64;
        let start = self.scroll as i64 - margin;
        let end = self.scroll as i64 + main as i64 + margin;
        (self.lines.next_leading(line) as i64) > start && (self.lines.leading(line) as i64) < end
    }

    fn check_next_page(&mut self, line: usize, main: u32) {
        if !self.page_armed {
            return;
        }
        if self.lines.trailing(line) + main >= self.lines.total_extent() {
            self.page_armed = false;
            tracing::debug!("grid: line {} near end, requesting next page", line);
            if let Some(cb) = self.next_page.as_mut() {
                cb();
            }
        }
    }

    fn extend_lines(&mut self) {
        let wanted = self.layout.line_count(self.item_count);
        for line in self.lines.len()..wanted {
            let extent = self
                .source
                .as_ref()
                .and_then(|s| s.extent_for_line(line))
                .unwrap_or(self.layout.estimated_extent);
            self.lines.push(extent);
        }
    }

    fn materialize_line(&mut self, line: usize) {
        for index in self.layout.indices_of(line, self.item_count) {
            self.materialize(index);
        }
    }

    fn materialize(&mut self, index: usize) {
        if self.cells.contains_key(&index) {
            return;
        }
        let Some(source) = self.source.as_mut() else {
            return;
        };
        if let Some(mut cell) = source.cell_for_row(&mut self.pool, index) {
            cell.set_index(Some(index));
            self.cells.insert(index, cell);
        }
    }

    fn evict_line(&mut self, line: usize) {
        for index in self.layout.indices_of(line, self.item_count) {
            if let Some(cell) = self.cells.remove(&index) {
                self.pool.enqueue(cell);
            }
        }
    }

    fn detach_all(&mut self) {
        for (_, cell) in self.cells.drain() {
            self.pool.enqueue(cell);
        }
        self.window = None;
    }
}
