//! BrowseGrid: vertical recycling poster grid over one library section.
//!
//! Items arrive a page at a time.  The grid asks for the next page once its
//! window reaches the last line; the App fetches it and hands the result
//! back through [`BrowseGrid::apply_page`].  Sections already visited are
//! kept in a cache so switching back is instant and keeps the focus.

use std::collections::HashMap;
use std::sync::Arc;

use marquee_proto::catalog::{CatalogError, CatalogService};
use marquee_proto::model::{ItemPage, MediaItem};
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use tracing::debug;

use super::{cell_rect, key_direction, truncate};
use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::grid::{
    CellFrame, Direction, FocusTarget, GridCell, GridDataSource, GridLayout, Overlay,
    RecyclingGrid, ReusePool,
};
use crate::images::{Artwork, ImageKey, ImageLoaded, ImageQueue, ImageTicket};
use crate::theme::{
    style_card, style_muted, style_secondary, C_ACCENT, C_ERROR, C_MUTED, C_PLAYING, C_SKELETON,
    C_WATCHED,
};
use crate::widgets::pane_chrome::{pane_chrome, Badge};
use crate::widgets::progress_bar::bar_glyphs;

pub const POSTER_CELL: &str = "poster";
const POSTER_WIDTH: u32 = 150;
const POSTER_HEIGHT: u32 = 225;

#[derive(Debug, Default)]
pub struct PosterCell {
    index: Option<usize>,
    item: Option<MediaItem>,
    artwork: Option<Artwork>,
    ticket: Option<ImageTicket>,
}

impl PosterCell {
    pub fn item(&self) -> Option<&MediaItem> {
        self.item.as_ref()
    }

    pub fn artwork(&self) -> Option<&Artwork> {
        self.artwork.as_ref()
    }

    pub fn has_pending_image(&self) -> bool {
        self.ticket.is_some()
    }

    fn bind(&mut self, item: MediaItem, ticket: Option<ImageTicket>) {
        self.item = Some(item);
        self.artwork = None;
        self.ticket = ticket;
    }
}

impl GridCell for PosterCell {
    fn reuse_identifier(&self) -> &'static str {
        POSTER_CELL
    }

    fn index(&self) -> Option<usize> {
        self.index
    }

    fn set_index(&mut self, index: Option<usize>) {
        self.index = index;
    }

    fn prepare_for_reuse(&mut self) {
        self.item = None;
        self.artwork = None;
        self.ticket = None;
    }

    fn cancel_pending(&mut self) {
        self.ticket = None;
    }
}

pub struct BrowseSource {
    section: u64,
    items: Vec<MediaItem>,
    total: usize,
    /// True once the first page has landed.
    loaded: bool,
    images: Option<ImageQueue>,
    catalog: Option<Arc<dyn CatalogService>>,
    selected: Option<usize>,
}

impl BrowseSource {
    pub fn new(section: u64, images: Option<ImageQueue>, catalog: Option<Arc<dyn CatalogService>>) -> Self {
        Self {
            section,
            items: Vec::new(),
            total: 0,
            loaded: false,
            images,
            catalog,
            selected: None,
        }
    }

    pub fn section(&self) -> u64 {
        self.section
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn has_more(&self) -> bool {
        !self.loaded || self.items.len() < self.total
    }

    fn append(&mut self, page: ItemPage) {
        self.items.extend(page.items);
        self.total = page.total_size.max(self.items.len());
        self.loaded = true;
    }
}

impl GridDataSource for BrowseSource {
    type Cell = PosterCell;

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn cell_for_row(&mut self, pool: &mut ReusePool<PosterCell>, index: usize) -> Option<PosterCell> {
        let item = self.items.get(index)?.clone();
        let mut cell = pool.dequeue(POSTER_CELL)?;
        let ticket = match (&self.images, &self.catalog) {
            (Some(images), Some(catalog)) if !item.thumb.is_empty() => catalog
                .image_url(&item.thumb, POSTER_WIDTH, POSTER_HEIGHT)
                .map(|url| {
                    images.request(
                        ImageKey {
                            index,
                            rating_key: item.rating_key,
                        },
                        url,
                    )
                }),
            _ => None,
        };
        cell.bind(item, ticket);
        Some(cell)
    }

    fn on_item_selected(&mut self, index: usize) {
        self.selected = Some(index);
    }

    fn clear_data(&mut self) {
        self.items.clear();
        self.total = 0;
        self.loaded = false;
        self.selected = None;
    }
}

/// A page fetch the App should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub section: u64,
    pub start: usize,
    pub count: usize,
}

struct CachedSection {
    items: Vec<MediaItem>,
    total: usize,
    focus: Option<usize>,
}

pub struct BrowseGrid {
    grid: RecyclingGrid<BrowseSource>,
    focus: Option<usize>,
    in_flight: Option<PageRequest>,
    /// A follow-up page failed; the grid latch is spent until a retry.
    load_more_failed: bool,
    cache: HashMap<u64, CachedSection>,
    images: Option<ImageQueue>,
    catalog: Option<Arc<dyn CatalogService>>,
    page_size: usize,
    title: String,
}

impl BrowseGrid {
    pub fn new(
        span: usize,
        page_size: usize,
        images: Option<ImageQueue>,
        catalog: Option<Arc<dyn CatalogService>>,
        next_page: impl FnMut() + Send + 'static,
    ) -> Self {
        let mut grid = RecyclingGrid::new(GridLayout::vertical(span));
        grid.register_cell(POSTER_CELL, Box::new(PosterCell::default));
        grid.on_next_page(next_page);
        Self {
            grid,
            focus: None,
            in_flight: None,
            load_more_failed: false,
            cache: HashMap::new(),
            images,
            catalog,
            page_size: page_size.max(1),
            title: String::new(),
        }
    }

    pub fn grid(&self) -> &RecyclingGrid<BrowseSource> {
        &self.grid
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn section(&self) -> Option<u64> {
        self.grid.source().map(BrowseSource::section)
    }

    /// Switch to `section`.  Returns the first-page fetch when the section
    /// is not cached.
    pub fn open_section(&mut self, section: u64, title: &str) -> Option<PageRequest> {
        if self.section() == Some(section) {
            return None;
        }
        self.stash_current();
        self.title = title.to_string();
        self.in_flight = None;
        self.load_more_failed = false;

        let mut source = BrowseSource::new(section, self.images.clone(), self.catalog.clone());
        if let Some(cached) = self.cache.remove(&section) {
            debug!("browse: section {} restored from cache ({} items)", section, cached.items.len());
            let has_items = !cached.items.is_empty();
            source.items = cached.items;
            source.total = cached.total;
            source.loaded = true;
            self.grid.set_data_source(Some(source));
            if has_items {
                self.grid.clear_overlay();
                self.focus = cached.focus.or(Some(0));
            } else {
                self.grid.set_empty("Nothing here yet");
                self.focus = None;
            }
            if let Some(f) = self.focus {
                self.grid.scroll_to_index(f);
            }
            return None;
        }

        self.grid.set_data_source(Some(source));
        self.grid.show_skeleton(self.grid.layout().span() * 2);
        self.focus = None;
        let request = PageRequest {
            section,
            start: 0,
            count: self.page_size,
        };
        self.in_flight = Some(request);
        Some(request)
    }

    fn stash_current(&mut self) {
        let focus = self.focus;
        let Some(source) = self.grid.set_data_source(None) else {
            return;
        };
        if !source.loaded {
            return;
        }
        self.cache.insert(
            source.section,
            CachedSection {
                items: source.items,
                total: source.total,
                focus,
            },
        );
    }

    /// Next page fetch, unless one is in flight or everything is loaded.
    pub fn next_page_request(&mut self) -> Option<PageRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        let source = self.grid.source()?;
        if !source.has_more() {
            return None;
        }
        let request = PageRequest {
            section: source.section,
            start: source.items.len(),
            count: self.page_size,
        };
        self.in_flight = Some(request);
        self.load_more_failed = false;
        Some(request)
    }

    pub fn load_more_failed(&self) -> bool {
        self.load_more_failed
    }

    /// Abort every artwork fetch still bound to a live card.
    pub fn cancel_images(&mut self) {
        self.grid.cancel_all_pending_images();
    }

    /// Apply a fetched page.  Pages for another section or offset are stale
    /// and dropped.  Returns the error text for a failed follow-up page.
    pub fn apply_page(
        &mut self,
        section: u64,
        start: usize,
        result: Result<ItemPage, CatalogError>,
    ) -> Option<String> {
        let current = self.grid.source().map(|s| (s.section, s.items.len()));
        let expected = self.in_flight.map(|r| (r.section, r.start));
        if current != Some((section, start)) || expected != Some((section, start)) {
            debug!("browse: dropping stale page {}@{}", section, start);
            return None;
        }
        self.in_flight = None;

        let page = match result {
            Ok(page) => page,
            Err(e) if start == 0 => {
                self.grid.set_error(format!("Could not load library: {}", e));
                return None;
            }
            Err(e) => {
                self.load_more_failed = true;
                return Some(format!("Could not load more items: {} (press m to retry)", e));
            }
        };

        let first = start == 0;
        if let Some(source) = self.grid.source_mut() {
            source.append(page);
        }
        if first {
            self.grid.reload_data();
        } else {
            self.grid.notify_data_changed();
        }
        let has_items = self.grid.source().is_some_and(|s| !s.items.is_empty());
        if has_items {
            self.grid.clear_overlay();
            if self.focus.is_none() {
                self.focus = Some(0);
            }
        } else {
            self.grid.set_empty("Nothing here yet");
        }
        None
    }

    /// Route a finished artwork fetch to its cell, if it still shows the item.
    pub fn apply_image(&mut self, loaded: ImageLoaded) -> bool {
        let Some(cell) = self.grid.cell_mut(loaded.key.index) else {
            return false;
        };
        if cell.item.as_ref().map(|i| i.rating_key) != Some(loaded.key.rating_key) {
            debug!("browse: artwork for recycled cell {} ignored", loaded.key.index);
            return false;
        }
        cell.ticket = None;
        match loaded.result {
            Ok(art) => {
                cell.artwork = Some(art);
                true
            }
            Err(e) => {
                debug!("browse: artwork failed for {}: {}", loaded.url, e);
                false
            }
        }
    }

    /// Forget every loaded section and refetch the current one.
    pub fn refresh(&mut self) -> Option<PageRequest> {
        self.cache.clear();
        let section = self.section()?;
        let title = self.title.clone();
        self.grid.set_data_source(None);
        self.open_section(section, &title)
    }

    fn move_focus(&mut self, direction: Direction) -> Vec<Action> {
        let Some(current) = self.focus.or_else(|| self.grid.default_focus()) else {
            return vec![Action::FocusEscaped(ComponentId::Browse, direction)];
        };
        match self.grid.next_cell_focus(current, direction) {
            FocusTarget::Cell(i) => {
                self.focus = Some(i);
                Vec::new()
            }
            FocusTarget::Parent(d) => vec![Action::FocusEscaped(ComponentId::Browse, d)],
        }
    }

    fn page_jump(&mut self, down: bool) {
        let Some(current) = self.focus else {
            return;
        };
        let (main, _) = self.grid.viewport().unwrap_or((0, 0));
        let layout = self.grid.layout();
        let rows = (main / (layout.estimated_extent + layout.spacing)).max(1) as usize;
        let step = rows * layout.span();
        let count = self.grid.item_count();
        let target = if down {
            (current + step).min(count.saturating_sub(1))
        } else {
            current.saturating_sub(step)
        };
        self.grid.scroll_to_index(target);
        self.focus = Some(target);
    }

    fn draw_card(&self, frame: &mut Frame, rect: Rect, cell: &PosterCell, focused: bool) {
        let Some(item) = cell.item() else {
            return;
        };
        let border = if focused { Style::default().fg(C_ACCENT) } else { style_muted() };
        let block = Block::default().borders(Borders::ALL).border_style(border).style(style_card(focused));
        let inner = block.inner(rect);
        frame.render_widget(block, rect);
        if inner.width == 0 || inner.height == 0 {
            return;
        }
        let w = inner.width as usize;

        let mut lines = Vec::new();
        let art_rows = inner.height.saturating_sub(3) as usize;
        let (glyph, color) = match (cell.artwork(), cell.has_pending_image()) {
            (Some(_), _) => ('▓', C_ACCENT),
            (None, true) => ('░', C_MUTED),
            (None, false) => ('·', C_SKELETON),
        };
        for _ in 0..art_rows {
            lines.push(Line::from(Span::styled(
                glyph.to_string().repeat(w),
                Style::default().fg(color),
            )));
        }
        lines.push(Line::from(Span::styled(
            truncate(&item.title, w),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(truncate(&item.card_subtitle(), w), style_secondary())));
        match item.watched_fraction() {
            Some(f) if item.view_offset > 0 => lines.push(Line::from(Span::styled(
                bar_glyphs(f, w),
                Style::default().fg(C_WATCHED),
            ))),
            _ if item.view_count > 0 => lines.push(Line::from(Span::styled(
                truncate("✓ watched", w),
                Style::default().fg(C_PLAYING),
            ))),
            _ => {}
        }
        frame.render_widget(Paragraph::new(lines), inner);
    }
}

impl Component for BrowseGrid {
    fn id(&self) -> ComponentId {
        ComponentId::Browse
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
                let selected = self.grid.source_mut().and_then(|s| s.selected.take());
                match selected.and_then(|i| self.grid.source()?.items().get(i).cloned()) {
                    Some(item) => vec![Action::OpenDetail(item)],
                    None => Vec::new(),
                }
            }
            KeyCode::PageDown => {
                self.page_jump(true);
                Vec::new()
            }
            KeyCode::PageUp => {
                self.page_jump(false);
                Vec::new()
            }
            KeyCode::Char('m') if self.load_more_failed => vec![Action::RequestNextPage],
            KeyCode::Home => {
                self.grid.scroll_to(0);
                self.focus = self.grid.default_focus();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, _state: &AppState) {
        let count_label = self
            .grid
            .source()
            .filter(|s| s.loaded)
            .map(|s| format!("{} items", s.total));
        let badge = if self.load_more_failed {
            Some(Badge {
                text: "load failed · m to retry",
                color: C_ERROR,
            })
        } else {
            count_label.as_deref().map(|text| Badge { text, color: C_MUTED })
        };
        let title = if self.title.is_empty() { "Library" } else { self.title.as_str() };
        let block = pane_chrome(title, Some('2'), focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.width == 0 || inner.height == 0 {
            return;
        }
        self.grid.set_viewport(inner.height as u32, inner.width as u32);

        let axis = self.grid.layout().axis;
        match self.grid.overlay().clone() {
            Overlay::Skeleton(n) => {
                let span = self.grid.layout().span();
                let extent = self.grid.layout().estimated_extent;
                for i in 0..n {
                    let (cross, cross_extent) = self.grid.layout().cross_frame(i % span, inner.width as u32);
                    let frame_spec = CellFrame {
                        main: ((i / span) as u32 * (extent + self.grid.layout().spacing)) as i32,
                        main_extent: extent,
                        cross,
                        cross_extent,
                    };
                    if let Some(rect) = cell_rect(inner, axis, frame_spec) {
                        frame.render_widget(Block::default().style(Style::default().bg(C_SKELETON)), rect);
                    }
                }
                return;
            }
            Overlay::Empty(msg) => {
                frame.render_widget(Paragraph::new(msg).style(style_muted()), inner);
                return;
            }
            Overlay::Error(msg) => {
                frame.render_widget(Paragraph::new(msg).style(Style::default().fg(C_ERROR)), inner);
                return;
            }
            Overlay::None => {}
        }

        for (index, cell, cell_frame) in self.grid.visible_cells() {
            if let Some(rect) = cell_rect(inner, axis, cell_frame) {
                self.draw_card(frame, rect, cell, focused && self.focus == Some(index));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marquee_proto::model::RatingKey;
    use ratatui::crossterm::event::KeyModifiers;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(start: usize, n: usize, total: usize) -> ItemPage {
        ItemPage {
            items: (start..start + n)
                .map(|i| MediaItem {
                    rating_key: RatingKey(i as u64 + 1000),
                    title: format!("Film {}", i),
                    ..Default::default()
                })
                .collect(),
            total_size: total,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn browse() -> (BrowseGrid, Arc<AtomicUsize>) {
        let asks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&asks);
        let grid = BrowseGrid::new(4, 20, None, None, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (grid, asks)
    }

    #[test]
    fn test_first_page_replaces_skeleton() {
        let (mut b, _) = browse();
        let req = b.open_section(7, "Movies").unwrap();
        assert_eq!(req, PageRequest { section: 7, start: 0, count: 20 });
        assert!(matches!(b.grid().overlay(), Overlay::Skeleton(8)));
        b.grid.set_viewport(40, 80);

        assert!(b.apply_page(7, 0, Ok(page(0, 20, 60))).is_none());
        assert_eq!(b.grid().overlay(), &Overlay::None);
        assert_eq!(b.grid().item_count(), 20);
        assert_eq!(b.focus(), Some(0));
    }

    #[test]
    fn test_paging_requests_and_stale_pages() {
        let (mut b, asks) = browse();
        b.open_section(7, "Movies");
        b.grid.set_viewport(40, 80);
        b.apply_page(7, 0, Ok(page(0, 20, 60)));

        let next = b.next_page_request().unwrap();
        assert_eq!(next.start, 20);
        assert!(b.next_page_request().is_none(), "one fetch at a time");

        // an answer for another offset is ignored
        b.apply_page(7, 40, Ok(page(40, 20, 60)));
        assert_eq!(b.grid().item_count(), 20);

        b.apply_page(7, 20, Ok(page(20, 20, 60)));
        assert_eq!(b.grid().item_count(), 40);
        b.next_page_request();
        b.apply_page(7, 40, Ok(page(40, 20, 60)));
        assert_eq!(b.grid().item_count(), 60);
        assert!(b.next_page_request().is_none(), "all items loaded");

        // scrolling to the end asked the App for pages
        for _ in 0..20 {
            b.handle_key(key(KeyCode::Down), &AppState::new(String::new(), String::new(), 20));
        }
        assert!(asks.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_section_cache_restores_items_and_focus() {
        let (mut b, _) = browse();
        b.open_section(1, "Movies");
        b.grid.set_viewport(40, 80);
        b.apply_page(1, 0, Ok(page(0, 20, 20)));
        let st = AppState::new(String::new(), String::new(), 20);
        b.handle_key(key(KeyCode::Right), &st);
        b.handle_key(key(KeyCode::Down), &st);
        assert_eq!(b.focus(), Some(5));

        assert!(b.open_section(2, "Shows").is_some());
        b.apply_page(2, 0, Ok(page(100, 3, 3)));
        assert_eq!(b.grid().item_count(), 3);

        assert!(b.open_section(1, "Movies").is_none(), "cached section needs no fetch");
        assert_eq!(b.grid().item_count(), 20);
        assert_eq!(b.focus(), Some(5));
    }

    #[test]
    fn test_first_page_error_and_empty() {
        let (mut b, _) = browse();
        b.open_section(3, "Music");
        b.grid.set_viewport(40, 80);
        b.apply_page(3, 0, Err(CatalogError::Status(500)));
        assert!(matches!(b.grid().overlay(), Overlay::Error(m) if m.contains("500")));

        b.open_section(4, "Empty");
        b.apply_page(4, 0, Ok(page(0, 0, 0)));
        assert_eq!(b.grid().overlay(), &Overlay::Empty("Nothing here yet".into()));
        assert!(b.next_page_request().is_none());
    }

    #[test]
    fn test_failed_follow_up_page_can_be_retried() {
        let (mut b, _) = browse();
        let st = AppState::new("srv".into(), "me".into(), 20);
        b.open_section(7, "Movies");
        b.grid.set_viewport(40, 80);
        b.apply_page(7, 0, Ok(page(0, 20, 60)));
        assert!(b.handle_key(key(KeyCode::Char('m')), &st).is_empty());

        b.next_page_request().unwrap();
        let err = b.apply_page(7, 20, Err(CatalogError::Status(503))).unwrap();
        assert!(err.contains("503") && err.contains("retry"));
        assert!(b.load_more_failed());
        assert_eq!(b.grid().item_count(), 20);

        let out = b.handle_key(key(KeyCode::Char('m')), &st);
        assert!(matches!(out[..], [Action::RequestNextPage]));
        let retry = b.next_page_request().unwrap();
        assert_eq!(retry, PageRequest { section: 7, start: 20, count: 20 });
        assert!(!b.load_more_failed());

        b.apply_page(7, 20, Ok(page(20, 20, 60)));
        assert_eq!(b.grid().item_count(), 40);
    }

    #[test]
    fn test_enter_opens_detail_for_focused_item() {
        let (mut b, _) = browse();
        b.open_section(1, "Movies");
        b.grid.set_viewport(40, 80);
        b.apply_page(1, 0, Ok(page(0, 8, 8)));
        let st = AppState::new(String::new(), String::new(), 20);
        b.handle_key(key(KeyCode::Right), &st);
        let out = b.handle_key(key(KeyCode::Enter), &st);
        match &out[..] {
            [Action::OpenDetail(item)] => assert_eq!(item.title, "Film 1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_top_row_up_escapes_to_parent() {
        let (mut b, _) = browse();
        b.open_section(1, "Movies");
        b.grid.set_viewport(40, 80);
        b.apply_page(1, 0, Ok(page(0, 8, 8)));
        let out = b.handle_key(key(KeyCode::Up), &AppState::new(String::new(), String::new(), 20));
        assert!(matches!(out[..], [Action::FocusEscaped(ComponentId::Browse, Direction::Up)]));
    }

    #[test]
    fn test_artwork_only_applies_to_bound_item() {
        let (mut b, _) = browse();
        b.open_section(1, "Movies");
        b.grid.set_viewport(40, 80);
        b.apply_page(1, 0, Ok(page(0, 8, 8)));
        let art = Artwork {
            bytes: 10,
            content_type: "image/jpeg".into(),
        };
        let stale = ImageLoaded {
            key: ImageKey {
                index: 2,
                rating_key: RatingKey(1),
            },
            url: "u".into(),
            result: Ok(art.clone()),
        };
        assert!(!b.apply_image(stale));
        let fresh = ImageLoaded {
            key: ImageKey {
                index: 2,
                rating_key: RatingKey(1002),
            },
            url: "u".into(),
            result: Ok(art),
        };
        assert!(b.apply_image(fresh));
        assert!(b.grid().cell(2).unwrap().artwork().is_some());
    }
}
