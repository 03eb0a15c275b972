//! App: component-based event loop.
//!
//! Architecture:
//! - `App` owns all components and `AppState` (shared read-only data for components).
//! - A `tokio::mpsc` channel carries `AppMessage`s in from background tasks:
//!   terminal input, catalog responses and the adaptive-seek flush timer.
//! - Engine events and finished artwork arrive on their own channels.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - The playback controller returns `Effect`s; App runs them and feeds the
//!   results back tagged with the request id they were issued under.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use marquee_proto::catalog::{CatalogResult, CatalogService};
use marquee_proto::config::SettingsStore;
use marquee_proto::model::{ItemPage, Library, MediaItem, PlaybackInfo, RatingKey};
use ratatui::crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    style::Style,
    widgets::Block,
    Terminal,
};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{
    action::{Action, ComponentId, PlayerAction, Screen},
    app_state::AppState,
    component::Component,
    components::{
        browse_grid::{BrowseGrid, PageRequest},
        detail::DetailPane,
        header::Header,
        help_overlay::HelpOverlay,
        player_view::{PlayerSnapshot, PlayerView},
        section_row::SectionRow,
    },
    engine::{EngineEvent, EngineHost, MediaEngine},
    focus::FocusRing,
    grid::Direction,
    images::{ImageLoaded, ImageQueue},
    player::{
        ControllerConfig, Effect, PlaybackController, PlaybackRequest, RequestId, OSD_TICK,
        TIMELINE_TICK,
    },
    theme::C_BG,
    widgets::{status_bar, toast::ToastManager},
};

/// Final `stopped` report on quit gets this long before the terminal is restored.
const SHUTDOWN_REPORT_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_DRAIN: usize = 256;

/// Messages delivered to the App event loop.
pub enum AppMessage {
    Event(Event),
    Sections(CatalogResult<Vec<Library>>),
    Page {
        section: u64,
        start: usize,
        result: CatalogResult<ItemPage>,
    },
    /// The browse grid reached its last line.
    NextPage,
    Metadata {
        key: RatingKey,
        result: CatalogResult<MediaItem>,
    },
    Decision {
        id: RequestId,
        result: CatalogResult<PlaybackInfo>,
    },
    Children {
        id: RequestId,
        result: CatalogResult<Vec<MediaItem>>,
    },
    SeekFlush(u64),
}

pub struct App<E: MediaEngine + 'static> {
    state: AppState,
    settings: SettingsStore,
    catalog: Arc<dyn CatalogService>,
    engine: EngineHost<E>,
    images: ImageQueue,
    controller: Option<PlaybackController<E>>,

    tx: mpsc::Sender<AppMessage>,
    rx: Option<mpsc::Receiver<AppMessage>>,
    engine_rx: Option<mpsc::Receiver<EngineEvent>>,
    image_rx: Option<mpsc::Receiver<ImageLoaded>>,

    focus: FocusRing,
    header: Header,
    sections: SectionRow,
    browse: BrowseGrid,
    detail: DetailPane,
    player_view: PlayerView,
    help_overlay: HelpOverlay,
    toast: ToastManager,

    seek_flush: Option<AbortHandle>,
    /// Set when a player starts so the OSD and timeline intervals restart.
    reset_player_ticks: bool,
    should_quit: bool,
}

impl<E: MediaEngine + 'static> App<E> {
    pub async fn new(
        settings: SettingsStore,
        catalog: Arc<dyn CatalogService>,
        engine: EngineHost<E>,
        engine_rx: mpsc::Receiver<EngineEvent>,
    ) -> Self {
        let snapshot = settings.get().await;
        let server_name = snapshot
            .server()
            .map(|s| s.name.clone())
            .unwrap_or_else(|| "no server".to_string());

        let (tx, rx) = mpsc::channel::<AppMessage>(1024);
        let (image_tx, image_rx) = mpsc::channel::<ImageLoaded>(256);
        let images = ImageQueue::new(reqwest::Client::new(), image_tx);

        let page_tx = tx.clone();
        let browse = BrowseGrid::new(
            snapshot.ui.span_count,
            snapshot.ui.page_size,
            Some(images.clone()),
            Some(Arc::clone(&catalog)),
            move || {
                let _ = page_tx.try_send(AppMessage::NextPage);
            },
        );

        Self {
            state: AppState::new(server_name, snapshot.auth.username.clone(), snapshot.ui.page_size),
            settings,
            catalog,
            engine,
            images,
            controller: None,
            tx,
            rx: Some(rx),
            engine_rx: Some(engine_rx),
            image_rx: Some(image_rx),
            focus: FocusRing::new(vec![ComponentId::Sections, ComponentId::Browse]),
            header: Header::new(),
            sections: SectionRow::new(),
            browse,
            detail: DetailPane::new(),
            player_view: PlayerView::new(),
            help_overlay: HelpOverlay::new(),
            toast: ToastManager::new(),
            seek_flush: None,
            reset_player_ticks: false,
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut rx = self.rx.take().context("app event channel already taken")?;
        let mut engine_rx = self.engine_rx.take().context("engine channel already taken")?;
        let mut image_rx = self.image_rx.take().context("image channel already taken")?;

        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = self.tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        self.toast.spinner("Loading libraries");
        self.spawn_sections();

        // ── Periodic timers ───────────────────────────────────────────────────
        // Toast expiry + spinner animation.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Only polled while a player is open.
        let mut osd_tick = tokio::time::interval(OSD_TICK);
        osd_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeline_tick = tokio::time::interval(TIMELINE_TICK);
        timeline_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                self.refresh_player_snapshot();
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            let player_open = self.controller.is_some();
            tokio::select! {
                Some(msg) = rx.recv() => {
                    self.handle_message(msg).await;
                    // Drain whatever else is queued before the next frame.
                    for _ in 0..MAX_DRAIN {
                        let Ok(next) = rx.try_recv() else {
                            break;
                        };
                        self.handle_message(next).await;
                    }
                    needs_redraw = true;
                }

                Some(ev) = engine_rx.recv() => {
                    self.on_engine_event(ev);
                    needs_redraw = true;
                }

                Some(loaded) = image_rx.recv() => {
                    needs_redraw = self.browse.apply_image(loaded);
                }

                _ = ui_tick.tick() => {
                    self.toast.tick();
                    needs_redraw = true;
                }

                _ = osd_tick.tick(), if player_open => {
                    if let Some(ctl) = self.controller.as_mut() {
                        needs_redraw = ctl.osd_tick();
                    }
                }

                _ = timeline_tick.tick(), if player_open => {
                    if let Some(ctl) = self.controller.as_mut() {
                        let effects = ctl.timeline_tick();
                        self.run_effects(effects);
                    }
                }
            }

            if std::mem::take(&mut self.reset_player_ticks) {
                osd_tick.reset();
                timeline_tick.reset();
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        self.shutdown_player().await;
        self.browse.cancel_images();
        self.engine.with_idle(|engine| engine.cleanup());

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        info!("marquee exited");
        Ok(())
    }

    /// Tear down a live player on quit and wait briefly for its final report.
    async fn shutdown_player(&mut self) {
        let Some(mut ctl) = self.controller.take() else {
            return;
        };
        for effect in ctl.teardown() {
            if let Effect::ReportTimeline { report, .. } = effect {
                let sent = self.catalog.report_timeline(report);
                match tokio::time::timeout(SHUTDOWN_REPORT_TIMEOUT, sent).await {
                    Ok(Ok(())) => debug!("final timeline report sent"),
                    Ok(Err(e)) => warn!("final timeline report failed: {}", e),
                    Err(_) => warn!("final timeline report timed out"),
                }
            }
        }
        if let Some(h) = self.seek_flush.take() {
            h.abort();
        }
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    async fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                for action in self.handle_key(key) {
                    self.dispatch(action).await;
                }
            }
            AppMessage::Event(Event::Resize(w, h)) => self.dispatch(Action::Resize(w, h)).await,
            AppMessage::Event(_) => {}

            AppMessage::Sections(result) => {
                self.toast.dismiss_spinner();
                self.state.sections_loading = false;
                match result {
                    Ok(libs) => {
                        info!("loaded {} library sections", libs.len());
                        self.state.sections_error = None;
                        self.state.sections = libs.clone();
                        self.sections.set_sections(libs);
                        let keep = self.state.current_section.filter(|&i| i < self.state.sections.len());
                        self.open_section(keep.unwrap_or(0));
                    }
                    Err(e) => {
                        warn!("library sections failed: {}", e);
                        self.state.sections_error = Some(e.to_string());
                        self.sections.set_error(&e.to_string());
                        self.toast.error(format!("Could not load libraries: {}", e));
                    }
                }
            }
            AppMessage::Page {
                section,
                start,
                result,
            } => {
                if let Some(err) = self.browse.apply_page(section, start, result) {
                    warn!("{}", err);
                    self.toast.warning(err);
                }
            }
            AppMessage::NextPage => {
                if let Some(req) = self.browse.next_page_request() {
                    self.spawn_page(req);
                }
            }
            AppMessage::Metadata { key, result } => self.detail.apply_metadata(key, result),
            AppMessage::Decision { id, result } => {
                if let Some(ctl) = self.controller.as_mut() {
                    let effects = ctl.on_decision(id, result);
                    self.run_effects(effects);
                }
            }
            AppMessage::Children { id, result } => {
                if let Some(ctl) = self.controller.as_mut() {
                    let effects = ctl.on_children(id, result);
                    self.run_effects(effects);
                }
            }
            AppMessage::SeekFlush(token) => {
                self.seek_flush = None;
                if let Some(ctl) = self.controller.as_mut() {
                    let effects = ctl.flush_seek(token);
                    self.run_effects(effects);
                }
            }
        }
    }

    fn on_engine_event(&mut self, ev: EngineEvent) {
        let Some(ctl) = self.controller.as_mut() else {
            debug!("engine event with no player open: {:?}", ev);
            return;
        };
        let effects = ctl.on_engine_event(ev);
        self.run_effects(effects);
    }

    // ── Effects ───────────────────────────────────────────────────────────────

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PromptResume(prompt) => self.player_view.prompt_resume(prompt),
                Effect::FetchDecision { id, query } => {
                    let catalog = Arc::clone(&self.catalog);
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let result = catalog.playback_decision(query).await;
                        let _ = tx.send(AppMessage::Decision { id, result }).await;
                    });
                }
                Effect::FetchChildren { id, parent } => {
                    let catalog = Arc::clone(&self.catalog);
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let result = catalog.children(parent).await;
                        let _ = tx.send(AppMessage::Children { id, result }).await;
                    });
                }
                Effect::ReportTimeline { id, report } => {
                    let catalog = Arc::clone(&self.catalog);
                    tokio::spawn(async move {
                        if let Err(e) = catalog.report_timeline(report).await {
                            warn!("timeline report {:?} failed: {}", id, e);
                        }
                    });
                }
                Effect::ScheduleSeekFlush { token, delay } => {
                    if let Some(h) = self.seek_flush.take() {
                        h.abort();
                    }
                    let tx = self.tx.clone();
                    let handle = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(AppMessage::SeekFlush(token)).await;
                    });
                    self.seek_flush = Some(handle.abort_handle());
                }
                Effect::CancelTimers => {
                    if let Some(h) = self.seek_flush.take() {
                        h.abort();
                    }
                }
                Effect::Notify(message) => self.toast.info(message),
                Effect::ShowError(message) => self.player_view.show_error(message),
                Effect::Exit => self.leave_player(),
            }
        }
    }

    fn leave_player(&mut self) {
        self.controller = None;
        self.player_view.reset();
        self.images.resume();
        if let Some(h) = self.seek_flush.take() {
            h.abort();
        }
        // Watch state changed; refetch what the detail pane shows.
        let shown = self.detail.item().map(|i| i.rating_key);
        match shown {
            Some(key) => {
                self.state.screen = Screen::Detail;
                self.detail.mark_loading();
                self.spawn_metadata(key);
            }
            None => self.state.screen = Screen::Home,
        }
        debug!("player closed");
    }

    // ── Catalog fetches ───────────────────────────────────────────────────────

    fn spawn_sections(&self) {
        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = catalog.library_sections().await;
            let _ = tx.send(AppMessage::Sections(result)).await;
        });
    }

    fn spawn_page(&self, req: PageRequest) {
        debug!("fetching section {} items {}+{}", req.section, req.start, req.count);
        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = catalog.library_items(req.section, req.start, req.count).await;
            let _ = tx
                .send(AppMessage::Page {
                    section: req.section,
                    start: req.start,
                    result,
                })
                .await;
        });
    }

    fn spawn_metadata(&self, key: RatingKey) {
        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = catalog.metadata(key).await;
            let _ = tx.send(AppMessage::Metadata { key, result }).await;
        });
    }

    fn open_section(&mut self, index: usize) {
        let Some(lib) = self.state.sections.get(index) else {
            return;
        };
        self.state.current_section = Some(index);
        if let Some(req) = self.browse.open_section(lib.key, &lib.title) {
            self.spawn_page(req);
        }
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return vec![Action::Quit];
        }

        // Help overlay captures all keys when visible
        if self.help_overlay.visible {
            return self.help_overlay.handle_key(key, &self.state);
        }

        // The player owns the keyboard, including q and Esc.
        if self.state.screen == Screen::Player {
            return self.player_view.handle_key(key, &self.state);
        }

        match key.code {
            KeyCode::Char('?') => return vec![Action::ToggleHelp],
            KeyCode::Char('q') if key.modifiers == KeyModifiers::NONE => return vec![Action::Quit],
            _ => {}
        }

        if self.state.screen == Screen::Detail {
            return self.detail.handle_key(key, &self.state);
        }

        match key.code {
            KeyCode::Tab => return vec![Action::FocusNext],
            KeyCode::BackTab => return vec![Action::FocusPrev],
            KeyCode::Char('1') => return vec![Action::FocusPane(ComponentId::Sections)],
            KeyCode::Char('2') => return vec![Action::FocusPane(ComponentId::Browse)],
            KeyCode::Char('r') => return vec![Action::Refresh],
            _ => {}
        }

        match self.focus.current() {
            Some(ComponentId::Sections) => self.sections.handle_key(key, &self.state),
            Some(ComponentId::Browse) => self.browse.handle_key(key, &self.state),
            _ => vec![],
        }
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        // Broadcast to components first so overlays can react.
        let secondary = self.help_overlay.on_action(&action, &self.state);

        self.apply_action(action).await;

        // Dispatch any secondary actions (depth-limited to 1 level)
        for a in secondary {
            self.apply_action(a).await;
        }
    }

    async fn apply_action(&mut self, action: Action) {
        match &action {
            Action::Player(PlayerAction::Touch) | Action::Noop | Action::Resize(..) => {}
            _ => debug!("apply_action: {:?}", action),
        }
        match action {
            // ── Navigation ────────────────────────────────────────────────────
            Action::FocusNext => {
                self.focus.next();
            }
            Action::FocusPrev => {
                self.focus.prev();
            }
            Action::FocusPane(id) => self.focus.set(id),
            Action::FocusEscaped(ComponentId::Sections, Direction::Down) => {
                self.focus.set(ComponentId::Browse);
            }
            Action::FocusEscaped(ComponentId::Browse, Direction::Up) => {
                self.focus.set(ComponentId::Sections);
            }
            Action::FocusEscaped(..) => {}
            Action::Back => {
                if self.state.screen == Screen::Detail {
                    self.state.screen = Screen::Home;
                    self.focus.set(ComponentId::Browse);
                }
            }

            // ── Catalog ───────────────────────────────────────────────────────
            Action::OpenSection(index) => {
                self.open_section(index);
                self.focus.set(ComponentId::Browse);
            }
            Action::OpenDetail(item) => {
                let key = item.rating_key;
                self.detail.open(item);
                self.state.screen = Screen::Detail;
                self.spawn_metadata(key);
            }
            Action::RequestNextPage => {
                if let Some(req) = self.browse.next_page_request() {
                    self.spawn_page(req);
                }
            }
            Action::Refresh => {
                self.state.sections_loading = true;
                self.state.sections_error = None;
                self.toast.spinner("Loading libraries");
                self.spawn_sections();
                if let Some(req) = self.browse.refresh() {
                    self.spawn_page(req);
                }
            }

            // ── Playback ──────────────────────────────────────────────────────
            Action::Play { item, media_index } => self.start_playback(item, media_index).await,
            Action::Player(pa) => self.apply_player_action(pa),

            // ── System ────────────────────────────────────────────────────────
            Action::Quit => self.should_quit = true,
            Action::ToggleHelp | Action::Resize(..) | Action::Noop => {}
        }
    }

    async fn start_playback(&mut self, item: MediaItem, media_index: usize) {
        if self.controller.is_some() {
            self.toast.warning("A player is already open");
            return;
        }
        let lease = match self.engine.acquire() {
            Ok(lease) => lease,
            Err(e) => {
                warn!("{}", e);
                self.toast.error(e.to_string());
                return;
            }
        };
        let settings = self.settings.get().await;
        info!("playing {} ({}) version {}", item.title, item.rating_key, media_index);

        // Artwork waits while the stream negotiates and buffers.
        self.images.pause();

        let mut request = PlaybackRequest::new(item)
            .with_quality(settings.playback.max_bitrate, settings.playback.resolution.clone());
        request.media_index = media_index;

        let mut ctl = PlaybackController::new(lease, ControllerConfig::from(&settings.playback));
        let effects = ctl.start(request);
        self.controller = Some(ctl);
        self.state.screen = Screen::Player;
        self.reset_player_ticks = true;
        self.run_effects(effects);
    }

    fn apply_player_action(&mut self, action: PlayerAction) {
        let Some(ctl) = self.controller.as_mut() else {
            return;
        };
        let effects = match action {
            PlayerAction::TogglePause => {
                ctl.toggle_pause();
                vec![]
            }
            PlayerAction::SeekForward => ctl.seek_forward(),
            PlayerAction::SeekBackward => ctl.seek_backward(),
            PlayerAction::ToggleOsd => {
                ctl.toggle_osd();
                vec![]
            }
            PlayerAction::ToggleStats => {
                ctl.toggle_stats();
                vec![]
            }
            PlayerAction::CycleAudio => ctl.cycle_audio(),
            PlayerAction::CycleSubtitles => ctl.cycle_subtitles(),
            PlayerAction::SetTrack(kind, id) => {
                ctl.set_track(kind, id);
                ctl.touch();
                vec![]
            }
            PlayerAction::Resume(resume) => ctl.choose_resume(resume),
            PlayerAction::AcknowledgeError => ctl.acknowledge_error(),
            PlayerAction::Close => ctl.close(),
            PlayerAction::Touch => {
                ctl.touch();
                vec![]
            }
        };
        self.run_effects(effects);
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn refresh_player_snapshot(&mut self) {
        if let Some(ctl) = &self.controller {
            self.player_view.set_snapshot(PlayerSnapshot::capture(ctl));
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let area = frame.area();
        frame.render_widget(Block::default().style(Style::default().bg(C_BG)), area);

        let [header_area, body_area, status_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(area);

        match self.state.screen {
            Screen::Player => {
                let [player_area, keys_area] =
                    Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);
                self.player_view.draw(frame, player_area, true, &self.state);
                if self.player_view.snapshot().osd_visible {
                    status_bar::draw_keys_bar(frame, keys_area, Screen::Player);
                }
            }
            Screen::Detail => {
                self.header.draw(frame, header_area, false, &self.state);
                self.detail.draw(frame, body_area, true, &self.state);
                status_bar::draw_keys_bar(frame, status_area, Screen::Detail);
            }
            Screen::Home => {
                self.header.draw(frame, header_area, false, &self.state);
                let [row_area, grid_area] =
                    Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(body_area);
                let sections_focused = self.focus.is_focused(ComponentId::Sections);
                let browse_focused = self.focus.is_focused(ComponentId::Browse);
                self.sections.draw(frame, row_area, sections_focused, &self.state);
                self.browse.draw(frame, grid_area, browse_focused, &self.state);
                status_bar::draw_keys_bar(frame, status_area, Screen::Home);
            }
        }

        // ── Help overlay (on top of everything) ──────────────────────────────
        self.help_overlay.draw(frame, area, false, &self.state);

        // ── Toast notifications (topmost layer) ──────────────────────────────
        self.toast.draw(frame, area);
    }
}
