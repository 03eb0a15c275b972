//! AppState: data shared read-only with every component.

use marquee_proto::model::Library;

use crate::action::Screen;

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub server_name: String,
    pub username: String,
    pub sections: Vec<Library>,
    /// Index into `sections` of the section being browsed.
    pub current_section: Option<usize>,
    pub sections_loading: bool,
    pub sections_error: Option<String>,
    pub page_size: usize,
}

impl AppState {
    pub fn new(server_name: String, username: String, page_size: usize) -> Self {
        Self {
            screen: Screen::Home,
            server_name,
            username,
            sections: Vec::new(),
            current_section: None,
            sections_loading: true,
            sections_error: None,
            page_size: page_size.max(1),
        }
    }

    pub fn section(&self) -> Option<&Library> {
        self.current_section.and_then(|i| self.sections.get(i))
    }
}
