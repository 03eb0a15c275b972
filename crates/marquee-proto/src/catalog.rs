//! Contract for the remote catalog.
//!
//! Implementations return boxed futures so the UI can hold an
//! `Arc<dyn CatalogService>` and spawn each call onto the runtime.

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::model::{
    DecisionQuery, ItemPage, Library, MediaItem, PlaybackInfo, RatingKey, TimelineReport,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("no server selected")]
    NoServer,
    #[error("not authorized; sign in again")]
    Unauthorized,
    #[error("item {0} not found")]
    NotFound(RatingKey),
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Decode(e.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

pub trait CatalogService: Send + Sync {
    fn library_sections(&self) -> BoxFuture<'_, CatalogResult<Vec<Library>>>;

    fn library_items(
        &self,
        section: u64,
        start: usize,
        count: usize,
    ) -> BoxFuture<'_, CatalogResult<ItemPage>>;

    fn metadata(&self, key: RatingKey) -> BoxFuture<'_, CatalogResult<MediaItem>>;

    fn children(&self, parent: RatingKey) -> BoxFuture<'_, CatalogResult<Vec<MediaItem>>>;

    fn playback_decision(&self, query: DecisionQuery) -> BoxFuture<'_, CatalogResult<PlaybackInfo>>;

    fn report_timeline(&self, report: TimelineReport) -> BoxFuture<'_, CatalogResult<()>>;

    /// Absolute URL for an image path such as an item's `thumb`.
    fn image_url(&self, path: &str, width: u32, height: u32) -> Option<String>;
}
