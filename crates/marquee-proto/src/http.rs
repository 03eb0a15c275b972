//! `CatalogService` over the media server's JSON HTTP API.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{CatalogError, CatalogResult, CatalogService};
use crate::config::{ServerEntry, Settings};
use crate::model::{
    DecisionQuery, ItemPage, Library, MediaItem, PlaybackInfo, RatingKey, StreamProtocol,
    TimelineReport,
};

const PRODUCT: &str = "marquee";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MediaContainer")]
    container: Container,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Container {
    total_size: Option<usize>,
    size: usize,
    #[serde(rename = "Directory")]
    directories: Vec<Library>,
    #[serde(rename = "Metadata")]
    metadata: Vec<MediaItem>,
    general_decision_text: String,
    direct_play_decision_code: Option<u32>,
    direct_play_decision_text: String,
    transcode_decision_text: String,
}

pub struct HttpCatalog {
    client: Client,
    base_url: String,
    token: String,
    client_id: String,
}

impl HttpCatalog {
    pub fn new(base_url: &str, token: &str, client_id: &str) -> CatalogResult<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client_id: client_id.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> CatalogResult<Self> {
        let server: &ServerEntry = settings.server().ok_or(CatalogError::NoServer)?;
        Self::new(
            &server.base_url,
            &settings.token_for(server),
            &settings.auth.client_id,
        )
    }

    fn request(&self, path: &str, session_id: Option<&str>) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .header("X-Plex-Product", PRODUCT)
            .header("X-Plex-Version", env!("CARGO_PKG_VERSION"))
            .header("X-Plex-Client-Identifier", &self.client_id)
            .header("X-Plex-Platform", std::env::consts::OS);
        if !self.token.is_empty() {
            req = req.header("X-Plex-Token", &self.token);
        }
        if let Some(id) = session_id {
            req = req.header("X-Plex-Session-Identifier", id);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> CatalogResult<reqwest::Response> {
        let resp = req.send().await?;
        match resp.status() {
            StatusCode::UNAUTHORIZED => Err(CatalogError::Unauthorized),
            s if !s.is_success() => Err(CatalogError::Status(s.as_u16())),
            _ => Ok(resp),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> CatalogResult<T> {
        let resp = self.send(req).await?;
        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn container(&self, req: reqwest::RequestBuilder) -> CatalogResult<Container> {
        Ok(self.fetch::<Envelope>(req).await?.container)
    }

    async fn decision(&self, query: DecisionQuery) -> CatalogResult<PlaybackInfo> {
        let session_id = generate_session_id();
        let path = format!("/library/metadata/{}", query.rating_key);
        let direct = if query.force_transcode { "0" } else { "1" };
        let mut params: Vec<(&str, String)> = vec![
            ("path", path.clone()),
            ("mediaIndex", query.media_index.to_string()),
            ("partIndex", "0".into()),
            ("protocol", "hls".into()),
            ("directPlay", direct.into()),
            ("directStream", direct.into()),
            ("directStreamAudio", "1".into()),
            ("autoAdjustQuality", "1".into()),
            ("location", "lan".into()),
            ("transcodeSessionId", session_id.clone()),
        ];
        if query.max_bitrate > 0 {
            params.push(("videoBitrate", query.max_bitrate.to_string()));
        }
        if let Some(res) = &query.resolution {
            params.push(("videoResolution", res.clone()));
        }

        info!(
            "[catalog] decision key={} bitrate={} force={} offset={}ms",
            query.rating_key, query.max_bitrate, query.force_transcode, query.offset_ms
        );
        let req = self
            .request("/video/:/transcode/universal/decision", Some(&session_id))
            .query(&params);
        let container = self.container(req).await?;

        let direct_playable = container
            .direct_play_decision_code
            .is_some_and(|c| (1000..2000).contains(&c));
        let part_key = container
            .metadata
            .first()
            .and_then(|m| m.media.first())
            .and_then(|m| m.parts.first())
            .map(|p| p.key.clone())
            .filter(|k| !k.is_empty());

        let (playback_url, protocol) = match part_key {
            Some(key) if !query.force_transcode => {
                (self.direct_url(&key)?, StreamProtocol::Http)
            }
            _ => (self.hls_url(&query, &session_id)?, StreamProtocol::Hls),
        };
        debug!("[catalog] playback url ({:?}): {}", protocol, playback_url);

        Ok(PlaybackInfo {
            direct_playable,
            playback_url,
            protocol,
            session_id: if protocol == StreamProtocol::Hls {
                session_id
            } else {
                String::new()
            },
            general_decision: container.general_decision_text,
            direct_play_decision: container.direct_play_decision_text,
            transcode_decision: container.transcode_decision_text,
        })
    }

    fn direct_url(&self, part_key: &str) -> CatalogResult<String> {
        let mut url = self.parse(&format!("{}{}", self.base_url, part_key))?;
        url.query_pairs_mut().append_pair("X-Plex-Token", &self.token);
        Ok(url.into())
    }

    fn hls_url(&self, query: &DecisionQuery, session_id: &str) -> CatalogResult<String> {
        let mut url = self.parse(&format!(
            "{}/video/:/transcode/universal/start.m3u8",
            self.base_url
        ))?;
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("path", &format!("/library/metadata/{}", query.rating_key))
                .append_pair("mediaIndex", &query.media_index.to_string())
                .append_pair("partIndex", "0")
                .append_pair("fastSeek", "1")
                .append_pair("copyts", "1")
                .append_pair("offset", &(query.offset_ms / 1000).to_string())
                .append_pair("X-Plex-Client-Identifier", &self.client_id)
                .append_pair("X-Plex-Token", &self.token)
                .append_pair("session", session_id)
                .append_pair("directStream", "0")
                .append_pair("protocol", "hls");
            if query.max_bitrate > 0 {
                q.append_pair("maxVideoBitrate", &query.max_bitrate.to_string());
            }
            if let Some(res) = &query.resolution {
                q.append_pair("videoResolution", video_resolution(res));
            }
        }
        Ok(url.into())
    }

    fn parse(&self, raw: &str) -> CatalogResult<Url> {
        Url::parse(raw).map_err(|e| CatalogError::Decode(format!("bad url {}: {}", raw, e)))
    }
}

/// Map a quality label to the frame size the transcoder expects.
pub fn video_resolution(label: &str) -> &str {
    match label {
        "1080p" => "1920x1080",
        "720p" => "1280x720",
        "480p" => "854x480",
        "360p" => "640x360",
        "320p" => "480x320",
        other => other,
    }
}

/// Fresh v4 UUID for one transcode session.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

impl CatalogService for HttpCatalog {
    fn library_sections(&self) -> BoxFuture<'_, CatalogResult<Vec<Library>>> {
        async move {
            let container = self.container(self.request("/library/sections", None)).await?;
            debug!("[catalog] {} library sections", container.directories.len());
            Ok(container.directories)
        }
        .boxed()
    }

    fn library_items(
        &self,
        section: u64,
        start: usize,
        count: usize,
    ) -> BoxFuture<'_, CatalogResult<ItemPage>> {
        async move {
            let req = self
                .request(&format!("/library/sections/{}/all", section), None)
                .query(&[
                    ("X-Plex-Container-Start", start.to_string()),
                    ("X-Plex-Container-Size", count.to_string()),
                ]);
            let container = self.container(req).await?;
            let total_size = container
                .total_size
                .unwrap_or(start + container.size.max(container.metadata.len()));
            debug!(
                "[catalog] section={} start={} got={} total={}",
                section,
                start,
                container.metadata.len(),
                total_size
            );
            Ok(ItemPage {
                items: container.metadata,
                total_size,
            })
        }
        .boxed()
    }

    fn metadata(&self, key: RatingKey) -> BoxFuture<'_, CatalogResult<MediaItem>> {
        async move {
            let req = self.request(&format!("/library/metadata/{}", key), None);
            self.container(req)
                .await?
                .metadata
                .into_iter()
                .next()
                .ok_or(CatalogError::NotFound(key))
        }
        .boxed()
    }

    fn children(&self, parent: RatingKey) -> BoxFuture<'_, CatalogResult<Vec<MediaItem>>> {
        async move {
            let req = self.request(&format!("/library/metadata/{}/children", parent), None);
            Ok(self.container(req).await?.metadata)
        }
        .boxed()
    }

    fn playback_decision(&self, query: DecisionQuery) -> BoxFuture<'_, CatalogResult<PlaybackInfo>> {
        self.decision(query).boxed()
    }

    fn report_timeline(&self, report: TimelineReport) -> BoxFuture<'_, CatalogResult<()>> {
        async move {
            let session = (!report.session_id.is_empty()).then_some(report.session_id.as_str());
            let req = self.request("/:/timeline", session).query(&[
                ("ratingKey", report.rating_key.to_string()),
                ("key", format!("/library/metadata/{}", report.rating_key)),
                ("time", report.position_ms.to_string()),
                ("duration", report.duration_ms.to_string()),
                ("state", report.state.as_str().to_string()),
                ("playbackTime", report.position_ms.to_string()),
            ]);
            self.send(req).await?;
            debug!(
                "[catalog] timeline key={} state={} time={}",
                report.rating_key, report.state, report.position_ms
            );
            Ok(())
        }
        .boxed()
    }

    fn image_url(&self, path: &str, width: u32, height: u32) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        let mut url = Url::parse(&format!("{}/photo/:/transcode", self.base_url)).ok()?;
        url.query_pairs_mut()
            .append_pair("url", path)
            .append_pair("width", &width.to_string())
            .append_pair("height", &height.to_string())
            .append_pair("X-Plex-Token", &self.token);
        Some(url.into())
    }
}
