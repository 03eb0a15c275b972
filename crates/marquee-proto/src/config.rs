use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::platform;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
    /// `machine_id` of the selected entry in `servers`.
    #[serde(default)]
    pub current_server: Option<String>,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub ui: UiSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    #[serde(default = "default_seek_increment")]
    pub seek_increment_secs: u32,
    #[serde(default = "default_autoplay_next")]
    pub autoplay_next: bool,
    /// Engine demuxer cache in MiB.
    #[serde(default = "default_cache_mb")]
    pub cache_mb: u32,
    #[serde(default = "default_osd_timeout")]
    pub osd_timeout_secs: u32,
    /// kbps; 0 plays the original quality.
    #[serde(default)]
    pub max_bitrate: u32,
    #[serde(default)]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub machine_id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub access_token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_span_count")]
    pub span_count: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            seek_increment_secs: default_seek_increment(),
            autoplay_next: default_autoplay_next(),
            cache_mb: default_cache_mb(),
            osd_timeout_secs: default_osd_timeout(),
            max_bitrate: 0,
            resolution: None,
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            span_count: default_span_count(),
        }
    }
}

fn default_seek_increment() -> u32 {
    10
}

fn default_autoplay_next() -> bool {
    true
}

fn default_cache_mb() -> u32 {
    50
}

fn default_osd_timeout() -> u32 {
    5
}

fn default_page_size() -> usize {
    50
}

fn default_span_count() -> usize {
    4
}

impl Settings {
    /// The selected server, or the first one when nothing is selected.
    pub fn server(&self) -> Option<&ServerEntry> {
        match &self.current_server {
            Some(id) => self.servers.iter().find(|s| &s.machine_id == id),
            None => self.servers.first(),
        }
    }

    /// Token to send with catalog requests: the server's own token wins.
    pub fn token_for(&self, server: &ServerEntry) -> String {
        if server.access_token.is_empty() {
            self.auth.token.clone()
        } else {
            server.access_token.clone()
        }
    }

    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.auth.expires_at.is_some_and(|t| t <= now)
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("settings.toml")
    }

    /// Read settings from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let mut settings = Self::default();
            settings.ensure_client_id();
            settings.save_to(path)?;
            return Ok(settings);
        }

        let content = std::fs::read_to_string(path)?;
        let mut settings: Self = toml::from_str(&content)?;
        if settings.ensure_client_id() {
            settings.save_to(path)?;
        }
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns true when an id had to be generated.
    fn ensure_client_id(&mut self) -> bool {
        if !self.auth.client_id.is_empty() {
            return false;
        }
        self.auth.client_id = generate_client_id();
        true
    }
}

fn generate_client_id() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| format!("{:x}", rng.gen_range(0..16u8)))
        .collect()
}

/// Shared, persisted settings.  Every mutation goes through [`update`] and is
/// written back to disk before the call returns.
///
/// [`update`]: SettingsStore::update
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
}

impl SettingsStore {
    pub fn open_default() -> anyhow::Result<Self> {
        Self::open(Settings::config_path())
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let settings = Settings::load_from(&path)?;
        tracing::debug!("settings loaded from {}", path.display());
        Ok(Self {
            settings: Arc::new(RwLock::new(settings)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn update<F>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut Settings),
    {
        let snapshot = {
            let mut settings = self.settings.write().await;
            f(&mut settings);
            settings.clone()
        };
        snapshot.save_to(&self.path)
    }

    pub async fn set_current_server(&self, machine_id: &str) -> anyhow::Result<()> {
        let id = machine_id.to_string();
        self.update(move |s| s.current_server = Some(id)).await
    }

    pub async fn set_auth(
        &self,
        token: String,
        username: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        self.update(move |s| {
            s.auth.token = token;
            s.auth.username = username;
            s.auth.expires_at = expires_at;
        })
        .await
    }

    pub async fn clear_auth(&self) -> anyhow::Result<()> {
        self.update(|s| {
            s.auth.token.clear();
            s.auth.username.clear();
            s.auth.expires_at = None;
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.playback.seek_increment_secs, 10);
        assert!(settings.playback.autoplay_next);
        assert_eq!(settings.playback.cache_mb, 50);
        assert_eq!(settings.playback.osd_timeout_secs, 5);
        assert_eq!(settings.ui.span_count, 4);
        assert!(settings.server().is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let raw = r#"
            current_server = "b"

            [playback]
            seek_increment_secs = 30

            [[servers]]
            machine_id = "a"
            name = "Attic"
            base_url = "http://10.0.0.2:32400"

            [[servers]]
            machine_id = "b"
            name = "Basement"
            base_url = "http://10.0.0.3:32400"
            access_token = "server-token"
        "#;
        let settings: Settings = toml::from_str(raw).unwrap();
        assert_eq!(settings.playback.seek_increment_secs, 30);
        assert!(settings.playback.autoplay_next);
        let server = settings.server().unwrap();
        assert_eq!(server.name, "Basement");
        assert_eq!(settings.token_for(server), "server-token");
    }

    #[test]
    fn test_token_expiry() {
        let now = Utc::now();
        let mut settings = Settings::default();
        assert!(!settings.token_expired(now));
        settings.auth.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(settings.token_expired(now));
    }

    #[test]
    fn test_client_id_shape() {
        let id = generate_client_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
