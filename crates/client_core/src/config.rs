use std::{fs, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context};
use shared::domain::NarratorId;
use url::Url;

const SETTINGS_FILE: &str = "studio.toml";
const WS_ANALYSIS_PATH: &str = "/ws/process";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub default_narrator_id: NarratorId,
    pub default_music_genre: String,
    pub download_dir: PathBuf,
    pub request_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".into(),
            default_narrator_id: NarratorId::new("aria"),
            default_music_genre: "explainer".into(),
            download_dir: PathBuf::from("./downloads"),
            request_timeout_secs: 600,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn api_base(&self) -> anyhow::Result<Url> {
        let trimmed = self.api_base_url.trim().trim_end_matches('/');
        Url::parse(trimmed).with_context(|| format!("invalid api base url: {trimmed}"))
    }

    /// Websocket endpoint of the analysis channel, derived from the HTTP base.
    pub fn analysis_ws_url(&self) -> anyhow::Result<String> {
        let base = self.api_base_url.trim().trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(anyhow!(
                "api_base_url must start with http:// or https://, got {base}"
            ));
        };
        Ok(format!("{ws_base}{WS_ANALYSIS_PATH}"))
    }
}

pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_settings(&mut settings, &raw);
    }

    apply_env_settings(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn file_value(table: &toml::Table, key: &str) -> Option<String> {
    match table.get(key)? {
        toml::Value::String(text) => Some(text.clone()),
        toml::Value::Integer(number) => Some(number.to_string()),
        _ => None,
    }
}

fn apply_file_settings(settings: &mut ClientSettings, raw: &str) {
    let Ok(file_cfg) = raw.parse::<toml::Table>() else {
        return;
    };
    if let Some(v) = file_value(&file_cfg, "api_base_url") {
        settings.api_base_url = v;
    }
    if let Some(v) = file_value(&file_cfg, "default_narrator") {
        settings.default_narrator_id = NarratorId::new(v);
    }
    if let Some(v) = file_value(&file_cfg, "default_music_genre") {
        settings.default_music_genre = v;
    }
    if let Some(v) = file_value(&file_cfg, "download_dir") {
        settings.download_dir = PathBuf::from(v);
    }
    if let Some(v) = file_value(&file_cfg, "request_timeout_secs") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}

fn apply_env_settings(settings: &mut ClientSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("STUDIO_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = var("APP__DEFAULT_NARRATOR") {
        settings.default_narrator_id = NarratorId::new(v);
    }
    if let Some(v) = var("APP__DEFAULT_MUSIC_GENRE") {
        settings.default_music_genre = v;
    }
    if let Some(v) = var("APP__DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }
    if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
}
