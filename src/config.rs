// src/config.rs
//! Curator configuration: TOML file with serde defaults, sanitized on load,
//! with env overrides for the model endpoint. Invalid values fall back to
//! defaults instead of failing startup.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/curator.toml";

pub const ENV_MODEL: &str = "MODEL";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";

fn default_model() -> String {
    "google/gemini-2.0-flash-exp:free".to_string()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_target_channel() -> String {
    "@digest_channel".to_string()
}
fn default_top_n() -> usize {
    15
}
fn default_posting_times() -> Vec<String> {
    vec!["00:00".to_string()]
}
fn default_tz_offset_hours() -> i32 {
    3
}
fn default_hashtag() -> String {
    "#DIGEST".to_string()
}
fn default_preview_len() -> usize {
    200
}
fn default_spool_dir() -> PathBuf {
    PathBuf::from("spool")
}
fn default_cache_file() -> PathBuf {
    PathBuf::from("news_cache.json")
}
fn default_processed_file() -> PathBuf {
    PathBuf::from("processed_messages.json")
}
fn default_web_news_file() -> PathBuf {
    PathBuf::from("web_news.json")
}
fn default_web_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Channels the external fetcher tracks; informational for the pipeline.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_target_channel")]
    pub target_channel: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// "HH:MM" entries checked against the publication timezone.
    #[serde(default = "default_posting_times")]
    pub posting_times: Vec<String>,
    /// Fixed publication timezone offset, in hours east of UTC.
    #[serde(default = "default_tz_offset_hours")]
    pub tz_offset_hours: i32,
    #[serde(default = "default_hashtag")]
    pub hashtag: String,
    /// Per-item preview length for the dedup payload, in chars.
    #[serde(default = "default_preview_len")]
    pub preview_len: usize,
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(default = "default_processed_file")]
    pub processed_file: PathBuf,
    #[serde(default = "default_web_news_file")]
    pub web_news_file: PathBuf,
    /// Bind address for the digest web view binary.
    #[serde(default = "default_web_bind")]
    pub web_bind: String,
    #[serde(default)]
    pub ai: AiSettings,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            target_channel: default_target_channel(),
            top_n: default_top_n(),
            posting_times: default_posting_times(),
            tz_offset_hours: default_tz_offset_hours(),
            hashtag: default_hashtag(),
            preview_len: default_preview_len(),
            spool_dir: default_spool_dir(),
            cache_file: default_cache_file(),
            processed_file: default_processed_file(),
            web_news_file: default_web_news_file(),
            web_bind: default_web_bind(),
            ai: AiSettings::default(),
        }
    }
}

impl CuratorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let mut cfg: CuratorConfig = toml::from_str(&data)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load the config or fall back to defaults (with env overrides applied
    /// either way).
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(
                    path = %path.as_ref().display(),
                    error = ?e,
                    "config not loaded, using defaults"
                );
                let mut cfg = Self::default();
                cfg.sanitize();
                cfg
            }
        }
    }

    fn sanitize(&mut self) {
        if self.top_n == 0 {
            self.top_n = default_top_n();
        }
        if self.preview_len == 0 {
            self.preview_len = default_preview_len();
        }
        if !(-12..=14).contains(&self.tz_offset_hours) {
            self.tz_offset_hours = default_tz_offset_hours();
        }
        if self.web_bind.trim().is_empty() {
            self.web_bind = default_web_bind();
        }
        if let Ok(model) = std::env::var(ENV_MODEL) {
            if !model.trim().is_empty() {
                self.ai.model = model;
            }
        }
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.trim().is_empty() {
                self.ai.base_url = url;
            }
        }
    }

    /// Publication timezone as a fixed offset. `sanitize` keeps the hour
    /// range valid, so construction cannot fail.
    pub fn tz(&self) -> FixedOffset {
        let hours = self.tz_offset_hours.clamp(-12, 14);
        FixedOffset::east_opt(hours * 3600).expect("valid tz offset")
    }

    /// Whether a digest should be posted at `now_utc` per the schedule.
    pub fn should_post_now(&self, now_utc: DateTime<Utc>) -> bool {
        let local = now_utc.with_timezone(&self.tz());
        let hm = local.format("%H:%M").to_string();
        self.posting_times.iter().any(|t| t == &hm)
    }
}
