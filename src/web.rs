// src/web.rs
//! Web rendition of the digest: a structured JSON feed regenerated after each
//! collection pass, plus the axum routes that serve it. The feed is a
//! convenience view over already-collected items; generation failures degrade
//! to a fixed "feed is refreshing" placeholder, never an error page.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::State, response::Html, routing::get, Json, Router};
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::ai_client::{DynChatClient, GenerateRequest};
use crate::curate::{extract_json, Item};
use crate::prompts;
use crate::store::NewsStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebEntry {
    pub title: String,
    pub summary: String,
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub time_ago: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebCategory {
    pub title: String,
    #[serde(default)]
    pub emoji: String,
    pub news: Vec<WebEntry>,
}

/// The whole feed as served by `/api/news` and persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebNews {
    #[serde(default)]
    pub categories: Vec<WebCategory>,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub timestamp: String,
}

impl WebNews {
    /// Feed shown before the first generation has ever run.
    pub fn welcome() -> Self {
        Self {
            categories: vec![WebCategory {
                title: "News".to_string(),
                emoji: "📰".to_string(),
                news: vec![WebEntry {
                    title: "Welcome to the digest".to_string(),
                    summary: "Your personal news digest across technology, education \
                              and science. The feed updates automatically."
                        .to_string(),
                    source: "digest-curator".to_string(),
                    url: "#".to_string(),
                    image: String::new(),
                    time_ago: "just now".to_string(),
                    category: "Welcome".to_string(),
                }],
            }],
            last_updated: "Loading...".to_string(),
            timestamp: String::new(),
        }
    }

    /// Feed substituted when generation fails on a non-empty batch.
    fn refreshing() -> Self {
        Self {
            categories: vec![WebCategory {
                title: "Technology".to_string(),
                emoji: "🚀".to_string(),
                news: vec![WebEntry {
                    title: "The feed is refreshing".to_string(),
                    summary: "The news feed is being updated right now. Reload the page \
                              in a few minutes."
                        .to_string(),
                    source: "digest-curator".to_string(),
                    url: "#".to_string(),
                    image: String::new(),
                    time_ago: "just now".to_string(),
                    category: "System".to_string(),
                }],
            }],
            last_updated: String::new(),
            timestamp: String::new(),
        }
    }
}

/// Generates the structured feed from the raw item cache.
pub struct WebNewsBuilder {
    client: DynChatClient,
    tz: FixedOffset,
}

impl WebNewsBuilder {
    pub fn new(client: DynChatClient, tz: FixedOffset) -> Self {
        Self { client, tz }
    }

    /// Build the feed for the current cache. Empty input yields an empty
    /// (but stamped) feed without a call; generation errors yield the
    /// refreshing placeholder.
    pub async fn generate(&self, items: &[Item]) -> WebNews {
        let mut news = if items.is_empty() {
            WebNews {
                categories: Vec::new(),
                last_updated: String::new(),
                timestamp: String::new(),
            }
        } else {
            match self.try_generate(items).await {
                Ok(news) => news,
                Err(e) => {
                    warn!(error = ?e, "web feed generation failed, serving placeholder");
                    WebNews::refreshing()
                }
            }
        };
        let now = Utc::now();
        news.timestamp = now.to_rfc3339();
        news.last_updated = now.with_timezone(&self.tz).format("%d.%m.%Y %H:%M").to_string();
        news
    }

    async fn try_generate(&self, items: &[Item]) -> Result<WebNews> {
        let news_list = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let preview: String = item.text.chars().take(200).collect();
                format!("{}. {} | Source: {} | Link: {}", i + 1, preview, item.source_id, item.link())
            })
            .collect::<Vec<_>>()
            .join("\n");

        let raw = self
            .client
            .generate(GenerateRequest {
                system: Some(prompts::WEB_NEWS_SYSTEM),
                user_turns: vec![prompts::web_news_user(&news_list)],
                temperature: 0.7,
                max_tokens: Some(4000),
            })
            .await?;

        serde_json::from_str(extract_json(&raw)).context("web feed response is not valid JSON")
    }
}

// ------------------------------------------------------------
// Routes
// ------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    store: Arc<NewsStore>,
}

pub fn create_router(store: Arc<NewsStore>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/", get(index))
        .route("/api/news", get(api_news))
        .layer(CorsLayer::very_permissive())
        .with_state(AppState { store })
}

async fn api_news(State(state): State<AppState>) -> Json<WebNews> {
    Json(state.store.load_web_news().unwrap_or_else(WebNews::welcome))
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let news = state.store.load_web_news().unwrap_or_else(WebNews::welcome);
    Html(render_index(&news))
}

fn render_index(news: &WebNews) -> String {
    use std::fmt::Write as _;

    let mut body = String::new();
    for cat in &news.categories {
        let _ = write!(
            body,
            "<section><h2>{} {}</h2><ul>",
            html_escape::encode_text(&cat.emoji),
            html_escape::encode_text(&cat.title)
        );
        for entry in &cat.news {
            let _ = write!(
                body,
                "<li><a href=\"{}\">{}</a> — {} <small>{} · {}</small></li>",
                html_escape::encode_double_quoted_attribute(&entry.url),
                html_escape::encode_text(&entry.title),
                html_escape::encode_text(&entry.summary),
                html_escape::encode_text(&entry.source),
                html_escape::encode_text(&entry.time_ago),
            );
        }
        body.push_str("</ul></section>");
    }

    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>News digest</title></head>\
         <body><h1>News digest</h1><p>Updated: {}</p>{}</body></html>",
        html_escape::encode_text(&news.last_updated),
        body
    )
}
