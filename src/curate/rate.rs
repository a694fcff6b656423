// src/curate/rate.rs
//! Importance rating (batched and single-item) plus top-N selection.
//! The batch path never fails: any error degrades to uniform neutral scores
//! so the pipeline keeps moving.

use anyhow::{bail, Context, Result};
use metrics::counter;
use serde_json::Value;
use tracing::{info, warn};

use crate::ai_client::{DynChatClient, GenerateRequest};
use crate::curate::{clamp01, extract_json, RatedItem, RatingResult};
use crate::prompts;

const FALLBACK_SCORE: f32 = 0.5;
const FALLBACK_REASONING: &str = "Fallback due to rating error";

pub struct Ranker {
    client: DynChatClient,
}

impl Ranker {
    pub fn new(client: DynChatClient) -> Self {
        Self { client }
    }

    /// Rate all texts in one batched call. Length- and order-preserving;
    /// every score lies in `[0, 1]`. On any failure every item gets a
    /// neutral 0.5 instead.
    pub async fn rate_batch(&self, texts: &[String]) -> Vec<RatingResult> {
        crate::curate::ensure_metrics_described();
        if texts.is_empty() {
            return Vec::new();
        }
        match self.try_rate_batch(texts).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = ?e, count = texts.len(), "batch rating failed, using neutral scores");
                counter!("curate_rate_fallback_total").increment(1);
                texts
                    .iter()
                    .map(|_| RatingResult {
                        score: FALLBACK_SCORE,
                        reasoning: FALLBACK_REASONING.to_string(),
                    })
                    .collect()
            }
        }
    }

    async fn try_rate_batch(&self, texts: &[String]) -> Result<Vec<RatingResult>> {
        let numbered = texts
            .iter()
            .enumerate()
            .map(|(i, text)| format!("{}. {text}", i + 1))
            .collect::<Vec<_>>()
            .join("\n\n");

        let raw = self
            .client
            .generate(GenerateRequest {
                system: Some(prompts::RATE_BATCH_SYSTEM),
                user_turns: vec![prompts::rate_batch_user(&numbered)],
                temperature: 0.3,
                max_tokens: None,
            })
            .await?;

        let values: Vec<Value> = serde_json::from_str(extract_json(&raw))
            .context("batch rating response is not a JSON array")?;
        if values.len() != texts.len() {
            bail!(
                "batch rating length mismatch: sent {}, got {}",
                texts.len(),
                values.len()
            );
        }
        Ok(values.iter().map(parse_rating).collect())
    }

    /// Single-item variant for ad-hoc scoring. Unlike the batch path this
    /// raises on empty input and unparseable responses.
    pub async fn rate_content(&self, content: &str) -> Result<RatingResult> {
        if content.trim().is_empty() {
            bail!("content must not be empty");
        }
        let raw = self
            .client
            .generate(GenerateRequest {
                system: Some(prompts::RATE_SYSTEM),
                user_turns: vec![prompts::rate_user(content)],
                temperature: 0.3,
                max_tokens: None,
            })
            .await?;
        let value: Value = serde_json::from_str(extract_json(&raw))
            .context("rating response is not valid JSON")?;
        let result = parse_rating(&value);
        info!(score = result.score, "content rated");
        Ok(result)
    }
}

fn parse_rating(value: &Value) -> RatingResult {
    let score = value
        .get("score")
        .and_then(Value::as_f64)
        .unwrap_or(FALLBACK_SCORE as f64) as f32;
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or("No reasoning provided")
        .to_string();
    RatingResult {
        score: clamp01(score),
        reasoning,
    }
}

/// Top-N selection: stable descending sort by score (ties keep collection
/// order), truncated to `top_n`. No error conditions.
pub fn select_top(mut rated: Vec<RatedItem>, top_n: usize) -> Vec<RatedItem> {
    rated.sort_by(|a, b| b.score.total_cmp(&a.score));
    rated.truncate(top_n);
    rated
}
