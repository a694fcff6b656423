// src/curate/mod.rs
//! Curation pipeline: dedup → rate/select → summarize ⇄ moderate → format → final gate.
//! Pure orchestration lives in `cycle`; each stage is its own module.

pub mod cycle;
pub mod dedup;
pub mod format;
pub mod moderate;
pub mod rate;
pub mod summarize;

use chrono::{DateTime, Utc};
use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// One collected news post. Immutable once created; identified by
/// `(source_id, sequence_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub text: String,
    /// Channel username, e.g. "@technews".
    pub source_id: String,
    /// Message id within the channel.
    pub sequence_id: i64,
    pub collected_at: DateTime<Utc>,
}

impl Item {
    /// Stable identity key used by the processed-ID set.
    pub fn key(&self) -> String {
        format!("{}:{}", self.source_id, self.sequence_id)
    }

    /// Public link to the original post, `t.me/<channel>/<id>`.
    pub fn link(&self) -> String {
        format!(
            "t.me/{}/{}",
            self.source_id.trim_start_matches('@'),
            self.sequence_id
        )
    }
}

/// A deduplicated item: the group primary plus the source ids absorbed from
/// its duplicates. `merged_sources` is ordered, value-deduplicated, and always
/// starts with the primary's own source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedItem {
    pub item: Item,
    pub merged_sources: Vec<String>,
}

impl MergedItem {
    pub fn singleton(item: Item) -> Self {
        let source = item.source_id.clone();
        Self {
            item,
            merged_sources: vec![source],
        }
    }
}

/// Importance rating for a single text, scores always in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingResult {
    pub score: f32,
    pub reasoning: String,
}

/// A merged item together with its importance rating.
#[derive(Debug, Clone, PartialEq)]
pub struct RatedItem {
    pub item: MergedItem,
    pub score: f32,
    pub reasoning: String,
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "curate_dedup_merged_total",
            "Items absorbed into another item by deduplication."
        );
        describe_counter!(
            "curate_dedup_fallback_total",
            "Dedup calls that fell back to identity passthrough."
        );
        describe_counter!(
            "curate_rate_fallback_total",
            "Batch rating calls that fell back to neutral scores."
        );
        describe_counter!("digest_cycles_total", "Publish cycles started.");
        describe_counter!("digest_published_total", "Digests handed to the publisher.");
        describe_counter!("digest_aborted_total", "Cycles that ended without publishing.");
        describe_counter!(
            "digest_review_rounds_total",
            "Summarize/review round-trips performed."
        );
        describe_counter!(
            "digest_final_gate_blocked_total",
            "Formatted digests blocked by the final moderation gate."
        );
        describe_gauge!("digest_last_cycle_ts", "Unix ts when a publish cycle last ran.");
    });
}

/// Strip an optional Markdown code fence around a JSON payload. Models wrap
/// JSON answers in fences often enough that parsing the raw content would
/// trip the fallback paths for no good reason.
pub(crate) fn extract_json(raw: &str) -> &str {
    let s = raw.trim();
    let s = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```"))
        .unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}

/// Clamp a model-reported score into `[0, 1]`.
pub(crate) fn clamp01(x: f32) -> f32 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}
