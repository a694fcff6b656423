// src/curate/dedup.rs
//! LLM-assisted near-duplicate detection. Dedup is an optimization, not a
//! correctness requirement: every failure path degrades to identity
//! passthrough and the cycle carries on.

use anyhow::{Context, Result};
use metrics::counter;
use serde::Deserialize;
use tracing::{info, warn};

use crate::ai_client::{DynChatClient, GenerateRequest};
use crate::curate::{extract_json, Item, MergedItem};
use crate::prompts;

pub struct Deduplicator {
    client: DynChatClient,
    /// Per-item preview length sent to the model, in chars.
    preview_len: usize,
}

#[derive(Deserialize)]
struct GroupsResponse {
    #[serde(default)]
    groups: Vec<Vec<usize>>,
}

impl Deduplicator {
    pub fn new(client: DynChatClient, preview_len: usize) -> Self {
        Self {
            client,
            preview_len,
        }
    }

    /// Collapse near-duplicate items into merged items. Group order follows
    /// the classifier's answer; ungrouped items keep their original order.
    /// Every input index is emitted exactly once, as a primary or absorbed
    /// into one.
    pub async fn dedupe(&self, items: Vec<Item>) -> Vec<MergedItem> {
        crate::curate::ensure_metrics_described();
        if items.len() <= 1 {
            return items.into_iter().map(MergedItem::singleton).collect();
        }

        match self.fetch_groups(&items).await {
            Ok(groups) => {
                let before = items.len();
                let merged = apply_groups(items, &groups);
                let absorbed = before - merged.len();
                counter!("curate_dedup_merged_total").increment(absorbed as u64);
                info!(before, after = merged.len(), absorbed, "dedup finished");
                merged
            }
            Err(e) => {
                warn!(error = ?e, "dedup failed, keeping items as-is");
                counter!("curate_dedup_fallback_total").increment(1);
                items.into_iter().map(MergedItem::singleton).collect()
            }
        }
    }

    async fn fetch_groups(&self, items: &[Item]) -> Result<Vec<Vec<usize>>> {
        let news_list = items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("ID {i}: {}", preview(&item.text, self.preview_len)))
            .collect::<Vec<_>>()
            .join("\n\n");

        let raw = self
            .client
            .generate(GenerateRequest {
                system: Some(prompts::DEDUP_SYSTEM),
                user_turns: vec![prompts::dedup_user(items.len(), &news_list)],
                temperature: 0.1,
                max_tokens: Some(500),
            })
            .await?;

        let parsed: GroupsResponse =
            serde_json::from_str(extract_json(&raw)).context("dedup response is not valid JSON")?;
        Ok(parsed.groups)
    }
}

/// Apply duplicate groups over the item batch. The first listed index of each
/// group becomes the primary (text kept verbatim); later indices contribute
/// only their source id. Out-of-range and already-consumed indices are
/// ignored; anything left ungrouped is appended in original order.
pub(crate) fn apply_groups(items: Vec<Item>, groups: &[Vec<usize>]) -> Vec<MergedItem> {
    let n = items.len();
    let mut slots: Vec<Option<Item>> = items.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(n);

    for group in groups {
        let Some(&p) = group.first() else { continue };
        if p >= n {
            continue;
        }
        let Some(primary) = slots[p].take() else {
            continue;
        };
        let mut merged = MergedItem::singleton(primary);
        for &d in &group[1..] {
            if d >= n {
                continue;
            }
            if let Some(dup) = slots[d].take() {
                if !dup.source_id.is_empty() && !merged.merged_sources.contains(&dup.source_id) {
                    merged.merged_sources.push(dup.source_id);
                }
            }
        }
        out.push(merged);
    }

    for slot in slots.iter_mut() {
        if let Some(item) = slot.take() {
            out.push(MergedItem::singleton(item));
        }
    }

    out
}

/// Char-safe preview used to bound the classifier payload.
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(src: &str, seq: i64, text: &str) -> Item {
        Item {
            text: text.into(),
            source_id: src.into(),
            sequence_id: seq,
            collected_at: Utc::now(),
        }
    }

    fn batch() -> Vec<Item> {
        vec![
            item("@a", 1, "rocket launch"),
            item("@b", 2, "rocket launched today"),
            item("@c", 3, "unrelated grant news"),
            item("@d", 4, "the rocket went up"),
            item("@e", 5, "another story"),
        ]
    }

    #[test]
    fn groups_merge_sources_and_keep_primary_text() {
        let out = apply_groups(batch(), &[vec![0, 1, 3]]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].item.text, "rocket launch");
        assert_eq!(out[0].merged_sources, vec!["@a", "@b", "@d"]);
        // Ungrouped items follow in original order.
        assert_eq!(out[1].item.source_id, "@c");
        assert_eq!(out[2].item.source_id, "@e");
    }

    #[test]
    fn every_index_emitted_exactly_once() {
        // Overlapping groups and repeats must not drop or duplicate items.
        let out = apply_groups(batch(), &[vec![0, 1], vec![1, 2], vec![0, 4]]);
        let total: usize = out.iter().map(|m| m.merged_sources.len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let out = apply_groups(batch(), &[vec![0, 99], vec![42]]);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].merged_sources, vec!["@a"]);
    }

    #[test]
    fn duplicate_source_ids_collapse_by_value() {
        let items = vec![
            item("@a", 1, "x"),
            item("@a", 2, "x again"),
            item("@b", 3, "x once more"),
        ];
        let out = apply_groups(items, &[vec![0, 1, 2]]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].merged_sources, vec!["@a", "@b"]);
    }

    #[test]
    fn preview_is_char_safe() {
        let s = "ñañañá";
        assert_eq!(preview(s, 3), "ñañ");
        assert_eq!(preview(s, 100), s);
    }
}
