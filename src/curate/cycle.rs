// src/curate/cycle.rs
//! Publish-cycle orchestration: dedup → rate/select → bounded summarize ⇄
//! review loop → format → final moderation gate → publish.
//!
//! The review loop is an explicit state machine so the round cap and the
//! empty-draft short-circuit are structurally enforced rather than buried in
//! nested conditionals. No failure in here crashes the process: stages fall
//! back per their own contracts and cycle-level problems resolve to a clean
//! `Aborted` outcome. Only publisher transport errors propagate as `Err`.

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use metrics::{counter, gauge};
use tracing::{info, warn};

use crate::ai_client::DynChatClient;
use crate::config::CuratorConfig;
use crate::curate::dedup::Deduplicator;
use crate::curate::format::Formatter;
use crate::curate::moderate::{should_block, Moderator};
use crate::curate::rate::{select_top, Ranker};
use crate::curate::summarize::Summarizer;
use crate::curate::{ensure_metrics_described, Item, RatedItem};
use crate::publish::Publisher;
use crate::store::NewsStore;

/// Maximum summarize/review round-trips per cycle, the initial draft
/// included. The 5th rejection gives up silently and proceeds with the last
/// draft; the final gate still stands between that draft and the channel.
pub const MAX_REVIEW_ROUNDS: usize = 5;

/// Why a cycle ended without publishing. All of these are non-fatal
/// "nothing to publish this cycle" outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    NoItems,
    EmptyDraft,
    EmptyFormatted,
    FinalGateBlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Published,
    Aborted(AbortReason),
}

/// Review-loop states. `round` counts summarize/review round-trips, 1-based.
enum LoopState {
    Draft {
        feedback: Option<String>,
        round: usize,
    },
    Review {
        draft: String,
        round: usize,
    },
    Settled(String),
    Aborted,
}

pub struct DigestCycle {
    dedup: Deduplicator,
    ranker: Ranker,
    moderator: Moderator,
    summarizer: Summarizer,
    formatter: Formatter,
    top_n: usize,
    target_channel: String,
    hashtag: String,
    tz: FixedOffset,
}

impl DigestCycle {
    pub fn new(client: DynChatClient, config: &CuratorConfig) -> Self {
        Self {
            dedup: Deduplicator::new(client.clone(), config.preview_len),
            ranker: Ranker::new(client.clone()),
            moderator: Moderator::new(client.clone()),
            summarizer: Summarizer::new(client.clone()),
            formatter: Formatter::new(client),
            top_n: config.top_n,
            target_channel: config.target_channel.clone(),
            hashtag: config.hashtag.clone(),
            tz: config.tz(),
        }
    }

    /// Run one full publish cycle over a raw item batch.
    pub async fn run(&self, items: Vec<Item>, publisher: &dyn Publisher) -> Result<CycleOutcome> {
        ensure_metrics_described();
        counter!("digest_cycles_total").increment(1);
        gauge!("digest_last_cycle_ts").set(Utc::now().timestamp() as f64);

        if items.is_empty() {
            warn!("no news to publish");
            return Ok(self.abort(AbortReason::NoItems));
        }
        info!(count = items.len(), "preparing digest");

        let merged = self.dedup.dedupe(items).await;
        let texts: Vec<String> = merged.iter().map(|m| m.item.text.clone()).collect();
        let ratings = self.ranker.rate_batch(&texts).await;
        let rated: Vec<RatedItem> = merged
            .into_iter()
            .zip(ratings)
            .map(|(item, rating)| RatedItem {
                item,
                score: rating.score,
                reasoning: rating.reasoning,
            })
            .collect();
        let selected = select_top(rated, self.top_n);
        if selected.is_empty() {
            warn!("no news left after selection");
            return Ok(self.abort(AbortReason::NoItems));
        }
        info!(selected = selected.len(), "top news selected");

        let Some(draft) = self.review_loop(&selected).await else {
            warn!("summarizer produced an empty draft, aborting cycle");
            return Ok(self.abort(AbortReason::EmptyDraft));
        };

        let formatted = self.formatter.format(&draft).await;
        if formatted.trim().is_empty() {
            warn!("formatting produced an empty result, aborting cycle");
            return Ok(self.abort(AbortReason::EmptyFormatted));
        }

        // Fresh, independent gate on the formatted text: restyling can change
        // the classification, and loop approval never bypasses this check.
        let gate = self.moderator.classify(&formatted).await;
        if should_block(&gate) {
            warn!("formatted digest blocked by the final moderation gate");
            counter!("digest_final_gate_blocked_total").increment(1);
            return Ok(self.abort(AbortReason::FinalGateBlocked));
        }

        let message = format!(
            "{}{}",
            digest_header(&self.hashtag, self.tz, Utc::now()),
            formatted
        );
        publisher.publish(&self.target_channel, &message).await?;
        counter!("digest_published_total").increment(1);
        info!(channel = %self.target_channel, "digest published");
        Ok(CycleOutcome::Published)
    }

    /// Drive summarizer and moderator through the bounded feedback loop.
    /// Returns the final draft (approved, or last one when the cap is hit),
    /// or `None` when a draft comes back empty.
    async fn review_loop(&self, selected: &[RatedItem]) -> Option<String> {
        let mut state = LoopState::Draft {
            feedback: None,
            round: 1,
        };
        loop {
            state = match state {
                LoopState::Draft { feedback, round } => {
                    let draft = self.summarizer.summarize(selected, feedback.as_deref()).await;
                    if draft.trim().is_empty() {
                        LoopState::Aborted
                    } else {
                        LoopState::Review { draft, round }
                    }
                }
                LoopState::Review { draft, round } => {
                    counter!("digest_review_rounds_total").increment(1);
                    let verdict = self.moderator.review(&draft).await;
                    if verdict.approved {
                        info!(round, "draft approved");
                        LoopState::Settled(draft)
                    } else if round >= MAX_REVIEW_ROUNDS {
                        // Known permissive policy: the emitted text did not
                        // pass review. The final gate is the last defense.
                        warn!(
                            rounds = round,
                            "review cap reached, proceeding with unapproved draft"
                        );
                        LoopState::Settled(draft)
                    } else {
                        info!(round, feedback = %verdict.feedback, "reviewer requested changes");
                        LoopState::Draft {
                            feedback: Some(verdict.feedback),
                            round: round + 1,
                        }
                    }
                }
                LoopState::Settled(draft) => return Some(draft),
                LoopState::Aborted => return None,
            };
        }
    }

    fn abort(&self, reason: AbortReason) -> CycleOutcome {
        counter!("digest_aborted_total").increment(1);
        CycleOutcome::Aborted(reason)
    }
}

/// Fixed publication header: hashtag plus the current date in the publication
/// timezone.
pub fn digest_header(hashtag: &str, tz: FixedOffset, now_utc: DateTime<Utc>) -> String {
    format!(
        "{} {}\n\n",
        hashtag,
        now_utc.with_timezone(&tz).format("%d.%m.%Y")
    )
}

/// Load the pending batch from the store, run one cycle, and clear the cache
/// after a successful publish. Clearing on publish only is what lets aborted
/// batches retry on the next cycle.
pub async fn publish_pending(
    cycle: &DigestCycle,
    store: &NewsStore,
    publisher: &dyn Publisher,
) -> Result<CycleOutcome> {
    let items = store.load_cache();
    let outcome = cycle.run(items, publisher).await?;
    if outcome == CycleOutcome::Published {
        store.clear_cache()?;
        info!("news cache cleared after publication");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn header_uses_publication_timezone() {
        // 23:30 UTC on Dec 31 is already Jan 1 in UTC+3.
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 30, 0).unwrap();
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        assert_eq!(digest_header("#DIGEST", tz, now), "#DIGEST 01.01.2026\n\n");
    }
}
