// src/curate/summarize.rs
//! Abstractive digest generation. Reviewer feedback arrives as an extra user
//! turn so each revision steers the next draft without replaying history.

use std::fmt::Write as _;

use tracing::error;

use crate::ai_client::{DynChatClient, GenerateRequest};
use crate::curate::RatedItem;
use crate::prompts;

/// User-visible placeholder returned when generation fails. Non-empty on
/// purpose; the cycle's empty-draft guard must not treat an outage as "no
/// news".
pub const SUMMARY_ERROR_PLACEHOLDER: &str =
    "Digest generation failed. Please try again later.";

pub struct Summarizer {
    client: DynChatClient,
}

impl Summarizer {
    pub fn new(client: DynChatClient) -> Self {
        Self { client }
    }

    /// Produce a digest draft from the selected items. Empty input yields an
    /// empty digest without a call; generation errors yield a fixed
    /// placeholder rather than raising.
    pub async fn summarize(&self, items: &[RatedItem], feedback: Option<&str>) -> String {
        if items.is_empty() {
            return String::new();
        }

        let mut news_list = String::new();
        for (i, rated) in items.iter().enumerate() {
            let item = &rated.item.item;
            let _ = writeln!(news_list, "{}. {} {}\n", i + 1, item.text, item.link());
        }

        let mut user_turns = vec![prompts::summarize_user(&news_list)];
        if let Some(fb) = feedback {
            if !fb.trim().is_empty() {
                user_turns.push(prompts::summarize_feedback(fb));
            }
        }

        match self
            .client
            .generate(GenerateRequest {
                system: Some(prompts::SUMMARIZE_SYSTEM),
                user_turns,
                temperature: 0.1,
                max_tokens: Some(1024),
            })
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!(error = ?e, "summary generation failed");
                SUMMARY_ERROR_PLACEHOLDER.to_string()
            }
        }
    }
}
