// src/curate/format.rs
//! Publication restyling. Fail-open: an unformatted but reviewed digest beats
//! blocking publication at a non-safety-critical stage.

use tracing::error;

use crate::ai_client::{DynChatClient, GenerateRequest};
use crate::prompts;

pub struct Formatter {
    client: DynChatClient,
}

impl Formatter {
    pub fn new(client: DynChatClient) -> Self {
        Self { client }
    }

    /// Rewrite the approved digest into the channel's publication style with
    /// a short lead-in. Empty input short-circuits to empty output; on error
    /// the input digest is returned unchanged.
    pub async fn format(&self, digest: &str) -> String {
        if digest.trim().is_empty() {
            return String::new();
        }
        match self
            .client
            .generate(GenerateRequest {
                system: Some(prompts::FORMAT_SYSTEM),
                user_turns: vec![prompts::format_user(digest)],
                temperature: 0.35,
                max_tokens: Some(800),
            })
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!(error = ?e, "formatting failed, publishing the raw digest");
                digest.to_string()
            }
        }
    }
}
