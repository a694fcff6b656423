// src/curate/moderate.rs
//! Content-policy moderation: a closed six-category classification, a
//! thresholded block decision, and the review verdicts that drive the
//! summarizer feedback loop.
//!
//! Classification fails closed: when the model cannot be reached or answers
//! off-schema, every category scores 1.0 so nothing unreviewed slips through.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::ai_client::{ClassifyRequest, DynChatClient};
use crate::curate::clamp01;
use crate::prompts;

/// Closed set of moderation categories. Keyed maps over this enum stay
/// exhaustiveness-checkable, unlike an open string dictionary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Violence,
    HateSpeech,
    AdultContent,
    SelfHarm,
    Misinformation,
    GovernmentContent,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Violence,
        Category::HateSpeech,
        Category::AdultContent,
        Category::SelfHarm,
        Category::Misinformation,
        Category::GovernmentContent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Violence => "violence",
            Category::HateSpeech => "hate_speech",
            Category::AdultContent => "adult_content",
            Category::SelfHarm => "self_harm",
            Category::Misinformation => "misinformation",
            Category::GovernmentContent => "government_content",
        }
    }

    /// Per-category block threshold. Deliberately permissive: only extreme
    /// violations block.
    pub fn block_threshold(self) -> f32 {
        match self {
            Category::Violence => 0.97,
            Category::HateSpeech => 0.95,
            Category::AdultContent => 0.97,
            Category::SelfHarm => 0.98,
            Category::Misinformation => 0.96,
            Category::GovernmentContent => 0.98,
        }
    }
}

/// Soft threshold: elevated-but-passing categories earn advisory feedback.
pub const ADVISORY_THRESHOLD: f32 = 0.85;
/// Rejection feedback only covers the most severe band, not every category
/// that contributed to the block decision.
pub const SEVERE_FEEDBACK_THRESHOLD: f32 = 0.98;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: f32,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// Per-category severity scores, always covering all six categories.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationResult {
    categories: BTreeMap<Category, CategoryScore>,
}

impl ModerationResult {
    /// Parse the tool-call arguments. All six categories must be present;
    /// scores are clamped into `[0, 1]`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut categories: BTreeMap<Category, CategoryScore> =
            serde_json::from_value(value.clone())
                .context("moderation arguments do not match the category schema")?;
        for cat in Category::ALL {
            match categories.get_mut(&cat) {
                Some(cs) => cs.score = clamp01(cs.score),
                None => bail!("moderation response is missing category '{}'", cat.as_str()),
            }
        }
        Ok(Self { categories })
    }

    /// Fail-closed result: every category at maximal severity, the first
    /// category carrying the error message as its sole flag.
    pub fn fail_closed(error: &str) -> Self {
        let mut categories = BTreeMap::new();
        for (i, cat) in Category::ALL.into_iter().enumerate() {
            let flags = if i == 0 {
                vec![error.to_string()]
            } else {
                Vec::new()
            };
            categories.insert(cat, CategoryScore { score: 1.0, flags });
        }
        Self { categories }
    }

    pub fn score(&self, category: Category) -> f32 {
        // Constructors guarantee the full set; missing entries read as
        // maximal severity anyway.
        self.categories.get(&category).map_or(1.0, |c| c.score)
    }

    pub fn flags(&self, category: Category) -> &[String] {
        self.categories
            .get(&category)
            .map_or(&[], |c| c.flags.as_slice())
    }

    #[cfg(test)]
    pub fn from_scores(scores: [f32; 6]) -> Self {
        let mut categories = BTreeMap::new();
        for (cat, score) in Category::ALL.into_iter().zip(scores) {
            categories.insert(
                cat,
                CategoryScore {
                    score,
                    flags: Vec::new(),
                },
            );
        }
        Self { categories }
    }
}

/// Block if any category meets or exceeds its threshold.
pub fn should_block(result: &ModerationResult) -> bool {
    for cat in Category::ALL {
        let score = result.score(cat);
        if score >= cat.block_threshold() {
            info!(category = cat.as_str(), score, "content blocked");
            return true;
        }
    }
    false
}

/// Review decision: approved plus human-readable feedback for the
/// summarizer. Feedback is empty when approved with no soft issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub approved: bool,
    pub feedback: String,
}

pub struct Moderator {
    client: DynChatClient,
}

impl Moderator {
    pub fn new(client: DynChatClient) -> Self {
        Self { client }
    }

    /// Classify text across all six categories. Never fails: any error
    /// becomes the fail-closed result.
    pub async fn classify(&self, text: &str) -> ModerationResult {
        match self.try_classify(text).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = ?e, "moderation failed, failing closed");
                ModerationResult::fail_closed(&e.to_string())
            }
        }
    }

    async fn try_classify(&self, text: &str) -> Result<ModerationResult> {
        let value = self
            .client
            .classify(ClassifyRequest {
                prompt: prompts::moderate_user(text),
                tool_name: "content_moderation",
                tool_description: "Content analysis for policy violations",
                parameters: moderation_schema(),
                temperature: 0.1,
                max_tokens: Some(1000),
            })
            .await?;
        ModerationResult::from_value(&value)
    }

    /// Classify then decide, producing revision feedback for the summarizer.
    pub async fn review(&self, text: &str) -> ReviewVerdict {
        match self.try_classify(text).await {
            Ok(result) => verdict_from(&result),
            Err(e) => {
                warn!(error = ?e, "review failed, rejecting with generic feedback");
                ReviewVerdict {
                    approved: false,
                    feedback: "Moderation could not be run. Soften the wording and keep \
                               the tone neutral."
                        .to_string(),
                }
            }
        }
    }
}

/// Turn a classification into a verdict. Pure so the three-tier threshold
/// behavior is unit-testable without a client.
pub(crate) fn verdict_from(result: &ModerationResult) -> ReviewVerdict {
    if !should_block(result) {
        // Approve, but pass along advisory notes for elevated categories.
        let mut issues = Vec::new();
        for cat in Category::ALL {
            if result.score(cat) >= ADVISORY_THRESHOLD {
                issues.push(format!(
                    "{}: soften the wording{}",
                    cat.as_str(),
                    first_flag(result, cat)
                ));
            }
        }
        let feedback = if issues.is_empty() {
            String::new()
        } else {
            format!("Minor edits: {}", issues.join(", "))
        };
        return ReviewVerdict {
            approved: true,
            feedback,
        };
    }

    let mut issues = Vec::new();
    for cat in Category::ALL {
        if result.score(cat) >= SEVERE_FEEDBACK_THRESHOLD {
            issues.push(format!(
                "{}: remove or radically rephrase the offending passages{}",
                cat.as_str(),
                first_flag(result, cat)
            ));
        }
    }
    let feedback = if issues.is_empty() {
        "Re-check the wording for neutrality and avoid judgemental language.".to_string()
    } else {
        format!("Update the digest to resolve the violations: {}", issues.join(", "))
    };
    ReviewVerdict {
        approved: false,
        feedback,
    }
}

fn first_flag(result: &ModerationResult, category: Category) -> String {
    result
        .flags(category)
        .first()
        .map(|f| format!(" ('{f}')"))
        .unwrap_or_default()
}

/// JSON schema for the forced `content_moderation` tool call.
fn moderation_schema() -> Value {
    let mut properties = serde_json::Map::new();
    for cat in Category::ALL {
        properties.insert(
            cat.as_str().to_string(),
            serde_json::json!({
                "type": "object",
                "properties": {
                    "score": {
                        "type": "number",
                        "description": format!("{} severity, 0-1", cat.as_str()),
                    },
                    "flags": {
                        "type": "array",
                        "items": { "type": "string" },
                    },
                },
                "required": ["score"],
            }),
        );
    }
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": Category::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
    })
}

/// All-zero category map, the benign answer used by the mock client.
pub fn benign_categories_value() -> Value {
    let mut map = serde_json::Map::new();
    for cat in Category::ALL {
        map.insert(
            cat.as_str().to_string(),
            serde_json::json!({ "score": 0.0, "flags": [] }),
        );
    }
    Value::Object(map)
}
