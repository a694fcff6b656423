// tests/review_loop.rs
// Review-loop termination: the cap on summarize/review round-trips and the
// empty-draft short-circuit, observed through a full cycle run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use digest_curator::ai_client::{ChatClient, ClassifyRequest, GenerateRequest};
use digest_curator::config::CuratorConfig;
use digest_curator::curate::cycle::{AbortReason, CycleOutcome, DigestCycle};
use digest_curator::curate::moderate::benign_categories_value;
use digest_curator::curate::summarize::SUMMARY_ERROR_PLACEHOLDER;
use digest_curator::curate::Item;
use digest_curator::publish::Publisher;

fn blocked_categories_value() -> Value {
    let mut v = benign_categories_value();
    v["violence"] = serde_json::json!({ "score": 0.99, "flags": ["graphic detail"] });
    v
}

/// Dispatches on the prompt text so each pipeline stage can be scripted
/// independently, and counts summarize/classify calls.
struct PipelineClient {
    draft: String,
    classify_response: Value,
    fail_summarize: bool,
    fail_format: bool,
    summarize_calls: AtomicUsize,
    classify_calls: AtomicUsize,
}

impl PipelineClient {
    fn new(draft: &str, classify_response: Value) -> Self {
        Self {
            draft: draft.to_string(),
            classify_response,
            fail_summarize: false,
            fail_format: false,
            summarize_calls: AtomicUsize::new(0),
            classify_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatClient for PipelineClient {
    async fn generate(&self, req: GenerateRequest<'_>) -> Result<String> {
        let first = req.user_turns.first().cloned().unwrap_or_default();
        if first.starts_with("Below are") {
            // Dedup: no duplicate groups.
            Ok(r#"{"groups": []}"#.to_string())
        } else if first.starts_with("Rate each") {
            let count = first.matches("\n\n").count();
            let ratings: Vec<Value> = (0..count)
                .map(|_| serde_json::json!({ "score": 0.8, "reasoning": "ok" }))
                .collect();
            Ok(serde_json::to_string(&ratings)?)
        } else if first.starts_with("Create a concise") {
            self.summarize_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_summarize {
                bail!("simulated summarizer outage")
            }
            Ok(self.draft.clone())
        } else if first.starts_with("Rewrite this digest") {
            if self.fail_format {
                bail!("simulated formatter outage")
            }
            // Echo back whatever digest was handed over for restyling.
            let digest = first.split_once("\n\n").map(|(_, d)| d).unwrap_or_default();
            Ok(format!("formatted: {digest}"))
        } else {
            bail!("unexpected prompt: {first}")
        }
    }

    async fn classify(&self, _req: ClassifyRequest<'_>) -> Result<Value> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.classify_response.clone())
    }

    fn provider_name(&self) -> &'static str {
        "pipeline-script"
    }
}

struct NullPublisher {
    calls: AtomicUsize,
    last_text: std::sync::Mutex<String>,
}

impl NullPublisher {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_text: std::sync::Mutex::new(String::new()),
        }
    }
}

#[async_trait]
impl Publisher for NullPublisher {
    async fn publish(&self, _channel: &str, text: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_text.lock().unwrap() = text.to_string();
        Ok(())
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

struct BrokenPublisher;

#[async_trait]
impl Publisher for BrokenPublisher {
    async fn publish(&self, _channel: &str, _text: &str) -> Result<()> {
        bail!("simulated transport failure")
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

fn items(n: usize) -> Vec<Item> {
    (0..n)
        .map(|i| Item {
            text: format!("news item {i}"),
            source_id: format!("@src{i}"),
            sequence_id: i as i64 + 1,
            collected_at: Utc::now(),
        })
        .collect()
}

#[tokio::test]
async fn persistent_rejection_stops_after_five_rounds() {
    let client = Arc::new(PipelineClient::new(
        "a perfectly fine draft",
        blocked_categories_value(),
    ));
    let publisher = NullPublisher::new();
    let cycle = DigestCycle::new(client.clone(), &CuratorConfig::default());

    let outcome = cycle.run(items(2), &publisher).await.unwrap();

    // The loop gives up after 5 rejections and proceeds with the last draft,
    // which the (equally strict) final gate then blocks.
    assert_eq!(outcome, CycleOutcome::Aborted(AbortReason::FinalGateBlocked));
    assert_eq!(client.summarize_calls.load(Ordering::SeqCst), 5);
    // 5 review passes + 1 final gate.
    assert_eq!(client.classify_calls.load(Ordering::SeqCst), 6);
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_draft_aborts_immediately() {
    let client = Arc::new(PipelineClient::new("   ", benign_categories_value()));
    let publisher = NullPublisher::new();
    let cycle = DigestCycle::new(client.clone(), &CuratorConfig::default());

    let outcome = cycle.run(items(2), &publisher).await.unwrap();

    assert_eq!(outcome, CycleOutcome::Aborted(AbortReason::EmptyDraft));
    assert_eq!(client.summarize_calls.load(Ordering::SeqCst), 1);
    // No review rounds were spent on the empty draft.
    assert_eq!(client.classify_calls.load(Ordering::SeqCst), 0);
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_batch_publishes_nothing() {
    let client = Arc::new(PipelineClient::new("draft", benign_categories_value()));
    let publisher = NullPublisher::new();
    let cycle = DigestCycle::new(client.clone(), &CuratorConfig::default());

    let outcome = cycle.run(Vec::new(), &publisher).await.unwrap();

    assert_eq!(outcome, CycleOutcome::Aborted(AbortReason::NoItems));
    assert_eq!(client.summarize_calls.load(Ordering::SeqCst), 0);
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn formatter_outage_publishes_the_reviewed_draft() {
    let mut client = PipelineClient::new("a perfectly fine draft", benign_categories_value());
    client.fail_format = true;
    let client = Arc::new(client);
    let publisher = NullPublisher::new();
    let cycle = DigestCycle::new(client.clone(), &CuratorConfig::default());

    let outcome = cycle.run(items(2), &publisher).await.unwrap();

    // Formatting is fail-open: the approved draft goes out unstyled.
    assert_eq!(outcome, CycleOutcome::Published);
    assert_eq!(publisher.calls.load(Ordering::SeqCst), 1);
    let text = publisher.last_text.lock().unwrap().clone();
    assert!(text.contains("a perfectly fine draft"));
    assert!(!text.contains("formatted:"));
}

#[tokio::test]
async fn summarizer_outage_publishes_placeholder_not_empty_abort() {
    let mut client = PipelineClient::new("unused", benign_categories_value());
    client.fail_summarize = true;
    let client = Arc::new(client);
    let publisher = NullPublisher::new();
    let cycle = DigestCycle::new(client.clone(), &CuratorConfig::default());

    let outcome = cycle.run(items(2), &publisher).await.unwrap();

    // The placeholder is a real (non-empty) draft: it flows through review,
    // formatting and the gate instead of tripping the empty-draft abort.
    assert_eq!(outcome, CycleOutcome::Published);
    assert_eq!(client.summarize_calls.load(Ordering::SeqCst), 1);
    let text = publisher.last_text.lock().unwrap().clone();
    assert!(text.contains(SUMMARY_ERROR_PLACEHOLDER));
}

#[tokio::test]
async fn publisher_transport_failure_is_the_cycle_error() {
    let client = Arc::new(PipelineClient::new(
        "a perfectly fine draft",
        benign_categories_value(),
    ));
    let cycle = DigestCycle::new(client, &CuratorConfig::default());

    let err = cycle.run(items(2), &BrokenPublisher).await.unwrap_err();
    assert!(err.to_string().contains("transport"));
}
