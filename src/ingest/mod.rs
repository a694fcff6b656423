// src/ingest/mod.rs
//! Item collection boundary. Sources implement `ItemSource`; `collect_once`
//! normalizes their output, skips already-processed identities and appends
//! the rest to the on-disk cache.

pub mod spool;

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::curate::Item;
use crate::store::NewsStore;

#[async_trait::async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Item>>;

    /// Acknowledge that everything returned by `fetch_latest` has been
    /// persisted. Sources that hand over consumable input (spool files)
    /// discard it here, not during the fetch, so a crash before the store
    /// save never loses items.
    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Items fetched from sources.");
        describe_counter!(
            "ingest_kept_total",
            "Items kept after normalization and processed-ID filtering."
        );
        describe_counter!("ingest_source_errors_total", "Source fetch errors.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when collection last ran.");
    });
}

/// Normalize collected text: decode HTML entities, strip tags, normalize
/// curly quotes, collapse whitespace, cap length at 1500 chars.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // Collapse runs of spaces but keep line breaks: bullet structure matters
    // for the summarizer payload.
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[ \t\r\x{A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    static RE_NL: OnceCell<regex::Regex> = OnceCell::new();
    let re_nl = RE_NL.get_or_init(|| regex::Regex::new(r" ?\n[ \n]*").unwrap());
    out = re_nl.replace_all(&out, "\n").to_string();
    out = out.trim().to_string();

    if out.chars().count() > 1500 {
        out = out.chars().take(1500).collect();
    }

    out
}

/// Pull every source once and append unseen items to the cache. Returns the
/// number of newly collected items. Source errors are logged and skipped;
/// only store I/O errors propagate.
pub async fn collect_once(sources: &[Box<dyn ItemSource>], store: &NewsStore) -> Result<usize> {
    ensure_metrics_described();

    let mut processed = store.load_processed();
    let mut cache = store.load_cache();
    let mut added = 0usize;

    for source in sources {
        match source.fetch_latest().await {
            Ok(items) => {
                counter!("ingest_items_total").increment(items.len() as u64);
                for mut item in items {
                    item.text = normalize_text(&item.text);
                    if item.text.is_empty() {
                        continue;
                    }
                    let key = item.key();
                    if processed.contains(&key) {
                        continue;
                    }
                    processed.insert(key);
                    info!(source = %item.source_id, seq = item.sequence_id, "item collected");
                    cache.push(item);
                    added += 1;
                }
            }
            Err(e) => {
                warn!(error = ?e, source = source.name(), "source error");
                counter!("ingest_source_errors_total").increment(1);
            }
        }
    }

    if added > 0 {
        store.save_cache(&cache)?;
        store.save_processed(&processed)?;
    }
    // Only now is it safe for sources to discard what they handed over.
    for source in sources {
        if let Err(e) = source.commit().await {
            warn!(error = ?e, source = source.name(), "source commit failed");
        }
    }
    counter!("ingest_kept_total").increment(added as u64);
    gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_tags_and_entities() {
        let s = "<b>Hello&nbsp;&nbsp; world</b> &ldquo;ok&rdquo;";
        assert_eq!(normalize_text(s), "Hello world \"ok\"");
    }

    #[test]
    fn normalize_keeps_line_structure() {
        let s = "line one   \n\n   line two";
        assert_eq!(normalize_text(s), "line one\nline two");
    }

    #[test]
    fn normalize_caps_length() {
        let s = "x".repeat(2000);
        assert_eq!(normalize_text(&s).chars().count(), 1500);
    }
}
