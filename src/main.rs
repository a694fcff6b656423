//! Digest Curator — Binary Entrypoint
//! Runs one collect + conditional publish cycle: drain the item spool into
//! the cache, and when the posting schedule says so, curate and publish.
//!
//! Scheduling across runs (cron, systemd timer) is the operator's concern.

use chrono::Utc;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use digest_curator::config::{CuratorConfig, DEFAULT_CONFIG_PATH};
use digest_curator::curate::cycle::{publish_pending, CycleOutcome, DigestCycle};
use digest_curator::ingest::{collect_once, spool::SpoolSource, ItemSource};
use digest_curator::publish::TelegramPublisher;
use digest_curator::store::NewsStore;
use digest_curator::web::WebNewsBuilder;
use digest_curator::build_client_from_config;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Err(e) = PrometheusBuilder::new().install() {
        warn!(error = ?e, "metrics exporter not installed");
    }

    let config = CuratorConfig::load_or_default(DEFAULT_CONFIG_PATH);
    let store = NewsStore::from_config(&config);

    let sources: Vec<Box<dyn ItemSource>> =
        vec![Box::new(SpoolSource::new(config.spool_dir.clone()))];
    let added = collect_once(&sources, &store).await?;
    info!(added, "collection finished");

    let client = build_client_from_config(&config);

    // Refresh the web feed whenever the batch changed; the web view only
    // reads what is saved here.
    if added > 0 {
        let builder = WebNewsBuilder::new(client.clone(), config.tz());
        let feed = builder.generate(&store.load_cache()).await;
        if let Err(e) = store.save_web_news(&feed) {
            warn!(error = ?e, "web feed not saved");
        }
    }

    let force = std::env::var("CURATOR_FORCE_PUBLISH")
        .map(|v| v == "1")
        .unwrap_or(false);
    if !force && !config.should_post_now(Utc::now()) {
        info!("outside the posting window, nothing to publish now");
        return Ok(());
    }

    let cycle = DigestCycle::new(client, &config);
    let publisher = TelegramPublisher::from_env();
    match publish_pending(&cycle, &store, &publisher).await {
        Ok(CycleOutcome::Published) => info!("cycle finished: published"),
        Ok(CycleOutcome::Aborted(reason)) => {
            info!(?reason, "cycle finished: nothing published")
        }
        Err(e) => {
            error!(error = ?e, "publish failed, batch kept for the next cycle");
            return Err(e);
        }
    }
    Ok(())
}
