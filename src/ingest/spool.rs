// src/ingest/spool.rs
//! File-spool source: an external fetcher drops JSON batches of items into a
//! directory; each `fetch_latest` reads the readable batches and `commit`
//! removes them once the collected items are persisted. Keeps the actual
//! network-side fetching out of the curator entirely.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use tracing::warn;

use crate::curate::Item;
use crate::ingest::ItemSource;

pub struct SpoolSource {
    dir: PathBuf,
    /// Batch files read by the last `fetch_latest`, removed on `commit`.
    pending: Mutex<Vec<PathBuf>>,
}

impl SpoolSource {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            pending: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl ItemSource for SpoolSource {
    async fn fetch_latest(&self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            // Missing spool dir just means nothing was dropped yet.
            Err(_) => return Ok(items),
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut consumed = Vec::new();
        for path in paths {
            match fs::read_to_string(&path) {
                Ok(data) => match serde_json::from_str::<Vec<Item>>(&data) {
                    Ok(mut batch) => {
                        items.append(&mut batch);
                        consumed.push(path);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = ?e, "spool file is not an item batch");
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = ?e, "spool file unreadable");
                }
            }
        }

        *self.pending.lock().expect("spool lock") = consumed;
        Ok(items)
    }

    /// Remove the batch files handed over by the last fetch. Leftover files
    /// re-ingest on the next run, where the processed-ID set filters them.
    async fn commit(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending.lock().expect("spool lock"));
        for path in pending {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = ?e, "spool file not removed");
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "spool"
    }
}
