// src/store.rs
//! On-disk state: the accumulated news cache and the processed-ID set.
//! Writes are atomic (tmp file + rename); unreadable files degrade to empty
//! collections so a corrupted cache never takes the curator down.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;

use crate::config::CuratorConfig;
use crate::curate::Item;
use crate::web::WebNews;

pub struct NewsStore {
    cache_path: PathBuf,
    processed_path: PathBuf,
    web_path: PathBuf,
}

impl NewsStore {
    pub fn new(cache_path: PathBuf, processed_path: PathBuf, web_path: PathBuf) -> Self {
        Self {
            cache_path,
            processed_path,
            web_path,
        }
    }

    pub fn from_config(config: &CuratorConfig) -> Self {
        Self::new(
            config.cache_file.clone(),
            config.processed_file.clone(),
            config.web_news_file.clone(),
        )
    }

    /// Load the accumulated item batch. Missing or unreadable files yield an
    /// empty batch.
    pub fn load_cache(&self) -> Vec<Item> {
        match fs::read_to_string(&self.cache_path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!(path = %self.cache_path.display(), error = ?e, "news cache unreadable");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        }
    }

    pub fn save_cache(&self, items: &[Item]) -> Result<()> {
        let json = serde_json::to_string_pretty(items)?;
        write_atomic(&self.cache_path, json.as_bytes())?;
        Ok(())
    }

    /// Remove the cache file. The caller does this only after a successful
    /// publication.
    pub fn clear_cache(&self) -> Result<()> {
        match fs::remove_file(&self.cache_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load the set of already-processed item identities (`source:seq` keys).
    pub fn load_processed(&self) -> HashSet<String> {
        match fs::read_to_string(&self.processed_path) {
            Ok(data) => serde_json::from_str::<Vec<String>>(&data)
                .map(|ids| ids.into_iter().collect())
                .unwrap_or_else(|e| {
                    warn!(path = %self.processed_path.display(), error = ?e, "processed set unreadable");
                    HashSet::new()
                }),
            Err(_) => HashSet::new(),
        }
    }

    pub fn save_processed(&self, ids: &HashSet<String>) -> Result<()> {
        // Sorted for stable files and readable diffs.
        let mut list: Vec<&String> = ids.iter().collect();
        list.sort();
        let json = serde_json::to_string_pretty(&list)?;
        write_atomic(&self.processed_path, json.as_bytes())?;
        Ok(())
    }

    /// Load the last generated web feed. `None` when the file is missing or
    /// unreadable; the web layer substitutes its welcome feed.
    pub fn load_web_news(&self) -> Option<WebNews> {
        let data = fs::read_to_string(&self.web_path).ok()?;
        match serde_json::from_str(&data) {
            Ok(news) => Some(news),
            Err(e) => {
                warn!(path = %self.web_path.display(), error = ?e, "web feed unreadable");
                None
            }
        }
    }

    pub fn save_web_news(&self, news: &WebNews) -> Result<()> {
        let json = serde_json::to_string_pretty(news)?;
        write_atomic(&self.web_path, json.as_bytes())?;
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn store_in(dir: &Path) -> NewsStore {
        NewsStore::new(
            dir.join("cache.json"),
            dir.join("processed.json"),
            dir.join("web.json"),
        )
    }

    fn item(seq: i64) -> Item {
        Item {
            text: format!("news {seq}"),
            source_id: "@src".into(),
            sequence_id: seq,
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn cache_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(store.load_cache().is_empty());
        store.save_cache(&[item(1), item(2)]).unwrap();
        let loaded = store.load_cache();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].sequence_id, 1);

        store.clear_cache().unwrap();
        assert!(store.load_cache().is_empty());
        // Clearing an already-missing cache is fine.
        store.clear_cache().unwrap();
    }

    #[test]
    fn processed_set_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let mut ids = HashSet::new();
        ids.insert("@a:1".to_string());
        ids.insert("@b:7".to_string());
        store.save_processed(&ids).unwrap();
        assert_eq!(store.load_processed(), ids);
    }

    #[test]
    fn corrupted_files_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(dir.path().join("cache.json"), "not json").unwrap();
        fs::write(dir.path().join("processed.json"), "{broken").unwrap();
        fs::write(dir.path().join("web.json"), "[oops").unwrap();
        assert!(store.load_cache().is_empty());
        assert!(store.load_processed().is_empty());
        assert!(store.load_web_news().is_none());
    }

    #[test]
    fn web_feed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert!(store.load_web_news().is_none());

        let news = WebNews::welcome();
        store.save_web_news(&news).unwrap();
        assert_eq!(store.load_web_news().unwrap(), news);
    }
}
