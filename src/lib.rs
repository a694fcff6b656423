// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod ai_client;
pub mod config;
pub mod curate;
pub mod ingest;
pub mod prompts;
pub mod publish;
pub mod store;
pub mod web;

// ---- Re-exports for stable public API ----
pub use crate::ai_client::{build_client_from_config, ChatClient, DynChatClient};
pub use crate::config::CuratorConfig;
pub use crate::curate::cycle::{publish_pending, AbortReason, CycleOutcome, DigestCycle};
pub use crate::curate::{Item, MergedItem, RatedItem, RatingResult};
pub use crate::publish::Publisher;
pub use crate::store::NewsStore;
pub use crate::web::{WebNews, WebNewsBuilder};
