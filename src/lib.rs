pub mod actions;
pub mod admin_handlers;
pub mod ai_moderation;
pub mod classifier;
pub mod config;
pub mod error;
pub mod handlers;
pub mod message;
pub mod moderator;
pub mod night_mode;
pub mod policy;
pub mod quota;
pub mod rate_limit;
pub mod risk;
pub mod spam_enforcer;
pub mod store;
pub mod strike_manager;

use anyhow::Result;
use std::sync::Arc;

use crate::config::Settings;
use crate::store::{MemoryStore, RedisStore, Store};

/// Opens the configured store: Redis, or in-memory when `STORE=memory`.
pub async fn open_store(settings: &Settings) -> Result<Arc<dyn Store>> {
    if settings.use_memory_store {
        log::warn!("Using the in-memory store; nothing survives a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = RedisStore::connect(&settings.redis_url).await?;
    Ok(Arc::new(store))
}
