use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::time::sleep;

use crate::config::{limits, window};
use crate::store::Store;

/// Daily maintenance: strike decay per chat and pruning of old day counters.
pub struct StrikeManager {
    store: Arc<dyn Store>,
}

/// What one maintenance pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub chats: usize,
    pub decayed: usize,
    pub pruned: usize,
}

impl StrikeManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        StrikeManager { store }
    }

    pub async fn start_strike_decay(&self) {
        loop {
            match self.run_maintenance(Utc::now()).await {
                Ok(report) => log::info!(
                    "Strike maintenance: {} chats, {} records decayed, {} counters pruned",
                    report.chats,
                    report.decayed,
                    report.pruned
                ),
                Err(e) => log::error!("Error running strike maintenance: {}", e),
            }
            sleep(window::MAINTENANCE_TICK).await;
        }
    }

    pub async fn run_maintenance(&self, now: DateTime<Utc>) -> Result<MaintenanceReport> {
        let mut report = MaintenanceReport::default();
        for chat in self.store.known_chats().await? {
            report.chats += 1;
            let settings = match self.store.effective_ai_policy(chat, 0).await {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Skipping strike decay for chat {}: {}", chat, e);
                    continue;
                }
            };
            if settings.strike_decay_days > 0 {
                match self.store.decay_at(chat, settings.strike_decay_days, now).await {
                    Ok(decayed) => report.decayed += decayed,
                    Err(e) => log::warn!("Strike decay failed for chat {}: {}", chat, e),
                }
            }
            sleep(window::BETWEEN_CHATS).await;
        }

        let cutoff = (now - ChronoDuration::days(limits::COUNTER_RETENTION_DAYS)).date_naive();
        report.pruned = self.store.prune_before(cutoff).await?;
        Ok(report)
    }
}
