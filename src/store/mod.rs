//! Persistence boundary of the moderation core.
//!
//! Policy layers are written only by administrator-facing configuration; the
//! enforcers only read them. Strike points, counters and logs are written by
//! the enforcers.

pub mod memory;
pub mod records;
pub mod redis_store;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use teloxide::types::{ChatId, UserId};

use crate::night_mode::NightModeConfig;
use crate::policy::{AiModLayer, AiModSettings, LinkFlags, LinkPolicy, SpamPolicy, SpamPolicyLayer};
use crate::quota::local_day;

pub use memory::MemoryStore;
pub use records::{ModerationLogEntry, SpamEvent, StrikeEvent, StrikeRecord};
pub use redis_store::RedisStore;

/// Stored policy layers plus the merge order that turns them into effective policies.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn spam_layer(&self, chat: ChatId) -> Result<Option<SpamPolicyLayer>>;
    async fn set_spam_layer(&self, chat: ChatId, layer: &SpamPolicyLayer) -> Result<()>;
    async fn spam_topic_layer(&self, chat: ChatId, topic: i32) -> Result<Option<SpamPolicyLayer>>;
    async fn set_spam_topic_layer(
        &self,
        chat: ChatId,
        topic: i32,
        layer: &SpamPolicyLayer,
    ) -> Result<()>;
    async fn ai_layer(&self, chat: ChatId, topic: i32) -> Result<Option<AiModLayer>>;
    async fn set_ai_layer(&self, chat: ChatId, topic: i32, layer: &AiModLayer) -> Result<()>;
    async fn link_flags(&self, chat: ChatId) -> Result<Option<LinkFlags>>;
    async fn set_link_flags(&self, chat: ChatId, flags: &LinkFlags) -> Result<()>;
    async fn night_mode(&self, chat: ChatId) -> Result<Option<NightModeConfig>>;
    async fn set_night_mode(&self, chat: ChatId, config: &NightModeConfig) -> Result<()>;
    async fn is_pro(&self, chat: ChatId) -> Result<bool>;
    async fn set_pro(&self, chat: ChatId, pro: bool) -> Result<()>;
    async fn topic_owners(&self, chat: ChatId, topic: i32) -> Result<BTreeSet<u64>>;
    async fn set_topic_owners(&self, chat: ChatId, topic: i32, owners: &BTreeSet<u64>) -> Result<()>;
    /// Every chat that has stored any policy.
    async fn known_chats(&self) -> Result<Vec<ChatId>>;
    /// Removes every policy layer, strike record and log of a chat.
    async fn purge_chat(&self, chat: ChatId) -> Result<()>;

    /// Global layer, then the topic 0 override, then the topic override when `topic != 0`.
    async fn effective_spam_policy(&self, chat: ChatId, topic: i32) -> Result<SpamPolicy> {
        let mut policy = SpamPolicy::default();
        if let Some(global) = self.spam_layer(chat).await? {
            policy.merge(&global);
        }
        if let Some(chat_default) = self.spam_topic_layer(chat, 0).await? {
            policy.merge(&chat_default);
        }
        if topic != 0 {
            if let Some(topic_layer) = self.spam_topic_layer(chat, topic).await? {
                policy.merge(&topic_layer);
            }
        }
        Ok(policy)
    }

    async fn effective_link_policy(&self, chat: ChatId, topic: i32) -> Result<LinkPolicy> {
        let spam = self.effective_spam_policy(chat, topic).await?;
        let flags = self.link_flags(chat).await?.unwrap_or_default();
        Ok(LinkPolicy::build(&flags, &spam))
    }

    /// Topic 0 layer, then the topic layer when `topic != 0`.
    async fn effective_ai_policy(&self, chat: ChatId, topic: i32) -> Result<AiModSettings> {
        let mut settings = AiModSettings::default();
        if let Some(chat_default) = self.ai_layer(chat, 0).await? {
            settings.merge(&chat_default);
        }
        if topic != 0 {
            if let Some(topic_layer) = self.ai_layer(chat, topic).await? {
                settings.merge(&topic_layer);
            }
        }
        Ok(settings)
    }
}

/// Persisted strike points with an audit trail.
#[async_trait]
pub trait StrikeLedger: Send + Sync {
    /// Adds points, appends an audit event and returns the new total.
    async fn add_points(&self, chat: ChatId, user: UserId, points: i64, reason: &str) -> Result<i64>;
    async fn get_points(&self, chat: ChatId, user: UserId) -> Result<i64>;
    /// Subtracts one point from every record not updated within `days` of `now`.
    /// Returns the number of records decayed. Points never go below zero.
    async fn decay_at(&self, chat: ChatId, days: i64, now: DateTime<Utc>) -> Result<usize>;
    /// Highest point totals first.
    async fn top(&self, chat: ChatId, limit: usize) -> Result<Vec<StrikeRecord>>;
    /// Most recent audit events first.
    async fn strike_events(&self, chat: ChatId, limit: usize) -> Result<Vec<StrikeEvent>>;

    async fn decay(&self, chat: ChatId, days: i64) -> Result<usize> {
        self.decay_at(chat, days, Utc::now()).await
    }
}

/// Durable day-bucketed counters. Increments are atomic and return the new value.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Records one message and returns the user's count for `day` in this topic.
    async fn record_message(&self, chat: ChatId, topic: i32, user: UserId, day: NaiveDate) -> Result<i64>;
    async fn count_messages(&self, chat: ChatId, topic: i32, user: UserId, day: NaiveDate) -> Result<i64>;
    /// Increments a per-user daily hit counter of `kind` and returns the new value.
    async fn bump_hits(&self, chat: ChatId, user: UserId, kind: &str, day: NaiveDate) -> Result<i64>;
    /// Drops day counters older than `day`. Returns the number removed.
    async fn prune_before(&self, day: NaiveDate) -> Result<usize>;

    /// Messages sent today, with "today" running from local midnight in `tz`.
    async fn count_messages_today(&self, chat: ChatId, topic: i32, user: UserId, tz: Tz) -> Result<i64> {
        self.count_messages(chat, topic, user, local_day(Utc::now(), tz)).await
    }
}

/// Append-only moderation and spam logs.
#[async_trait]
pub trait ModerationLog: Send + Sync {
    async fn append_moderation(&self, entry: &ModerationLogEntry) -> Result<()>;
    async fn append_spam_event(&self, event: &SpamEvent) -> Result<()>;
    async fn recent_moderation(&self, chat: ChatId, limit: usize) -> Result<Vec<ModerationLogEntry>>;
    async fn recent_spam_events(&self, chat: ChatId, limit: usize) -> Result<Vec<SpamEvent>>;
}

/// Everything the enforcers need from persistence.
pub trait Store: PolicyStore + StrikeLedger + CounterStore + ModerationLog {}

impl<T: PolicyStore + StrikeLedger + CounterStore + ModerationLog> Store for T {}
