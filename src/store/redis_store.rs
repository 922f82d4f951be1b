//! Redis-backed store. Policies live as JSON documents in a per-chat hash,
//! counters are atomic `INCR`s with an expiry.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use teloxide::types::{ChatId, UserId};

use super::{
    CounterStore, ModerationLog, ModerationLogEntry, PolicyStore, SpamEvent, StrikeEvent,
    StrikeLedger, StrikeRecord,
};
use crate::config::{field, key, limits, suffix};
use crate::night_mode::NightModeConfig;
use crate::policy::{AiModLayer, LinkFlags, SpamPolicyLayer};

pub struct RedisStore {
    conn: MultiplexedConnection,
}

fn policy_key(chat: ChatId) -> String {
    format!("{}{}", key::POLICY_PREFIX, chat.0)
}

fn strikes_key(chat: ChatId, suffix: &str) -> String {
    format!("{}{}{}", key::STRIKES_PREFIX, chat.0, suffix)
}

pub fn quota_key(chat: ChatId, topic: i32, user: UserId, day: NaiveDate) -> String {
    format!(
        "{}{}:{}:{}:{}",
        key::QUOTA_PREFIX,
        chat.0,
        topic,
        user.0,
        day.format("%Y-%m-%d")
    )
}

pub fn hits_key(chat: ChatId, user: UserId, kind: &str, day: NaiveDate) -> String {
    format!(
        "{}{}:{}:{}:{}",
        key::HITS_PREFIX,
        kind,
        chat.0,
        user.0,
        day.format("%Y-%m-%d")
    )
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    async fn get_json<T: DeserializeOwned>(&self, chat: ChatId, name: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(policy_key(chat), name).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync>(&self, chat: ChatId, name: &str, value: &T) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(value)?;
        let _: () = conn.hset(policy_key(chat), name, json).await?;
        let _: () = conn.sadd(key::KNOWN_CHATS, chat.0).await?;
        Ok(())
    }

    async fn incr_with_expiry(&self, counter_key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(counter_key, 1)
            .cmd("EXPIRE")
            .arg(counter_key)
            .arg(limits::COUNTER_TTL_SECS)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn recent<T: DeserializeOwned>(&self, list_key: String, limit: usize) -> Result<Vec<T>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(list_key, 0, limit as isize - 1).await?;
        Ok(raw
            .iter()
            .filter_map(|json| serde_json::from_str(json).ok())
            .collect())
    }

    async fn push_capped<T: Serialize + Sync>(&self, list_key: String, value: &T) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(value)?;
        let _: () = redis::pipe()
            .atomic()
            .lpush(&list_key, json)
            .ignore()
            .ltrim(&list_key, 0, limits::LOG_MAX_ENTRIES - 1)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PolicyStore for RedisStore {
    async fn spam_layer(&self, chat: ChatId) -> Result<Option<SpamPolicyLayer>> {
        self.get_json(chat, field::SPAM).await
    }

    async fn set_spam_layer(&self, chat: ChatId, layer: &SpamPolicyLayer) -> Result<()> {
        self.set_json(chat, field::SPAM, layer).await
    }

    async fn spam_topic_layer(&self, chat: ChatId, topic: i32) -> Result<Option<SpamPolicyLayer>> {
        self.get_json(chat, &format!("{}{}", field::SPAM_TOPIC, topic))
            .await
    }

    async fn set_spam_topic_layer(
        &self,
        chat: ChatId,
        topic: i32,
        layer: &SpamPolicyLayer,
    ) -> Result<()> {
        self.set_json(chat, &format!("{}{}", field::SPAM_TOPIC, topic), layer)
            .await
    }

    async fn ai_layer(&self, chat: ChatId, topic: i32) -> Result<Option<AiModLayer>> {
        self.get_json(chat, &format!("{}{}", field::AI_TOPIC, topic))
            .await
    }

    async fn set_ai_layer(&self, chat: ChatId, topic: i32, layer: &AiModLayer) -> Result<()> {
        self.set_json(chat, &format!("{}{}", field::AI_TOPIC, topic), layer)
            .await
    }

    async fn link_flags(&self, chat: ChatId) -> Result<Option<LinkFlags>> {
        self.get_json(chat, field::LINK).await
    }

    async fn set_link_flags(&self, chat: ChatId, flags: &LinkFlags) -> Result<()> {
        self.set_json(chat, field::LINK, flags).await
    }

    async fn night_mode(&self, chat: ChatId) -> Result<Option<NightModeConfig>> {
        self.get_json(chat, field::NIGHT).await
    }

    async fn set_night_mode(&self, chat: ChatId, config: &NightModeConfig) -> Result<()> {
        self.set_json(chat, field::NIGHT, config).await
    }

    async fn is_pro(&self, chat: ChatId) -> Result<bool> {
        Ok(self.get_json::<bool>(chat, field::PRO).await?.unwrap_or(false))
    }

    async fn set_pro(&self, chat: ChatId, pro: bool) -> Result<()> {
        self.set_json(chat, field::PRO, &pro).await
    }

    async fn topic_owners(&self, chat: ChatId, topic: i32) -> Result<BTreeSet<u64>> {
        Ok(self
            .get_json(chat, &format!("{}{}", field::TOPIC_OWNERS, topic))
            .await?
            .unwrap_or_default())
    }

    async fn set_topic_owners(&self, chat: ChatId, topic: i32, owners: &BTreeSet<u64>) -> Result<()> {
        self.set_json(chat, &format!("{}{}", field::TOPIC_OWNERS, topic), owners)
            .await
    }

    async fn known_chats(&self) -> Result<Vec<ChatId>> {
        let mut conn = self.conn.clone();
        let ids: Vec<i64> = conn.smembers(key::KNOWN_CHATS).await?;
        Ok(ids.into_iter().map(ChatId).collect())
    }

    async fn purge_chat(&self, chat: ChatId) -> Result<()> {
        let mut conn = self.conn.clone();
        let keys = vec![
            policy_key(chat),
            strikes_key(chat, suffix::POINTS),
            strikes_key(chat, suffix::UPDATED),
            strikes_key(chat, suffix::EVENTS),
            format!("{}{}", key::MODLOG_PREFIX, chat.0),
            format!("{}{}", key::SPAMLOG_PREFIX, chat.0),
        ];
        let _: () = conn.del(keys).await?;
        let _: () = conn.srem(key::KNOWN_CHATS, chat.0).await?;
        log::info!("Purged all moderation data for chat {}", chat.0);
        Ok(())
    }
}

#[async_trait]
impl StrikeLedger for RedisStore {
    async fn add_points(&self, chat: ChatId, user: UserId, points: i64, reason: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        let now = Utc::now();
        let event = StrikeEvent {
            chat_id: chat.0,
            user_id: user.0,
            delta: points,
            reason: reason.to_string(),
            at: now,
        };
        let events_key = strikes_key(chat, suffix::EVENTS);
        let (total,): (i64,) = redis::pipe()
            .atomic()
            .hincr(strikes_key(chat, suffix::POINTS), user.0, points)
            .hset(strikes_key(chat, suffix::UPDATED), user.0, now.timestamp())
            .ignore()
            .lpush(&events_key, serde_json::to_string(&event)?)
            .ignore()
            .ltrim(&events_key, 0, limits::STRIKE_EVENTS_MAX - 1)
            .ignore()
            .query_async(&mut conn)
            .await?;

        if total < 0 {
            let _: () = conn
                .hset(strikes_key(chat, suffix::POINTS), user.0, 0)
                .await?;
            return Ok(0);
        }
        Ok(total)
    }

    async fn get_points(&self, chat: ChatId, user: UserId) -> Result<i64> {
        let mut conn = self.conn.clone();
        let points: Option<i64> = conn.hget(strikes_key(chat, suffix::POINTS), user.0).await?;
        Ok(points.unwrap_or(0).max(0))
    }

    async fn decay_at(&self, chat: ChatId, days: i64, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn.clone();
        let cutoff = (now - Duration::days(days)).timestamp();
        let points_key = strikes_key(chat, suffix::POINTS);
        let updated: HashMap<String, i64> = conn.hgetall(strikes_key(chat, suffix::UPDATED)).await?;

        let mut decayed = 0;
        for (user, ts) in updated {
            if ts >= cutoff {
                continue;
            }
            let points: Option<i64> = conn.hget(&points_key, &user).await?;
            if points.unwrap_or(0) <= 0 {
                continue;
            }
            let remaining: i64 = conn.hincr(&points_key, &user, -1).await?;
            if remaining < 0 {
                let _: () = conn.hset(&points_key, &user, 0).await?;
            }
            decayed += 1;
        }
        Ok(decayed)
    }

    async fn top(&self, chat: ChatId, limit: usize) -> Result<Vec<StrikeRecord>> {
        let mut conn = self.conn.clone();
        let points: HashMap<String, i64> = conn.hgetall(strikes_key(chat, suffix::POINTS)).await?;
        let updated: HashMap<String, i64> = conn.hgetall(strikes_key(chat, suffix::UPDATED)).await?;

        let mut records: Vec<StrikeRecord> = points
            .into_iter()
            .filter(|(_, p)| *p > 0)
            .filter_map(|(user, p)| {
                let user_id = user.parse::<u64>().ok()?;
                let ts = updated.get(&user).copied().unwrap_or(0);
                Some(StrikeRecord {
                    user_id,
                    points: p,
                    updated: Utc.timestamp_opt(ts, 0).single().unwrap_or_else(Utc::now),
                })
            })
            .collect();
        records.sort_by(|a, b| b.points.cmp(&a.points).then(a.user_id.cmp(&b.user_id)));
        records.truncate(limit);
        Ok(records)
    }

    async fn strike_events(&self, chat: ChatId, limit: usize) -> Result<Vec<StrikeEvent>> {
        self.recent(strikes_key(chat, suffix::EVENTS), limit).await
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn record_message(&self, chat: ChatId, topic: i32, user: UserId, day: NaiveDate) -> Result<i64> {
        self.incr_with_expiry(&quota_key(chat, topic, user, day)).await
    }

    async fn count_messages(&self, chat: ChatId, topic: i32, user: UserId, day: NaiveDate) -> Result<i64> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = conn.get(quota_key(chat, topic, user, day)).await?;
        Ok(count.unwrap_or(0))
    }

    async fn bump_hits(&self, chat: ChatId, user: UserId, kind: &str, day: NaiveDate) -> Result<i64> {
        self.incr_with_expiry(&hits_key(chat, user, kind, day)).await
    }

    async fn prune_before(&self, _day: NaiveDate) -> Result<usize> {
        // Day counters carry their own expiry.
        Ok(0)
    }
}

#[async_trait]
impl ModerationLog for RedisStore {
    async fn append_moderation(&self, entry: &ModerationLogEntry) -> Result<()> {
        self.push_capped(format!("{}{}", key::MODLOG_PREFIX, entry.chat_id), entry)
            .await
    }

    async fn append_spam_event(&self, event: &SpamEvent) -> Result<()> {
        self.push_capped(format!("{}{}", key::SPAMLOG_PREFIX, event.chat_id), event)
            .await
    }

    async fn recent_moderation(&self, chat: ChatId, limit: usize) -> Result<Vec<ModerationLogEntry>> {
        self.recent(format!("{}{}", key::MODLOG_PREFIX, chat.0), limit)
            .await
    }

    async fn recent_spam_events(&self, chat: ChatId, limit: usize) -> Result<Vec<SpamEvent>> {
        self.recent(format!("{}{}", key::SPAMLOG_PREFIX, chat.0), limit)
            .await
    }
}
