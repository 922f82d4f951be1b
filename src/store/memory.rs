//! In-process store used by tests and the `STORE=memory` development mode.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use teloxide::types::{ChatId, UserId};

use super::{
    CounterStore, ModerationLog, ModerationLogEntry, PolicyStore, SpamEvent, StrikeEvent,
    StrikeLedger, StrikeRecord,
};
use crate::night_mode::NightModeConfig;
use crate::policy::{AiModLayer, LinkFlags, SpamPolicyLayer};

#[derive(Default)]
struct Inner {
    spam: HashMap<i64, SpamPolicyLayer>,
    spam_topics: HashMap<(i64, i32), SpamPolicyLayer>,
    ai: HashMap<(i64, i32), AiModLayer>,
    link: HashMap<i64, LinkFlags>,
    night: HashMap<i64, NightModeConfig>,
    pro: HashSet<i64>,
    owners: HashMap<(i64, i32), BTreeSet<u64>>,
    known: BTreeSet<i64>,
    strikes: HashMap<(i64, u64), StrikeRecord>,
    strike_events: HashMap<i64, Vec<StrikeEvent>>,
    messages: HashMap<(i64, i32, u64, NaiveDate), i64>,
    hits: HashMap<(i64, u64, String, NaiveDate), i64>,
    modlog: HashMap<i64, Vec<ModerationLogEntry>>,
    spamlog: HashMap<i64, Vec<SpamEvent>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

fn newest_first<T: Clone>(items: Option<&Vec<T>>, limit: usize) -> Vec<T> {
    items
        .map(|v| v.iter().rev().take(limit).cloned().collect())
        .unwrap_or_default()
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn spam_layer(&self, chat: ChatId) -> Result<Option<SpamPolicyLayer>> {
        Ok(self.lock()?.spam.get(&chat.0).cloned())
    }

    async fn set_spam_layer(&self, chat: ChatId, layer: &SpamPolicyLayer) -> Result<()> {
        let mut inner = self.lock()?;
        inner.known.insert(chat.0);
        inner.spam.insert(chat.0, layer.clone());
        Ok(())
    }

    async fn spam_topic_layer(&self, chat: ChatId, topic: i32) -> Result<Option<SpamPolicyLayer>> {
        Ok(self.lock()?.spam_topics.get(&(chat.0, topic)).cloned())
    }

    async fn set_spam_topic_layer(
        &self,
        chat: ChatId,
        topic: i32,
        layer: &SpamPolicyLayer,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        inner.known.insert(chat.0);
        inner.spam_topics.insert((chat.0, topic), layer.clone());
        Ok(())
    }

    async fn ai_layer(&self, chat: ChatId, topic: i32) -> Result<Option<AiModLayer>> {
        Ok(self.lock()?.ai.get(&(chat.0, topic)).cloned())
    }

    async fn set_ai_layer(&self, chat: ChatId, topic: i32, layer: &AiModLayer) -> Result<()> {
        let mut inner = self.lock()?;
        inner.known.insert(chat.0);
        inner.ai.insert((chat.0, topic), layer.clone());
        Ok(())
    }

    async fn link_flags(&self, chat: ChatId) -> Result<Option<LinkFlags>> {
        Ok(self.lock()?.link.get(&chat.0).cloned())
    }

    async fn set_link_flags(&self, chat: ChatId, flags: &LinkFlags) -> Result<()> {
        let mut inner = self.lock()?;
        inner.known.insert(chat.0);
        inner.link.insert(chat.0, flags.clone());
        Ok(())
    }

    async fn night_mode(&self, chat: ChatId) -> Result<Option<NightModeConfig>> {
        Ok(self.lock()?.night.get(&chat.0).cloned())
    }

    async fn set_night_mode(&self, chat: ChatId, config: &NightModeConfig) -> Result<()> {
        let mut inner = self.lock()?;
        inner.known.insert(chat.0);
        inner.night.insert(chat.0, config.clone());
        Ok(())
    }

    async fn is_pro(&self, chat: ChatId) -> Result<bool> {
        Ok(self.lock()?.pro.contains(&chat.0))
    }

    async fn set_pro(&self, chat: ChatId, pro: bool) -> Result<()> {
        let mut inner = self.lock()?;
        inner.known.insert(chat.0);
        if pro {
            inner.pro.insert(chat.0);
        } else {
            inner.pro.remove(&chat.0);
        }
        Ok(())
    }

    async fn topic_owners(&self, chat: ChatId, topic: i32) -> Result<BTreeSet<u64>> {
        Ok(self
            .lock()?
            .owners
            .get(&(chat.0, topic))
            .cloned()
            .unwrap_or_default())
    }

    async fn set_topic_owners(&self, chat: ChatId, topic: i32, owners: &BTreeSet<u64>) -> Result<()> {
        let mut inner = self.lock()?;
        inner.known.insert(chat.0);
        inner.owners.insert((chat.0, topic), owners.clone());
        Ok(())
    }

    async fn known_chats(&self) -> Result<Vec<ChatId>> {
        Ok(self.lock()?.known.iter().map(|id| ChatId(*id)).collect())
    }

    async fn purge_chat(&self, chat: ChatId) -> Result<()> {
        let mut inner = self.lock()?;
        let id = chat.0;
        inner.known.remove(&id);
        inner.spam.remove(&id);
        inner.spam_topics.retain(|(c, _), _| *c != id);
        inner.ai.retain(|(c, _), _| *c != id);
        inner.link.remove(&id);
        inner.night.remove(&id);
        inner.pro.remove(&id);
        inner.owners.retain(|(c, _), _| *c != id);
        inner.strikes.retain(|(c, _), _| *c != id);
        inner.strike_events.remove(&id);
        inner.messages.retain(|(c, _, _, _), _| *c != id);
        inner.hits.retain(|(c, _, _, _), _| *c != id);
        inner.modlog.remove(&id);
        inner.spamlog.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl StrikeLedger for MemoryStore {
    async fn add_points(&self, chat: ChatId, user: UserId, points: i64, reason: &str) -> Result<i64> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let record = inner
            .strikes
            .entry((chat.0, user.0))
            .or_insert_with(|| StrikeRecord {
                user_id: user.0,
                points: 0,
                updated: now,
            });
        record.points = (record.points + points).max(0);
        record.updated = now;
        let total = record.points;
        inner.strike_events.entry(chat.0).or_default().push(StrikeEvent {
            chat_id: chat.0,
            user_id: user.0,
            delta: points,
            reason: reason.to_string(),
            at: now,
        });
        Ok(total)
    }

    async fn get_points(&self, chat: ChatId, user: UserId) -> Result<i64> {
        Ok(self
            .lock()?
            .strikes
            .get(&(chat.0, user.0))
            .map(|r| r.points)
            .unwrap_or(0))
    }

    async fn decay_at(&self, chat: ChatId, days: i64, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::days(days);
        let mut inner = self.lock()?;
        let mut decayed = 0;
        for ((c, _), record) in inner.strikes.iter_mut() {
            if *c == chat.0 && record.points > 0 && record.updated < cutoff {
                record.points -= 1;
                decayed += 1;
            }
        }
        Ok(decayed)
    }

    async fn top(&self, chat: ChatId, limit: usize) -> Result<Vec<StrikeRecord>> {
        let inner = self.lock()?;
        let mut records: Vec<StrikeRecord> = inner
            .strikes
            .iter()
            .filter(|((c, _), r)| *c == chat.0 && r.points > 0)
            .map(|(_, r)| r.clone())
            .collect();
        records.sort_by(|a, b| b.points.cmp(&a.points).then(a.user_id.cmp(&b.user_id)));
        records.truncate(limit);
        Ok(records)
    }

    async fn strike_events(&self, chat: ChatId, limit: usize) -> Result<Vec<StrikeEvent>> {
        Ok(newest_first(self.lock()?.strike_events.get(&chat.0), limit))
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn record_message(&self, chat: ChatId, topic: i32, user: UserId, day: NaiveDate) -> Result<i64> {
        let mut inner = self.lock()?;
        let count = inner.messages.entry((chat.0, topic, user.0, day)).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn count_messages(&self, chat: ChatId, topic: i32, user: UserId, day: NaiveDate) -> Result<i64> {
        Ok(self
            .lock()?
            .messages
            .get(&(chat.0, topic, user.0, day))
            .copied()
            .unwrap_or(0))
    }

    async fn bump_hits(&self, chat: ChatId, user: UserId, kind: &str, day: NaiveDate) -> Result<i64> {
        let mut inner = self.lock()?;
        let count = inner
            .hits
            .entry((chat.0, user.0, kind.to_string(), day))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn prune_before(&self, day: NaiveDate) -> Result<usize> {
        let mut inner = self.lock()?;
        let before = inner.messages.len() + inner.hits.len();
        inner.messages.retain(|(_, _, _, d), _| *d >= day);
        inner.hits.retain(|(_, _, _, d), _| *d >= day);
        Ok(before - inner.messages.len() - inner.hits.len())
    }
}

#[async_trait]
impl ModerationLog for MemoryStore {
    async fn append_moderation(&self, entry: &ModerationLogEntry) -> Result<()> {
        self.lock()?
            .modlog
            .entry(entry.chat_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn append_spam_event(&self, event: &SpamEvent) -> Result<()> {
        self.lock()?
            .spamlog
            .entry(event.chat_id)
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn recent_moderation(&self, chat: ChatId, limit: usize) -> Result<Vec<ModerationLogEntry>> {
        Ok(newest_first(self.lock()?.modlog.get(&chat.0), limit))
    }

    async fn recent_spam_events(&self, chat: ChatId, limit: usize) -> Result<Vec<SpamEvent>> {
        Ok(newest_first(self.lock()?.spamlog.get(&chat.0), limit))
    }
}
