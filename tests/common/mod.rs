#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use teloxide::types::{ChatId, MessageId, UserId};

use emerald_moderator::actions::ChatActions;
use emerald_moderator::classifier::{CategoryScores, Classifier};
use emerald_moderator::message::{IncomingMessage, MediaAttachment, MediaKind, Privileges};
use emerald_moderator::night_mode::NightModeConfig;
use emerald_moderator::policy::{AiModLayer, LinkFlags, SpamPolicyLayer};
use emerald_moderator::store::{
    CounterStore, MemoryStore, ModerationLog, ModerationLogEntry, PolicyStore, SpamEvent,
    StrikeEvent, StrikeLedger, StrikeRecord,
};

pub const CHAT: ChatId = ChatId(-1001234);
pub const USER: UserId = UserId(42);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Delete(i64, i32),
    Send(i64, Option<i32>, String),
    Restrict(i64, u64, DateTime<Utc>),
    Ban(i64, u64),
    Permissions(i64, bool),
}

/// Records every platform call; deletes can be made to fail.
#[derive(Default)]
pub struct RecordingActions {
    calls: Mutex<Vec<Call>>,
    pub fail_deletes: AtomicBool,
}

impl RecordingActions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Delete(..))).count()
    }

    pub fn sent(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send(_, _, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn restricts(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Restrict(..))).count()
    }

    pub fn bans(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Ban(..))).count()
    }

    /// Delete, restrict, ban or permission changes.
    pub fn mutations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !matches!(c, Call::Send(..)))
            .count()
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatActions for RecordingActions {
    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        self.push(Call::Delete(chat.0, message.0));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(anyhow!("Bad Request: message can't be deleted"));
        }
        Ok(())
    }

    async fn send_message(&self, chat: ChatId, topic: Option<i32>, text: &str) -> Result<()> {
        self.push(Call::Send(chat.0, topic, text.to_string()));
        Ok(())
    }

    async fn restrict_member(&self, chat: ChatId, user: UserId, until: DateTime<Utc>) -> Result<()> {
        self.push(Call::Restrict(chat.0, user.0, until));
        Ok(())
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<()> {
        self.push(Call::Ban(chat.0, user.0));
        Ok(())
    }

    async fn set_chat_permissions(&self, chat: ChatId, can_send: bool) -> Result<()> {
        self.push(Call::Permissions(chat.0, can_send));
        Ok(())
    }
}

/// Returns fixed scores, counts calls and records chat-specific models.
#[derive(Default)]
pub struct ScriptedClassifier {
    pub text: Option<CategoryScores>,
    pub image: Option<CategoryScores>,
    pub calls: AtomicUsize,
    pub models: Mutex<Vec<String>>,
}

impl ScriptedClassifier {
    pub fn text(scores: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            text: Some(to_scores(scores)),
            ..Default::default()
        })
    }

    pub fn image(scores: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            image: Some(to_scores(scores)),
            ..Default::default()
        })
    }

    pub fn silent() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify_text(&self, _text: &str) -> Option<CategoryScores> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.text.clone()
    }

    async fn classify_image(&self, _url: &str) -> Option<CategoryScores> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.image.clone()
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    async fn classify_text_with(&self, text: &str, model: &str) -> Option<CategoryScores> {
        self.models.lock().unwrap().push(model.to_string());
        self.classify_text(text).await
    }

    async fn classify_image_with(&self, url: &str, model: &str) -> Option<CategoryScores> {
        self.models.lock().unwrap().push(model.to_string());
        self.classify_image(url).await
    }
}

/// A [`MemoryStore`] whose strike writes or decay can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_add_points: AtomicBool,
    /// Chat id whose decay fails; 0 for none.
    pub fail_decay_chat: AtomicI64,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl PolicyStore for FlakyStore {
    async fn spam_layer(&self, chat: ChatId) -> Result<Option<SpamPolicyLayer>> {
        self.inner.spam_layer(chat).await
    }
    async fn set_spam_layer(&self, chat: ChatId, layer: &SpamPolicyLayer) -> Result<()> {
        self.inner.set_spam_layer(chat, layer).await
    }
    async fn spam_topic_layer(&self, chat: ChatId, topic: i32) -> Result<Option<SpamPolicyLayer>> {
        self.inner.spam_topic_layer(chat, topic).await
    }
    async fn set_spam_topic_layer(
        &self,
        chat: ChatId,
        topic: i32,
        layer: &SpamPolicyLayer,
    ) -> Result<()> {
        self.inner.set_spam_topic_layer(chat, topic, layer).await
    }
    async fn ai_layer(&self, chat: ChatId, topic: i32) -> Result<Option<AiModLayer>> {
        self.inner.ai_layer(chat, topic).await
    }
    async fn set_ai_layer(&self, chat: ChatId, topic: i32, layer: &AiModLayer) -> Result<()> {
        self.inner.set_ai_layer(chat, topic, layer).await
    }
    async fn link_flags(&self, chat: ChatId) -> Result<Option<LinkFlags>> {
        self.inner.link_flags(chat).await
    }
    async fn set_link_flags(&self, chat: ChatId, flags: &LinkFlags) -> Result<()> {
        self.inner.set_link_flags(chat, flags).await
    }
    async fn night_mode(&self, chat: ChatId) -> Result<Option<NightModeConfig>> {
        self.inner.night_mode(chat).await
    }
    async fn set_night_mode(&self, chat: ChatId, config: &NightModeConfig) -> Result<()> {
        self.inner.set_night_mode(chat, config).await
    }
    async fn is_pro(&self, chat: ChatId) -> Result<bool> {
        self.inner.is_pro(chat).await
    }
    async fn set_pro(&self, chat: ChatId, pro: bool) -> Result<()> {
        self.inner.set_pro(chat, pro).await
    }
    async fn topic_owners(&self, chat: ChatId, topic: i32) -> Result<BTreeSet<u64>> {
        self.inner.topic_owners(chat, topic).await
    }
    async fn set_topic_owners(&self, chat: ChatId, topic: i32, owners: &BTreeSet<u64>) -> Result<()> {
        self.inner.set_topic_owners(chat, topic, owners).await
    }
    async fn known_chats(&self) -> Result<Vec<ChatId>> {
        self.inner.known_chats().await
    }
    async fn purge_chat(&self, chat: ChatId) -> Result<()> {
        self.inner.purge_chat(chat).await
    }
}

#[async_trait]
impl StrikeLedger for FlakyStore {
    async fn add_points(&self, chat: ChatId, user: UserId, points: i64, reason: &str) -> Result<i64> {
        if self.fail_add_points.load(Ordering::SeqCst) {
            return Err(anyhow!("strike ledger unavailable"));
        }
        self.inner.add_points(chat, user, points, reason).await
    }
    async fn get_points(&self, chat: ChatId, user: UserId) -> Result<i64> {
        self.inner.get_points(chat, user).await
    }
    async fn decay_at(&self, chat: ChatId, days: i64, now: DateTime<Utc>) -> Result<usize> {
        if self.fail_decay_chat.load(Ordering::SeqCst) == chat.0 {
            return Err(anyhow!("decay failed for chat {}", chat));
        }
        self.inner.decay_at(chat, days, now).await
    }
    async fn top(&self, chat: ChatId, limit: usize) -> Result<Vec<StrikeRecord>> {
        self.inner.top(chat, limit).await
    }
    async fn strike_events(&self, chat: ChatId, limit: usize) -> Result<Vec<StrikeEvent>> {
        self.inner.strike_events(chat, limit).await
    }
}

#[async_trait]
impl CounterStore for FlakyStore {
    async fn record_message(&self, chat: ChatId, topic: i32, user: UserId, day: NaiveDate) -> Result<i64> {
        self.inner.record_message(chat, topic, user, day).await
    }
    async fn count_messages(&self, chat: ChatId, topic: i32, user: UserId, day: NaiveDate) -> Result<i64> {
        self.inner.count_messages(chat, topic, user, day).await
    }
    async fn bump_hits(&self, chat: ChatId, user: UserId, kind: &str, day: NaiveDate) -> Result<i64> {
        self.inner.bump_hits(chat, user, kind, day).await
    }
    async fn prune_before(&self, day: NaiveDate) -> Result<usize> {
        self.inner.prune_before(day).await
    }
}

#[async_trait]
impl ModerationLog for FlakyStore {
    async fn append_moderation(&self, entry: &ModerationLogEntry) -> Result<()> {
        self.inner.append_moderation(entry).await
    }
    async fn append_spam_event(&self, event: &SpamEvent) -> Result<()> {
        self.inner.append_spam_event(event).await
    }
    async fn recent_moderation(&self, chat: ChatId, limit: usize) -> Result<Vec<ModerationLogEntry>> {
        self.inner.recent_moderation(chat, limit).await
    }
    async fn recent_spam_events(&self, chat: ChatId, limit: usize) -> Result<Vec<SpamEvent>> {
        self.inner.recent_spam_events(chat, limit).await
    }
}

pub fn to_scores(scores: &[(&str, f64)]) -> CategoryScores {
    scores.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn message(id: i32, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id: CHAT,
        topic_id: None,
        sender_id: Some(USER),
        message_id: MessageId(id),
        text: text.to_string(),
        entities: Vec::new(),
        media: None,
        privileges: Privileges::default(),
    }
}

pub fn photo_message(id: i32) -> IncomingMessage {
    IncomingMessage {
        media: Some(MediaAttachment {
            kind: MediaKind::Photo,
            url: "https://cdn.example/photo.jpg".to_string(),
        }),
        ..message(id, "")
    }
}
