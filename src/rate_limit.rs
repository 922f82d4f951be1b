//! Short-lived per-process state shared by the enforcers: sliding windows,
//! the processed-message dedup cache, per-chat cooldowns and the lock-notice
//! throttle. None of it survives a restart, and none of it is shared between
//! processes.

use moka::sync::Cache;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use teloxide::types::{ChatId, MessageId, UserId};

use crate::config::{limits, window};

/// Weighted events per key within a trailing window.
pub struct SlidingWindow<K> {
    window: Duration,
    events: Mutex<HashMap<K, VecDeque<(Instant, u32)>>>,
}

impl<K: Hash + Eq + Clone> SlidingWindow<K> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Records `weight` at `now` and returns the total weight inside the window.
    pub fn bump(&self, key: K, weight: u32, now: Instant) -> u32 {
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let queue = events.entry(key).or_default();
        while let Some((at, _)) = queue.front() {
            if now.duration_since(*at) >= self.window {
                queue.pop_front();
            } else {
                break;
            }
        }
        queue.push_back((now, weight));
        queue.iter().map(|(_, w)| *w).sum()
    }

    /// Drops keys whose newest event is older than `idle`.
    pub fn sweep(&self, now: Instant, idle: Duration) -> usize {
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = events.len();
        events.retain(|_, queue| {
            queue
                .back()
                .map(|(at, _)| now.duration_since(*at) < idle.max(self.window))
                .unwrap_or(false)
        });
        before - events.len()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process state owned by the moderation engines.
pub struct EngineRuntimeState {
    flood: SlidingWindow<(i64, u64)>,
    emoji: SlidingWindow<(i64, u64)>,
    ai_calls: SlidingWindow<i64>,
    cooldowns: Mutex<HashMap<i64, Instant>>,
    processed: Cache<(i64, i32), ()>,
    lock_notices: Cache<(i64, u64), ()>,
}

impl Default for EngineRuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRuntimeState {
    pub fn new() -> Self {
        Self {
            flood: SlidingWindow::new(window::FLOOD),
            emoji: SlidingWindow::new(window::EMOJI),
            ai_calls: SlidingWindow::new(window::AI_CALLS),
            cooldowns: Mutex::new(HashMap::new()),
            processed: Cache::builder()
                .max_capacity(limits::DEDUP_CAPACITY)
                .time_to_live(Duration::from_secs(limits::DEDUP_TTL_SECS))
                .build(),
            lock_notices: Cache::builder()
                .max_capacity(limits::DEDUP_CAPACITY)
                .time_to_live(window::LOCK_NOTICE)
                .build(),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Messages from this user in this chat within the trailing 10 seconds, this one included.
    pub fn bump_and_count(&self, chat: ChatId, user: UserId) -> u32 {
        self.bump_and_count_at(chat, user, Instant::now())
    }

    pub fn bump_and_count_at(&self, chat: ChatId, user: UserId, now: Instant) -> u32 {
        self.flood.bump((chat.0, user.0), 1, now)
    }

    /// Emoji sent by this user in this chat within the trailing minute, these included.
    pub fn bump_emoji(&self, chat: ChatId, user: UserId, emoji: u32) -> u32 {
        self.emoji.bump((chat.0, user.0), emoji, Instant::now())
    }

    /// Classifier calls for this chat within the trailing minute, this one included.
    pub fn bump_ai_calls(&self, chat: ChatId) -> u32 {
        self.ai_calls.bump(chat.0, 1, Instant::now())
    }

    /// Returns `true` if this message was already handled; marks it handled otherwise.
    pub fn seen_before(&self, chat: ChatId, message: MessageId) -> bool {
        !self.processed.entry((chat.0, message.0)).or_insert(()).is_fresh()
    }

    /// `true` at most once per user per lock-notice window.
    pub fn take_lock_notice(&self, chat: ChatId, user: UserId) -> bool {
        self.lock_notices
            .entry((chat.0, user.0))
            .or_insert(())
            .is_fresh()
    }

    pub fn in_cooldown(&self, chat: ChatId, cooldown_s: u64) -> bool {
        if cooldown_s == 0 {
            return false;
        }
        self.cooldowns
            .lock()
            .ok()
            .and_then(|c| c.get(&chat.0).copied())
            .map(|last| last.elapsed() < Duration::from_secs(cooldown_s))
            .unwrap_or(false)
    }

    pub fn mark_enforced(&self, chat: ChatId) {
        if let Ok(mut cooldowns) = self.cooldowns.lock() {
            cooldowns.insert(chat.0, Instant::now());
        }
    }

    /// Removes idle rate windows and stale cooldowns.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = self.flood.sweep(now, window::IDLE_SWEEP)
            + self.emoji.sweep(now, window::IDLE_SWEEP)
            + self.ai_calls.sweep(now, window::IDLE_SWEEP);
        if let Ok(mut cooldowns) = self.cooldowns.lock() {
            let before = cooldowns.len();
            cooldowns.retain(|_, last| now.duration_since(*last) < window::IDLE_SWEEP);
            removed += before - cooldowns.len();
        }
        self.processed.run_pending_tasks();
        self.lock_notices.run_pending_tasks();
        removed
    }
}

/// Periodically sweeps idle runtime state.
pub async fn run_sweeper(state: Arc<EngineRuntimeState>) {
    let mut ticker = tokio::time::interval(window::IDLE_SWEEP);
    loop {
        ticker.tick().await;
        let removed = state.sweep();
        if removed > 0 {
            log::debug!("Swept {} idle rate-limit entries", removed);
        }
    }
}
