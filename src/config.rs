//! Centralized configuration for Redis keys, moderation tables, and runtime settings.

use std::env;
use std::time::Duration;

/// **Redis Key Prefixes:** identify categories of data stored in Redis.
pub mod key {
    /// Set of every chat the bot has stored policy for.
    pub const KNOWN_CHATS: &str = "tg:chats:known";
    /// Prefix for a chat's policy hash (e.g. `"tg:policy:<chat_id>"`).
    pub const POLICY_PREFIX: &str = "tg:policy:";
    /// Prefix for a chat's strike point hash (e.g. `"tg:strikes:<chat_id>:points"`).
    pub const STRIKES_PREFIX: &str = "tg:strikes:";
    /// Prefix for daily per-topic message counters
    /// (e.g. `"tg:quota:<chat_id>:<topic>:<user_id>:<YYYY-MM-DD>"`).
    pub const QUOTA_PREFIX: &str = "tg:quota:";
    /// Prefix for daily enforcement-hit counters
    /// (e.g. `"tg:hits:<kind>:<chat_id>:<user_id>:<YYYY-MM-DD>"`).
    pub const HITS_PREFIX: &str = "tg:hits:";
    /// Prefix for the AI moderation log list (e.g. `"tg:modlog:<chat_id>"`).
    pub const MODLOG_PREFIX: &str = "tg:modlog:";
    /// Prefix for the spam event log list (e.g. `"tg:spamlog:<chat_id>"`).
    pub const SPAMLOG_PREFIX: &str = "tg:spamlog:";
}

/// **Redis Key Suffixes:** common endings for composite Redis keys.
pub mod suffix {
    /// Strike points per user.
    pub const POINTS: &str = ":points";
    /// Last strike update timestamp per user.
    pub const UPDATED: &str = ":updated";
    /// Strike audit events.
    pub const EVENTS: &str = ":events";
}

/// **Redis Hash Field Names:** fields within the `tg:policy:<chat_id>` hash.
pub mod field {
    /// Global spam policy layer.
    pub const SPAM: &str = "spam";
    /// Prefix for a topic spam override (e.g. `"spam:<topic>"`).
    pub const SPAM_TOPIC: &str = "spam:";
    /// Prefix for an AI moderation layer (e.g. `"ai:<topic>"`, topic 0 is the default).
    pub const AI_TOPIC: &str = "ai:";
    /// Group-wide link protection flags.
    pub const LINK: &str = "link";
    /// Night mode configuration.
    pub const NIGHT: &str = "night";
    /// Pro tier flag.
    pub const PRO: &str = "pro";
    /// Prefix for the topic owner list (e.g. `"owners:<topic>"`).
    pub const TOPIC_OWNERS: &str = "owners:";
}

/// Hit-counter kinds kept per user per day.
pub mod hits {
    /// Spam enforcer violations.
    pub const SPAM: &str = "spam";
    /// AI moderation enforcement actions.
    pub const AI: &str = "ai";
    /// Link warnings already sent under `warn_once`.
    pub const LINK_WARNED: &str = "link_warned";
}

/// Sliding windows and periodic task intervals.
pub mod window {
    use std::time::Duration;

    /// Flood detection window.
    pub const FLOOD: Duration = Duration::from_secs(10);
    /// Emoji-per-minute window.
    pub const EMOJI: Duration = Duration::from_secs(60);
    /// Classifier call budget window.
    pub const AI_CALLS: Duration = Duration::from_secs(60);
    /// One "chat is locked" reply per user within this window.
    pub const LOCK_NOTICE: Duration = Duration::from_secs(60);
    /// Night mode scheduler tick.
    pub const NIGHT_TICK: Duration = Duration::from_secs(60);
    /// Strike decay and counter pruning.
    pub const MAINTENANCE_TICK: Duration = Duration::from_secs(24 * 60 * 60);
    /// Pause between chats inside a periodic tick.
    pub const BETWEEN_CHATS: Duration = Duration::from_millis(25);
    /// Rate windows untouched for this long are swept.
    pub const IDLE_SWEEP: Duration = Duration::from_secs(10 * 60);
}

/// In-process cache sizes and retention.
pub mod limits {
    /// Recently processed messages remembered for dedup.
    pub const DEDUP_CAPACITY: u64 = 10_000;
    /// Seconds a processed message id stays in the dedup cache.
    pub const DEDUP_TTL_SECS: u64 = 60 * 60;
    /// Entries kept per chat in the moderation and spam logs.
    pub const LOG_MAX_ENTRIES: isize = 1000;
    /// Entries kept per chat in the strike audit log.
    pub const STRIKE_EVENTS_MAX: isize = 1000;
    /// Daily counters expire after this many seconds.
    pub const COUNTER_TTL_SECS: i64 = 3 * 24 * 60 * 60;
    /// Day counters older than this many days are pruned.
    pub const COUNTER_RETENTION_DAYS: i64 = 2;
    /// Mute applied by the spam enforcer when its action is `mute`.
    pub const SPAM_MUTE_MINUTES: i64 = 10;
    /// Gate applied to `sexual_minors` when `block_sexual_minors` is set.
    pub const SEXUAL_MINORS_GATE: f64 = 0.01;
}

/// Preset numeric ceilings per spam level: `(emoji_per_msg, emoji_per_min, msgs_per_10s)`.
pub mod level_preset {
    pub const LIGHT: (u32, u32, u32) = (30, 60, 10);
    pub const MEDIUM: (u32, u32, u32) = (15, 30, 7);
    pub const STRICT: (u32, u32, u32) = (6, 15, 5);
}

/// Remaining-quota values that trigger a notice in `smart` mode.
pub const QUOTA_SMART_THRESHOLDS: &[i64] = &[10, 5, 2, 1, 0];

/// Strike severity multipliers per violation category.
pub const SEVERITY_TABLE: &[(&str, i64)] = &[
    ("toxicity", 1),
    ("harassment", 1),
    ("link_risk", 1),
    ("hate", 2),
    ("sexual", 2),
    ("selfharm", 2),
    ("violence", 2),
    ("nudity", 2),
    ("violence_visual", 2),
    ("weapons", 2),
    ("gore", 3),
    ("sexual_minors", 5),
];

/// Severity multiplier for a category; unknown categories count as 1.
pub fn severity_of(category: &str) -> i64 {
    SEVERITY_TABLE
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, weight)| *weight)
        .unwrap_or(1)
}

/// Default Redis URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1/";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Runtime settings read from the environment (with `.env` support).
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_username: String,
    pub redis_url: String,
    pub use_memory_store: bool,
    pub openai_api_key: Option<String>,
    /// API root the classifier endpoints hang off, without a trailing slash.
    pub openai_base_url: String,
    pub moderation_model: String,
    pub vision_model: String,
    pub classifier_timeout: Duration,
}

impl Settings {
    /// Reads settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let timeout_secs = env::var("CLASSIFIER_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(8);

        Self {
            bot_username: env::var("BOT_USERNAME").unwrap_or_else(|_| "emerald_bot".to_string()),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            use_memory_store: env::var("STORE").map(|v| v == "memory").unwrap_or(false),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string()),
            moderation_model: env::var("AI_MODERATION_MODEL")
                .unwrap_or_else(|_| "omni-moderation-latest".to_string()),
            vision_model: env::var("AI_VISION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            classifier_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_lookup() {
        assert_eq!(severity_of("toxicity"), 1);
        assert_eq!(severity_of("gore"), 3);
        assert_eq!(severity_of("sexual_minors"), 5);
        assert_eq!(severity_of("something_new"), 1);
    }
}
