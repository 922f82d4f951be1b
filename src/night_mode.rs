//! Night mode: a time-of-day quiet window per chat.
//!
//! The scheduler tick flips chat-wide permissions on window edges; per-message
//! enforcement deletes non-admin messages while the window is open.

use anyhow::Result;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use teloxide::types::ChatId;
use tokio::time::sleep;

use crate::actions::ChatActions;
use crate::config::window;
use crate::error::PolicyError;
use crate::message::IncomingMessage;
use crate::rate_limit::EngineRuntimeState;
use crate::store::Store;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NightModeConfig {
    pub enabled: bool,
    /// Minute of day (0..1439) the window opens.
    pub start_minute: u32,
    /// Minute of day the window closes; may be earlier than `start_minute`.
    pub end_minute: u32,
    pub delete_non_admin_msgs: bool,
    pub warn_once: bool,
    pub timezone: String,
    /// Lock the chat through platform permissions instead of deleting messages.
    pub hard_mode: bool,
    /// Manual "quiet now" that wins over the schedule until it expires.
    pub override_until: Option<DateTime<Utc>>,
    pub write_lock: bool,
    pub lock_message: Option<String>,
}

impl Default for NightModeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_minute: 22 * 60,
            end_minute: 7 * 60,
            delete_non_admin_msgs: true,
            warn_once: true,
            timezone: "UTC".to_string(),
            hard_mode: false,
            override_until: None,
            write_lock: false,
            lock_message: None,
        }
    }
}

impl NightModeConfig {
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }

    pub fn override_active(&self, now: DateTime<Utc>) -> bool {
        self.override_until.map(|until| until > now).unwrap_or(false)
    }

    /// Sets the window, validating both minutes.
    pub fn set_window(&mut self, start_minute: u32, end_minute: u32) -> Result<(), PolicyError> {
        for minute in [start_minute, end_minute] {
            if minute >= MINUTES_PER_DAY {
                return Err(PolicyError::InvalidMinute(minute));
            }
        }
        self.start_minute = start_minute;
        self.end_minute = end_minute;
        Ok(())
    }

    /// Local `HH:MM` at which the current quiet period ends.
    pub fn quiet_until_label(&self, now: DateTime<Utc>) -> String {
        match self.override_until {
            Some(until) if until > now => {
                let local = until.with_timezone(&self.tz());
                format!("{:02}:{:02}", local.hour(), local.minute())
            }
            _ => format_hhmm(self.end_minute),
        }
    }
}

/// Whether `minute` falls in `[start, end)`, wrapping past midnight when `start > end`.
pub fn in_window(start: u32, end: u32, minute: u32) -> bool {
    if start == end {
        false
    } else if start < end {
        minute >= start && minute < end
    } else {
        minute >= start || minute < end
    }
}

/// A live override always wins; otherwise the schedule decides, in the chat's timezone.
pub fn is_quiet(config: &NightModeConfig, now: DateTime<Utc>) -> bool {
    if config.override_active(now) {
        return true;
    }
    if !config.enabled {
        return false;
    }
    let local = now.with_timezone(&config.tz());
    let minute = local.hour() * 60 + local.minute();
    in_window(config.start_minute, config.end_minute, minute)
}

/// Parses `HH:MM` into a minute of day.
pub fn parse_hhmm(input: &str) -> Result<u32, PolicyError> {
    let invalid = || PolicyError::InvalidTime(input.to_string());
    let (hours, minutes) = input.trim().split_once(':').ok_or_else(invalid)?;
    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

pub fn format_hhmm(minute: u32) -> String {
    format!("{:02}:{:02}", (minute / 60) % 24, minute % 60)
}

/// Window edge seen by a scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightTransition {
    Entered,
    Exited,
}

pub struct NightModeScheduler {
    store: Arc<dyn Store>,
    actions: Arc<dyn ChatActions>,
    state: Arc<EngineRuntimeState>,
    active: Mutex<HashMap<i64, bool>>,
}

impl NightModeScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        actions: Arc<dyn ChatActions>,
        state: Arc<EngineRuntimeState>,
    ) -> Self {
        Self {
            store,
            actions,
            state,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub async fn start(&self) {
        loop {
            if let Err(e) = self.tick(Utc::now()).await {
                log::error!("Night mode tick failed: {}", e);
            }
            sleep(window::NIGHT_TICK).await;
        }
    }

    /// Re-evaluates every known chat and returns the edges crossed.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<(ChatId, NightTransition)>> {
        let mut transitions = Vec::new();
        for chat in self.store.known_chats().await? {
            match self.tick_chat(chat, now).await {
                Ok(Some(transition)) => transitions.push((chat, transition)),
                Ok(None) => {}
                Err(e) => log::warn!("Night mode check failed for chat {}: {}", chat, e),
            }
            sleep(window::BETWEEN_CHATS).await;
        }
        Ok(transitions)
    }

    async fn tick_chat(&self, chat: ChatId, now: DateTime<Utc>) -> Result<Option<NightTransition>> {
        let Some(config) = self.store.night_mode(chat).await? else {
            return Ok(None);
        };
        let quiet = is_quiet(&config, now);
        let was_quiet = self.swap_active(chat, quiet);
        if quiet == was_quiet {
            return Ok(None);
        }

        let locks_chat = config.hard_mode || config.write_lock;
        if quiet {
            log::info!("Night mode on in chat {}", chat);
            if locks_chat {
                if let Err(e) = self.actions.set_chat_permissions(chat, false).await {
                    log::warn!("Failed to lock chat {}: {}", chat, e);
                }
            }
            if config.warn_once {
                let notice = format!("🌙 Quiet mode until {}.", config.quiet_until_label(now));
                self.notify(chat, &notice).await;
            }
            Ok(Some(NightTransition::Entered))
        } else {
            log::info!("Night mode off in chat {}", chat);
            if locks_chat {
                if let Err(e) = self.actions.set_chat_permissions(chat, true).await {
                    log::warn!("Failed to unlock chat {}: {}", chat, e);
                }
            }
            if config.warn_once {
                self.notify(chat, "☀️ Quiet mode ended.").await;
            }
            Ok(Some(NightTransition::Exited))
        }
    }

    fn swap_active(&self, chat: ChatId, quiet: bool) -> bool {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.insert(chat.0, quiet).unwrap_or(false)
    }

    async fn notify(&self, chat: ChatId, text: &str) {
        if let Err(e) = self.actions.send_message(chat, None, text).await {
            log::warn!("Failed to send night mode notice to chat {}: {}", chat, e);
        }
    }

    /// Deletes a non-admin message sent inside the quiet window. Returns `true`
    /// when the message was removed.
    pub async fn enforce_message(&self, msg: &IncomingMessage, now: DateTime<Utc>) -> Result<bool> {
        let Some(config) = self.store.night_mode(msg.chat_id).await? else {
            return Ok(false);
        };
        if !config.delete_non_admin_msgs || config.write_lock || !is_quiet(&config, now) {
            return Ok(false);
        }
        if msg.privileges.is_admin_like() {
            return Ok(false);
        }

        if let Err(e) = self.actions.delete_message(msg.chat_id, msg.message_id).await {
            log::warn!(
                "Failed to delete message {} in quiet chat {}: {}",
                msg.message_id.0,
                msg.chat_id,
                e
            );
        }
        if let Some(user) = msg.sender_id {
            if self.state.take_lock_notice(msg.chat_id, user) {
                let text = config.lock_message.clone().unwrap_or_else(|| {
                    format!("🌙 The chat is quiet until {}.", config.quiet_until_label(now))
                });
                if let Err(e) = self.actions.send_message(msg.chat_id, msg.topic_id, &text).await {
                    log::warn!("Failed to send lock notice in chat {}: {}", msg.chat_id, e);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_hhmm() {
        assert_eq!(parse_hhmm("22:00"), Ok(1320));
        assert_eq!(parse_hhmm("06:30"), Ok(390));
        assert_eq!(format_hhmm(390), "06:30");
        assert_eq!(
            parse_hhmm("24:00"),
            Err(PolicyError::InvalidTime("24:00".to_string()))
        );
        assert!(parse_hhmm("noon").is_err());
    }

    #[test]
    fn test_set_window_rejects_out_of_range() {
        let mut config = NightModeConfig::default();
        assert_eq!(config.set_window(1440, 0), Err(PolicyError::InvalidMinute(1440)));
        assert!(config.set_window(0, 1439).is_ok());
    }
}
