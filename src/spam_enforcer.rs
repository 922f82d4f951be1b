//! Rule-based spam enforcement: link policy, emoji limits, flood and daily quota.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use teloxide::types::UserId;

use crate::actions::ChatActions;
use crate::config::{hits, limits};
use crate::message::IncomingMessage;
use crate::policy::{Action, LinkPolicy, SpamPolicy};
use crate::quota::{evaluate_quota, local_day, remaining_notice, QuotaVerdict, LIMIT_REACHED_NOTICE};
use crate::rate_limit::EngineRuntimeState;
use crate::risk::extract_domains;
use crate::store::{SpamEvent, Store};

const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x1F600, 0x1F64F), // emoticons
    (0x1F300, 0x1F5FF), // symbols and pictographs
    (0x1F680, 0x1F6FF), // transport and map
    (0x1F900, 0x1F9FF), // supplemental symbols and pictographs
    (0x1FA70, 0x1FAFF), // symbols and pictographs extended-A
    (0x2600, 0x26FF),   // misc symbols
    (0x2700, 0x27BF),   // dingbats
];

const REGIONAL_INDICATORS: (u32, u32) = (0x1F1E6, 0x1F1FF);

/// Emoji in `text`; a flag (two regional indicators) counts once.
pub fn count_emoji(text: &str) -> u32 {
    let mut emoji = 0;
    let mut indicators = 0;
    for c in text.chars() {
        let cp = c as u32;
        if cp >= REGIONAL_INDICATORS.0 && cp <= REGIONAL_INDICATORS.1 {
            indicators += 1;
        } else if EMOJI_RANGES.iter().any(|(lo, hi)| cp >= *lo && cp <= *hi) {
            emoji += 1;
        }
    }
    emoji + (indicators + 1) / 2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpamReason {
    LinkBlacklist,
    LinkForbidden,
    EmojiPerMsg,
    EmojiPerMin,
    Flood,
    Quota,
}

impl SpamReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpamReason::LinkBlacklist => "link_blacklist",
            SpamReason::LinkForbidden => "link_forbidden",
            SpamReason::EmojiPerMsg => "emoji_per_msg",
            SpamReason::EmojiPerMin => "emoji_per_min",
            SpamReason::Flood => "flood",
            SpamReason::Quota => "quota",
        }
    }

    fn notice(&self) -> &'static str {
        match self {
            SpamReason::LinkBlacklist => "This link is not allowed here.",
            SpamReason::LinkForbidden => "Only admins may post links here.",
            SpamReason::EmojiPerMsg => "Too many emoji in one message.",
            SpamReason::EmojiPerMin => "Too many emoji, slow down.",
            SpamReason::Flood => "You are sending messages too fast.",
            SpamReason::Quota => LIMIT_REACHED_NOTICE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpamOutcome {
    Allowed,
    /// Anonymous admin, privileged or whitelisted sender.
    Exempt,
    Violation { reason: SpamReason, action: Action },
    Error,
}

struct Violation {
    reason: SpamReason,
    count: i64,
    limit: i64,
    base_action: Action,
    domains: Vec<String>,
    /// Text posted to the chat; `None` stays silent.
    notice: Option<String>,
    /// Post the notice even when the action is a plain delete.
    announce: bool,
}

impl Violation {
    fn new(reason: SpamReason, count: i64, limit: i64, base_action: Action) -> Self {
        Self {
            reason,
            count,
            limit,
            base_action,
            domains: Vec::new(),
            notice: Some(reason.notice().to_string()),
            announce: false,
        }
    }
}

pub struct SpamEnforcer {
    store: Arc<dyn Store>,
    actions: Arc<dyn ChatActions>,
    state: Arc<EngineRuntimeState>,
}

impl SpamEnforcer {
    pub fn new(
        store: Arc<dyn Store>,
        actions: Arc<dyn ChatActions>,
        state: Arc<EngineRuntimeState>,
    ) -> Self {
        Self {
            store,
            actions,
            state,
        }
    }

    /// Runs every spam check; never fails.
    pub async fn process(&self, msg: &IncomingMessage) -> SpamOutcome {
        match self.evaluate(msg).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!(
                    "Spam check failed for message {} in chat {}: {}",
                    msg.message_id.0,
                    msg.chat_id,
                    e
                );
                SpamOutcome::Error
            }
        }
    }

    async fn evaluate(&self, msg: &IncomingMessage) -> Result<SpamOutcome> {
        let Some(user) = msg.sender_id else {
            return Ok(SpamOutcome::Exempt);
        };
        if msg.privileges.is_privileged() {
            return Ok(SpamOutcome::Exempt);
        }
        let policy = self.store.effective_spam_policy(msg.chat_id, msg.topic()).await?;
        if policy.is_whitelisted(user.0) {
            return Ok(SpamOutcome::Exempt);
        }

        let flags = self.store.link_flags(msg.chat_id).await?.unwrap_or_default();
        let link = LinkPolicy::build(&flags, &policy);

        let violation = match self.check_links(msg, user, &policy, &link).await? {
            Some(v) => Some(v),
            None => self.check_rates(msg, user, &policy).await?,
        };

        match violation {
            Some(violation) => self.enforce(msg, user, &policy, violation).await,
            None => Ok(SpamOutcome::Allowed),
        }
    }

    async fn check_links(
        &self,
        msg: &IncomingMessage,
        user: UserId,
        policy: &SpamPolicy,
        link: &LinkPolicy,
    ) -> Result<Option<Violation>> {
        let domains = extract_domains(&msg.text, &msg.entities);
        if domains.is_empty() || link.user_whitelist.contains(&user.0) {
            return Ok(None);
        }

        let blacklisted: BTreeSet<&String> =
            domains.iter().filter(|d| link.is_blacklisted(d)).collect();
        let mut violation = if !blacklisted.is_empty() {
            let mut v = Violation::new(SpamReason::LinkBlacklist, blacklisted.len() as i64, 0, link.action);
            v.domains = blacklisted.into_iter().cloned().collect();
            v
        } else if link.admins_only && !domains.iter().all(|d| link.is_whitelisted(d)) {
            let mut v = Violation::new(SpamReason::LinkForbidden, domains.len() as i64, 0, link.action);
            v.domains = domains.iter().cloned().collect();
            v
        } else {
            return Ok(None);
        };

        let send_warning = if link.warn_once {
            let day = local_day(Utc::now(), policy.tz());
            self.store
                .bump_hits(msg.chat_id, user, hits::LINK_WARNED, day)
                .await?
                == 1
        } else {
            true
        };
        violation.notice = send_warning.then(|| link.warn_text.clone());
        violation.announce = true;
        Ok(Some(violation))
    }

    async fn check_rates(
        &self,
        msg: &IncomingMessage,
        user: UserId,
        policy: &SpamPolicy,
    ) -> Result<Option<Violation>> {
        let emoji = count_emoji(&msg.text);
        if policy.emoji_max_per_msg > 0 && emoji > policy.emoji_max_per_msg {
            return Ok(Some(Violation::new(
                SpamReason::EmojiPerMsg,
                i64::from(emoji),
                i64::from(policy.emoji_max_per_msg),
                policy.action_primary,
            )));
        }

        if policy.emoji_max_per_min > 0 && emoji > 0 {
            let in_window = self.state.bump_emoji(msg.chat_id, user, emoji);
            if in_window > policy.emoji_max_per_min {
                return Ok(Some(Violation::new(
                    SpamReason::EmojiPerMin,
                    i64::from(in_window),
                    i64::from(policy.emoji_max_per_min),
                    policy.action_primary,
                )));
            }
        }

        if policy.max_msgs_per_10s > 0 {
            let recent = self.state.bump_and_count(msg.chat_id, user);
            if recent > policy.max_msgs_per_10s {
                return Ok(Some(Violation::new(
                    SpamReason::Flood,
                    i64::from(recent),
                    i64::from(policy.max_msgs_per_10s),
                    policy.action_primary,
                )));
            }
        }

        if policy.per_user_daily_limit > 0 {
            let day = local_day(Utc::now(), policy.tz());
            let count = self
                .store
                .record_message(msg.chat_id, msg.topic(), user, day)
                .await?;
            match evaluate_quota(policy.per_user_daily_limit, count, policy.quota_notify) {
                QuotaVerdict::Allowed { remaining, notify } => {
                    if notify {
                        self.notify(msg, &remaining_notice(remaining)).await;
                    }
                }
                QuotaVerdict::Exceeded { first_over } => {
                    let mut v = Violation::new(
                        SpamReason::Quota,
                        count,
                        i64::from(policy.per_user_daily_limit),
                        Action::Delete,
                    );
                    v.notice = first_over.then(|| LIMIT_REACHED_NOTICE.to_string());
                    v.announce = true;
                    return Ok(Some(v));
                }
            }
        }

        Ok(None)
    }

    async fn enforce(
        &self,
        msg: &IncomingMessage,
        user: UserId,
        policy: &SpamPolicy,
        violation: Violation,
    ) -> Result<SpamOutcome> {
        let day = local_day(Utc::now(), policy.tz());
        let hits_today = self.store.bump_hits(msg.chat_id, user, hits::SPAM, day).await?;
        let escalated = policy.escalation_threshold > 0
            && hits_today >= i64::from(policy.escalation_threshold);
        let mut action = if escalated {
            policy.action_secondary
        } else {
            violation.base_action
        };
        // over-quota messages always go
        if violation.reason == SpamReason::Quota {
            action = action.max(Action::Delete);
        }

        let announce = violation.announce || action == Action::Warn || action >= Action::Mute;
        let notice = violation.notice.as_deref().filter(|_| announce);
        self.apply(msg, user, action, notice).await;

        let event = SpamEvent {
            chat_id: msg.chat_id.0,
            topic_id: msg.topic(),
            user_id: user.0,
            message_id: msg.message_id.0,
            reason: violation.reason.as_str().to_string(),
            count: violation.count,
            limit: violation.limit,
            action: action.as_str().to_string(),
            domains: violation.domains,
            at: Utc::now(),
        };
        if let Err(e) = self.store.append_spam_event(&event).await {
            log::warn!("Failed to log spam event in chat {}: {}", msg.chat_id, e);
        }
        log::info!(
            "Spam {} by user {} in chat {}: count {} limit {}, action {}",
            event.reason,
            user,
            msg.chat_id,
            event.count,
            event.limit,
            action
        );

        Ok(SpamOutcome::Violation {
            reason: violation.reason,
            action,
        })
    }

    async fn apply(&self, msg: &IncomingMessage, user: UserId, action: Action, notice: Option<&str>) {
        if action >= Action::Delete {
            if let Err(e) = self.actions.delete_message(msg.chat_id, msg.message_id).await {
                log::warn!(
                    "Failed to delete spam message {} in chat {}: {}",
                    msg.message_id.0,
                    msg.chat_id,
                    e
                );
            }
        }
        match action {
            Action::Mute => {
                let until = Utc::now() + Duration::minutes(limits::SPAM_MUTE_MINUTES);
                if let Err(e) = self.actions.restrict_member(msg.chat_id, user, until).await {
                    log::warn!("Failed to mute user {} in chat {}: {}", user, msg.chat_id, e);
                }
            }
            Action::Ban => {
                if let Err(e) = self.actions.ban_member(msg.chat_id, user).await {
                    log::warn!("Failed to ban user {} in chat {}: {}", user, msg.chat_id, e);
                }
            }
            Action::Warn | Action::Delete => {}
        }
        if let Some(text) = notice {
            self.notify(msg, text).await;
        }
    }

    async fn notify(&self, msg: &IncomingMessage, text: &str) {
        if let Err(e) = self.actions.send_message(msg.chat_id, msg.topic_id, text).await {
            log::warn!("Failed to send notice in chat {}: {}", msg.chat_id, e);
        }
    }
}
