//! AI moderation decisions for a single message.
//!
//! A message moves from received, through risk assessment, to a decision and
//! ends in exactly one [`ModerationOutcome`]. Nothing here returns an error to
//! the caller: failures end in [`ModerationOutcome::Error`] with a log entry.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;
use teloxide::types::{ChatId, UserId};

use crate::actions::ChatActions;
use crate::classifier::{zero_scores, CategoryScores, Classifier, TEXT_CATEGORIES};
use crate::config::{hits, limits, severity_of};
use crate::message::IncomingMessage;
use crate::policy::{Action, AiModSettings};
use crate::quota::local_day;
use crate::rate_limit::EngineRuntimeState;
use crate::risk::{extract_domains, risk_score};
use crate::store::{ModerationLogEntry, Store};

/// A category whose score met its threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub category: String,
    pub score: f64,
    pub threshold: f64,
}

/// Why a message left the pipeline before assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    Disabled,
    NotPro,
    Exempt,
    Cooldown,
    RateLimited,
    NoContent,
}

/// What was done about a violating message.
#[derive(Debug, Clone, PartialEq)]
pub struct Enforcement {
    pub violation: Violation,
    pub action: Action,
    pub strikes_total: i64,
    pub strikes_added: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModerationOutcome {
    Skipped(SkipReason),
    Allowed,
    ShadowLogged(Violation),
    Warned(Enforcement),
    Deleted(Enforcement),
    Muted(Enforcement),
    Banned(Enforcement),
    Error,
}

impl ModerationOutcome {
    /// Platform action taken, if any.
    pub fn action(&self) -> Option<Action> {
        match self {
            ModerationOutcome::Warned(e)
            | ModerationOutcome::Deleted(e)
            | ModerationOutcome::Muted(e)
            | ModerationOutcome::Banned(e) => Some(e.action),
            _ => None,
        }
    }

    fn enforced(enforcement: Enforcement) -> Self {
        match enforcement.action {
            Action::Warn => ModerationOutcome::Warned(enforcement),
            Action::Delete => ModerationOutcome::Deleted(enforcement),
            Action::Mute => ModerationOutcome::Muted(enforcement),
            Action::Ban => ModerationOutcome::Banned(enforcement),
        }
    }
}

/// Scores gathered for one message.
#[derive(Debug, Clone, Default)]
pub struct RiskAssessment {
    pub text: CategoryScores,
    pub media: Option<CategoryScores>,
    pub domains: BTreeSet<String>,
    pub link_score: f64,
}

impl RiskAssessment {
    /// Text, link and media scores in one map; visual violence is `violence_visual`.
    pub fn all_scores(&self) -> CategoryScores {
        let mut all = self.text.clone();
        all.insert("link_risk".to_string(), self.link_score);
        if let Some(media) = &self.media {
            for (name, score) in media {
                all.insert(media_category(name).to_string(), *score);
            }
        }
        all
    }
}

fn media_category(name: &str) -> &str {
    if name == "violence" {
        "violence_visual"
    } else {
        name
    }
}

fn check(violations: &mut Vec<Violation>, category: &str, score: f64, threshold: f64) {
    if score > 0.0 && score >= threshold {
        violations.push(Violation {
            category: category.to_string(),
            score,
            threshold,
        });
    }
}

/// Violations in detection order: text categories, link risk, then media.
pub fn detect_violations(settings: &AiModSettings, assessment: &RiskAssessment) -> Vec<Violation> {
    let mut violations = Vec::new();
    let text = |name: &str| assessment.text.get(name).copied().unwrap_or(0.0);

    check(&mut violations, "toxicity", text("toxicity"), settings.tox_thresh);
    check(&mut violations, "hate", text("hate"), settings.hate_thresh);
    check(&mut violations, "sexual", text("sexual"), settings.sex_thresh);
    check(&mut violations, "harassment", text("harassment"), settings.harass_thresh);
    check(&mut violations, "selfharm", text("selfharm"), settings.selfharm_thresh);
    check(&mut violations, "violence", text("violence"), settings.violence_thresh);
    check(&mut violations, "link_risk", assessment.link_score, settings.link_risk_thresh);

    if let Some(media) = &assessment.media {
        let score = |name: &str| media.get(name).copied().unwrap_or(0.0);
        check(&mut violations, "nudity", score("nudity"), settings.visual_nudity_thresh);
        if settings.block_sexual_minors {
            check(&mut violations, "sexual_minors", score("sexual_minors"), limits::SEXUAL_MINORS_GATE);
        }
        check(
            &mut violations,
            "violence_visual",
            score("violence"),
            settings.visual_violence_thresh,
        );
        check(&mut violations, "weapons", score("weapons"), settings.visual_weapons_thresh);
        check(&mut violations, "gore", score("gore"), settings.visual_violence_thresh);
    }
    violations
}

/// Highest severity wins; equal severities keep detection order.
pub fn primary_violation(violations: &[Violation]) -> Option<&Violation> {
    violations
        .iter()
        .enumerate()
        .max_by_key(|(index, v)| (severity_of(&v.category), Reverse(*index)))
        .map(|(_, v)| v)
}

/// Final action once persisted strikes are known. Strikes at the ban
/// threshold force a ban; at the mute threshold they force at least a mute.
pub fn apply_strike_override(settings: &AiModSettings, action: Action, strikes_total: i64) -> Action {
    if settings.strike_ban_threshold > 0 && strikes_total >= settings.strike_ban_threshold {
        Action::Ban
    } else if settings.strike_mute_threshold > 0 && strikes_total >= settings.strike_mute_threshold {
        action.max(Action::Mute)
    } else {
        action
    }
}

pub struct AiModerationEngine {
    store: Arc<dyn Store>,
    classifier: Arc<dyn Classifier>,
    actions: Arc<dyn ChatActions>,
    state: Arc<EngineRuntimeState>,
}

impl AiModerationEngine {
    pub fn new(
        store: Arc<dyn Store>,
        classifier: Arc<dyn Classifier>,
        actions: Arc<dyn ChatActions>,
        state: Arc<EngineRuntimeState>,
    ) -> Self {
        Self {
            store,
            classifier,
            actions,
            state,
        }
    }

    pub async fn process(&self, msg: &IncomingMessage) -> ModerationOutcome {
        match self.run(msg).await {
            Ok(outcome) => {
                match &outcome {
                    ModerationOutcome::Skipped(reason) => log::debug!(
                        "AI moderation skipped message {} in chat {}: {:?}",
                        msg.message_id.0,
                        msg.chat_id,
                        reason
                    ),
                    ModerationOutcome::Allowed => log::debug!(
                        "AI moderation allowed message {} in chat {}",
                        msg.message_id.0,
                        msg.chat_id
                    ),
                    other => log::info!(
                        "AI moderation of message {} in chat {}: {:?}",
                        msg.message_id.0,
                        msg.chat_id,
                        other
                    ),
                }
                outcome
            }
            Err(e) => {
                log::error!(
                    "AI moderation failed for message {} in chat {}: {}",
                    msg.message_id.0,
                    msg.chat_id,
                    e
                );
                let entry = self.log_entry(msg, "error", 0.0, "error", &RiskAssessment::default(), 0, 0);
                if let Err(e) = self.store.append_moderation(&entry).await {
                    log::warn!("Failed to record moderation error: {}", e);
                }
                ModerationOutcome::Error
            }
        }
    }

    async fn run(&self, msg: &IncomingMessage) -> Result<ModerationOutcome> {
        let chat = msg.chat_id;
        if self.state.seen_before(chat, msg.message_id) {
            return Ok(ModerationOutcome::Skipped(SkipReason::Duplicate));
        }

        let settings = self.store.effective_ai_policy(chat, msg.topic()).await?;
        if !settings.enabled {
            return Ok(ModerationOutcome::Skipped(SkipReason::Disabled));
        }
        if !self.store.is_pro(chat).await? {
            return Ok(ModerationOutcome::Skipped(SkipReason::NotPro));
        }

        let privileges = msg.privileges;
        if (privileges.is_admin_like() && settings.exempt_admins)
            || (privileges.is_topic_owner && settings.exempt_topic_owner)
        {
            return Ok(ModerationOutcome::Skipped(SkipReason::Exempt));
        }

        if msg.text.trim().is_empty() && msg.media.is_none() {
            return Ok(ModerationOutcome::Skipped(SkipReason::NoContent));
        }
        if self.state.in_cooldown(chat, settings.cooldown_s) {
            return Ok(ModerationOutcome::Skipped(SkipReason::Cooldown));
        }
        if settings.max_calls_per_min > 0 && self.state.bump_ai_calls(chat) > settings.max_calls_per_min {
            return Ok(ModerationOutcome::Skipped(SkipReason::RateLimited));
        }

        let assessment = self.assess(msg, settings.model.as_deref()).await;
        let violations = detect_violations(&settings, &assessment);

        let Some(primary) = primary_violation(&violations).cloned() else {
            if settings.shadow_mode {
                let entry = self.log_entry(msg, "none", 0.0, "ok", &assessment, 0, 0);
                self.store.append_moderation(&entry).await?;
            }
            return Ok(ModerationOutcome::Allowed);
        };

        if settings.shadow_mode {
            let strikes_total = match msg.sender_id {
                Some(user) => self.store.get_points(chat, user).await?,
                None => 0,
            };
            let entry = self.log_entry(
                msg,
                &primary.category,
                primary.score,
                "shadow",
                &assessment,
                strikes_total,
                0,
            );
            self.store.append_moderation(&entry).await?;
            return Ok(ModerationOutcome::ShadowLogged(primary));
        }

        let enforcement = self.decide(msg, &settings, primary).await?;
        self.apply(msg, &settings, &enforcement).await;

        let entry = self.log_entry(
            msg,
            &enforcement.violation.category,
            enforcement.violation.score,
            enforcement.action.as_str(),
            &assessment,
            enforcement.strikes_total,
            enforcement.strikes_added,
        );
        self.store.append_moderation(&entry).await?;
        self.state.mark_enforced(chat);

        Ok(ModerationOutcome::enforced(enforcement))
    }

    async fn assess(&self, msg: &IncomingMessage, model: Option<&str>) -> RiskAssessment {
        let text = match (msg.text.trim().is_empty(), model) {
            (true, _) => None,
            (false, Some(model)) => self.classifier.classify_text_with(&msg.text, model).await,
            (false, None) => self.classifier.classify_text(&msg.text).await,
        };
        let media = match (&msg.media, model) {
            (Some(attachment), Some(model)) => {
                self.classifier.classify_image_with(&attachment.url, model).await
            }
            (Some(attachment), None) => self.classifier.classify_image(&attachment.url).await,
            (None, _) => None,
        };
        let domains = extract_domains(&msg.text, &msg.entities);
        let link_score = risk_score(&domains);
        RiskAssessment {
            text: text.unwrap_or_else(|| zero_scores(&TEXT_CATEGORIES)),
            media,
            domains,
            link_score,
        }
    }

    /// Escalation by today's hits, then strike accrual and the strike override.
    async fn decide(
        &self,
        msg: &IncomingMessage,
        settings: &AiModSettings,
        violation: Violation,
    ) -> Result<Enforcement> {
        let Some(user) = msg.sender_id else {
            // anonymous posts can only be removed
            return Ok(Enforcement {
                action: settings.action_primary.min(Action::Delete),
                violation,
                strikes_total: 0,
                strikes_added: 0,
            });
        };

        let spam = self.store.effective_spam_policy(msg.chat_id, msg.topic()).await?;
        let day = local_day(Utc::now(), spam.tz());
        let hits_today = self.store.bump_hits(msg.chat_id, user, hits::AI, day).await?;
        let mut action = if settings.escalate_after > 0 && hits_today >= i64::from(settings.escalate_after) {
            settings.escalate_action
        } else {
            settings.action_primary
        };

        let points = settings.strike_points_per_hit.max(0) * severity_of(&violation.category);
        let strikes_total = if points > 0 {
            self.store
                .add_points(msg.chat_id, user, points, &violation.category)
                .await?
        } else {
            self.store.get_points(msg.chat_id, user).await?
        };
        action = apply_strike_override(settings, action, strikes_total);

        Ok(Enforcement {
            violation,
            action,
            strikes_total,
            strikes_added: points,
        })
    }

    async fn apply(&self, msg: &IncomingMessage, settings: &AiModSettings, enforcement: &Enforcement) {
        let chat = msg.chat_id;
        if let Err(e) = self.actions.delete_message(chat, msg.message_id).await {
            log::warn!(
                "Failed to delete message {} in chat {}: {}",
                msg.message_id.0,
                chat,
                e
            );
        }

        let warning = settings.warning_for(&enforcement.violation.category);
        if let Err(e) = self.actions.send_message(chat, msg.topic_id, &warning).await {
            log::warn!("Failed to send moderation warning in chat {}: {}", chat, e);
        }

        let Some(user) = msg.sender_id else { return };
        match enforcement.action {
            Action::Mute => self.mute(chat, user, settings.mute_minutes).await,
            Action::Ban => {
                if let Err(e) = self.actions.ban_member(chat, user).await {
                    log::warn!("Failed to ban user {} in chat {}: {}", user, chat, e);
                }
            }
            Action::Warn | Action::Delete => {}
        }
    }

    async fn mute(&self, chat: ChatId, user: UserId, minutes: i64) {
        let until = Utc::now() + Duration::minutes(minutes.max(1));
        if let Err(e) = self.actions.restrict_member(chat, user, until).await {
            log::warn!("Failed to mute user {} in chat {}: {}", user, chat, e);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn log_entry(
        &self,
        msg: &IncomingMessage,
        category: &str,
        score: f64,
        action: &str,
        assessment: &RiskAssessment,
        strikes_total: i64,
        strikes_added: i64,
    ) -> ModerationLogEntry {
        ModerationLogEntry {
            chat_id: msg.chat_id.0,
            topic_id: msg.topic(),
            user_id: msg.sender_id.map(|u| u.0),
            message_id: msg.message_id.0,
            category: category.to_string(),
            score,
            action: action.to_string(),
            scores: assessment.all_scores(),
            domains: assessment.domains.iter().cloned().collect(),
            link_score: assessment.link_score,
            strikes_total,
            strikes_added,
            at: Utc::now(),
        }
    }
}
