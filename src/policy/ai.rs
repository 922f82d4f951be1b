use serde::{Deserialize, Serialize};

use super::Action;

/// One stored layer of AI moderation settings (topic 0 is the chat default).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiModLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tox_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hate_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harass_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selfharm_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violence_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_risk_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_nudity_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_violence_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_weapons_thresh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_sexual_minors: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_primary: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_secondary: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalate_after: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalate_action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exempt_admins: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exempt_topic_owner: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_calls_per_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike_points_per_hit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike_mute_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike_ban_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike_decay_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warn_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appeal_url: Option<String>,
}

/// Effective AI moderation settings for a chat+topic.
#[derive(Debug, Clone, PartialEq)]
pub struct AiModSettings {
    pub enabled: bool,
    /// Evaluate and log, never enforce.
    pub shadow_mode: bool,
    /// Moderation model for this chat; `None` uses the deployment default.
    pub model: Option<String>,
    pub tox_thresh: f64,
    pub hate_thresh: f64,
    pub sex_thresh: f64,
    pub harass_thresh: f64,
    pub selfharm_thresh: f64,
    pub violence_thresh: f64,
    pub link_risk_thresh: f64,
    pub visual_nudity_thresh: f64,
    pub visual_violence_thresh: f64,
    pub visual_weapons_thresh: f64,
    pub block_sexual_minors: bool,
    pub action_primary: Action,
    /// Kept with the layers for admin tooling. Decisions never read it: repeat
    /// offenders go to `escalate_action` and the strike thresholds.
    pub action_secondary: Action,
    /// Enforcement hits per day that switch to `escalate_action`; 0 disables.
    pub escalate_after: u32,
    pub escalate_action: Action,
    pub mute_minutes: i64,
    pub exempt_admins: bool,
    pub exempt_topic_owner: bool,
    /// 0 disables the call budget.
    pub max_calls_per_min: u32,
    pub cooldown_s: u64,
    pub strike_points_per_hit: i64,
    pub strike_mute_threshold: i64,
    pub strike_ban_threshold: i64,
    pub strike_decay_days: i64,
    /// `{category}` is replaced with the violation category.
    pub warn_text: String,
    pub appeal_url: Option<String>,
}

impl Default for AiModSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            shadow_mode: false,
            model: None,
            tox_thresh: 0.8,
            hate_thresh: 0.8,
            sex_thresh: 0.8,
            harass_thresh: 0.8,
            selfharm_thresh: 0.7,
            violence_thresh: 0.8,
            link_risk_thresh: 0.6,
            visual_nudity_thresh: 0.8,
            visual_violence_thresh: 0.8,
            visual_weapons_thresh: 0.9,
            block_sexual_minors: true,
            action_primary: Action::Delete,
            action_secondary: Action::Mute,
            escalate_after: 3,
            escalate_action: Action::Mute,
            mute_minutes: 60,
            exempt_admins: true,
            exempt_topic_owner: true,
            max_calls_per_min: 60,
            cooldown_s: 0,
            strike_points_per_hit: 1,
            strike_mute_threshold: 5,
            strike_ban_threshold: 10,
            strike_decay_days: 7,
            warn_text: "Message removed by AI moderation: {category}".to_string(),
            appeal_url: None,
        }
    }
}

impl AiModSettings {
    pub fn merge(&mut self, layer: &AiModLayer) {
        merge_fields!(self, layer;
            enabled,
            shadow_mode,
            tox_thresh,
            hate_thresh,
            sex_thresh,
            harass_thresh,
            selfharm_thresh,
            violence_thresh,
            link_risk_thresh,
            visual_nudity_thresh,
            visual_violence_thresh,
            visual_weapons_thresh,
            block_sexual_minors,
            action_primary,
            action_secondary,
            escalate_after,
            escalate_action,
            mute_minutes,
            exempt_admins,
            exempt_topic_owner,
            max_calls_per_min,
            cooldown_s,
            strike_points_per_hit,
            strike_mute_threshold,
            strike_ban_threshold,
            strike_decay_days,
            warn_text,
        );
        if let Some(model) = layer.model.as_ref().filter(|m| !m.trim().is_empty()) {
            self.model = Some(model.clone());
        }
        if layer.appeal_url.is_some() {
            self.appeal_url = layer.appeal_url.clone();
        }
    }

    /// Warning sent to the chat for a violation of `category`.
    pub fn warning_for(&self, category: &str) -> String {
        let text = self.warn_text.replace("{category}", category);
        match &self.appeal_url {
            Some(url) if !url.trim().is_empty() => format!("{}\nAppeal: {}", text, url),
            _ => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_includes_appeal_url() {
        let mut settings = AiModSettings::default();
        assert_eq!(
            settings.warning_for("hate"),
            "Message removed by AI moderation: hate"
        );
        settings.merge(&AiModLayer {
            appeal_url: Some("https://t.me/appeals".to_string()),
            ..Default::default()
        });
        assert_eq!(
            settings.warning_for("hate"),
            "Message removed by AI moderation: hate\nAppeal: https://t.me/appeals"
        );
    }
}
