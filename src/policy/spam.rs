use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::Action;
use crate::config::level_preset;
use crate::error::PolicyError;

/// Spam protection strength; each level carries preset numeric ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpamLevel {
    #[default]
    Off,
    Light,
    Medium,
    Strict,
}

impl SpamLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpamLevel::Off => "off",
            SpamLevel::Light => "light",
            SpamLevel::Medium => "medium",
            SpamLevel::Strict => "strict",
        }
    }

    /// `(emoji_per_msg, emoji_per_min, msgs_per_10s)` ceilings, `None` for `off`.
    pub fn preset(&self) -> Option<(u32, u32, u32)> {
        match self {
            SpamLevel::Off => None,
            SpamLevel::Light => Some(level_preset::LIGHT),
            SpamLevel::Medium => Some(level_preset::MEDIUM),
            SpamLevel::Strict => Some(level_preset::STRICT),
        }
    }
}

impl fmt::Display for SpamLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpamLevel {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(SpamLevel::Off),
            "light" => Ok(SpamLevel::Light),
            "medium" => Ok(SpamLevel::Medium),
            "strict" => Ok(SpamLevel::Strict),
            other => Err(PolicyError::UnknownLevel(other.to_string())),
        }
    }
}

/// When remaining-quota notices are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaNotify {
    Off,
    #[default]
    Smart,
    Always,
}

/// One stored layer of spam policy: the global row or a topic override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpamPolicyLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<SpamLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_whitelist: Option<BTreeSet<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_whitelist: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_blacklist: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji_max_per_msg: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji_max_per_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_msgs_per_10s: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_primary: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_secondary: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_user_daily_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_notify: Option<QuotaNotify>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Effective spam policy for one chat+topic.
#[derive(Debug, Clone, PartialEq)]
pub struct SpamPolicy {
    pub level: SpamLevel,
    pub user_whitelist: BTreeSet<u64>,
    pub link_whitelist: BTreeSet<String>,
    pub domain_blacklist: BTreeSet<String>,
    pub emoji_max_per_msg: u32,
    pub emoji_max_per_min: u32,
    pub max_msgs_per_10s: u32,
    pub action_primary: Action,
    pub action_secondary: Action,
    /// Spam hits per day after which `action_secondary` applies; 0 disables.
    pub escalation_threshold: u32,
    /// 0 disables the daily quota.
    pub per_user_daily_limit: u32,
    pub quota_notify: QuotaNotify,
    pub timezone: String,
}

impl Default for SpamPolicy {
    fn default() -> Self {
        Self {
            level: SpamLevel::Off,
            user_whitelist: BTreeSet::new(),
            link_whitelist: BTreeSet::new(),
            domain_blacklist: BTreeSet::new(),
            emoji_max_per_msg: 0,
            emoji_max_per_min: 0,
            max_msgs_per_10s: 0,
            action_primary: Action::Delete,
            action_secondary: Action::Mute,
            escalation_threshold: 3,
            per_user_daily_limit: 0,
            quota_notify: QuotaNotify::Smart,
            timezone: "UTC".to_string(),
        }
    }
}

impl SpamPolicy {
    /// Absorbs one layer, then re-applies the level clamp.
    pub fn merge(&mut self, layer: &SpamPolicyLayer) {
        merge_fields!(self, layer;
            level,
            user_whitelist,
            link_whitelist,
            domain_blacklist,
            emoji_max_per_msg,
            emoji_max_per_min,
            max_msgs_per_10s,
            action_primary,
            action_secondary,
            escalation_threshold,
            per_user_daily_limit,
            quota_notify,
            timezone,
        );
        self.clamp_to_level();
    }

    /// `off` zeroes every numeric limit. Other levels replace an unset (0) or
    /// looser limit with the preset ceiling and keep tighter ones.
    pub fn clamp_to_level(&mut self) {
        match self.level.preset() {
            None => {
                self.emoji_max_per_msg = 0;
                self.emoji_max_per_min = 0;
                self.max_msgs_per_10s = 0;
            }
            Some((per_msg, per_min, per_10s)) => {
                self.emoji_max_per_msg = clamp_limit(self.emoji_max_per_msg, per_msg);
                self.emoji_max_per_min = clamp_limit(self.emoji_max_per_min, per_min);
                self.max_msgs_per_10s = clamp_limit(self.max_msgs_per_10s, per_10s);
            }
        }
    }

    /// Configured timezone, falling back to UTC on unknown names.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(Tz::UTC)
    }

    pub fn is_whitelisted(&self, user_id: u64) -> bool {
        self.user_whitelist.contains(&user_id)
    }
}

fn clamp_limit(value: u32, ceiling: u32) -> u32 {
    if value == 0 || value > ceiling {
        ceiling
    } else {
        value
    }
}

/// Validates an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, PolicyError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| PolicyError::InvalidTimezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_keeps_tighter_limits() {
        let mut policy = SpamPolicy::default();
        policy.merge(&SpamPolicyLayer {
            level: Some(SpamLevel::Medium),
            emoji_max_per_msg: Some(3),
            max_msgs_per_10s: Some(50),
            ..Default::default()
        });
        assert_eq!(policy.emoji_max_per_msg, 3);
        assert_eq!(policy.emoji_max_per_min, 30);
        assert_eq!(policy.max_msgs_per_10s, 7);
    }

    #[test]
    fn test_layer_json_omits_unset_fields() {
        let layer = SpamPolicyLayer {
            level: Some(SpamLevel::Strict),
            ..Default::default()
        };
        let json = serde_json::to_string(&layer).unwrap();
        assert_eq!(json, r#"{"level":"strict"}"#);
        let back: SpamPolicyLayer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layer);
    }

    #[test]
    fn test_timezone_parsing() {
        assert!(parse_timezone("Europe/Berlin").is_ok());
        assert_eq!(
            parse_timezone("Mars/Olympus"),
            Err(PolicyError::InvalidTimezone("Mars/Olympus".to_string()))
        );
    }
}
