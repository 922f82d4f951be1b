use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{Action, SpamPolicy};

/// Group-wide link protection switches, stored once per chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkFlags {
    pub admins_only: bool,
    pub warn_once: bool,
    pub warn_text: Option<String>,
    pub action: Option<Action>,
}

pub const DEFAULT_LINK_WARN_TEXT: &str = "Links are not allowed here.";

/// Effective link policy for a chat+topic: link flags combined with the
/// domain lists of the effective spam policy.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPolicy {
    pub admins_only: bool,
    pub warn_once: bool,
    pub warn_text: String,
    pub whitelist: BTreeSet<String>,
    pub blacklist: BTreeSet<String>,
    pub action: Action,
    pub user_whitelist: BTreeSet<u64>,
}

impl LinkPolicy {
    pub fn build(flags: &LinkFlags, spam: &SpamPolicy) -> Self {
        Self {
            admins_only: flags.admins_only,
            warn_once: flags.warn_once,
            warn_text: flags
                .warn_text
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LINK_WARN_TEXT.to_string()),
            whitelist: spam.link_whitelist.clone(),
            blacklist: spam.domain_blacklist.clone(),
            action: flags.action.unwrap_or(spam.action_primary),
            user_whitelist: spam.user_whitelist.clone(),
        }
    }

    /// A domain matches a list entry exactly or as a subdomain of it.
    fn listed(list: &BTreeSet<String>, domain: &str) -> bool {
        list.iter().any(|entry| {
            let entry = entry.trim_start_matches("www.");
            domain == entry || domain.ends_with(&format!(".{}", entry))
        })
    }

    pub fn is_blacklisted(&self, domain: &str) -> bool {
        Self::listed(&self.blacklist, domain)
    }

    pub fn is_whitelisted(&self, domain: &str) -> bool {
        Self::listed(&self.whitelist, domain)
    }
}
