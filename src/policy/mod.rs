//! Layered moderation policies.
//!
//! Every policy exists twice: a *layer* type whose fields are all `Option`
//! (unset means "inherit from the parent layer") and an *effective* type with
//! concrete values. Effective policies start from hard-coded permissive
//! defaults and absorb layers in order (global, topic 0, topic N); a set field
//! in a later layer overwrites the earlier value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PolicyError;

/// Copies every `Some` field of `$layer` over the same field of `$target`.
macro_rules! merge_fields {
    ($target:expr, $layer:expr; $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$layer.$field {
                $target.$field = value.clone();
            }
        )+
    };
}

pub mod ai;
pub mod link;
pub mod spam;

pub use ai::{AiModLayer, AiModSettings};
pub use link::{LinkFlags, LinkPolicy};
pub use spam::{QuotaNotify, SpamLevel, SpamPolicy, SpamPolicyLayer};

/// Enforcement action, ordered from mildest to strictest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Warn,
    Delete,
    Mute,
    Ban,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Warn => "warn",
            Action::Delete => "delete",
            Action::Mute => "mute",
            Action::Ban => "ban",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(Action::Warn),
            "delete" => Ok(Action::Delete),
            "mute" => Ok(Action::Mute),
            "ban" => Ok(Action::Ban),
            other => Err(PolicyError::UnknownAction(other.to_string())),
        }
    }
}
