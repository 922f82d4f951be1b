//! Daily per-topic message quotas.
//!
//! Days run from local midnight to local midnight in the policy timezone, so
//! a message at 23:59 and one at 00:01 local time land in different buckets
//! even when both fall on the same UTC date.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::config::QUOTA_SMART_THRESHOLDS;
use crate::policy::QuotaNotify;

/// Calendar day of `now` in `tz`.
pub fn local_day(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Outcome of counting one more message against a daily limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaVerdict {
    /// Message may stay; `notify` says whether to post the remaining count.
    Allowed { remaining: i64, notify: bool },
    /// Message is over the limit and must go; `first_over` marks the one
    /// message that gets the "limit reached" notice.
    Exceeded { first_over: bool },
}

/// `count` already includes the message being judged.
pub fn evaluate_quota(limit: u32, count: i64, mode: QuotaNotify) -> QuotaVerdict {
    let limit = i64::from(limit);
    if count > limit {
        return QuotaVerdict::Exceeded {
            first_over: count == limit + 1,
        };
    }
    let remaining = limit - count;
    let notify = match mode {
        QuotaNotify::Off => false,
        QuotaNotify::Always => true,
        QuotaNotify::Smart => count == 1 || QUOTA_SMART_THRESHOLDS.contains(&remaining),
    };
    QuotaVerdict::Allowed { remaining, notify }
}

pub fn remaining_notice(remaining: i64) -> String {
    match remaining {
        0 => "You have used all your messages for today in this topic.".to_string(),
        1 => "1 message left for today in this topic.".to_string(),
        n => format!("{} messages left for today in this topic.", n),
    }
}

pub const LIMIT_REACHED_NOTICE: &str =
    "Daily message limit reached for this topic. Further messages will be removed until tomorrow.";
