//! Records appended to the moderation, spam and strike logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cumulative strike points of one user in one chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRecord {
    pub user_id: u64,
    pub points: i64,
    pub updated: DateTime<Utc>,
}

/// Audit entry written for every strike accrual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeEvent {
    pub chat_id: i64,
    pub user_id: u64,
    pub delta: i64,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// One AI moderation decision worth recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationLogEntry {
    pub chat_id: i64,
    pub topic_id: i32,
    pub user_id: Option<u64>,
    pub message_id: i32,
    pub category: String,
    pub score: f64,
    /// `ok`, `shadow`, `error` or the action taken.
    pub action: String,
    pub scores: BTreeMap<String, f64>,
    pub domains: Vec<String>,
    pub link_score: f64,
    pub strikes_total: i64,
    pub strikes_added: i64,
    pub at: DateTime<Utc>,
}

/// One spam enforcer violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamEvent {
    pub chat_id: i64,
    pub topic_id: i32,
    pub user_id: u64,
    pub message_id: i32,
    pub reason: String,
    pub count: i64,
    pub limit: i64,
    pub action: String,
    pub domains: Vec<String>,
    pub at: DateTime<Utc>,
}
