//! Outbound platform actions.
//!
//! The enforcers treat every call as best-effort: a failed delete must not
//! stop the warning from being sent.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::{ChatPermissions, MessageId, ThreadId};

#[async_trait]
pub trait ChatActions: Send + Sync {
    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()>;
    async fn send_message(&self, chat: ChatId, topic: Option<i32>, text: &str) -> Result<()>;
    /// Revokes send permissions until `until`.
    async fn restrict_member(&self, chat: ChatId, user: UserId, until: DateTime<Utc>) -> Result<()>;
    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<()>;
    /// Chat-wide write lock (`can_send = false`) or its release.
    async fn set_chat_permissions(&self, chat: ChatId, can_send: bool) -> Result<()>;
}

/// Permissions granted to members while the chat is not locked.
pub fn member_write_permissions() -> ChatPermissions {
    ChatPermissions::SEND_MESSAGES
        | ChatPermissions::SEND_AUDIOS
        | ChatPermissions::SEND_DOCUMENTS
        | ChatPermissions::SEND_PHOTOS
        | ChatPermissions::SEND_VIDEOS
        | ChatPermissions::SEND_VIDEO_NOTES
        | ChatPermissions::SEND_VOICE_NOTES
        | ChatPermissions::SEND_POLLS
        | ChatPermissions::SEND_OTHER_MESSAGES
        | ChatPermissions::ADD_WEB_PAGE_PREVIEWS
}

#[async_trait]
impl ChatActions for Bot {
    async fn delete_message(&self, chat: ChatId, message: MessageId) -> Result<()> {
        Requester::delete_message(self, chat, message).await?;
        Ok(())
    }

    async fn send_message(&self, chat: ChatId, topic: Option<i32>, text: &str) -> Result<()> {
        let request = Requester::send_message(self, chat, text.to_string());
        match topic {
            Some(topic) if topic != 0 => {
                request.message_thread_id(ThreadId(MessageId(topic))).await?;
            }
            _ => {
                request.await?;
            }
        }
        Ok(())
    }

    async fn restrict_member(&self, chat: ChatId, user: UserId, until: DateTime<Utc>) -> Result<()> {
        Requester::restrict_chat_member(self, chat, user, ChatPermissions::empty())
            .until_date(until)
            .await?;
        Ok(())
    }

    async fn ban_member(&self, chat: ChatId, user: UserId) -> Result<()> {
        Requester::ban_chat_member(self, chat, user).await?;
        Ok(())
    }

    async fn set_chat_permissions(&self, chat: ChatId, can_send: bool) -> Result<()> {
        let permissions = if can_send {
            member_write_permissions()
        } else {
            ChatPermissions::empty()
        };
        Requester::set_chat_permissions(self, chat, permissions).await?;
        Ok(())
    }
}
