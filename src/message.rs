//! Normalized inbound message consumed by the enforcers.

use teloxide::types::{ChatId, MessageId, UserId};

/// Kind of the first attachment worth classifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Sticker,
    AnimationThumbnail,
    VideoThumbnail,
}

/// Attached media with a fetchable remote reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub url: String,
}

/// A hidden link: entity text that points to a different URL.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkEntity {
    pub visible: String,
    pub url: String,
}

/// Privilege flags resolved by the access-control collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Privileges {
    pub is_admin: bool,
    pub is_owner: bool,
    pub is_anonymous_admin: bool,
    pub is_topic_owner: bool,
}

impl Privileges {
    /// Admin, owner or an anonymous-admin post.
    pub fn is_admin_like(&self) -> bool {
        self.is_admin || self.is_owner || self.is_anonymous_admin
    }

    /// Any privileged actor, topic owners included.
    pub fn is_privileged(&self) -> bool {
        self.is_admin_like() || self.is_topic_owner
    }
}

#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    /// Forum topic; `None` outside topics.
    pub topic_id: Option<i32>,
    /// `None` for anonymous-admin posts.
    pub sender_id: Option<UserId>,
    pub message_id: MessageId,
    /// Text or caption.
    pub text: String,
    pub entities: Vec<LinkEntity>,
    pub media: Option<MediaAttachment>,
    pub privileges: Privileges,
}

impl IncomingMessage {
    /// Topic scope used for policy resolution (0 is the chat-wide default).
    pub fn topic(&self) -> i32 {
        self.topic_id.unwrap_or(0)
    }
}
