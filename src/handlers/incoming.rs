//! Conversion of Telegram messages into [`IncomingMessage`].

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberStatus, MessageEntityKind};

use crate::message::{IncomingMessage, LinkEntity, MediaAttachment, MediaKind, Privileges};
use crate::store::Store;

/// Forum topic of the message, if it was posted inside one.
pub fn topic_of(msg: &Message) -> Option<i32> {
    if msg.is_topic_message {
        msg.thread_id.map(|thread| thread.0 .0)
    } else {
        None
    }
}

/// Posted by an anonymous admin on behalf of the group itself.
pub fn is_anonymous_admin(msg: &Message) -> bool {
    msg.sender_chat
        .as_ref()
        .map(|sender| sender.id == msg.chat.id)
        .unwrap_or(false)
}

pub fn text_of(msg: &Message) -> String {
    msg.text().or_else(|| msg.caption()).unwrap_or_default().to_string()
}

/// Text links whose visible text differs from the target.
pub fn link_entities(msg: &Message) -> Vec<LinkEntity> {
    let entities = msg
        .parse_entities()
        .or_else(|| msg.parse_caption_entities())
        .unwrap_or_default();
    entities
        .iter()
        .filter_map(|entity| match entity.kind() {
            MessageEntityKind::TextLink { url } => Some(LinkEntity {
                visible: entity.text().to_string(),
                url: url.to_string(),
            }),
            _ => None,
        })
        .collect()
}

/// First attachment worth classifying: photo, sticker, then animation and
/// video thumbnails.
pub fn media_file(msg: &Message) -> Option<(MediaKind, String)> {
    if let Some(sizes) = msg.photo() {
        return sizes.last().map(|p| (MediaKind::Photo, p.file.id.clone()));
    }
    if let Some(sticker) = msg.sticker() {
        let file = sticker
            .thumbnail
            .as_ref()
            .map(|t| t.file.id.clone())
            .unwrap_or_else(|| sticker.file.id.clone());
        return Some((MediaKind::Sticker, file));
    }
    if let Some(animation) = msg.animation() {
        return animation
            .thumbnail
            .as_ref()
            .map(|t| (MediaKind::AnimationThumbnail, t.file.id.clone()));
    }
    if let Some(video) = msg.video() {
        return video
            .thumbnail
            .as_ref()
            .map(|t| (MediaKind::VideoThumbnail, t.file.id.clone()));
    }
    None
}

fn mime_for(path: &str) -> &'static str {
    let path = path.to_lowercase();
    if path.ends_with(".webp") {
        "image/webp"
    } else if path.ends_with(".png") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

/// Downloads the file and inlines it as a data URL, keeping the bot token
/// out of anything sent to the classifier.
pub async fn media_data_url(bot: &Bot, file_id: String) -> Result<String> {
    let file = bot.get_file(file_id).await?;
    let mut bytes: Vec<u8> = Vec::new();
    bot.download_file(&file.path, &mut bytes).await?;
    Ok(format!("data:{};base64,{}", mime_for(&file.path), BASE64.encode(bytes)))
}

pub async fn resolve_privileges(
    bot: &Bot,
    store: &dyn Store,
    msg: &Message,
    topic: Option<i32>,
) -> Result<Privileges> {
    let mut privileges = Privileges {
        is_anonymous_admin: is_anonymous_admin(msg),
        ..Default::default()
    };
    let Some(user) = msg.from.as_ref().filter(|_| !privileges.is_anonymous_admin) else {
        return Ok(privileges);
    };

    let member = bot.get_chat_member(msg.chat.id, user.id).await?;
    match member.status() {
        ChatMemberStatus::Owner => privileges.is_owner = true,
        ChatMemberStatus::Administrator => privileges.is_admin = true,
        _ => {}
    }
    if let Some(topic) = topic {
        privileges.is_topic_owner = store.topic_owners(msg.chat.id, topic).await?.contains(&user.id.0);
    }
    Ok(privileges)
}

pub async fn to_incoming(bot: &Bot, store: &dyn Store, msg: &Message) -> Result<IncomingMessage> {
    let topic_id = topic_of(msg);
    let privileges = resolve_privileges(bot, store, msg, topic_id).await?;
    let media = match media_file(msg) {
        Some((kind, file_id)) => match media_data_url(bot, file_id).await {
            Ok(url) => Some(MediaAttachment { kind, url }),
            Err(e) => {
                log::warn!("Could not fetch media of message {}: {}", msg.id.0, e);
                None
            }
        },
        None => None,
    };

    Ok(IncomingMessage {
        chat_id: msg.chat.id,
        topic_id,
        sender_id: msg
            .from
            .as_ref()
            .filter(|_| !privileges.is_anonymous_admin)
            .map(|u| u.id),
        message_id: msg.id,
        text: text_of(msg),
        entities: link_entities(msg),
        media,
        privileges,
    })
}
