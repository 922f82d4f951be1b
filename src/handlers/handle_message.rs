use std::sync::Arc;
use teloxide::prelude::*;

use crate::handlers::to_incoming;
use crate::moderator::Moderator;

/// Runs a group message through the moderation pipeline. Never fails: every
/// problem is logged and the update is dropped.
pub async fn handle_message(bot: Bot, message: Message, moderator: Arc<Moderator>) {
    if message.chat.is_private() {
        return;
    }
    let incoming = match to_incoming(&bot, moderator.store.as_ref(), &message).await {
        Ok(incoming) => incoming,
        Err(e) => {
            log::warn!(
                "Could not read message {} in chat {}: {}",
                message.id.0,
                message.chat.id,
                e
            );
            return;
        }
    };
    let outcome = moderator.moderate(&incoming).await;
    log::debug!(
        "Message {} in chat {}: {:?}",
        message.id.0,
        message.chat.id,
        outcome
    );
}
