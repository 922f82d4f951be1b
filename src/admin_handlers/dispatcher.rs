use std::sync::Arc;
use teloxide::dispatching::{Dispatcher, UpdateFilterExt};
use teloxide::dptree;
use teloxide::prelude::{Bot, Message, ResponseResult, Update};
use teloxide::utils::command::BotCommands;

use crate::admin_handlers::{handle_admin_command, sender_is_admin, AdminCommand};
use crate::handlers::handle_message;
use crate::moderator::Moderator;

/// The command to run for this text, if any. Commands from non-admins are
/// not answered; their messages are moderated like any other.
pub fn command_for_sender(text: &str, bot_username: &str, sender_is_admin: bool) -> Option<AdminCommand> {
    if !sender_is_admin {
        return None;
    }
    AdminCommand::parse(text, bot_username).ok()
}

/// Admin commands go to the command handler; everything else is moderated.
pub async fn message_handler(bot: Bot, msg: Message, moderator: Arc<Moderator>) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        if AdminCommand::parse(text, &moderator.bot_username).is_ok() {
            let is_admin = sender_is_admin(&bot, &msg).await;
            if let Some(cmd) = command_for_sender(text, &moderator.bot_username, is_admin) {
                if let Err(e) = handle_admin_command(bot, msg.clone(), cmd, moderator.store.as_ref()).await {
                    log::warn!("Admin command failed in chat {}: {}", msg.chat.id, e);
                }
                return Ok(());
            }
            log::debug!("Command from non-admin in chat {} goes to moderation", msg.chat.id);
        }
    }
    handle_message(bot, msg, moderator).await;
    Ok(())
}

pub async fn run_dispatcher(bot: Bot, moderator: Arc<Moderator>) {
    let handler = dptree::entry().branch(Update::filter_message().endpoint(message_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![moderator])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
