use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;
use teloxide::prelude::*;
use teloxide::types::{Chat, ChatMemberStatus};
use teloxide::utils::command::BotCommands;

use crate::admin_handlers::AdminCommand;
use crate::handlers::incoming::is_anonymous_admin;
use crate::night_mode::{format_hhmm, parse_hhmm};
use crate::policy::spam::parse_timezone;
use crate::policy::SpamLevel;
use crate::store::Store;

const LIST_LIMIT: usize = 10;

pub async fn is_user_admin(bot: &Bot, chat: &Chat, user_id: UserId) -> Result<bool> {
    if chat.is_private() {
        return Ok(false);
    }
    let member = bot.get_chat_member(chat.id, user_id).await?;
    Ok(matches!(
        member.status(),
        ChatMemberStatus::Owner | ChatMemberStatus::Administrator
    ))
}

fn parse_switch(state: &str) -> Option<bool> {
    match state.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Applies an admin command to the store and returns the reply text.
/// Invalid input produces an explanatory reply, not an error.
pub async fn execute_command(
    store: &dyn Store,
    chat_id: ChatId,
    cmd: AdminCommand,
    now: DateTime<Utc>,
) -> Result<String> {
    let reply = match cmd {
        AdminCommand::Help => AdminCommand::descriptions().to_string(),
        AdminCommand::SpamLevel { level } => match SpamLevel::from_str(&level) {
            Ok(level) => {
                let mut layer = store.spam_layer(chat_id).await?.unwrap_or_default();
                layer.level = Some(level);
                store.set_spam_layer(chat_id, &layer).await?;
                format!("Spam level set to {}.", level)
            }
            Err(e) => format!("❌ {}", e),
        },
        AdminCommand::AiMod { state } => match parse_switch(&state) {
            Some(enabled) => {
                let mut layer = store.ai_layer(chat_id, 0).await?.unwrap_or_default();
                layer.enabled = Some(enabled);
                store.set_ai_layer(chat_id, 0, &layer).await?;
                let mut reply = format!("AI moderation {}.", on_off(enabled));
                if enabled && !store.is_pro(chat_id).await? {
                    reply.push_str(" It only runs in Pro chats.");
                }
                reply
            }
            None => "Usage: /aimod on|off".to_string(),
        },
        AdminCommand::Shadow { state } => match parse_switch(&state) {
            Some(shadow) => {
                let mut layer = store.ai_layer(chat_id, 0).await?.unwrap_or_default();
                layer.shadow_mode = Some(shadow);
                store.set_ai_layer(chat_id, 0, &layer).await?;
                format!("Shadow mode {}.", on_off(shadow))
            }
            None => "Usage: /shadow on|off".to_string(),
        },
        AdminCommand::Pro { state } => match parse_switch(&state) {
            Some(pro) => {
                store.set_pro(chat_id, pro).await?;
                format!("Pro tier {}.", on_off(pro))
            }
            None => "Usage: /pro on|off".to_string(),
        },
        AdminCommand::NightMode { args } => set_night_mode(store, chat_id, &args).await?,
        AdminCommand::NightOff => {
            let mut config = store.night_mode(chat_id).await?.unwrap_or_default();
            config.enabled = false;
            config.override_until = None;
            store.set_night_mode(chat_id, &config).await?;
            "Night mode off.".to_string()
        }
        AdminCommand::Quiet { minutes } => {
            let mut config = store.night_mode(chat_id).await?.unwrap_or_default();
            if minutes == 0 {
                config.override_until = None;
                store.set_night_mode(chat_id, &config).await?;
                "Quiet override cleared.".to_string()
            } else {
                config.override_until = Some(now + Duration::minutes(i64::from(minutes)));
                store.set_night_mode(chat_id, &config).await?;
                format!("Chat is quiet for the next {} minutes.", minutes)
            }
        }
        AdminCommand::Strikes { user_id } => {
            let points = store.get_points(chat_id, UserId(user_id)).await?;
            format!("User {} has {} strike points.", user_id, points)
        }
        AdminCommand::Top => {
            let top = store.top(chat_id, LIST_LIMIT).await?;
            if top.is_empty() {
                "No strikes recorded.".to_string()
            } else {
                let mut reply = String::from("Strike leaderboard:");
                for (rank, record) in top.iter().enumerate() {
                    reply.push_str(&format!("\n{}. {}: {}", rank + 1, record.user_id, record.points));
                }
                reply
            }
        }
        AdminCommand::Recent => {
            let recent = store.recent_moderation(chat_id, LIST_LIMIT).await?;
            if recent.is_empty() {
                "No moderation decisions yet.".to_string()
            } else {
                let mut reply = String::from("Recent decisions:");
                for entry in recent {
                    let user = entry
                        .user_id
                        .map(|u| u.to_string())
                        .unwrap_or_else(|| "anonymous".to_string());
                    reply.push_str(&format!(
                        "\n{} {} {} ({:.2}) user {}",
                        entry.at.format("%m-%d %H:%M"),
                        entry.action,
                        entry.category,
                        entry.score,
                        user
                    ));
                }
                reply
            }
        }
    };
    Ok(reply)
}

async fn set_night_mode(store: &dyn Store, chat_id: ChatId, args: &str) -> Result<String> {
    const USAGE: &str = "Usage: /nightmode HH:MM HH:MM [timezone]";
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Ok(USAGE.to_string());
    }
    let window = parse_hhmm(parts[0]).and_then(|start| parse_hhmm(parts[1]).map(|end| (start, end)));
    let (start, end) = match window {
        Ok(window) => window,
        Err(e) => return Ok(format!("❌ {}", e)),
    };

    let mut config = store.night_mode(chat_id).await?.unwrap_or_default();
    if let Some(tz) = parts.get(2) {
        match parse_timezone(tz) {
            Ok(tz) => config.timezone = tz.name().to_string(),
            Err(e) => return Ok(format!("❌ {}", e)),
        }
    }
    if let Err(e) = config.set_window(start, end) {
        return Ok(format!("❌ {}", e));
    }
    config.enabled = true;
    store.set_night_mode(chat_id, &config).await?;
    Ok(format!(
        "Night mode {}-{} ({}).",
        format_hhmm(start),
        format_hhmm(end),
        config.timezone
    ))
}

/// Owners, administrators and anonymous admin posts may issue commands.
pub async fn sender_is_admin(bot: &Bot, msg: &Message) -> bool {
    if is_anonymous_admin(msg) {
        return true;
    }
    match msg.from.as_ref() {
        Some(user) => is_user_admin(bot, &msg.chat, user.id).await.unwrap_or(false),
        None => false,
    }
}

/// Runs a command from a sender already known to be an admin.
pub async fn handle_admin_command(
    bot: Bot,
    msg: Message,
    cmd: AdminCommand,
    store: &dyn Store,
) -> Result<()> {
    log::info!(
        "Admin {:?} in chat {}: {:?}",
        msg.from.as_ref().map(|u| u.id),
        msg.chat.id,
        cmd
    );
    let reply = execute_command(store, msg.chat.id, cmd, Utc::now()).await?;
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}
