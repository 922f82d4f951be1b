use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Admin commands:")]
pub enum AdminCommand {
    #[command(description = "show help.")]
    Help,
    #[command(description = "set spam level: off, light, medium or strict.")]
    SpamLevel { level: String },
    #[command(description = "turn AI moderation on or off.")]
    AiMod { state: String },
    #[command(description = "turn AI shadow mode on or off.")]
    Shadow { state: String },
    #[command(description = "turn the Pro tier on or off.")]
    Pro { state: String },
    #[command(description = "set night mode: HH:MM HH:MM [timezone].")]
    NightMode { args: String },
    #[command(description = "turn night mode off.")]
    NightOff,
    #[command(description = "quiet the chat now for N minutes (0 clears).")]
    Quiet { minutes: u32 },
    #[command(description = "show strike points of a user id.")]
    Strikes { user_id: u64 },
    #[command(description = "show the strike leaderboard.")]
    Top,
    #[command(description = "show recent AI moderation decisions.")]
    Recent,
}
