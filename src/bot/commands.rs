use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "snake_case", description = "ACT assistant commands:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show the welcome message")]
    Help,
    #[command(description = "merge a JSON object into the knowledge base (admin only)")]
    UpdateKnowledge(String),
}

impl Command {
    /// Parse a `/command`, or `None` for anything this bot does not handle.
    pub fn recognize(text: &str, bot_username: &str) -> Option<Self> {
        Self::parse(text, bot_username).ok()
    }
}
