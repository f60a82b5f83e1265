use heartflow_core::config::BotConfig;
use heartflow_core::InboundMessage;

/// Whether a message addresses the bot: an explicit @ from the transport,
/// or the bot's nickname / an alias appearing in the text.
pub fn is_mentioned_bot(message: &InboundMessage, bot: &BotConfig) -> bool {
    if message.at_bot {
        return true;
    }
    let text = &message.plain_text;
    if !bot.nickname.is_empty() && text.contains(bot.nickname.as_str()) {
        return true;
    }
    bot.aliases
        .iter()
        .filter(|a| !a.is_empty())
        .any(|alias| text.contains(alias.as_str()))
}
