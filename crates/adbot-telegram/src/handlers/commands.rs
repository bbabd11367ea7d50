use teloxide::types::Message;

use adbot_core::{
    domain::{ChatId, Sender},
    messaging::types::{Command, IncomingUpdate},
};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub(super) fn to_command(msg: &Message, text: &str, sender: Sender) -> IncomingUpdate {
    let (name, args) = parse_command(text);
    IncomingUpdate::Command(Command {
        chat_id: ChatId(msg.chat.id.0),
        sender,
        name,
        args,
    })
}
