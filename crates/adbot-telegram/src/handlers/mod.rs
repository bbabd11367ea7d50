//! Telegram update handlers.
//!
//! Each handler is a small adapter that turns a teloxide update into a core
//! `IncomingUpdate` and hands it to the submission flow or the moderation desk.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};

use adbot_core::{
    domain::{ChatId, MessageId, MessageRef, Sender, UserId},
    messaging::types::{IncomingUpdate, UnsupportedMessage},
};

use crate::router::AppState;
mod callback;
mod commands;
mod photo;
mod text;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Group chats (the moderator chat included) and channel posts never drive the flow.
    if !msg.chat.is_private() {
        return Ok(());
    }
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let sender = sender_of(user);

    let update = if let Some(body) = msg.text() {
        if body.starts_with('/') {
            commands::to_command(&msg, body, sender)
        } else {
            text::to_text(&msg, body, sender)
        }
    } else if let Some(update) = photo::to_photo(&msg, sender.clone()) {
        update
    } else {
        IncomingUpdate::Unsupported(UnsupportedMessage {
            message: message_ref(&msg),
            sender,
        })
    };

    let step = state.flow.handle(update).await;
    tracing::debug!(chat_id = msg.chat.id.0, ?step, "message handled");
    Ok(())
}

pub(crate) fn sender_of(user: &User) -> Sender {
    Sender {
        user_id: UserId(user.id.0 as i64),
        display_name: user.full_name(),
        username: user.username.clone(),
    }
}

pub(crate) fn message_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
    }
}
