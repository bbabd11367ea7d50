use std::sync::Arc;

use teloxide::prelude::*;

use adbot_core::{
    messaging::types::{CallbackQuery as ButtonPress, IncomingUpdate},
    moderation::ModerationAction,
};

use super::{message_ref, sender_of};
use crate::router::AppState;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let data = q.data.clone().unwrap_or_default();

    // Always answer callback query eventually.
    if data.is_empty() {
        let _ = bot.answer_callback_query(q.id).await;
        return Ok(());
    }

    let press = ButtonPress {
        callback_id: q.id.clone(),
        sender: sender_of(&q.from),
        data,
        message: q.message.as_ref().map(message_ref),
    };

    if ModerationAction::parse(&press.data).is_some() {
        let outcome = state.desk.handle_action(&press).await;
        tracing::debug!(moderator = press.sender.user_id.0, ?outcome, "moderation action handled");
    } else {
        let step = state.flow.handle(IncomingUpdate::Callback(press)).await;
        tracing::debug!(?step, "callback handled");
    }
    Ok(())
}
