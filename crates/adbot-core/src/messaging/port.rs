use async_trait::async_trait;

use crate::{
    domain::{ChatId, ChatTarget, MessageId, MessageRef, Membership, UserId},
    messaging::types::InlineKeyboard,
    Result,
};

/// Messenger port consumed by the workflow.
///
/// Telegram is the only implementation; retries and timeouts belong to the
/// implementation, never to the callers.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(
        &self,
        target: ChatTarget,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef>;

    async fn send_photo(
        &self,
        target: ChatTarget,
        file_id: &str,
        caption: Option<&str>,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef>;

    async fn edit_text(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()>;

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()>;

    async fn forward_message(
        &self,
        to: ChatTarget,
        from_chat: ChatId,
        message_id: MessageId,
    ) -> Result<MessageRef>;

    async fn membership_status(&self, channel: &ChatTarget, user_id: UserId)
        -> Result<Membership>;
}
