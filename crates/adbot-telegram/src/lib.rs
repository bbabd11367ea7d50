//! Telegram adapter (teloxide).
//!
//! This crate implements the `adbot-core` MessagingPort over Telegram Bot API.
//! Everything is sent as plain text: ad bodies must reach the channel byte for byte.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ChatMemberStatus, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Recipient},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use adbot_core::{
    domain::{ChatId, ChatTarget, Membership, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ButtonAction, InlineKeyboard},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn recipient(target: &ChatTarget) -> Recipient {
        match target {
            ChatTarget::Id(id) => Recipient::Id(Self::tg_chat(*id)),
            ChatTarget::Username(name) => Recipient::ChannelUsername(name.clone()),
        }
    }

    fn message_ref(msg: &Message) -> MessageRef {
        MessageRef {
            chat_id: ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        }
    }

    fn markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .buttons
            .into_iter()
            .filter_map(|b| match b.action {
                ButtonAction::Callback(data) => Some(InlineKeyboardButton::callback(b.label, data)),
                ButtonAction::Url(url) => match reqwest::Url::parse(&url) {
                    Ok(url) => Some(InlineKeyboardButton::url(b.label, url)),
                    Err(e) => {
                        tracing::warn!(%url, "dropping button with invalid url: {e}");
                        None
                    }
                },
            })
            .map(|button| vec![button])
            .collect();
        InlineKeyboardMarkup::new(rows)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::debug!(?d, "rate limited, retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(
        &self,
        target: ChatTarget,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        let markup = keyboard.map(Self::markup);
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(Self::recipient(&target), text.to_string());
                if let Some(m) = &markup {
                    req = req.reply_markup(m.clone());
                }
                req
            })
            .await?;
        Ok(Self::message_ref(&msg))
    }

    async fn send_photo(
        &self,
        target: ChatTarget,
        file_id: &str,
        caption: Option<&str>,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        let markup = keyboard.map(Self::markup);
        let msg = self
            .with_retry(|| {
                let mut req = self.bot.send_photo(
                    Self::recipient(&target),
                    InputFile::file_id(file_id.to_string()),
                );
                if let Some(c) = caption {
                    req = req.caption(c.to_string());
                }
                if let Some(m) = &markup {
                    req = req.reply_markup(m.clone());
                }
                req
            })
            .await?;
        Ok(Self::message_ref(&msg))
    }

    async fn edit_text(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        // Editing without a markup also strips the old keyboard.
        let markup = keyboard.map(Self::markup);
        self.with_retry(|| {
            let mut req = self.bot.edit_message_text(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
                text.to_string(),
            );
            if let Some(m) = &markup {
                req = req.reply_markup(m.clone());
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string()).show_alert(show_alert);
            }
            req
        })
        .await?;
        Ok(())
    }

    async fn forward_message(
        &self,
        to: ChatTarget,
        from_chat: ChatId,
        message_id: MessageId,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot.forward_message(
                    Self::recipient(&to),
                    Self::tg_chat(from_chat),
                    Self::tg_msg_id(message_id),
                )
            })
            .await?;
        Ok(Self::message_ref(&msg))
    }

    async fn membership_status(&self, channel: &ChatTarget, user_id: UserId) -> Result<Membership> {
        let member = self
            .with_retry(|| {
                self.bot.get_chat_member(
                    Self::recipient(channel),
                    teloxide::types::UserId(user_id.0 as u64),
                )
            })
            .await?;
        Ok(match member.kind.status() {
            ChatMemberStatus::Owner | ChatMemberStatus::Administrator | ChatMemberStatus::Member => {
                Membership::Member
            }
            ChatMemberStatus::Restricted | ChatMemberStatus::Left | ChatMemberStatus::Banned => {
                Membership::NotMember
            }
        })
    }
}
