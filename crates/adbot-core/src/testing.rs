//! Test doubles shared by the flow and moderation tests.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    config::Config,
    domain::{ChatId, ChatTarget, Membership, MessageId, MessageRef, Sender, UserId},
    errors::Error,
    flow::SubmissionFlow,
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, Command, IncomingUpdate, InlineKeyboard, PhotoMessage, TextMessage},
    },
    moderation::ModerationDesk,
    registry::Registry,
    utils::AuditLogger,
    Result,
};

pub const ADMIN_CHAT: i64 = -500;
pub const CHANNEL: &str = "@poolbia";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Text {
        target: ChatTarget,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Photo {
        target: ChatTarget,
        file_id: String,
        caption: Option<String>,
    },
    Edit {
        msg: MessageRef,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
        show_alert: bool,
    },
    Forward {
        to: ChatTarget,
        from_chat: ChatId,
        message_id: MessageId,
    },
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    calls: Mutex<Vec<Call>>,
    members: Mutex<HashSet<i64>>,
    membership_error: AtomicBool,
    fail_channel: AtomicBool,
    fail_moderators: AtomicBool,
    blocked: Mutex<HashSet<i64>>,
}

impl FakeMessenger {
    fn alloc(&self, target: &ChatTarget) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        let chat_id = match target {
            ChatTarget::Id(id) => *id,
            ChatTarget::Username(_) => ChatId(-1000),
        };
        MessageRef {
            chat_id,
            message_id: MessageId(1000 + *guard),
        }
    }

    pub fn join(&self, user: i64) {
        self.members.lock().unwrap().insert(user);
    }

    pub fn leave(&self, user: i64) {
        self.members.lock().unwrap().remove(&user);
    }

    pub fn fail_membership_queries(&self, fail: bool) {
        self.membership_error.store(fail, Ordering::SeqCst);
    }

    pub fn fail_channel_posts(&self, fail: bool) {
        self.fail_channel.store(fail, Ordering::SeqCst);
    }

    /// Make every send to the moderator chat fail.
    pub fn fail_moderator_chat(&self, fail: bool) {
        self.fail_moderators.store(fail, Ordering::SeqCst);
    }

    pub fn block_bot(&self, user: i64) {
        self.blocked.lock().unwrap().insert(user);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn texts_to(&self, target: &ChatTarget) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Text { target: t, text, .. } if &t == target => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Everything that reached the public channel, text or caption.
    pub fn channel_posts(&self) -> Vec<String> {
        let channel = ChatTarget::Username(CHANNEL.to_string());
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Text { target, text, .. } if target == channel => Some(text),
                Call::Photo {
                    target, caption, ..
                } if target == channel => Some(caption.unwrap_or_default()),
                _ => None,
            })
            .collect()
    }

    pub fn last_keyboard(&self) -> Option<InlineKeyboard> {
        self.calls().into_iter().rev().find_map(|c| match c {
            Call::Text { keyboard, .. } | Call::Edit { keyboard, .. } => keyboard,
            _ => None,
        })
    }

    fn check_target(&self, target: &ChatTarget) -> Result<()> {
        match target {
            ChatTarget::Username(_) if self.fail_channel.load(Ordering::SeqCst) => Err(
                Error::External("telegram error: Bad Request: chat not found".to_string()),
            ),
            ChatTarget::Id(ChatId(ADMIN_CHAT)) if self.fail_moderators.load(Ordering::SeqCst) => {
                Err(Error::External(
                    "telegram error: Bad Request: message is too long".to_string(),
                ))
            }
            ChatTarget::Id(id) if self.blocked.lock().unwrap().contains(&id.0) => Err(
                Error::External("telegram error: Forbidden: bot was blocked by the user".to_string()),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_text(
        &self,
        target: ChatTarget,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        tokio::task::yield_now().await;
        self.check_target(&target)?;
        let msg = self.alloc(&target);
        self.calls.lock().unwrap().push(Call::Text {
            target,
            text: text.to_string(),
            keyboard,
        });
        Ok(msg)
    }

    async fn send_photo(
        &self,
        target: ChatTarget,
        file_id: &str,
        caption: Option<&str>,
        _keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        tokio::task::yield_now().await;
        self.check_target(&target)?;
        let msg = self.alloc(&target);
        self.calls.lock().unwrap().push(Call::Photo {
            target,
            file_id: file_id.to_string(),
            caption: caption.map(str::to_string),
        });
        Ok(msg)
    }

    async fn edit_text(
        &self,
        msg: MessageRef,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Edit {
            msg,
            text: text.to_string(),
            keyboard,
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        });
        Ok(())
    }

    async fn forward_message(
        &self,
        to: ChatTarget,
        from_chat: ChatId,
        message_id: MessageId,
    ) -> Result<MessageRef> {
        self.check_target(&to)?;
        let msg = self.alloc(&to);
        self.calls.lock().unwrap().push(Call::Forward {
            to,
            from_chat,
            message_id,
        });
        Ok(msg)
    }

    async fn membership_status(
        &self,
        _channel: &ChatTarget,
        user_id: UserId,
    ) -> Result<Membership> {
        if self.membership_error.load(Ordering::SeqCst) {
            return Err(Error::External("telegram error: network".to_string()));
        }
        if self.members.lock().unwrap().contains(&user_id.0) {
            Ok(Membership::Member)
        } else {
            Ok(Membership::NotMember)
        }
    }
}

pub fn test_config() -> Arc<Config> {
    Arc::new(Config {
        bot_token: "x".to_string(),
        bot_username: None,
        channel: ChatTarget::Username(CHANNEL.to_string()),
        channel_link: "https://t.me/poolbia".to_string(),
        admin_chat_id: ChatId(ADMIN_CHAT),
        payment_destination: "6037-0000-1111-2222".to_string(),
        normal_ad_price: Some("50,000 T".to_string()),
        featured_ad_price: None,
        submission_ttl: Some(Duration::from_secs(3600)),
        sweep_interval: Duration::from_secs(60),
        audit_log_path: audit_path(),
        audit_log_json: true,
    })
}

fn audit_path() -> PathBuf {
    PathBuf::from(format!("/tmp/adbot-test-audit-{}.log", std::process::id()))
}

/// Flow, desk and registry wired to one fake messenger.
pub struct Harness {
    pub messenger: Arc<FakeMessenger>,
    pub registry: Arc<Registry>,
    pub desk: Arc<ModerationDesk>,
    pub flow: SubmissionFlow,
}

impl Harness {
    pub fn new() -> Self {
        let cfg = test_config();
        let messenger = Arc::new(FakeMessenger::default());
        let registry = Arc::new(Registry::new());
        let audit = Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        ));
        let desk = Arc::new(ModerationDesk::new(
            cfg.clone(),
            messenger.clone(),
            registry.clone(),
            audit.clone(),
        ));
        let flow = SubmissionFlow::new(
            cfg,
            messenger.clone(),
            registry.clone(),
            desk.clone(),
            audit,
        );
        Self {
            messenger,
            registry,
            desk,
            flow,
        }
    }
}

// ============== Update builders ==============

pub fn sender(user: i64, username: Option<&str>) -> Sender {
    Sender {
        user_id: UserId(user),
        display_name: format!("User {user}"),
        username: username.map(str::to_string),
    }
}

fn msg(chat: i64, message_id: i32) -> MessageRef {
    MessageRef {
        chat_id: ChatId(chat),
        message_id: MessageId(message_id),
    }
}

pub fn command(user: i64, name: &str) -> IncomingUpdate {
    IncomingUpdate::Command(Command {
        chat_id: ChatId(user),
        sender: sender(user, Some("alice")),
        name: name.to_string(),
        args: String::new(),
    })
}

pub fn callback(user: i64, data: &str) -> IncomingUpdate {
    IncomingUpdate::Callback(callback_query(user, user, data))
}

pub fn callback_query(user: i64, chat: i64, data: &str) -> CallbackQuery {
    CallbackQuery {
        callback_id: format!("cb-{user}-{data}"),
        sender: sender(user, Some("alice")),
        data: data.to_string(),
        message: Some(msg(chat, 1)),
    }
}

pub fn text(user: i64, message_id: i32, body: &str) -> IncomingUpdate {
    IncomingUpdate::Text(TextMessage {
        message: msg(user, message_id),
        sender: sender(user, Some("alice")),
        text: body.to_string(),
    })
}

pub fn photo(user: i64, message_id: i32, file_id: &str, caption: Option<&str>) -> IncomingUpdate {
    IncomingUpdate::Photo(PhotoMessage {
        message: msg(user, message_id),
        sender: sender(user, Some("alice")),
        file_id: file_id.to_string(),
        caption: caption.map(str::to_string),
    })
}
