use crate::domain::{ChatId, MessageRef, Sender};

/// Messenger-agnostic incoming update model.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(Command),
    Text(TextMessage),
    Photo(PhotoMessage),
    Callback(CallbackQuery),
    /// Any message kind the workflow has no rule for (stickers, voice, ...).
    Unsupported(UnsupportedMessage),
}

impl IncomingUpdate {
    pub fn sender(&self) -> &Sender {
        match self {
            IncomingUpdate::Command(c) => &c.sender,
            IncomingUpdate::Text(t) => &t.sender,
            IncomingUpdate::Photo(p) => &p.sender,
            IncomingUpdate::Callback(q) => &q.sender,
            IncomingUpdate::Unsupported(u) => &u.sender,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Command {
    pub chat_id: ChatId,
    pub sender: Sender,
    pub name: String,
    pub args: String,
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub message: MessageRef,
    pub sender: Sender,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct PhotoMessage {
    pub message: MessageRef,
    pub sender: Sender,
    /// Largest available size; opaque to the core.
    pub file_id: String,
    pub caption: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub callback_id: String,
    pub sender: Sender,
    pub data: String,
    /// The message carrying the keyboard, when Telegram still has it.
    pub message: Option<MessageRef>,
}

#[derive(Clone, Debug)]
pub struct UnsupportedMessage {
    pub message: MessageRef,
    pub sender: Sender,
}

/// What pressing a button does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonAction {
    Callback(String),
    Url(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub action: ButtonAction,
}

impl InlineButton {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Callback(data.into()),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: ButtonAction::Url(url.into()),
        }
    }
}

/// Inline keyboard, one button per row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }

    pub fn callback_data(&self) -> impl Iterator<Item = &str> {
        self.buttons.iter().filter_map(|b| match &b.action {
            ButtonAction::Callback(data) => Some(data.as_str()),
            ButtonAction::Url(_) => None,
        })
    }
}
