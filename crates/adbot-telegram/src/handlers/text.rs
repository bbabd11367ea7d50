use teloxide::types::Message;

use adbot_core::{
    domain::Sender,
    messaging::types::{IncomingUpdate, TextMessage},
};

use super::message_ref;

/// The body is passed through untouched; no trimming, no entity parsing.
pub(super) fn to_text(msg: &Message, body: &str, sender: Sender) -> IncomingUpdate {
    IncomingUpdate::Text(TextMessage {
        message: message_ref(msg),
        sender,
        text: body.to_string(),
    })
}
