use teloxide::types::{Message, PhotoSize};

use adbot_core::{
    domain::Sender,
    messaging::types::{IncomingUpdate, PhotoMessage},
};

use super::message_ref;

/// Highest-resolution rendition of the photo.
fn largest(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes.iter().max_by_key(|p| p.width * p.height)
}

pub(super) fn to_photo(msg: &Message, sender: Sender) -> Option<IncomingUpdate> {
    let photo = largest(msg.photo()?)?;
    Some(IncomingUpdate::Photo(PhotoMessage {
        message: message_ref(msg),
        sender,
        file_id: photo.file.id.clone(),
        caption: msg.caption().map(str::to_string),
    }))
}
