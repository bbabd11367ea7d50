//! User-facing texts, callback payloads and keyboards.

use crate::{
    config::Config,
    domain::{ChatTarget, Sender},
    messaging::types::{InlineButton, InlineKeyboard},
    submission::{AdContent, AdType, Submission, SubmissionId},
};

// ============== Callback payloads ==============

pub const CHECK_MEMBERSHIP: &str = "check_membership_in_convo";
pub const AGREE_RULES: &str = "agree_rules";
pub const AD_TYPE_PREFIX: &str = "ad_type:";
pub const APPROVE_PREFIX: &str = "approve:";
pub const REJECT_PREFIX: &str = "reject:";

// ============== Submitter prompts ==============

pub const RULES: &str = "Ad rules:\n\
1. One item or service per ad.\n\
2. No illegal goods, scams or misleading claims.\n\
3. Include a price and a way to contact you.\n\
4. Ads are published only after the payment receipt is reviewed.\n\
5. The moderators may decline any ad; declined payments are refunded.\n\n\
Tap \"I agree\" to continue.";
pub const CHOOSE_AD_TYPE: &str = "Choose the type of your ad:";
pub const SEND_CONTENT: &str =
    "Send the ad now: either a text message, or a single photo with a caption.";
pub const RECEIVED: &str =
    "Thanks! Your ad and receipt were sent for review. You will be notified once it is published.";
pub const REVIEW_UNAVAILABLE: &str =
    "Sorry, we could not pass your ad to the moderators just now. Please send the receipt photo again in a few minutes.";
pub const LOST_SUBMISSION: &str =
    "Sorry, we could not find the ad this receipt belongs to. Please start again with /start.";
pub const CANCELLED: &str = "Ad submission cancelled. Send /start to begin again.";
pub const NOTHING_TO_CANCEL: &str = "There is nothing to cancel. Send /start to post an ad.";
pub const STILL_NOT_MEMBER_ALERT: &str = "You are not a member of the channel yet.";
pub const UNKNOWN_AD_TYPE: &str = "Unknown ad type.";
pub const STALE_BUTTON: &str = "This button is no longer active. Send /start to begin again.";
pub const HELP: &str = "/start - post a new ad\n/cancel - abandon the current ad\n/help - show this message";

pub fn join_prompt(still_missing: bool) -> &'static str {
    if still_missing {
        "You have not joined the channel yet. Please join it and check again."
    } else {
        "To post an ad you need to be a member of our channel. Join it, then tap \"I've joined\"."
    }
}

pub fn join_keyboard(channel_link: &str) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        InlineButton::url("Join the channel", channel_link),
        InlineButton::callback("I've joined", CHECK_MEMBERSHIP),
    ])
}

pub fn rules_keyboard() -> InlineKeyboard {
    InlineKeyboard::new(vec![InlineButton::callback("I agree", AGREE_RULES)])
}

pub fn ad_type_keyboard(cfg: &Config) -> InlineKeyboard {
    let buttons = AdType::ALL
        .into_iter()
        .map(|t| {
            let label = match price_of(cfg, t) {
                Some(p) => format!("{} ({p})", t.label()),
                None => t.label().to_string(),
            };
            InlineButton::callback(label, format!("{AD_TYPE_PREFIX}{}", t.tag()))
        })
        .collect();
    InlineKeyboard::new(buttons)
}

pub fn payment_prompt(cfg: &Config, ad_type: AdType) -> String {
    let amount = match price_of(cfg, ad_type) {
        Some(p) => format!("{p} for a {}", ad_type.label().to_lowercase()),
        None => format!("the fee for a {}", ad_type.label().to_lowercase()),
    };
    format!(
        "Almost done. Please pay {amount} to:\n\n{}\n\nThen send a photo of the payment receipt.",
        cfg.payment_destination
    )
}

fn price_of(cfg: &Config, ad_type: AdType) -> Option<&str> {
    match ad_type {
        AdType::Normal => cfg.normal_ad_price.as_deref(),
        AdType::Featured => cfg.featured_ad_price.as_deref(),
    }
}

// ============== Moderation ==============

pub fn moderator_summary(sub: &Submission) -> String {
    let handle = sub
        .submitter
        .username
        .as_deref()
        .map(|u| format!(" @{u}"))
        .unwrap_or_default();
    let kind = match sub.content {
        AdContent::Text(_) => "text",
        AdContent::Photo { .. } => "photo",
    };
    let mut out = format!(
        "New ad #{}\nType: {}\nFrom: {}{} (id {})\nSubmitted: {}\nContent: {kind}",
        sub.id,
        sub.ad_type.label(),
        sub.submitter.display_name,
        handle,
        sub.submitter.user_id.0,
        sub.submitted_at.format("%Y-%m-%d %H:%M UTC"),
    );
    if let Some(text) = sub.content.text() {
        out.push_str("\n\n");
        out.push_str(text);
    }
    out
}

pub fn moderation_keyboard(id: SubmissionId) -> InlineKeyboard {
    InlineKeyboard::new(vec![
        InlineButton::callback("Approve and publish", format!("{APPROVE_PREFIX}{id}")),
        InlineButton::callback("Reject", format!("{REJECT_PREFIX}{id}")),
    ])
}

/// Trailing block appended to every published ad.
pub fn attribution(submitter: &Sender, channel: &ChatTarget) -> String {
    format!("\n\n------\nPosted by: {}\nChannel: {channel}", submitter.mention())
}

/// The public post: the user's text untouched, then the attribution block.
pub fn compose_post(content: Option<&str>, submitter: &Sender, channel: &ChatTarget) -> String {
    let block = attribution(submitter, channel);
    match content {
        Some(text) if !text.is_empty() => format!("{text}{block}"),
        _ => block.trim_start().to_string(),
    }
}

pub fn published_notice(id: SubmissionId, moderator: &Sender) -> String {
    format!("Ad #{id} approved by {} and published.", moderator.mention())
}

pub fn rejected_notice(id: SubmissionId, moderator: &Sender) -> String {
    format!("Ad #{id} rejected by {}.", moderator.mention())
}

pub fn expired_notice(raw_id: &str) -> String {
    format!("Ad #{raw_id}: expired or not found.")
}

pub fn publication_failed(err: &str) -> String {
    format!("Publishing failed: {err}")
}

pub fn submitter_published(channel: &ChatTarget) -> String {
    format!("Your ad has been approved and published in {channel}.")
}

pub const SUBMITTER_REJECTED: &str =
    "Your ad was not approved by the moderators. Contact the channel admins for details.";
pub const SUBMITTER_EXPIRED: &str =
    "Your ad expired before it was reviewed. Send /start to submit it again.";
pub const ALREADY_IN_PROGRESS: &str = "Another moderator is handling this ad right now.";
pub const NOT_ALLOWED: &str = "Only moderators can do that.";
pub const MALFORMED_ACTION: &str = "Invalid ad id in this button.";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    fn alice(username: Option<&str>) -> Sender {
        Sender {
            user_id: UserId(42),
            display_name: "Alice".to_string(),
            username: username.map(str::to_string),
        }
    }

    #[test]
    fn post_keeps_text_byte_identical() {
        let channel = ChatTarget::Username("@poolbia".to_string());
        let text = "  Selling a bike <b>cheap</b> & fast\n";
        let post = compose_post(Some(text), &alice(Some("alice")), &channel);

        assert!(post.starts_with(text));
        assert_eq!(&post[text.len()..], attribution(&alice(Some("alice")), &channel));
        assert!(post.ends_with("Posted by: @alice\nChannel: @poolbia"));
    }

    #[test]
    fn attribution_falls_back_to_numeric_id() {
        let channel = ChatTarget::Username("@poolbia".to_string());
        let post = compose_post(None, &alice(None), &channel);
        assert!(post.starts_with("------"));
        assert!(post.contains("Posted by: id 42"));
    }

    #[test]
    fn moderation_keyboard_embeds_id() {
        let kb = moderation_keyboard(SubmissionId(77));
        let data: Vec<&str> = kb.callback_data().collect();
        assert_eq!(data, vec!["approve:77", "reject:77"]);
    }
}
