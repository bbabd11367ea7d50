use std::{env, path::PathBuf, time::Duration};

use crate::{
    domain::{ChatId, ChatTarget},
    errors::Error,
    Result,
};

/// Typed configuration, loaded from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub bot_username: Option<String>,

    // Channel
    /// Channel users must join, and where approved ads are published.
    pub channel: ChatTarget,
    /// Public invite link shown on the join button.
    pub channel_link: String,

    // Moderation
    pub admin_chat_id: ChatId,
    pub payment_destination: String,
    pub normal_ad_price: Option<String>,
    pub featured_ad_price: Option<String>,

    // Expiry
    /// `None` disables expiry of unresolved submissions.
    pub submission_ttl: Option<Duration>,
    pub sweep_interval: Duration,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        // A missing `.env` is fine; real deployments set the environment directly.
        let _ = dotenvy::dotenv();

        let bot_token = env_str("BOT_TOKEN").and_then(non_empty).ok_or_else(|| {
            Error::Config("BOT_TOKEN environment variable is required".to_string())
        })?;
        let bot_username = env_str("BOT_USERNAME")
            .and_then(non_empty)
            .map(|s| s.trim_start_matches('@').to_string());

        let channel_raw = env_str("CHANNEL_USERNAME").and_then(non_empty).ok_or_else(|| {
            Error::Config("CHANNEL_USERNAME environment variable is required".to_string())
        })?;
        let channel = parse_channel(&channel_raw);
        let channel_link = channel_link(env_str("CHANNEL_LINK").and_then(non_empty), &channel);

        let admin_chat_id = env_str("ADMIN_CHAT_ID")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(ChatId)
            .ok_or_else(|| {
                Error::Config("ADMIN_CHAT_ID must be set to a numeric chat id".to_string())
            })?;

        let payment_destination = env_str("PAYMENT_DESTINATION")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("PAYMENT_DESTINATION environment variable is required".to_string())
            })?;
        let normal_ad_price = env_str("NORMAL_AD_PRICE").and_then(non_empty);
        let featured_ad_price = env_str("FEATURED_AD_PRICE").and_then(non_empty);

        let ttl_hours = env_u64("SUBMISSION_TTL_HOURS").unwrap_or(72);
        let submission_ttl = (ttl_hours > 0).then(|| Duration::from_secs(ttl_hours * 3600));
        let sweep_interval =
            Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS").unwrap_or(600).max(1));

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/adbot-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        Ok(Self {
            bot_token,
            bot_username,
            channel,
            channel_link,
            admin_chat_id,
            payment_destination,
            normal_ad_price,
            featured_ad_price,
            submission_ttl,
            sweep_interval,
            audit_log_path,
            audit_log_json,
        })
    }
}

/// `-100123` → numeric id, `name` / `@name` → `@name`.
pub fn parse_channel(raw: &str) -> ChatTarget {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return ChatTarget::Id(ChatId(id));
    }
    ChatTarget::Username(format!("@{}", raw.trim_start_matches('@')))
}

fn channel_link(raw: Option<String>, channel: &ChatTarget) -> String {
    match raw {
        Some(link) if link.starts_with("https://") || link.starts_with("http://") => link,
        Some(path) => format!("https://t.me/{}", path.trim_start_matches('@')),
        None => match channel {
            ChatTarget::Username(name) => format!("https://t.me/{}", name.trim_start_matches('@')),
            ChatTarget::Id(_) => "https://t.me/".to_string(),
        },
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_get_at_prefix() {
        assert_eq!(
            parse_channel("poolbia"),
            ChatTarget::Username("@poolbia".to_string())
        );
        assert_eq!(
            parse_channel("@poolbia"),
            ChatTarget::Username("@poolbia".to_string())
        );
        assert_eq!(
            parse_channel("-1001234"),
            ChatTarget::Id(ChatId(-1001234))
        );
    }

    #[test]
    fn channel_link_accepts_bare_paths_and_urls() {
        let ch = ChatTarget::Username("@poolbia".to_string());
        assert_eq!(channel_link(None, &ch), "https://t.me/poolbia");
        assert_eq!(
            channel_link(Some("+AbCdEf".to_string()), &ch),
            "https://t.me/+AbCdEf"
        );
        assert_eq!(
            channel_link(Some("https://t.me/joinchat/x".to_string()), &ch),
            "https://t.me/joinchat/x"
        );
    }
}
