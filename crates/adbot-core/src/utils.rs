use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    domain::Sender,
    errors::Error,
    submission::{Submission, SubmissionId},
    Result,
};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderator_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    fn base(event: &str) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: None,
            username: None,
            submission_id: None,
            ad_type: None,
            content: None,
            moderator_id: None,
            error: None,
        }
    }

    fn for_submission(event: &str, sub: &Submission) -> Self {
        Self {
            user_id: Some(sub.submitter.user_id.0),
            username: sub.submitter.username.clone(),
            submission_id: Some(sub.id.0),
            ad_type: Some(sub.ad_type.tag().to_string()),
            ..Self::base(event)
        }
    }

    pub fn submission_received(sub: &Submission) -> Self {
        Self {
            content: sub.content.text().map(str::to_string),
            ..Self::for_submission("submission_received", sub)
        }
    }

    pub fn sent_to_moderation(sub: &Submission) -> Self {
        Self::for_submission("sent_to_moderation", sub)
    }

    pub fn approved(sub: &Submission, moderator: &Sender) -> Self {
        Self {
            moderator_id: Some(moderator.user_id.0),
            ..Self::for_submission("approved", sub)
        }
    }

    pub fn rejected(sub: &Submission, moderator: &Sender) -> Self {
        Self {
            moderator_id: Some(moderator.user_id.0),
            ..Self::for_submission("rejected", sub)
        }
    }

    pub fn expired(sub: &Submission) -> Self {
        Self::for_submission("expired", sub)
    }

    pub fn publish_failed(id: SubmissionId, moderator: &Sender, error: &str) -> Self {
        Self {
            submission_id: Some(id.0),
            moderator_id: Some(moderator.user_id.0),
            error: Some(error.to_string()),
            ..Self::base("publish_failed")
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.content {
            event.content = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            out.push_str(&json_value_to_display(v));
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Write and log failures instead of returning them.
    pub fn record(&self, event: AuditEvent) {
        let name = event.event.clone();
        if let Err(e) = self.write(event) {
            tracing::warn!("failed to write {name} audit event: {e}");
        }
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

fn json_value_to_display(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| "<unprintable>".to_string()),
    }
}
