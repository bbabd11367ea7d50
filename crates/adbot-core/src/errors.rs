/// Core error type.
///
/// Adapter crates map their specific errors into this type so the workflow
/// can handle transport failures uniformly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Workflow-level failures.
///
/// None of these escape the transition that produced them; each one is turned
/// into a chat message (or a log line) at the boundary where it occurs.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowFailure {
    #[error("membership query failed")]
    MembershipQueryFailure,

    #[error("malformed moderation action: {0}")]
    MalformedModerationAction(String),

    #[error("submission expired or not found")]
    ExpiredSubmission,

    #[error("submission reference lost")]
    LostSubmissionReference,

    #[error("moderators unreachable: {0}")]
    ModerationDispatchFailure(String),

    #[error("publication failed: {0}")]
    PublicationFailure(String),

    #[error("submitter notification failed: {0}")]
    NotificationFailure(String),
}
