//! Moderator side: review dispatch, approve/reject actions and expiry.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    domain::{ChatTarget, MessageRef},
    errors::WorkflowFailure,
    messaging::{port::MessagingPort, types::CallbackQuery},
    registry::{ClaimRefused, Registry},
    submission::{AdContent, Submission, SubmissionId},
    texts,
    utils::{AuditEvent, AuditLogger},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject,
}

impl ModerationAction {
    /// Split `approve:<id>` / `reject:<id>`; returns the raw id text.
    pub fn parse(data: &str) -> Option<(Self, &str)> {
        if let Some(raw) = data.strip_prefix(texts::APPROVE_PREFIX) {
            return Some((ModerationAction::Approve, raw));
        }
        data.strip_prefix(texts::REJECT_PREFIX)
            .map(|raw| (ModerationAction::Reject, raw))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModerationOutcome {
    Published(SubmissionId),
    Rejected(SubmissionId),
    Failed(WorkflowFailure),
    /// Pressed outside the moderator chat.
    NotAllowed,
}

pub struct ModerationDesk {
    cfg: Arc<Config>,
    messenger: Arc<dyn MessagingPort>,
    registry: Arc<Registry>,
    audit: Arc<AuditLogger>,
}

impl ModerationDesk {
    pub fn new(
        cfg: Arc<Config>,
        messenger: Arc<dyn MessagingPort>,
        registry: Arc<Registry>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            cfg,
            messenger,
            registry,
            audit,
        }
    }

    fn moderators(&self) -> ChatTarget {
        ChatTarget::Id(self.cfg.admin_chat_id)
    }

    /// Hand a paid submission to the moderators: the ad photo (if any), the
    /// forwarded receipt, then the summary carrying the action buttons.
    pub async fn submit_for_review(&self, sub: &Submission) -> Result<MessageRef> {
        if let AdContent::Photo { file_id, caption } = &sub.content {
            if let Err(e) = self
                .messenger
                .send_photo(self.moderators(), file_id, caption.as_deref(), None)
                .await
            {
                tracing::warn!(submission_id = sub.id.0, "failed to copy ad photo: {e}");
            }
        }

        if let Some(receipt) = sub.receipt_message {
            if let Err(e) = self
                .messenger
                .forward_message(self.moderators(), receipt.chat_id, receipt.message_id)
                .await
            {
                tracing::warn!(submission_id = sub.id.0, "failed to forward receipt: {e}");
            }
        }

        let summary = self
            .messenger
            .send_text(
                self.moderators(),
                &texts::moderator_summary(sub),
                Some(texts::moderation_keyboard(sub.id)),
            )
            .await?;
        tracing::info!(submission_id = sub.id.0, "submission sent to moderators");
        Ok(summary)
    }

    pub async fn handle_action(&self, q: &CallbackQuery) -> ModerationOutcome {
        let from_moderators = q
            .message
            .map(|m| m.chat_id == self.cfg.admin_chat_id)
            .unwrap_or(false);
        if !from_moderators {
            tracing::warn!(user_id = q.sender.user_id.0, data = %q.data, "moderation action outside moderator chat");
            self.answer(q, Some(texts::NOT_ALLOWED), true).await;
            return ModerationOutcome::NotAllowed;
        }

        let Some((action, raw_id)) = ModerationAction::parse(&q.data) else {
            self.answer(q, Some(texts::MALFORMED_ACTION), true).await;
            return ModerationOutcome::Failed(WorkflowFailure::MalformedModerationAction(
                q.data.clone(),
            ));
        };
        let Some(id) = SubmissionId::parse(raw_id) else {
            tracing::warn!(data = %q.data, "malformed moderation payload");
            self.answer(q, Some(texts::MALFORMED_ACTION), true).await;
            return ModerationOutcome::Failed(WorkflowFailure::MalformedModerationAction(
                raw_id.to_string(),
            ));
        };

        match action {
            ModerationAction::Approve => self.approve(id, q).await,
            ModerationAction::Reject => self.reject(id, q).await,
        }
    }

    /// Publish a submission. The first approver wins; a press while it is in
    /// flight is only answered, a press after it is done sees "expired or not found".
    pub async fn approve(&self, id: SubmissionId, q: &CallbackQuery) -> ModerationOutcome {
        let sub = match self.registry.claim(id).await {
            Ok(sub) => sub,
            Err(refused) => return self.refused(id, q, refused).await,
        };

        if let Err(e) = self.publish(&sub).await {
            self.registry.release(id).await;
            let err = e.to_string();
            tracing::error!(submission_id = id.0, "publication failed: {err}");
            self.audit
                .record(AuditEvent::publish_failed(id, &q.sender, &err));

            let report = texts::publication_failed(&err);
            self.answer(q, Some(&report), true).await;
            if let Err(e) = self
                .messenger
                .send_text(self.moderators(), &report, None)
                .await
            {
                tracing::warn!("failed to report publication failure: {e}");
            }
            return ModerationOutcome::Failed(WorkflowFailure::PublicationFailure(err));
        }

        self.notify_submitter(&sub, &texts::submitter_published(&self.cfg.channel))
            .await;
        self.registry.remove(id).await;

        self.answer(q, None, false).await;
        self.edit_moderator_message(q, &texts::published_notice(id, &q.sender))
            .await;
        self.audit.record(AuditEvent::approved(&sub, &q.sender));
        tracing::info!(submission_id = id.0, moderator = q.sender.user_id.0, "ad published");

        ModerationOutcome::Published(id)
    }

    pub async fn reject(&self, id: SubmissionId, q: &CallbackQuery) -> ModerationOutcome {
        // Claiming first keeps a reject from racing an in-flight approval.
        let sub = match self.registry.claim(id).await {
            Ok(sub) => sub,
            Err(refused) => return self.refused(id, q, refused).await,
        };
        self.registry.remove(id).await;

        self.notify_submitter(&sub, texts::SUBMITTER_REJECTED).await;
        self.answer(q, None, false).await;
        self.edit_moderator_message(q, &texts::rejected_notice(id, &q.sender))
            .await;
        self.audit.record(AuditEvent::rejected(&sub, &q.sender));
        tracing::info!(submission_id = id.0, moderator = q.sender.user_id.0, "ad rejected");

        ModerationOutcome::Rejected(id)
    }

    async fn publish(&self, sub: &Submission) -> Result<MessageRef> {
        let channel = self.cfg.channel.clone();
        match &sub.content {
            AdContent::Text(text) => {
                let post = texts::compose_post(Some(text), &sub.submitter, &channel);
                self.messenger.send_text(channel, &post, None).await
            }
            AdContent::Photo { file_id, caption } => {
                let post = texts::compose_post(caption.as_deref(), &sub.submitter, &channel);
                self.messenger
                    .send_photo(channel, file_id, Some(&post), None)
                    .await
            }
        }
    }

    async fn refused(
        &self,
        id: SubmissionId,
        q: &CallbackQuery,
        refused: ClaimRefused,
    ) -> ModerationOutcome {
        match refused {
            ClaimRefused::Missing => {
                tracing::info!(submission_id = id.0, "moderation action on expired submission");
                let notice = texts::expired_notice(&id.to_string());
                self.answer(q, Some(&notice), false).await;
                self.edit_moderator_message(q, &notice).await;
            }
            // The holder of the claim edits the message when it is done.
            ClaimRefused::InFlight => {
                tracing::info!(submission_id = id.0, "moderation action while another is in flight");
                self.answer(q, Some(texts::ALREADY_IN_PROGRESS), false).await;
            }
        }
        ModerationOutcome::Failed(WorkflowFailure::ExpiredSubmission)
    }

    /// Best-effort; the submitter may have blocked the bot.
    async fn notify_submitter(&self, sub: &Submission, text: &str) {
        if let Err(e) = self
            .messenger
            .send_text(ChatTarget::Id(sub.submitter_chat), text, None)
            .await
        {
            let failure = WorkflowFailure::NotificationFailure(e.to_string());
            tracing::warn!(
                submission_id = sub.id.0,
                user_id = sub.submitter.user_id.0,
                "{failure}"
            );
        }
    }

    async fn edit_moderator_message(&self, q: &CallbackQuery, text: &str) {
        let Some(msg) = q.message else {
            return;
        };
        if let Err(e) = self.messenger.edit_text(msg, text, None).await {
            tracing::warn!("failed to edit moderator message: {e}");
        }
    }

    async fn answer(&self, q: &CallbackQuery, text: Option<&str>, show_alert: bool) {
        if let Err(e) = self
            .messenger
            .answer_callback(&q.callback_id, text, show_alert)
            .await
        {
            tracing::debug!("answer_callback failed: {e}");
        }
    }

    // ============== Expiry ==============

    /// Evict submissions older than `ttl` and tell their submitters.
    pub async fn expire_stale(&self, ttl: Duration) -> usize {
        let evicted = self.registry.evict_expired(ttl).await;
        for sub in &evicted {
            self.notify_submitter(sub, texts::SUBMITTER_EXPIRED).await;
            self.audit.record(AuditEvent::expired(sub));
        }
        evicted.len()
    }

    pub fn spawn_expiry_sweeper(
        self: Arc<Self>,
        ttl: Duration,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        let n = self.expire_stale(ttl).await;
                        if n > 0 {
                            tracing::info!(count = n, "expired stale submissions");
                        }
                    }
                }
            }
        })
    }
}
