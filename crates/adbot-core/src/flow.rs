//! Per-user submission workflow.
//!
//! `/start` → membership → rules → ad type → content → payment receipt →
//! moderation. The machine is linear; the only loop is the membership re-check.
//! Every transition for a user runs under that user's session lock.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    config::Config,
    domain::{ChatId, ChatTarget, Membership, MessageRef, Sender, UserId},
    errors::WorkflowFailure,
    membership::MembershipGate,
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, Command, IncomingUpdate, InlineKeyboard, PhotoMessage, TextMessage},
    },
    moderation::ModerationDesk,
    registry::Registry,
    submission::{AdContent, AdType, Submission, SubmissionId},
    texts,
    utils::{AuditEvent, AuditLogger},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowState {
    AwaitingMembership,
    AwaitingRulesAgreement,
    AwaitingAdType,
    AwaitingAdContent,
    AwaitingPaymentReceipt,
}

/// Conversation state for one user. `state == None` means "no session".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserSession {
    pub state: Option<FlowState>,
    pub ad_type: Option<AdType>,
    pub pending_submission: Option<SubmissionId>,
}

impl UserSession {
    fn enter(&mut self, state: FlowState) -> Step {
        self.state = Some(state);
        Step::Entered(state)
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What one update did to the workflow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Now in this state (also returned for the membership self-loop).
    Entered(FlowState),
    /// Receipt accepted and the submission handed to the moderators.
    Completed(SubmissionId),
    Cancelled,
    /// The transition failed. The session is cleared, except after
    /// `ModerationDispatchFailure` where the receipt can be sent again.
    Failed(WorkflowFailure),
    /// No rule matched; nothing changed.
    Ignored,
}

/// Per-user session locks, same shape as the router's per-chat locks.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<UserId, Arc<Mutex<UserSession>>>>,
}

impl SessionStore {
    pub async fn lock_user(&self, user_id: UserId) -> OwnedMutexGuard<UserSession> {
        let session = {
            let mut map = self.inner.lock().await;
            map.entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(UserSession::default())))
                .clone()
        };
        session.lock_owned().await
    }

    /// Unlock, and forget the user entirely when they have no session and
    /// nobody else is queued on their lock.
    pub async fn release(&self, user_id: UserId, guard: OwnedMutexGuard<UserSession>) {
        let idle = guard.state.is_none();
        drop(guard);
        if !idle {
            return;
        }
        let mut map = self.inner.lock().await;
        let unused = map.get(&user_id).is_some_and(|s| {
            Arc::strong_count(s) == 1
                && s.try_lock().map(|g| g.state.is_none()).unwrap_or(false)
        });
        if unused {
            map.remove(&user_id);
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn snapshot(&self, user_id: UserId) -> UserSession {
        let session = self.inner.lock().await.get(&user_id).cloned();
        match session {
            Some(s) => s.lock().await.clone(),
            None => UserSession::default(),
        }
    }
}

pub struct SubmissionFlow {
    cfg: Arc<Config>,
    messenger: Arc<dyn MessagingPort>,
    gate: MembershipGate,
    registry: Arc<Registry>,
    desk: Arc<ModerationDesk>,
    audit: Arc<AuditLogger>,
    sessions: SessionStore,
}

impl SubmissionFlow {
    pub fn new(
        cfg: Arc<Config>,
        messenger: Arc<dyn MessagingPort>,
        registry: Arc<Registry>,
        desk: Arc<ModerationDesk>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        let gate = MembershipGate::new(messenger.clone(), cfg.channel.clone());
        Self {
            cfg,
            messenger,
            gate,
            registry,
            desk,
            audit,
            sessions: SessionStore::default(),
        }
    }

    pub async fn session(&self, user_id: UserId) -> UserSession {
        self.sessions.snapshot(user_id).await
    }

    pub async fn handle(&self, update: IncomingUpdate) -> Step {
        let user_id = update.sender().user_id;
        let mut session = self.sessions.lock_user(user_id).await;
        let before = session.state;

        let step = match update {
            IncomingUpdate::Command(cmd) => self.on_command(&mut session, cmd).await,
            IncomingUpdate::Callback(q) => self.on_callback(&mut session, q).await,
            IncomingUpdate::Text(msg) => self.on_text(&mut session, msg).await,
            IncomingUpdate::Photo(msg) => self.on_photo(&mut session, msg).await,
            IncomingUpdate::Unsupported(_) => Step::Ignored,
        };

        if step != Step::Ignored {
            tracing::debug!(user_id = user_id.0, ?before, after = ?session.state, ?step, "transition");
        }
        self.sessions.release(user_id, session).await;
        step
    }

    /// Users currently in the middle of a submission.
    pub async fn active_sessions(&self) -> usize {
        self.sessions.len().await
    }

    // ============== Commands ==============

    async fn on_command(&self, session: &mut UserSession, cmd: Command) -> Step {
        match cmd.name.as_str() {
            "start" => self.start(session, &cmd).await,
            "cancel" => {
                if session.state.is_none() {
                    self.say(cmd.chat_id, texts::NOTHING_TO_CANCEL, None).await;
                    return Step::Ignored;
                }
                self.abandon(session, cmd.sender.user_id).await;
                self.say(cmd.chat_id, texts::CANCELLED, None).await;
                Step::Cancelled
            }
            "help" => {
                self.say(cmd.chat_id, texts::HELP, None).await;
                Step::Ignored
            }
            _ => Step::Ignored,
        }
    }

    async fn start(&self, session: &mut UserSession, cmd: &Command) -> Step {
        self.abandon(session, cmd.sender.user_id).await;

        match self.gate.check(cmd.sender.user_id).await {
            Membership::Member => {
                self.say(cmd.chat_id, texts::RULES, Some(texts::rules_keyboard()))
                    .await;
                session.enter(FlowState::AwaitingRulesAgreement)
            }
            Membership::NotMember => {
                self.say(
                    cmd.chat_id,
                    texts::join_prompt(false),
                    Some(texts::join_keyboard(&self.cfg.channel_link)),
                )
                .await;
                session.enter(FlowState::AwaitingMembership)
            }
        }
    }

    /// Clear the session, dropping a submission that never got its receipt.
    async fn abandon(&self, session: &mut UserSession, user_id: UserId) {
        if let Some(id) = session.pending_submission {
            if self.registry.remove_if_pending(id, user_id).await.is_some() {
                tracing::info!(submission_id = id.0, "dropped abandoned submission");
            }
        }
        session.clear();
    }

    // ============== Callbacks ==============

    async fn on_callback(&self, session: &mut UserSession, q: CallbackQuery) -> Step {
        let data = q.data.as_str();

        if data == texts::CHECK_MEMBERSHIP {
            if session.state != Some(FlowState::AwaitingMembership) {
                return self.stale(&q).await;
            }
            return match self.gate.check(q.sender.user_id).await {
                Membership::Member => {
                    self.answer(&q, None, false).await;
                    self.show(&q, texts::RULES, Some(texts::rules_keyboard()))
                        .await;
                    session.enter(FlowState::AwaitingRulesAgreement)
                }
                Membership::NotMember => {
                    self.answer(&q, Some(texts::STILL_NOT_MEMBER_ALERT), true)
                        .await;
                    self.show(
                        &q,
                        texts::join_prompt(true),
                        Some(texts::join_keyboard(&self.cfg.channel_link)),
                    )
                    .await;
                    session.enter(FlowState::AwaitingMembership)
                }
            };
        }

        if data == texts::AGREE_RULES {
            if session.state != Some(FlowState::AwaitingRulesAgreement) {
                return self.stale(&q).await;
            }
            self.answer(&q, None, false).await;
            self.show(
                &q,
                texts::CHOOSE_AD_TYPE,
                Some(texts::ad_type_keyboard(&self.cfg)),
            )
            .await;
            return session.enter(FlowState::AwaitingAdType);
        }

        if let Some(tag) = data.strip_prefix(texts::AD_TYPE_PREFIX) {
            if session.state != Some(FlowState::AwaitingAdType) || session.ad_type.is_some() {
                return self.stale(&q).await;
            }
            let Some(ad_type) = AdType::from_tag(tag) else {
                self.answer(&q, Some(texts::UNKNOWN_AD_TYPE), true).await;
                return Step::Ignored;
            };
            session.ad_type = Some(ad_type);
            self.answer(&q, None, false).await;
            let text = format!("{} selected.\n\n{}", ad_type.label(), texts::SEND_CONTENT);
            self.show(&q, &text, None).await;
            return session.enter(FlowState::AwaitingAdContent);
        }

        // Unknown payloads still get answered so the client stops its spinner.
        self.answer(&q, None, false).await;
        Step::Ignored
    }

    async fn stale(&self, q: &CallbackQuery) -> Step {
        self.answer(q, Some(texts::STALE_BUTTON), false).await;
        Step::Ignored
    }

    // ============== Content & receipt ==============

    async fn on_text(&self, session: &mut UserSession, msg: TextMessage) -> Step {
        if session.state != Some(FlowState::AwaitingAdContent) || msg.text.trim().is_empty() {
            return Step::Ignored;
        }
        let content = AdContent::Text(msg.text.clone());
        self.accept_content(session, msg.message, msg.sender, content)
            .await
    }

    async fn on_photo(&self, session: &mut UserSession, msg: PhotoMessage) -> Step {
        match session.state {
            Some(FlowState::AwaitingAdContent) => {
                let content = AdContent::Photo {
                    file_id: msg.file_id.clone(),
                    caption: msg.caption.clone(),
                };
                self.accept_content(session, msg.message, msg.sender, content)
                    .await
            }
            Some(FlowState::AwaitingPaymentReceipt) => self.accept_receipt(session, msg).await,
            _ => Step::Ignored,
        }
    }

    async fn accept_content(
        &self,
        session: &mut UserSession,
        message: MessageRef,
        sender: Sender,
        content: AdContent,
    ) -> Step {
        let Some(ad_type) = session.ad_type else {
            tracing::warn!(user_id = sender.user_id.0, "content received without an ad type");
            session.clear();
            return Step::Ignored;
        };

        let user_id = sender.user_id;
        let submission = Submission::new(message, ad_type, content, sender);
        let id = self.registry.insert_new(submission).await;
        session.pending_submission = Some(id);

        if let Some(sub) = self.registry.get(id).await {
            self.audit.record(AuditEvent::submission_received(&sub));
        }
        tracing::info!(
            submission_id = id.0,
            user_id = user_id.0,
            ad_type = ad_type.tag(),
            "ad content received"
        );

        self.say(
            message.chat_id,
            &texts::payment_prompt(&self.cfg, ad_type),
            None,
        )
        .await;
        session.enter(FlowState::AwaitingPaymentReceipt)
    }

    async fn accept_receipt(&self, session: &mut UserSession, msg: PhotoMessage) -> Step {
        let user_id = msg.sender.user_id;
        let marked = match session.pending_submission {
            Some(id) => self.registry.mark_awaiting_moderation(id, user_id).await,
            None => None,
        };
        let Some(mut sub) = marked else {
            tracing::warn!(
                user_id = user_id.0,
                pending = ?session.pending_submission,
                "payment receipt without a live submission"
            );
            session.clear();
            self.say(msg.message.chat_id, texts::LOST_SUBMISSION, None)
                .await;
            return Step::Failed(WorkflowFailure::LostSubmissionReference);
        };

        self.registry.attach_receipt(sub.id, msg.message).await;
        sub.receipt_message = Some(msg.message);

        // Nothing is promised to the user until the moderators have the ad.
        if let Err(e) = self.desk.submit_for_review(&sub).await {
            tracing::error!(submission_id = sub.id.0, "failed to reach moderators: {e}");
            self.registry.revert_to_pending(sub.id).await;
            self.say(msg.message.chat_id, texts::REVIEW_UNAVAILABLE, None)
                .await;
            return Step::Failed(WorkflowFailure::ModerationDispatchFailure(
                e.to_string(),
            ));
        }

        self.say(msg.message.chat_id, texts::RECEIVED, None).await;
        self.audit.record(AuditEvent::sent_to_moderation(&sub));

        session.clear();
        Step::Completed(sub.id)
    }

    // ============== Transport helpers ==============

    async fn say(&self, chat_id: ChatId, text: &str, keyboard: Option<InlineKeyboard>) {
        if let Err(e) = self
            .messenger
            .send_text(ChatTarget::Id(chat_id), text, keyboard)
            .await
        {
            tracing::warn!(chat_id = chat_id.0, "send failed: {e}");
        }
    }

    /// Replace the keyboard message in place; send a fresh one if that fails.
    async fn show(&self, q: &CallbackQuery, text: &str, keyboard: Option<InlineKeyboard>) {
        if let Some(msg) = q.message {
            match self.messenger.edit_text(msg, text, keyboard.clone()).await {
                Ok(()) => return,
                Err(e) => tracing::debug!("edit failed, sending instead: {e}"),
            }
        }
        let chat_id = q
            .message
            .map(|m| m.chat_id)
            .unwrap_or(ChatId(q.sender.user_id.0));
        self.say(chat_id, text, keyboard).await;
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
}
