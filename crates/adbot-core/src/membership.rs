use std::sync::Arc;

use crate::{
    domain::{ChatTarget, Membership, UserId},
    errors::WorkflowFailure,
    messaging::port::MessagingPort,
};

/// Channel-membership gate.
///
/// Every check is a fresh query; a failed query counts as "not a member".
#[derive(Clone)]
pub struct MembershipGate {
    messenger: Arc<dyn MessagingPort>,
    channel: ChatTarget,
}

impl MembershipGate {
    pub fn new(messenger: Arc<dyn MessagingPort>, channel: ChatTarget) -> Self {
        Self { messenger, channel }
    }

    pub async fn check(&self, user_id: UserId) -> Membership {
        match self.messenger.membership_status(&self.channel, user_id).await {
            Ok(m) => m,
            Err(e) => {
                let failure = WorkflowFailure::MembershipQueryFailure;
                tracing::warn!(
                    user_id = user_id.0,
                    channel = %self.channel,
                    "{failure}, treating as non-member: {e}"
                );
                Membership::NotMember
            }
        }
    }
}
