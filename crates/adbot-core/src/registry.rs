use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;

use crate::{
    domain::{MessageRef, UserId},
    submission::{Submission, SubmissionId, SubmissionStatus},
};

/// Why `Registry::claim` refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimRefused {
    /// Gone, or never reached the moderators.
    Missing,
    /// Another moderator's action holds it.
    InFlight,
}

/// Pending ad registry.
///
/// Owns every live `Submission`; sessions and moderator buttons only carry ids.
/// All operations take one short lock and never await anything while holding it.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<HashMap<SubmissionId, Submission>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite.
    pub async fn put(&self, id: SubmissionId, mut submission: Submission) {
        submission.id = id;
        self.inner.lock().await.insert(id, submission);
    }

    pub async fn get(&self, id: SubmissionId) -> Option<Submission> {
        self.inner.lock().await.get(&id).cloned()
    }

    /// Removing an absent id is a no-op.
    pub async fn remove(&self, id: SubmissionId) -> Option<Submission> {
        self.inner.lock().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Insert under `submission.id`, or the next free id when that slot belongs
    /// to another submitter (message ids are only unique per chat).
    pub async fn insert_new(&self, mut submission: Submission) -> SubmissionId {
        let mut map = self.inner.lock().await;
        let mut id = submission.id;
        while let Some(existing) = map.get(&id) {
            if existing.submitter.user_id == submission.submitter.user_id {
                break;
            }
            id = SubmissionId(id.0 + 1);
        }
        submission.id = id;
        map.insert(id, submission);
        id
    }

    /// `PendingReceipt` → `AwaitingModeration`, only for the submitter's own entry.
    /// Any other status or owner is a stale reference.
    pub async fn mark_awaiting_moderation(
        &self,
        id: SubmissionId,
        owner: UserId,
    ) -> Option<Submission> {
        let mut map = self.inner.lock().await;
        let sub = map.get_mut(&id)?;
        if sub.status != SubmissionStatus::PendingReceipt || sub.submitter.user_id != owner {
            return None;
        }
        sub.status = SubmissionStatus::AwaitingModeration;
        Some(sub.clone())
    }

    /// Attach the receipt message to a pending submission.
    pub async fn attach_receipt(&self, id: SubmissionId, receipt: MessageRef) {
        if let Some(sub) = self.inner.lock().await.get_mut(&id) {
            sub.receipt_message = Some(receipt);
        }
    }

    /// Take exclusive ownership of a submission for publication.
    ///
    /// Only one caller can claim a given id; everyone else is refused until the
    /// claim is released.
    pub async fn claim(&self, id: SubmissionId) -> Result<Submission, ClaimRefused> {
        let mut map = self.inner.lock().await;
        let sub = map.get_mut(&id).ok_or(ClaimRefused::Missing)?;
        match sub.status {
            SubmissionStatus::AwaitingModeration => {
                sub.status = SubmissionStatus::Publishing;
                Ok(sub.clone())
            }
            SubmissionStatus::Publishing => Err(ClaimRefused::InFlight),
            SubmissionStatus::PendingReceipt => Err(ClaimRefused::Missing),
        }
    }

    /// Undo a claim so the submission can be retried.
    pub async fn release(&self, id: SubmissionId) {
        if let Some(sub) = self.inner.lock().await.get_mut(&id) {
            if sub.status == SubmissionStatus::Publishing {
                sub.status = SubmissionStatus::AwaitingModeration;
            }
        }
    }

    /// `AwaitingModeration` → `PendingReceipt`, when the moderators could not be reached.
    pub async fn revert_to_pending(&self, id: SubmissionId) {
        if let Some(sub) = self.inner.lock().await.get_mut(&id) {
            if sub.status == SubmissionStatus::AwaitingModeration {
                sub.status = SubmissionStatus::PendingReceipt;
            }
        }
    }

    /// Drop the owner's submission if it never got its receipt.
    pub async fn remove_if_pending(&self, id: SubmissionId, owner: UserId) -> Option<Submission> {
        let mut map = self.inner.lock().await;
        match map.get(&id) {
            Some(sub)
                if sub.status == SubmissionStatus::PendingReceipt
                    && sub.submitter.user_id == owner =>
            {
                map.remove(&id)
            }
            _ => None,
        }
    }

    pub async fn evict_expired(&self, ttl: Duration) -> Vec<Submission> {
        self.evict_expired_at(ttl, Instant::now()).await
    }

    /// Remove entries older than `ttl`. Claimed entries are left alone.
    pub async fn evict_expired_at(&self, ttl: Duration, now: Instant) -> Vec<Submission> {
        let mut map = self.inner.lock().await;
        let expired: Vec<SubmissionId> = map
            .values()
            .filter(|s| s.status != SubmissionStatus::Publishing)
            .filter(|s| now.saturating_duration_since(s.created_at) >= ttl)
            .map(|s| s.id)
            .collect();
        expired.into_iter().filter_map(|id| map.remove(&id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, MessageId, Sender};
    use crate::submission::{AdContent, AdType};

    fn submission(user: i64, message_id: i32) -> Submission {
        Submission::new(
            MessageRef {
                chat_id: ChatId(user),
                message_id: MessageId(message_id),
            },
            AdType::Normal,
            AdContent::Text("Selling a bike".to_string()),
            Sender {
                user_id: UserId(user),
                display_name: "Alice".to_string(),
                username: Some("alice".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let reg = Registry::new();
        reg.put(SubmissionId(5), submission(42, 5)).await;

        assert!(reg.remove(SubmissionId(5)).await.is_some());
        assert!(reg.remove(SubmissionId(5)).await.is_none());
        assert!(reg.get(SubmissionId(5)).await.is_none());
    }

    #[tokio::test]
    async fn put_overwrites_and_rekeys() {
        let reg = Registry::new();
        reg.put(SubmissionId(9), submission(42, 1)).await;
        let mut other = submission(42, 1);
        other.ad_type = AdType::Featured;
        reg.put(SubmissionId(9), other).await;

        let got = reg.get(SubmissionId(9)).await.unwrap();
        assert_eq!(got.id, SubmissionId(9));
        assert_eq!(got.ad_type, AdType::Featured);
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn insert_new_probes_past_other_submitters() {
        let reg = Registry::new();
        let a = reg.insert_new(submission(42, 15)).await;
        let b = reg.insert_new(submission(43, 15)).await;

        assert_eq!(a, SubmissionId(15));
        assert_eq!(b, SubmissionId(16));
        assert_eq!(reg.get(b).await.unwrap().submitter.user_id, UserId(43));
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_released() {
        let reg = Registry::new();
        let id = reg.insert_new(submission(42, 3)).await;

        // Not claimable before the receipt arrives.
        assert_eq!(reg.claim(id).await.err(), Some(ClaimRefused::Missing));

        reg.mark_awaiting_moderation(id, UserId(42)).await.unwrap();
        assert!(reg.claim(id).await.is_ok());
        assert_eq!(reg.claim(id).await.err(), Some(ClaimRefused::InFlight));

        reg.release(id).await;
        assert!(reg.claim(id).await.is_ok());
        assert_eq!(
            reg.claim(SubmissionId(404)).await.err(),
            Some(ClaimRefused::Missing)
        );
    }

    #[tokio::test]
    async fn revert_to_pending_allows_a_second_receipt() {
        let reg = Registry::new();
        let id = reg.insert_new(submission(42, 3)).await;
        reg.mark_awaiting_moderation(id, UserId(42)).await.unwrap();

        reg.revert_to_pending(id).await;
        assert_eq!(
            reg.get(id).await.map(|s| s.status),
            Some(SubmissionStatus::PendingReceipt)
        );
        assert!(reg.mark_awaiting_moderation(id, UserId(42)).await.is_some());

        // A claimed entry is not pulled back.
        reg.claim(id).await.unwrap();
        reg.revert_to_pending(id).await;
        assert_eq!(
            reg.get(id).await.map(|s| s.status),
            Some(SubmissionStatus::Publishing)
        );
    }

    #[tokio::test]
    async fn mark_awaiting_moderation_requires_owner_and_pending() {
        let reg = Registry::new();
        let id = reg.insert_new(submission(42, 3)).await;

        assert!(reg.mark_awaiting_moderation(id, UserId(43)).await.is_none());
        assert!(reg.mark_awaiting_moderation(id, UserId(42)).await.is_some());
        assert!(reg.mark_awaiting_moderation(id, UserId(42)).await.is_none());
        assert!(reg.mark_awaiting_moderation(SubmissionId(404), UserId(42)).await.is_none());
    }

    #[tokio::test]
    async fn remove_if_pending_keeps_moderated_entries() {
        let reg = Registry::new();
        let pending = reg.insert_new(submission(42, 1)).await;
        let moderated = reg.insert_new(submission(42, 2)).await;
        reg.mark_awaiting_moderation(moderated, UserId(42)).await.unwrap();

        assert!(reg.remove_if_pending(pending, UserId(43)).await.is_none());
        assert!(reg.remove_if_pending(pending, UserId(42)).await.is_some());
        assert!(reg.remove_if_pending(moderated, UserId(42)).await.is_none());
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn eviction_skips_fresh_and_claimed_entries() {
        let reg = Registry::new();
        let old = reg.insert_new(submission(42, 1)).await;
        let claimed = reg.insert_new(submission(42, 2)).await;
        reg.mark_awaiting_moderation(claimed, UserId(42)).await.unwrap();
        reg.claim(claimed).await.unwrap();

        let ttl = Duration::from_secs(60);
        let now = Instant::now();
        assert!(reg.evict_expired_at(ttl, now).await.is_empty());

        let later = now + Duration::from_secs(61);
        let evicted = reg.evict_expired_at(ttl, later).await;
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, old);
        assert!(reg.get(claimed).await.is_some());
    }
}
