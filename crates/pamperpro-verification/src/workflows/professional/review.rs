use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::domain::{AccountId, KycSubmission, QueuePosition, ReviewRecord, ReviewVerdict, SubmissionId};
use super::lifecycle::AccountLifecycleMachine;
use super::policy::VerificationPolicy;
use super::repository::VerificationRepository;
use super::service::VerificationError;
use super::validation::ValidationErrors;

/// Opaque resume token for the review queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewCursor(String);

impl ReviewCursor {
    pub fn after(position: &QueuePosition) -> Self {
        let raw = format!(
            "{}|{}",
            position
                .submitted_at
                .to_rfc3339_opts(SecondsFormat::Nanos, true),
            position.id.0
        );
        Self(hex::encode(raw))
    }

    pub fn parse(token: &str) -> Option<QueuePosition> {
        let bytes = hex::decode(token.trim()).ok()?;
        let raw = String::from_utf8(bytes).ok()?;
        let (timestamp, id) = raw.split_once('|')?;
        let submitted_at = DateTime::parse_from_rfc3339(timestamp)
            .ok()?
            .with_timezone(&Utc);
        let id = Uuid::parse_str(id).ok()?;
        Some(QueuePosition {
            submitted_at,
            id: SubmissionId(id),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of pending submissions, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPage {
    pub items: Vec<KycSubmission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<ReviewCursor>,
}

/// Reviewer-facing view over pending submissions.
///
/// Listing never consumes anything: the same cursor always yields the same
/// page until a decision removes an entry from the queue.
pub struct ReviewQueue<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    policy: VerificationPolicy,
}

impl<R> ReviewQueue<R>
where
    R: VerificationRepository,
{
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>, policy: VerificationPolicy) -> Self {
        Self {
            repository,
            clock,
            policy,
        }
    }

    pub fn list_pending(
        &self,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ReviewPage, VerificationError> {
        let after = match cursor {
            Some(token) => Some(ReviewCursor::parse(token).ok_or_else(|| {
                ValidationErrors::single("cursor", "is not a valid review cursor")
            })?),
            None => None,
        };
        let limit = self.policy.page_size(limit);

        let mut items = self.repository.pending_submissions(after.as_ref(), limit + 1)?;
        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items
                .last()
                .map(|submission| ReviewCursor::after(&submission.queue_position()))
        } else {
            None
        };

        Ok(ReviewPage { items, next_cursor })
    }

    /// Record a reviewer decision exactly once.
    ///
    /// Concurrent reviewers race on the repository compare-and-set; the loser
    /// gets `AlreadyReviewed`.
    pub fn decide(
        &self,
        submission_id: &SubmissionId,
        reviewer_id: &AccountId,
        verdict: ReviewVerdict,
        notes: Option<String>,
    ) -> Result<KycSubmission, VerificationError> {
        let submission = self
            .repository
            .submission(submission_id)?
            .ok_or(VerificationError::NotFound("submission"))?;
        if !submission.is_pending() {
            return Err(VerificationError::AlreadyReviewed);
        }

        let notes = notes
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if verdict == ReviewVerdict::Rejected && notes.is_none() {
            return Err(ValidationErrors::single("notes", "are required when rejecting").into());
        }

        let now = self.clock.now();
        let transition =
            AccountLifecycleMachine::review_transition(submission.account_id, verdict, now);
        let review = ReviewRecord {
            verdict,
            reviewer_id: *reviewer_id,
            reviewed_at: now,
            notes,
        };

        let decided = self
            .repository
            .record_decision(submission_id, review, &transition)
            .map_err(|err| {
                let err = VerificationError::from_repository(err, transition.event);
                if matches!(err, VerificationError::AlreadyReviewed) {
                    warn!(submission_id = %submission_id, reviewer_id = %reviewer_id, "lost review race");
                }
                err
            })?;

        info!(
            submission_id = %decided.id,
            account_id = %decided.account_id,
            reviewer_id = %reviewer_id,
            decision = decided.decision.label(),
            to = %transition.to,
            "kyc submission reviewed"
        );
        Ok(decided)
    }
}
