use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Account, AccountId, Email, KycDecision, KycSubmission, OnboardingRecord, QueuePosition,
    ReviewRecord, SubmissionId,
};
use super::lifecycle::Transition;
use super::repository::{RepositoryError, VerificationRepository};

/// Process-local repository. One mutex guards every table so compound writes
/// and the decision compare-and-set are atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryVerificationRepository {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    emails: HashMap<Email, AccountId>,
    onboarding: HashMap<AccountId, OnboardingRecord>,
    submissions: HashMap<SubmissionId, KycSubmission>,
    // Submission ids per account in insertion order.
    by_account: HashMap<AccountId, Vec<SubmissionId>>,
    pending: BTreeSet<QueuePosition>,
}

impl Tables {
    fn check_transition(&self, transition: &Transition) -> Result<(), RepositoryError> {
        let account = self
            .accounts
            .get(&transition.account_id)
            .ok_or(RepositoryError::NotFound)?;
        if account.status != transition.from {
            return Err(RepositoryError::StatusMismatch {
                expected: transition.from,
                found: account.status,
            });
        }
        Ok(())
    }

    fn apply_transition(&mut self, transition: &Transition) {
        if let Some(account) = self.accounts.get_mut(&transition.account_id) {
            account.status = transition.to;
            account.updated_at = transition.at;
        }
    }

    fn has_pending(&self, account_id: &AccountId) -> bool {
        self.by_account
            .get(account_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.submissions.get(id))
            .any(KycSubmission::is_pending)
    }
}

impl InMemoryVerificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl VerificationRepository for InMemoryVerificationRepository {
    fn insert_account(&self, account: Account) -> Result<Account, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.emails.contains_key(&account.email) || tables.accounts.contains_key(&account.id)
        {
            return Err(RepositoryError::Conflict);
        }
        tables.emails.insert(account.email.clone(), account.id);
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn account(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.lock()?.accounts.get(id).cloned())
    }

    fn account_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    fn remove_account(&self, id: &AccountId) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let account = tables.accounts.remove(id).ok_or(RepositoryError::NotFound)?;
        tables.emails.remove(&account.email);
        tables.onboarding.remove(id);
        for submission_id in tables.by_account.remove(id).unwrap_or_default() {
            if let Some(submission) = tables.submissions.remove(&submission_id) {
                tables.pending.remove(&submission.queue_position());
            }
        }
        Ok(())
    }

    fn upsert_onboarding(
        &self,
        record: OnboardingRecord,
        transition: &Transition,
    ) -> Result<OnboardingRecord, RepositoryError> {
        let mut tables = self.lock()?;
        tables.check_transition(transition)?;

        let record = match tables.onboarding.get(&record.account_id) {
            Some(existing) => OnboardingRecord {
                submitted_at: existing.submitted_at,
                ..record
            },
            None => record,
        };

        tables.apply_transition(transition);
        tables.onboarding.insert(record.account_id, record.clone());
        Ok(record)
    }

    fn onboarding(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<OnboardingRecord>, RepositoryError> {
        Ok(self.lock()?.onboarding.get(account_id).cloned())
    }

    fn insert_submission(
        &self,
        submission: KycSubmission,
        transition: &Transition,
    ) -> Result<KycSubmission, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.submissions.contains_key(&submission.id) {
            return Err(RepositoryError::Conflict);
        }
        if tables.has_pending(&submission.account_id) {
            return Err(RepositoryError::PendingExists);
        }
        tables.check_transition(transition)?;

        tables.apply_transition(transition);
        if submission.is_pending() {
            tables.pending.insert(submission.queue_position());
        }
        tables
            .by_account
            .entry(submission.account_id)
            .or_default()
            .push(submission.id);
        tables.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    fn submission(&self, id: &SubmissionId) -> Result<Option<KycSubmission>, RepositoryError> {
        Ok(self.lock()?.submissions.get(id).cloned())
    }

    fn latest_submission(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<KycSubmission>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .by_account
            .get(account_id)
            .and_then(|ids| ids.last())
            .and_then(|id| tables.submissions.get(id))
            .cloned())
    }

    fn pending_submissions(
        &self,
        after: Option<&QueuePosition>,
        limit: usize,
    ) -> Result<Vec<KycSubmission>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .pending
            .iter()
            .filter(|position| after.map_or(true, |cursor| *position > cursor))
            .take(limit)
            .filter_map(|position| tables.submissions.get(&position.id))
            .cloned()
            .collect())
    }

    fn record_decision(
        &self,
        id: &SubmissionId,
        review: ReviewRecord,
        transition: &Transition,
    ) -> Result<KycSubmission, RepositoryError> {
        let mut tables = self.lock()?;
        let current = tables.submissions.get(id).ok_or(RepositoryError::NotFound)?;
        if current.decision != KycDecision::Pending {
            return Err(RepositoryError::AlreadyDecided);
        }
        if current.account_id != transition.account_id {
            return Err(RepositoryError::Conflict);
        }
        tables.check_transition(transition)?;

        let position = current.queue_position();
        let mut decided = current.clone();
        decided.decision = review.verdict.into();
        decided.reviewer_id = Some(review.reviewer_id);
        decided.reviewed_at = Some(review.reviewed_at);
        decided.review_notes = review.notes;

        tables.apply_transition(transition);
        tables.pending.remove(&position);
        tables.submissions.insert(*id, decided.clone());
        Ok(decided)
    }
}
