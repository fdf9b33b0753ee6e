use super::domain::{
    Account, AccountId, Email, KycSubmission, LifecycleStatus, OnboardingRecord, QueuePosition,
    ReviewRecord, SubmissionId,
};
use super::lifecycle::Transition;

/// Storage abstraction for the verification pipeline.
///
/// Methods taking a [`Transition`] must apply the record write and the account
/// status change as one unit: either both land or neither does. The status
/// change is a compare-and-set on `transition.from`.
pub trait VerificationRepository: Send + Sync {
    /// Insert a new account. `Conflict` when the e-mail is already taken.
    fn insert_account(&self, account: Account) -> Result<Account, RepositoryError>;
    fn account(&self, id: &AccountId) -> Result<Option<Account>, RepositoryError>;
    fn account_by_email(&self, email: &Email) -> Result<Option<Account>, RepositoryError>;
    /// Delete an account together with its onboarding record and submissions.
    fn remove_account(&self, id: &AccountId) -> Result<(), RepositoryError>;

    fn upsert_onboarding(
        &self,
        record: OnboardingRecord,
        transition: &Transition,
    ) -> Result<OnboardingRecord, RepositoryError>;
    fn onboarding(&self, account_id: &AccountId)
        -> Result<Option<OnboardingRecord>, RepositoryError>;

    /// Store a pending submission. `PendingExists` when the account already has one.
    fn insert_submission(
        &self,
        submission: KycSubmission,
        transition: &Transition,
    ) -> Result<KycSubmission, RepositoryError>;
    fn submission(&self, id: &SubmissionId) -> Result<Option<KycSubmission>, RepositoryError>;
    fn latest_submission(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<KycSubmission>, RepositoryError>;
    /// Pending submissions strictly after `after`, oldest first.
    fn pending_submissions(
        &self,
        after: Option<&QueuePosition>,
        limit: usize,
    ) -> Result<Vec<KycSubmission>, RepositoryError>;

    /// Compare-and-set the decision from `pending`. `AlreadyDecided` when
    /// another review got there first.
    fn record_decision(
        &self,
        id: &SubmissionId,
        review: ReviewRecord,
        transition: &Transition,
    ) -> Result<KycSubmission, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("account already has a pending submission")]
    PendingExists,
    #[error("submission already decided")]
    AlreadyDecided,
    #[error("account status changed (expected {expected}, found {found})")]
    StatusMismatch {
        expected: LifecycleStatus,
        found: LifecycleStatus,
    },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
