use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::accounts::AccountStore;
use super::clock::{Clock, SystemClock};
use super::credentials::{CredentialError, CredentialHasher};
use super::domain::{
    Account, AccountId, AccountView, IdentityFields, KycDecision, KycDocuments, KycSubmission,
    LifecycleStatus, OnboardingFields, OnboardingRecord, ReviewVerdict, Role, SubmissionId,
};
use super::kyc::KycSubmissionStore;
use super::lifecycle::{user_hint, AccountLifecycleMachine, DashboardView, LifecycleEvent, TransitionError};
use super::onboarding::OnboardingService;
use super::policy::VerificationPolicy;
use super::repository::{RepositoryError, VerificationRepository};
use super::review::{ReviewPage, ReviewQueue};
use super::validation::ValidationErrors;

/// Error raised by the verification pipeline.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("cannot apply {event} while account is {status}")]
    InvalidState {
        status: LifecycleStatus,
        event: LifecycleEvent,
    },
    #[error("{role} accounts are not part of professional verification")]
    RoleNotEligible { role: Role },
    #[error("account already has a submission awaiting review")]
    DuplicatePendingSubmission,
    #[error("an account with this e-mail already exists")]
    DuplicateEmail,
    #[error("submission was already reviewed")]
    AlreadyReviewed,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("e-mail or credential is incorrect")]
    InvalidCredentials,
    #[error("request is missing session identity")]
    Unauthenticated,
    #[error("session is not allowed to perform this action")]
    Forbidden,
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl VerificationError {
    /// Translate repository conflicts raised while applying `event` into
    /// pipeline errors.
    pub(crate) fn from_repository(err: RepositoryError, event: LifecycleEvent) -> Self {
        match err {
            RepositoryError::PendingExists => VerificationError::DuplicatePendingSubmission,
            RepositoryError::AlreadyDecided => VerificationError::AlreadyReviewed,
            RepositoryError::StatusMismatch { found, .. } => VerificationError::InvalidState {
                status: found,
                event,
            },
            RepositoryError::NotFound => VerificationError::NotFound("account"),
            other => VerificationError::Repository(other),
        }
    }

    /// Message suitable for showing to the person who made the request.
    pub fn user_message(&self) -> String {
        match self {
            VerificationError::InvalidState { status, event } => {
                user_hint(*status, *event).to_string()
            }
            VerificationError::AlreadyReviewed => {
                "this submission was already reviewed by someone else".to_string()
            }
            VerificationError::DuplicatePendingSubmission => {
                "a verification request is already awaiting review".to_string()
            }
            VerificationError::RoleNotEligible { .. } => {
                "only professional and vendor accounts can be verified".to_string()
            }
            VerificationError::Credential(_) | VerificationError::Repository(_) => {
                "verification service is temporarily unavailable".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<TransitionError> for VerificationError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::RoleNotEligible { role } => VerificationError::RoleNotEligible { role },
            TransitionError::InvalidState { status, event } => {
                VerificationError::InvalidState { status, event }
            }
        }
    }
}

/// Caller identity supplied by the session collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub account_id: AccountId,
    pub role: Role,
}

impl Session {
    pub fn require_admin(&self) -> Result<(), VerificationError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(VerificationError::Forbidden)
        }
    }

    pub fn require_self_or_admin(&self, account_id: &AccountId) -> Result<(), VerificationError> {
        if self.role == Role::Admin || self.account_id == *account_id {
            Ok(())
        } else {
            Err(VerificationError::Forbidden)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub credential: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialCheck {
    pub email: String,
    pub credential: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KycRequest {
    pub documents: KycDocuments,
    pub identity: IdentityFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub decision: ReviewVerdict,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub id: SubmissionId,
    pub decision: KycDecision,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

impl From<&KycSubmission> for SubmissionSummary {
    fn from(submission: &KycSubmission) -> Self {
        Self {
            id: submission.id,
            decision: submission.decision,
            submitted_at: submission.submitted_at,
            reviewed_at: submission.reviewed_at,
            review_notes: submission.review_notes.clone(),
        }
    }
}

/// Everything a dashboard needs to pick the view to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountOverview {
    pub account: AccountView,
    pub dashboard: DashboardView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_submission: Option<SubmissionSummary>,
}

/// Facade composing the account store, onboarding, KYC intake and review queue
/// over one repository, with session checks for the HTTP layer.
pub struct VerificationService<R> {
    accounts: AccountStore<R>,
    onboarding: OnboardingService<R>,
    kyc: KycSubmissionStore<R>,
    review: ReviewQueue<R>,
}

impl<R> VerificationService<R>
where
    R: VerificationRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: VerificationPolicy) -> Result<Self, VerificationError> {
        Self::with_clock(repository, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        policy: VerificationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, VerificationError> {
        let hasher = CredentialHasher::new(policy.kdf)?;

        Ok(Self {
            accounts: AccountStore::new(
                repository.clone(),
                clock.clone(),
                hasher,
                policy.min_credential_length,
            )?,
            onboarding: OnboardingService::new(repository.clone(), clock.clone()),
            kyc: KycSubmissionStore::new(
                repository.clone(),
                clock.clone(),
                policy.minimum_applicant_age,
            ),
            review: ReviewQueue::new(repository, clock, policy),
        })
    }

    pub fn accounts(&self) -> &AccountStore<R> {
        &self.accounts
    }

    pub fn onboarding(&self) -> &OnboardingService<R> {
        &self.onboarding
    }

    pub fn kyc(&self) -> &KycSubmissionStore<R> {
        &self.kyc
    }

    pub fn review(&self) -> &ReviewQueue<R> {
        &self.review
    }

    /// Self-service signup. Admin accounts are never self-assigned.
    pub fn signup(&self, request: SignupRequest) -> Result<Account, VerificationError> {
        if request.role == Role::Admin {
            return Err(VerificationError::Forbidden);
        }
        self.accounts
            .create(&request.email, &request.credential, request.role)
    }

    pub fn authenticate(&self, check: CredentialCheck) -> Result<Account, VerificationError> {
        self.accounts
            .authenticate(&check.email, &check.credential)?
            .ok_or(VerificationError::InvalidCredentials)
    }

    pub fn overview(
        &self,
        session: &Session,
        account_id: &AccountId,
    ) -> Result<AccountOverview, VerificationError> {
        session.require_self_or_admin(account_id)?;
        let account = self
            .accounts
            .find_by_id(account_id)?
            .ok_or(VerificationError::NotFound("account"))?;
        let latest = self.kyc.get_latest(account_id)?;

        Ok(AccountOverview {
            account: account.view(),
            dashboard: AccountLifecycleMachine::dashboard_view(&account, latest.as_ref()),
            latest_submission: latest.as_ref().map(SubmissionSummary::from),
        })
    }

    pub fn submit_onboarding(
        &self,
        session: &Session,
        fields: OnboardingFields,
    ) -> Result<OnboardingRecord, VerificationError> {
        self.onboarding.submit(&session.account_id, fields)
    }

    pub fn submit_kyc(
        &self,
        session: &Session,
        request: KycRequest,
    ) -> Result<KycSubmission, VerificationError> {
        self.kyc
            .submit(&session.account_id, request.documents, request.identity)
    }

    pub fn latest_kyc(
        &self,
        session: &Session,
        account_id: &AccountId,
    ) -> Result<Option<KycSubmission>, VerificationError> {
        session.require_self_or_admin(account_id)?;
        self.kyc.get_latest(account_id)
    }

    pub fn pending_queue(
        &self,
        session: &Session,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<ReviewPage, VerificationError> {
        session.require_admin()?;
        self.review.list_pending(cursor, limit)
    }

    pub fn decide(
        &self,
        session: &Session,
        submission_id: &SubmissionId,
        request: DecisionRequest,
    ) -> Result<KycSubmission, VerificationError> {
        session.require_admin()?;
        self.review.decide(
            submission_id,
            &session.account_id,
            request.decision,
            request.notes,
        )
    }
}
