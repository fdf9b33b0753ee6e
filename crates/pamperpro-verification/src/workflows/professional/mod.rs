//! Professional verification pipeline: signup, business onboarding, KYC
//! intake, admin review and the account lifecycle tying them together.

pub mod accounts;
pub mod clock;
pub mod credentials;
pub mod domain;
pub mod kyc;
pub mod lifecycle;
pub mod memory;
pub mod onboarding;
pub mod policy;
pub mod repository;
pub mod review;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use accounts::AccountStore;
pub use clock::{Clock, SystemClock};
pub use credentials::{CredentialError, CredentialHash, CredentialHasher, KdfParams};
pub use domain::{
    Account, AccountId, AccountView, DocumentRef, Email, IdDocumentKind, IdentityFields,
    KycDecision, KycDocuments, KycSubmission, LifecycleStatus, OnboardingFields,
    OnboardingRecord, PlanTag, QueuePosition, ReviewVerdict, Role, SubmissionId,
};
pub use kyc::KycSubmissionStore;
pub use lifecycle::{
    AccountLifecycleMachine, DashboardView, LifecycleEvent, Transition, TransitionError,
};
pub use memory::InMemoryVerificationRepository;
pub use onboarding::{validate_onboarding, OnboardingService, OnboardingStep};
pub use policy::VerificationPolicy;
pub use repository::{RepositoryError, VerificationRepository};
pub use review::{ReviewCursor, ReviewPage, ReviewQueue};
pub use router::{verification_router, ACCOUNT_ID_HEADER, ACCOUNT_ROLE_HEADER};
pub use service::{
    AccountOverview, CredentialCheck, DecisionRequest, KycRequest, Session, SignupRequest,
    SubmissionSummary, VerificationError, VerificationService,
};
pub use validation::{FieldError, ValidationErrors};
