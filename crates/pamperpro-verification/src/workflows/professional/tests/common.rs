use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use axum::http::{Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::professional::clock::Clock;
use crate::workflows::professional::domain::{
    Account, AccountId, DocumentRef, Email, IdDocumentKind, IdentityFields, KycDocuments,
    KycSubmission, LifecycleStatus, OnboardingFields, OnboardingRecord, PlanTag, QueuePosition,
    ReviewRecord, Role, SubmissionId,
};
use crate::workflows::professional::lifecycle::Transition;
use crate::workflows::professional::repository::{RepositoryError, VerificationRepository};
use crate::workflows::professional::{
    InMemoryVerificationRepository, KdfParams, KycRequest, Session, VerificationPolicy,
    VerificationService, ACCOUNT_ID_HEADER, ACCOUNT_ROLE_HEADER,
};

pub(super) const CREDENTIAL: &str = "correct horse battery";

/// Clock that only moves when told to.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn policy() -> VerificationPolicy {
    VerificationPolicy {
        kdf: KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        ..VerificationPolicy::default()
    }
}

pub(super) type MemoryService = VerificationService<InMemoryVerificationRepository>;

pub(super) fn build_service() -> (
    MemoryService,
    Arc<InMemoryVerificationRepository>,
    Arc<ManualClock>,
) {
    let repository = Arc::new(InMemoryVerificationRepository::new());
    let clock = Arc::new(ManualClock::starting_at(start()));
    let service = VerificationService::with_clock(repository.clone(), policy(), clock.clone())
        .expect("service builds");
    (service, repository, clock)
}

pub(super) fn professional(service: &MemoryService, email: &str) -> Account {
    service
        .accounts()
        .create(email, CREDENTIAL, Role::Professional)
        .expect("professional created")
}

pub(super) fn admin(service: &MemoryService, email: &str) -> Account {
    service
        .accounts()
        .create(email, CREDENTIAL, Role::Admin)
        .expect("admin created")
}

pub(super) fn session(account: &Account) -> Session {
    Session {
        account_id: account.id,
        role: account.role,
    }
}

pub(super) fn onboarding_fields() -> OnboardingFields {
    OnboardingFields {
        business_name: "Glow Studio".to_string(),
        address: "14 Market Street, Leeds".to_string(),
        phone: "+44 113 496 0000".to_string(),
        years_experience: Some(6),
        services_offered: BTreeSet::from(["Manicure".to_string(), "Lash lift".to_string()]),
        description: "Mobile nail and lash technician.".to_string(),
        plan: PlanTag::Standard,
    }
}

pub(super) fn content_hash(seed: u64) -> String {
    format!("{seed:064x}")
}

pub(super) fn kyc_documents() -> KycDocuments {
    KycDocuments {
        id_document: DocumentRef {
            uri: "storage://kyc/id-front.jpg".to_string(),
            content_hash: content_hash(1),
        },
        facial_photo: DocumentRef {
            uri: "storage://kyc/selfie.jpg".to_string(),
            content_hash: content_hash(2),
        },
        business_proof: DocumentRef {
            uri: "storage://kyc/insurance.pdf".to_string(),
            content_hash: content_hash(3),
        },
    }
}

pub(super) fn identity() -> IdentityFields {
    IdentityFields {
        full_name: "Jordan Rivera".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 12),
        id_document_kind: Some(IdDocumentKind::Passport),
        id_document_number: "X1234567".to_string(),
    }
}

pub(super) fn kyc_request() -> KycRequest {
    KycRequest {
        documents: kyc_documents(),
        identity: identity(),
    }
}

/// Professional that has completed onboarding.
pub(super) fn onboarded(service: &MemoryService, email: &str) -> Account {
    let account = professional(service, email);
    service
        .onboarding()
        .submit(&account.id, onboarding_fields())
        .expect("onboarding accepted");
    service
        .accounts()
        .find_by_id(&account.id)
        .expect("lookup succeeds")
        .expect("account exists")
}

/// Professional with a pending KYC submission.
pub(super) fn awaiting_review(service: &MemoryService, email: &str) -> (Account, KycSubmission) {
    let account = onboarded(service, email);
    let submission = service
        .kyc()
        .submit(&account.id, kyc_documents(), identity())
        .expect("kyc accepted");
    (account, submission)
}

pub(super) fn status_of(service: &MemoryService, id: &AccountId) -> LifecycleStatus {
    service
        .accounts()
        .find_by_id(id)
        .expect("lookup succeeds")
        .expect("account exists")
        .status
}

pub(super) struct UnavailableRepository;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl VerificationRepository for UnavailableRepository {
    fn insert_account(&self, _account: Account) -> Result<Account, RepositoryError> {
        Err(offline())
    }

    fn account(&self, _id: &AccountId) -> Result<Option<Account>, RepositoryError> {
        Err(offline())
    }

    fn account_by_email(&self, _email: &Email) -> Result<Option<Account>, RepositoryError> {
        Err(offline())
    }

    fn remove_account(&self, _id: &AccountId) -> Result<(), RepositoryError> {
        Err(offline())
    }

    fn upsert_onboarding(
        &self,
        _record: OnboardingRecord,
        _transition: &Transition,
    ) -> Result<OnboardingRecord, RepositoryError> {
        Err(offline())
    }

    fn onboarding(
        &self,
        _account_id: &AccountId,
    ) -> Result<Option<OnboardingRecord>, RepositoryError> {
        Err(offline())
    }

    fn insert_submission(
        &self,
        _submission: KycSubmission,
        _transition: &Transition,
    ) -> Result<KycSubmission, RepositoryError> {
        Err(offline())
    }

    fn submission(&self, _id: &SubmissionId) -> Result<Option<KycSubmission>, RepositoryError> {
        Err(offline())
    }

    fn latest_submission(
        &self,
        _account_id: &AccountId,
    ) -> Result<Option<KycSubmission>, RepositoryError> {
        Err(offline())
    }

    fn pending_submissions(
        &self,
        _after: Option<&QueuePosition>,
        _limit: usize,
    ) -> Result<Vec<KycSubmission>, RepositoryError> {
        Err(offline())
    }

    fn record_decision(
        &self,
        _id: &SubmissionId,
        _review: ReviewRecord,
        _transition: &Transition,
    ) -> Result<KycSubmission, RepositoryError> {
        Err(offline())
    }
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    session: Option<&Session>,
    body: &Value,
) -> Request<axum::body::Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json");
    if let Some(session) = session {
        builder = builder
            .header(ACCOUNT_ID_HEADER, session.account_id.to_string())
            .header(ACCOUNT_ROLE_HEADER, session.role.label());
    }
    builder
        .body(axum::body::Body::from(
            serde_json::to_vec(body).expect("serializable body"),
        ))
        .expect("valid request")
}

pub(super) fn get_request(uri: &str, session: Option<&Session>) -> Request<axum::body::Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(session) = session {
        builder = builder
            .header(ACCOUNT_ID_HEADER, session.account_id.to_string())
            .header(ACCOUNT_ROLE_HEADER, session.role.label());
    }
    builder
        .body(axum::body::Body::empty())
        .expect("valid request")
}

pub(super) fn assert_conflict_response(response: &Response) {
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
