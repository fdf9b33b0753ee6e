use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use super::accounts::load_account;
use super::clock::Clock;
use super::domain::{
    AccountId, DocumentRef, IdentityFields, KycDecision, KycDocuments, KycSubmission, SubmissionId,
};
use super::lifecycle::{AccountLifecycleMachine, LifecycleEvent};
use super::repository::VerificationRepository;
use super::service::VerificationError;
use super::validation::{require_text, ValidationErrors};

const CONTENT_HASH_BYTES: usize = 32;
const MAX_URI: usize = 2048;
const MAX_FULL_NAME: usize = 200;
const MAX_DOCUMENT_NUMBER: usize = 64;

/// KYC intake. Holds at most one pending submission per account.
pub struct KycSubmissionStore<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    minimum_applicant_age: u32,
}

impl<R> KycSubmissionStore<R>
where
    R: VerificationRepository,
{
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>, minimum_applicant_age: u32) -> Self {
        Self {
            repository,
            clock,
            minimum_applicant_age,
        }
    }

    /// Store a new pending submission and move the account to `kyc_submitted`.
    pub fn submit(
        &self,
        account_id: &AccountId,
        documents: KycDocuments,
        identity: IdentityFields,
    ) -> Result<KycSubmission, VerificationError> {
        let account = load_account(self.repository.as_ref(), account_id)?;

        if let Some(latest) = self.repository.latest_submission(account_id)? {
            if latest.is_pending() {
                return Err(VerificationError::DuplicatePendingSubmission);
            }
        }

        let now = self.clock.now();
        let transition = AccountLifecycleMachine::plan(&account, LifecycleEvent::KycSubmitted, now)?;

        let mut errors = ValidationErrors::new();
        validate_documents(&mut errors, &documents);
        validate_identity(
            &mut errors,
            &identity,
            now.date_naive(),
            self.minimum_applicant_age,
        );
        errors.into_result()?;

        let submission = KycSubmission {
            id: SubmissionId::generate(),
            account_id: account.id,
            submitted_at: now,
            documents: normalize_documents(documents),
            identity: IdentityFields {
                full_name: identity.full_name.trim().to_string(),
                id_document_number: identity.id_document_number.trim().to_string(),
                ..identity
            },
            decision: KycDecision::Pending,
            reviewer_id: None,
            reviewed_at: None,
            review_notes: None,
        };

        let stored = self
            .repository
            .insert_submission(submission, &transition)
            .map_err(|err| VerificationError::from_repository(err, LifecycleEvent::KycSubmitted))?;

        info!(
            account_id = %account.id,
            submission_id = %stored.id,
            from = %transition.from,
            to = %transition.to,
            "kyc submission queued for review"
        );
        Ok(stored)
    }

    /// Most recent submission for the account, whatever its decision.
    pub fn get_latest(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<KycSubmission>, VerificationError> {
        load_account(self.repository.as_ref(), account_id)?;
        Ok(self.repository.latest_submission(account_id)?)
    }
}

fn validate_documents(errors: &mut ValidationErrors, documents: &KycDocuments) {
    validate_document(errors, "documents.id_document", &documents.id_document);
    validate_document(errors, "documents.facial_photo", &documents.facial_photo);
    validate_document(errors, "documents.business_proof", &documents.business_proof);
}

fn validate_document(errors: &mut ValidationErrors, prefix: &str, document: &DocumentRef) {
    require_text(errors, &format!("{prefix}.uri"), &document.uri, MAX_URI);

    let hash = document.content_hash.trim();
    let field = format!("{prefix}.content_hash");
    if hash.is_empty() {
        errors.push(field, "is required");
    } else if !matches!(hex::decode(hash), Ok(bytes) if bytes.len() == CONTENT_HASH_BYTES) {
        errors.push(field, "must be a hex-encoded SHA-256 digest");
    }
}

fn validate_identity(
    errors: &mut ValidationErrors,
    identity: &IdentityFields,
    today: NaiveDate,
    minimum_age: u32,
) {
    require_text(
        errors,
        "identity.full_name",
        &identity.full_name,
        MAX_FULL_NAME,
    );

    match identity.date_of_birth {
        None => errors.push("identity.date_of_birth", "is required as a YYYY-MM-DD date"),
        Some(born) => match today.years_since(born) {
            None => errors.push("identity.date_of_birth", "must not be in the future"),
            Some(age) if age < minimum_age => errors.push(
                "identity.date_of_birth",
                format!("applicant must be at least {minimum_age} years old"),
            ),
            Some(_) => {}
        },
    }

    if identity.id_document_kind.is_none() {
        errors.push("identity.id_document_kind", "is required");
    }
    require_text(
        errors,
        "identity.id_document_number",
        &identity.id_document_number,
        MAX_DOCUMENT_NUMBER,
    );
}

fn normalize_documents(documents: KycDocuments) -> KycDocuments {
    let normalize = |document: DocumentRef| DocumentRef {
        uri: document.uri.trim().to_string(),
        content_hash: document.content_hash.trim().to_ascii_lowercase(),
    };
    KycDocuments {
        id_document: normalize(documents.id_document),
        facial_photo: normalize(documents.facial_photo),
        business_proof: normalize(documents.business_proof),
    }
}
