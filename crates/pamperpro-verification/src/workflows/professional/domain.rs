use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::credentials::CredentialHash;

/// Identifier wrapper for marketplace accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for KYC submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub Uuid);

impl SubmissionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Case-folded e-mail address. Two addresses differing only by case compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Trim, case-fold and sanity-check an address. Returns `None` when the
    /// value cannot be an e-mail address.
    pub fn parse(raw: &str) -> Option<Self> {
        let folded = raw.trim().to_lowercase();
        if folded.chars().any(char::is_whitespace) {
            return None;
        }

        let (local, domain) = folded.split_once('@')?;
        if local.is_empty() || domain.contains('@') {
            return None;
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return None;
        }

        Some(Self(folded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Professional,
    Vendor,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Professional => "professional",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
        }
    }

    /// Roles that sell services on the marketplace and therefore must be verified.
    pub const fn requires_verification(self) -> bool {
        matches!(self, Role::Professional | Role::Vendor)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Account-level position in the verification pipeline.
///
/// `Rejected` is kept so records written by older tooling still decode. The
/// lifecycle machine never produces it; such accounts re-submit onboarding
/// before they may submit KYC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Registered,
    OnboardingComplete,
    KycSubmitted,
    Active,
    Rejected,
}

impl LifecycleStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleStatus::Registered => "registered",
            LifecycleStatus::OnboardingComplete => "onboarding_complete",
            LifecycleStatus::KycSubmitted => "kyc_submitted",
            LifecycleStatus::Active => "active",
            LifecycleStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stored account. The credential hash never leaves the crate through API views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub email: Email,
    pub credential: CredentialHash,
    pub role: Role,
    pub status: LifecycleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public projection of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub id: AccountId,
    pub email: Email,
    pub role: Role,
    pub status: LifecycleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment-independent subscription tag chosen during onboarding. Billing is
/// handled elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTag {
    #[default]
    Trial,
    Standard,
    Premium,
}

/// Business questionnaire answers. Every field defaults so that missing keys
/// surface as field-level validation errors rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnboardingFields {
    pub business_name: String,
    pub address: String,
    pub phone: String,
    /// Kept wide so out-of-range answers reach validation instead of failing decode.
    pub years_experience: Option<i64>,
    pub services_offered: BTreeSet<String>,
    pub description: String,
    pub plan: PlanTag,
}

impl OnboardingFields {
    /// Trimmed copy used for storage.
    pub fn normalized(&self) -> Self {
        Self {
            business_name: self.business_name.trim().to_string(),
            address: self.address.trim().to_string(),
            phone: self.phone.trim().to_string(),
            years_experience: self.years_experience,
            services_offered: self
                .services_offered
                .iter()
                .map(|service| service.trim().to_string())
                .collect(),
            description: self.description.trim().to_string(),
            plan: self.plan,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingRecord {
    pub account_id: AccountId,
    pub fields: OnboardingFields,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Opaque pointer to a file held by the storage service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentRef {
    pub uri: String,
    /// Hex-encoded SHA-256 digest reported by the storage service.
    pub content_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KycDocuments {
    pub id_document: DocumentRef,
    pub facial_photo: DocumentRef,
    pub business_proof: DocumentRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdDocumentKind {
    Passport,
    NationalId,
    DrivingLicence,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityFields {
    pub full_name: String,
    #[serde(deserialize_with = "lenient_date")]
    pub date_of_birth: Option<NaiveDate>,
    pub id_document_kind: Option<IdDocumentKind>,
    pub id_document_number: String,
}

/// Reads `YYYY-MM-DD`. Anything else decodes as absent and is reported by
/// identity validation together with the other failing fields.
fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycDecision {
    Pending,
    Approved,
    Rejected,
}

impl KycDecision {
    pub const fn label(self) -> &'static str {
        match self {
            KycDecision::Pending => "pending",
            KycDecision::Approved => "approved",
            KycDecision::Rejected => "rejected",
        }
    }
}

/// Decision a reviewer may record. `pending` is not a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    Rejected,
}

impl From<ReviewVerdict> for KycDecision {
    fn from(verdict: ReviewVerdict) -> Self {
        match verdict {
            ReviewVerdict::Approved => KycDecision::Approved,
            ReviewVerdict::Rejected => KycDecision::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycSubmission {
    pub id: SubmissionId,
    pub account_id: AccountId,
    pub submitted_at: DateTime<Utc>,
    pub documents: KycDocuments,
    pub identity: IdentityFields,
    pub decision: KycDecision,
    pub reviewer_id: Option<AccountId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

impl KycSubmission {
    pub fn is_pending(&self) -> bool {
        self.decision == KycDecision::Pending
    }

    pub fn queue_position(&self) -> QueuePosition {
        QueuePosition {
            submitted_at: self.submitted_at,
            id: self.id,
        }
    }
}

/// Review outcome written by the compare-and-set in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRecord {
    pub verdict: ReviewVerdict,
    pub reviewer_id: AccountId,
    pub reviewed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Sort key of the review queue: oldest first, ties broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueuePosition {
    pub submitted_at: DateTime<Utc>,
    pub id: SubmissionId,
}
