use std::sync::Arc;

use tracing::info;

use super::clock::Clock;
use super::credentials::{CredentialError, CredentialHash, CredentialHasher};
use super::domain::{Account, AccountId, Email, LifecycleStatus, Role};
use super::repository::{RepositoryError, VerificationRepository};
use super::service::VerificationError;
use super::validation::ValidationErrors;

const INVALID_EMAIL: &str = "must be a valid e-mail address";
const DECOY_CREDENTIAL: &str = "pamperpro-unknown-account";

/// Account persistence and credential checks.
pub struct AccountStore<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    hasher: CredentialHasher,
    decoy: CredentialHash,
    min_credential_length: usize,
}

impl<R> AccountStore<R>
where
    R: VerificationRepository,
{
    pub fn new(
        repository: Arc<R>,
        clock: Arc<dyn Clock>,
        hasher: CredentialHasher,
        min_credential_length: usize,
    ) -> Result<Self, CredentialError> {
        let decoy = hasher.hash(DECOY_CREDENTIAL)?;
        Ok(Self {
            repository,
            clock,
            hasher,
            decoy,
            min_credential_length,
        })
    }

    /// Register an account in `registered` status.
    pub fn create(
        &self,
        email: &str,
        credential: &str,
        role: Role,
    ) -> Result<Account, VerificationError> {
        let parsed = Email::parse(email);

        let mut errors = ValidationErrors::new();
        if parsed.is_none() {
            errors.push("email", INVALID_EMAIL);
        }
        if credential.chars().count() < self.min_credential_length {
            errors.push(
                "credential",
                format!(
                    "must be at least {} characters",
                    self.min_credential_length
                ),
            );
        }
        errors.into_result()?;
        let Some(email) = parsed else {
            return Err(ValidationErrors::single("email", INVALID_EMAIL).into());
        };

        if self.repository.account_by_email(&email)?.is_some() {
            return Err(VerificationError::DuplicateEmail);
        }

        let now = self.clock.now();
        let account = Account {
            id: AccountId::generate(),
            email,
            credential: self.hasher.hash(credential)?,
            role,
            status: LifecycleStatus::Registered,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .repository
            .insert_account(account)
            .map_err(|err| match err {
                RepositoryError::Conflict => VerificationError::DuplicateEmail,
                other => VerificationError::Repository(other),
            })?;

        info!(account_id = %stored.id, role = %stored.role, "account registered");
        Ok(stored)
    }

    /// Lookup by case-insensitive e-mail. Malformed input simply finds nothing.
    pub fn find_by_email(&self, email: &str) -> Result<Option<Account>, VerificationError> {
        match Email::parse(email) {
            Some(email) => Ok(self.repository.account_by_email(&email)?),
            None => Ok(None),
        }
    }

    pub fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, VerificationError> {
        Ok(self.repository.account(id)?)
    }

    pub fn verify_credential(&self, account: &Account, candidate: &str) -> bool {
        account.credential.matches(candidate)
    }

    /// Look up by e-mail and check the credential. Unknown addresses are
    /// checked against a decoy hash made with the same cost, so every miss
    /// runs exactly one Argon2 verification.
    pub fn authenticate(
        &self,
        email: &str,
        candidate: &str,
    ) -> Result<Option<Account>, VerificationError> {
        match self.find_by_email(email)? {
            Some(account) if self.verify_credential(&account, candidate) => Ok(Some(account)),
            Some(_) => Ok(None),
            None => {
                self.decoy.matches(candidate);
                Ok(None)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn decoy_hash(&self) -> &CredentialHash {
        &self.decoy
    }

    /// Delete an account with everything it owns.
    pub fn remove(&self, id: &AccountId) -> Result<(), VerificationError> {
        self.repository.remove_account(id).map_err(|err| match err {
            RepositoryError::NotFound => VerificationError::NotFound("account"),
            other => VerificationError::Repository(other),
        })?;
        info!(account_id = %id, "account removed");
        Ok(())
    }
}

pub(crate) fn load_account<R>(repository: &R, id: &AccountId) -> Result<Account, VerificationError>
where
    R: VerificationRepository + ?Sized,
{
    repository
        .account(id)?
        .ok_or(VerificationError::NotFound("account"))
}
