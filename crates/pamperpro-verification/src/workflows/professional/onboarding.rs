use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::accounts::load_account;
use super::clock::Clock;
use super::domain::{AccountId, OnboardingFields, OnboardingRecord};
use super::lifecycle::{AccountLifecycleMachine, LifecycleEvent};
use super::repository::VerificationRepository;
use super::service::VerificationError;
use super::validation::{require_text, ValidationErrors};

const MAX_BUSINESS_NAME: usize = 120;
const MAX_ADDRESS: usize = 300;
const MAX_SERVICE_NAME: usize = 80;
const MAX_DESCRIPTION: usize = 2000;
const MAX_YEARS_EXPERIENCE: i64 = 70;
const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// Questionnaire pages as presented by the onboarding wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    Business,
    Contact,
    Experience,
    Services,
    Profile,
}

impl OnboardingStep {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Business,
            Self::Contact,
            Self::Experience,
            Self::Services,
            Self::Profile,
        ]
    }

    /// Validate only the fields owned by this step.
    pub fn validate(self, fields: &OnboardingFields) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        match self {
            Self::Business => {
                require_text(
                    &mut errors,
                    "business_name",
                    &fields.business_name,
                    MAX_BUSINESS_NAME,
                );
                require_text(&mut errors, "address", &fields.address, MAX_ADDRESS);
            }
            Self::Contact => validate_phone(&mut errors, &fields.phone),
            Self::Experience => match fields.years_experience {
                None => errors.push("years_experience", "is required"),
                Some(years) if !(0..=MAX_YEARS_EXPERIENCE).contains(&years) => errors.push(
                    "years_experience",
                    format!("must be between 0 and {MAX_YEARS_EXPERIENCE}"),
                ),
                Some(_) => {}
            },
            Self::Services => {
                if fields.services_offered.is_empty() {
                    errors.push("services_offered", "must list at least one service");
                } else if fields
                    .services_offered
                    .iter()
                    .any(|service| service.trim().is_empty())
                {
                    errors.push("services_offered", "service names must not be blank");
                } else if fields
                    .services_offered
                    .iter()
                    .any(|service| service.trim().chars().count() > MAX_SERVICE_NAME)
                {
                    errors.push(
                        "services_offered",
                        format!("service names must be at most {MAX_SERVICE_NAME} characters"),
                    );
                } else if distinct_services(&fields.services_offered)
                    != fields.services_offered.len()
                {
                    errors.push(
                        "services_offered",
                        "service names must be distinct once surrounding spaces are removed",
                    );
                }
            }
            Self::Profile => {
                require_text(&mut errors, "description", &fields.description, MAX_DESCRIPTION)
            }
        }
        errors
    }
}

fn distinct_services(services: &BTreeSet<String>) -> usize {
    services
        .iter()
        .map(|service| service.trim())
        .collect::<BTreeSet<_>>()
        .len()
}

fn validate_phone(errors: &mut ValidationErrors, phone: &str) {
    let phone = phone.trim();
    if phone.is_empty() {
        errors.push("phone", "is required");
        return;
    }

    let allowed = phone.char_indices().all(|(index, ch)| {
        ch.is_ascii_digit() || matches!(ch, ' ' | '-' | '(' | ')' | '.') || (ch == '+' && index == 0)
    });
    let digits = phone.chars().filter(char::is_ascii_digit).count();

    if !allowed {
        errors.push("phone", "may only contain digits, spaces, dashes, dots, parentheses and a leading +");
    } else if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        errors.push(
            "phone",
            format!("must contain {MIN_PHONE_DIGITS} to {MAX_PHONE_DIGITS} digits"),
        );
    }
}

/// Validate every step, collecting all failures.
pub fn validate_onboarding(fields: &OnboardingFields) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for step in OnboardingStep::ordered() {
        errors.errors.extend(step.validate(fields).errors);
    }
    errors.into_result()
}

/// Stores the business questionnaire and moves accounts out of `registered`.
pub struct OnboardingService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R> OnboardingService<R>
where
    R: VerificationRepository,
{
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Validate and upsert the onboarding record. Allowed while the account is
    /// `registered` or `onboarding_complete`.
    pub fn submit(
        &self,
        account_id: &AccountId,
        fields: OnboardingFields,
    ) -> Result<OnboardingRecord, VerificationError> {
        let account = load_account(self.repository.as_ref(), account_id)?;
        let now = self.clock.now();
        let transition =
            AccountLifecycleMachine::plan(&account, LifecycleEvent::OnboardingSubmitted, now)?;

        validate_onboarding(&fields)?;

        let record = OnboardingRecord {
            account_id: account.id,
            fields: fields.normalized(),
            submitted_at: now,
            updated_at: now,
        };
        let stored = self
            .repository
            .upsert_onboarding(record, &transition)
            .map_err(|err| {
                VerificationError::from_repository(err, LifecycleEvent::OnboardingSubmitted)
            })?;

        if transition.changes_status() {
            info!(
                account_id = %account.id,
                from = %transition.from,
                to = %transition.to,
                "onboarding completed"
            );
        } else {
            debug!(account_id = %account.id, "onboarding record updated");
        }
        Ok(stored)
    }

    /// Check a single wizard page without storing anything.
    pub fn validate_step(
        &self,
        step: OnboardingStep,
        fields: &OnboardingFields,
    ) -> Result<(), ValidationErrors> {
        step.validate(fields).into_result()
    }

    pub fn get(&self, account_id: &AccountId) -> Result<OnboardingRecord, VerificationError> {
        self.repository
            .onboarding(account_id)?
            .ok_or(VerificationError::NotFound("onboarding record"))
    }
}
