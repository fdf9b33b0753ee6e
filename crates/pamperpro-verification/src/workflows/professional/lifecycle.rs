//! Account lifecycle state machine.
//!
//! Every component asks this module whether an account may move, and hands the
//! resulting [`Transition`] to the repository, which applies it with a
//! compare-and-set on the prior status in the same write as the triggering
//! record.
//!
//! ```text
//! registered          --onboarding_submitted--> onboarding_complete
//! onboarding_complete --onboarding_submitted--> onboarding_complete
//! onboarding_complete --kyc_submitted---------> kyc_submitted
//! kyc_submitted       --kyc_approved----------> active
//! kyc_submitted       --kyc_rejected----------> onboarding_complete
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Account, AccountId, KycDecision, KycSubmission, LifecycleStatus, ReviewVerdict, Role,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    OnboardingSubmitted,
    KycSubmitted,
    KycApproved,
    KycRejected,
}

impl LifecycleEvent {
    pub const fn label(self) -> &'static str {
        match self {
            LifecycleEvent::OnboardingSubmitted => "onboarding_submitted",
            LifecycleEvent::KycSubmitted => "kyc_submitted",
            LifecycleEvent::KycApproved => "kyc_approved",
            LifecycleEvent::KycRejected => "kyc_rejected",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("{role} accounts are not part of professional verification")]
    RoleNotEligible { role: Role },
    #[error("cannot apply {event} while account is {status}")]
    InvalidState {
        status: LifecycleStatus,
        event: LifecycleEvent,
    },
}

/// Message shown to the account holder when `event` is refused in `status`.
pub(crate) fn user_hint(status: LifecycleStatus, event: LifecycleEvent) -> &'static str {
    match (status, event) {
        (LifecycleStatus::Registered, LifecycleEvent::KycSubmitted) => {
            "complete onboarding first"
        }
        (LifecycleStatus::KycSubmitted, LifecycleEvent::OnboardingSubmitted) => {
            "onboarding is locked while identity verification is under review"
        }
        (LifecycleStatus::Active, _) => "account is already verified",
        (_, LifecycleEvent::KycApproved | LifecycleEvent::KycRejected) => {
            "account is not awaiting identity review"
        }
        _ => "action is not available at this stage",
    }
}

/// Status change to apply atomically with a repository write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub account_id: AccountId,
    pub event: LifecycleEvent,
    pub from: LifecycleStatus,
    pub to: LifecycleStatus,
    pub at: DateTime<Utc>,
}

impl Transition {
    pub fn changes_status(&self) -> bool {
        self.from != self.to
    }
}

/// What the account holder's dashboard should render right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardView {
    AdminQueue,
    ClientHome,
    LimitedOnboarding,
    LimitedKycRequired { last_rejection: Option<String> },
    LimitedAwaitingReview,
    Full,
}

/// Stateless evaluator of transition legality.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountLifecycleMachine;

impl AccountLifecycleMachine {
    /// Target status for `event`, or `InvalidState` when the event does not
    /// apply to `status`.
    pub fn next_status(
        status: LifecycleStatus,
        event: LifecycleEvent,
    ) -> Result<LifecycleStatus, TransitionError> {
        use LifecycleEvent as E;
        use LifecycleStatus as S;

        match (status, event) {
            (S::Registered | S::OnboardingComplete | S::Rejected, E::OnboardingSubmitted) => {
                Ok(S::OnboardingComplete)
            }
            (S::OnboardingComplete, E::KycSubmitted) => Ok(S::KycSubmitted),
            (S::KycSubmitted, E::KycApproved) => Ok(S::Active),
            (S::KycSubmitted, E::KycRejected) => Ok(S::OnboardingComplete),
            _ => Err(TransitionError::InvalidState { status, event }),
        }
    }

    pub fn plan(
        account: &Account,
        event: LifecycleEvent,
        at: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        if !account.role.requires_verification() {
            return Err(TransitionError::RoleNotEligible { role: account.role });
        }

        let to = Self::next_status(account.status, event)?;
        Ok(Transition {
            account_id: account.id,
            event,
            from: account.status,
            to,
            at,
        })
    }

    /// Reaction to a review decision. A pending submission implies the account
    /// sits in `kyc_submitted`; the repository re-checks that when it writes
    /// the decision, so no prior read of the account is needed.
    pub fn review_transition(
        account_id: AccountId,
        verdict: ReviewVerdict,
        at: DateTime<Utc>,
    ) -> Transition {
        let (event, to) = match verdict {
            ReviewVerdict::Approved => (LifecycleEvent::KycApproved, LifecycleStatus::Active),
            ReviewVerdict::Rejected => (
                LifecycleEvent::KycRejected,
                LifecycleStatus::OnboardingComplete,
            ),
        };
        Transition {
            account_id,
            event,
            from: LifecycleStatus::KycSubmitted,
            to,
            at,
        }
    }

    pub fn permits(account: &Account, event: LifecycleEvent) -> bool {
        account.role.requires_verification() && Self::next_status(account.status, event).is_ok()
    }

    pub fn dashboard_view(account: &Account, latest: Option<&KycSubmission>) -> DashboardView {
        match account.role {
            Role::Admin => return DashboardView::AdminQueue,
            Role::Client => return DashboardView::ClientHome,
            Role::Professional | Role::Vendor => {}
        }

        match account.status {
            LifecycleStatus::Registered | LifecycleStatus::Rejected => {
                DashboardView::LimitedOnboarding
            }
            LifecycleStatus::OnboardingComplete => {
                let last_rejection = latest
                    .filter(|submission| submission.decision == KycDecision::Rejected)
                    .and_then(|submission| submission.review_notes.clone());
                DashboardView::LimitedKycRequired { last_rejection }
            }
            LifecycleStatus::KycSubmitted => DashboardView::LimitedAwaitingReview,
            LifecycleStatus::Active => DashboardView::Full,
        }
    }
}
