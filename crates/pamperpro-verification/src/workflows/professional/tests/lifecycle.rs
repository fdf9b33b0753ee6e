use super::common::*;
use crate::workflows::professional::credentials::CredentialHash;
use crate::workflows::professional::domain::{
    Account, AccountId, Email, KycDecision, LifecycleStatus, ReviewVerdict, Role,
};
use crate::workflows::professional::lifecycle::user_hint;
use crate::workflows::professional::{
    AccountLifecycleMachine, DashboardView, LifecycleEvent, TransitionError,
};

fn account(role: Role, status: LifecycleStatus) -> Account {
    Account {
        id: AccountId::generate(),
        email: Email::parse("someone@pamperpro.example").expect("valid email"),
        credential: CredentialHash::from_phc("$argon2id$placeholder"),
        role,
        status,
        created_at: start(),
        updated_at: start(),
    }
}

#[test]
fn next_status_follows_the_pipeline() {
    use LifecycleEvent as E;
    use LifecycleStatus as S;

    let legal = [
        (S::Registered, E::OnboardingSubmitted, S::OnboardingComplete),
        (S::OnboardingComplete, E::OnboardingSubmitted, S::OnboardingComplete),
        (S::OnboardingComplete, E::KycSubmitted, S::KycSubmitted),
        (S::KycSubmitted, E::KycApproved, S::Active),
        (S::KycSubmitted, E::KycRejected, S::OnboardingComplete),
        (S::Rejected, E::OnboardingSubmitted, S::OnboardingComplete),
    ];
    for (from, event, to) in legal {
        assert_eq!(
            AccountLifecycleMachine::next_status(from, event),
            Ok(to),
            "{from} --{event}-->"
        );
    }

    let illegal = [
        (S::Registered, E::KycSubmitted),
        (S::Registered, E::KycApproved),
        (S::KycSubmitted, E::OnboardingSubmitted),
        (S::KycSubmitted, E::KycSubmitted),
        (S::Active, E::OnboardingSubmitted),
        (S::Active, E::KycSubmitted),
        (S::OnboardingComplete, E::KycRejected),
        (S::Rejected, E::KycSubmitted),
    ];
    for (status, event) in illegal {
        assert_eq!(
            AccountLifecycleMachine::next_status(status, event),
            Err(TransitionError::InvalidState { status, event })
        );
    }
}

#[test]
fn plan_refuses_roles_outside_verification() {
    for role in [Role::Client, Role::Admin] {
        let account = account(role, LifecycleStatus::Registered);
        assert_eq!(
            AccountLifecycleMachine::plan(&account, LifecycleEvent::OnboardingSubmitted, start()),
            Err(TransitionError::RoleNotEligible { role })
        );
        assert!(!AccountLifecycleMachine::permits(
            &account,
            LifecycleEvent::OnboardingSubmitted
        ));
    }

    let vendor = account(Role::Vendor, LifecycleStatus::Registered);
    let transition =
        AccountLifecycleMachine::plan(&vendor, LifecycleEvent::OnboardingSubmitted, start())
            .expect("vendor may onboard");
    assert_eq!(transition.from, LifecycleStatus::Registered);
    assert_eq!(transition.to, LifecycleStatus::OnboardingComplete);
    assert!(transition.changes_status());
}

#[test]
fn review_transition_always_starts_from_kyc_submitted() {
    let id = AccountId::generate();
    let approved = AccountLifecycleMachine::review_transition(id, ReviewVerdict::Approved, start());
    assert_eq!(approved.from, LifecycleStatus::KycSubmitted);
    assert_eq!(approved.to, LifecycleStatus::Active);
    assert_eq!(approved.event, LifecycleEvent::KycApproved);

    let rejected = AccountLifecycleMachine::review_transition(id, ReviewVerdict::Rejected, start());
    assert_eq!(rejected.to, LifecycleStatus::OnboardingComplete);
    assert_eq!(rejected.event, LifecycleEvent::KycRejected);
}

#[test]
fn dashboard_view_tracks_role_and_status() {
    assert_eq!(
        AccountLifecycleMachine::dashboard_view(
            &account(Role::Admin, LifecycleStatus::Registered),
            None
        ),
        DashboardView::AdminQueue
    );
    assert_eq!(
        AccountLifecycleMachine::dashboard_view(
            &account(Role::Client, LifecycleStatus::Registered),
            None
        ),
        DashboardView::ClientHome
    );
    assert_eq!(
        AccountLifecycleMachine::dashboard_view(
            &account(Role::Professional, LifecycleStatus::Registered),
            None
        ),
        DashboardView::LimitedOnboarding
    );
    assert_eq!(
        AccountLifecycleMachine::dashboard_view(
            &account(Role::Professional, LifecycleStatus::KycSubmitted),
            None
        ),
        DashboardView::LimitedAwaitingReview
    );
    assert_eq!(
        AccountLifecycleMachine::dashboard_view(
            &account(Role::Vendor, LifecycleStatus::Active),
            None
        ),
        DashboardView::Full
    );
}

#[test]
fn legacy_rejected_accounts_return_to_onboarding() {
    let legacy = account(Role::Professional, LifecycleStatus::Rejected);

    assert!(!AccountLifecycleMachine::permits(
        &legacy,
        LifecycleEvent::KycSubmitted
    ));
    assert_eq!(
        AccountLifecycleMachine::dashboard_view(&legacy, None),
        DashboardView::LimitedOnboarding
    );
    let transition =
        AccountLifecycleMachine::plan(&legacy, LifecycleEvent::OnboardingSubmitted, start())
            .expect("legacy account may re-onboard");
    assert_eq!(transition.to, LifecycleStatus::OnboardingComplete);
}

#[test]
fn dashboard_surfaces_last_rejection_notes() {
    let (service, _, _) = build_service();
    let (owner, mut submission) = awaiting_review(&service, "pro@pamperpro.example");
    submission.decision = KycDecision::Rejected;
    submission.review_notes = Some("blurry ID".to_string());

    let owner = Account {
        status: LifecycleStatus::OnboardingComplete,
        ..owner
    };
    assert_eq!(
        AccountLifecycleMachine::dashboard_view(&owner, Some(&submission)),
        DashboardView::LimitedKycRequired {
            last_rejection: Some("blurry ID".to_string())
        }
    );
}

#[test]
fn hints_explain_refused_events() {
    assert_eq!(
        user_hint(LifecycleStatus::Registered, LifecycleEvent::KycSubmitted),
        "complete onboarding first"
    );
    assert_eq!(
        user_hint(LifecycleStatus::Active, LifecycleEvent::KycSubmitted),
        "account is already verified"
    );
}
