use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Duration;

use super::common::*;
use crate::workflows::professional::domain::{KycDecision, LifecycleStatus};
use crate::workflows::professional::{
    DashboardView, DecisionRequest, ReviewCursor, ReviewVerdict, SubmissionId,
    VerificationError,
};

fn approve() -> DecisionRequest {
    DecisionRequest {
        decision: ReviewVerdict::Approved,
        notes: None,
    }
}

#[test]
fn approval_activates_account_and_cannot_repeat() {
    let (service, _, _) = build_service();
    let reviewer = admin(&service, "ops@pamperpro.example");
    let (account, submission) = awaiting_review(&service, "pro@pamperpro.example");

    let decided = service
        .decide(&session(&reviewer), &submission.id, approve())
        .expect("approval recorded");
    assert_eq!(decided.decision, KycDecision::Approved);
    assert_eq!(decided.reviewer_id, Some(reviewer.id));
    assert_eq!(decided.reviewed_at, Some(start()));
    assert_eq!(status_of(&service, &account.id), LifecycleStatus::Active);

    let again = service
        .decide(&session(&reviewer), &submission.id, approve())
        .expect_err("second decision refused");
    assert!(matches!(again, VerificationError::AlreadyReviewed));
    assert_eq!(
        again.user_message(),
        "this submission was already reviewed by someone else"
    );
}

#[test]
fn rejection_returns_account_to_onboarding_complete() {
    let (service, _, _) = build_service();
    let reviewer = admin(&service, "ops@pamperpro.example");
    let (account, submission) = awaiting_review(&service, "pro@pamperpro.example");

    let decided = service
        .decide(
            &session(&reviewer),
            &submission.id,
            DecisionRequest {
                decision: ReviewVerdict::Rejected,
                notes: Some("  blurry ID ".to_string()),
            },
        )
        .expect("rejection recorded");
    assert_eq!(decided.review_notes.as_deref(), Some("blurry ID"));
    assert_eq!(
        status_of(&service, &account.id),
        LifecycleStatus::OnboardingComplete
    );

    let overview = service
        .overview(&session(&account), &account.id)
        .expect("overview");
    assert_eq!(
        overview.dashboard,
        DashboardView::LimitedKycRequired {
            last_rejection: Some("blurry ID".to_string())
        }
    );
}

#[test]
fn rejection_requires_notes() {
    let (service, _, _) = build_service();
    let reviewer = admin(&service, "ops@pamperpro.example");
    let (account, submission) = awaiting_review(&service, "pro@pamperpro.example");

    let err = service
        .decide(
            &session(&reviewer),
            &submission.id,
            DecisionRequest {
                decision: ReviewVerdict::Rejected,
                notes: Some("   ".to_string()),
            },
        )
        .expect_err("notes required");
    match err {
        VerificationError::Validation(errors) => assert_eq!(errors.fields(), vec!["notes"]),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(
        status_of(&service, &account.id),
        LifecycleStatus::KycSubmitted
    );
}

#[test]
fn only_admins_decide() {
    let (service, _, _) = build_service();
    let (account, submission) = awaiting_review(&service, "pro@pamperpro.example");

    assert!(matches!(
        service.decide(&session(&account), &submission.id, approve()),
        Err(VerificationError::Forbidden)
    ));
    assert!(matches!(
        service.pending_queue(&session(&account), None, None),
        Err(VerificationError::Forbidden)
    ));
}

#[test]
fn unknown_submission_is_not_found() {
    let (service, _, _) = build_service();
    let reviewer = admin(&service, "ops@pamperpro.example");
    assert!(matches!(
        service.decide(&session(&reviewer), &SubmissionId::generate(), approve()),
        Err(VerificationError::NotFound("submission"))
    ));
}

#[test]
fn concurrent_reviewers_record_exactly_one_decision() {
    let (service, _, _) = build_service();
    let first = admin(&service, "ops-1@pamperpro.example");
    let second = admin(&service, "ops-2@pamperpro.example");
    let (account, submission) = awaiting_review(&service, "pro@pamperpro.example");

    let service = Arc::new(service);
    let barrier = Barrier::new(2);
    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = [
            (session(&first), ReviewVerdict::Approved),
            (session(&second), ReviewVerdict::Rejected),
        ]
        .into_iter()
        .map(|(reviewer, verdict)| {
            let service = service.clone();
            let barrier = &barrier;
            let submission_id = submission.id;
            scope.spawn(move || {
                barrier.wait();
                service.decide(
                    &reviewer,
                    &submission_id,
                    DecisionRequest {
                        decision: verdict,
                        notes: Some("checked".to_string()),
                    },
                )
            })
        })
        .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("reviewer thread"))
            .collect()
    });

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|err| matches!(err, VerificationError::AlreadyReviewed)));

    let expected = match winners[0].decision {
        KycDecision::Approved => LifecycleStatus::Active,
        KycDecision::Rejected => LifecycleStatus::OnboardingComplete,
        KycDecision::Pending => panic!("winner left submission pending"),
    };
    assert_eq!(status_of(&service, &account.id), expected);
}

#[test]
fn pending_queue_pages_oldest_first_and_resumes() {
    let (service, _, clock) = build_service();
    let reviewer = admin(&service, "ops@pamperpro.example");

    let mut submitted = Vec::new();
    for index in 0..5 {
        let (_, submission) = awaiting_review(&service, &format!("pro-{index}@pamperpro.example"));
        submitted.push(submission.id);
        clock.advance(Duration::minutes(1));
    }

    let first = service
        .pending_queue(&session(&reviewer), None, Some(2))
        .expect("first page");
    assert_eq!(
        first.items.iter().map(|s| s.id).collect::<Vec<_>>(),
        submitted[..2].to_vec()
    );
    let cursor = first.next_cursor.expect("more pages");

    let second = service
        .pending_queue(&session(&reviewer), Some(cursor.as_str()), Some(2))
        .expect("second page");
    assert_eq!(
        second.items.iter().map(|s| s.id).collect::<Vec<_>>(),
        submitted[2..4].to_vec()
    );

    // Listing is read-only: the same cursor yields the same page.
    let replay = service
        .pending_queue(&session(&reviewer), Some(cursor.as_str()), Some(2))
        .expect("replayed page");
    assert_eq!(replay, second);

    let last = service
        .pending_queue(
            &session(&reviewer),
            second.next_cursor.as_ref().map(ReviewCursor::as_str),
            Some(2),
        )
        .expect("last page");
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].id, submitted[4]);
    assert!(last.next_cursor.is_none());
}

#[test]
fn equal_timestamps_are_ordered_by_id() {
    let (service, _, _) = build_service();
    let reviewer = admin(&service, "ops@pamperpro.example");

    let mut ids: Vec<_> = (0..4)
        .map(|index| awaiting_review(&service, &format!("pro-{index}@pamperpro.example")).1.id)
        .collect();
    ids.sort();

    let page = service
        .pending_queue(&session(&reviewer), None, None)
        .expect("page");
    assert_eq!(page.items.iter().map(|s| s.id).collect::<Vec<_>>(), ids);
    assert!(page.next_cursor.is_none());
}

#[test]
fn decided_submissions_leave_the_queue() {
    let (service, _, clock) = build_service();
    let reviewer = admin(&service, "ops@pamperpro.example");
    let (_, oldest) = awaiting_review(&service, "pro-a@pamperpro.example");
    clock.advance(Duration::minutes(1));
    let (_, newest) = awaiting_review(&service, "pro-b@pamperpro.example");

    service
        .decide(&session(&reviewer), &oldest.id, approve())
        .expect("approval recorded");

    let page = service
        .pending_queue(&session(&reviewer), None, None)
        .expect("page");
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, newest.id);
}

#[test]
fn malformed_cursor_is_a_validation_error() {
    let (service, _, _) = build_service();
    let reviewer = admin(&service, "ops@pamperpro.example");

    for token in ["zz", "6869", ""] {
        match service.pending_queue(&session(&reviewer), Some(token), None) {
            Err(VerificationError::Validation(errors)) => {
                assert_eq!(errors.fields(), vec!["cursor"])
            }
            other => panic!("expected cursor error for {token:?}, got {other:?}"),
        }
    }
}

#[test]
fn cursor_round_trips_queue_position() {
    let (service, _, _) = build_service();
    let (_, submission) = awaiting_review(&service, "pro@pamperpro.example");
    let position = submission.queue_position();

    let cursor = ReviewCursor::after(&position);
    assert_eq!(ReviewCursor::parse(cursor.as_str()), Some(position));
}
