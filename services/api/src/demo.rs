use chrono::NaiveDate;
use clap::Args;
use pamperpro_verification::error::AppError;
use pamperpro_verification::workflows::professional::{
    Account, AccountOverview, DecisionRequest, DocumentRef, IdDocumentKind, IdentityFields,
    InMemoryVerificationRepository, KycDocuments, KycRequest, OnboardingFields, PlanTag,
    ReviewVerdict, Role, Session, SignupRequest, VerificationPolicy, VerificationService,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::infra::MemoryVerificationService;

const DEMO_CREDENTIAL: &str = "demo-credential-123";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Approve the first submission instead of rejecting it and resubmitting.
    #[arg(long)]
    pub(crate) skip_rejection: bool,
    /// Print the final account overviews as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
struct DemoSummary {
    professional: AccountOverview,
    pending_after_review: usize,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let service: MemoryVerificationService = VerificationService::new(
        Arc::new(InMemoryVerificationRepository::new()),
        VerificationPolicy::default(),
    )?;

    println!("Professional verification demo");
    let reviewer = service
        .accounts()
        .create("reviewer@pamperpro.example", DEMO_CREDENTIAL, Role::Admin)?;
    let professional = service.signup(SignupRequest {
        email: "jordan@pamperpro.example".to_string(),
        credential: DEMO_CREDENTIAL.to_string(),
        role: Role::Professional,
    })?;
    let pro = session(&professional);
    let ops = session(&reviewer);
    print_status(&service, &professional, "signed up")?;

    match service.submit_kyc(&pro, demo_kyc()) {
        Ok(_) => println!("  unexpected: KYC accepted before onboarding"),
        Err(err) => println!("  KYC before onboarding refused: {}", err.user_message()),
    }

    service.submit_onboarding(&pro, demo_onboarding())?;
    print_status(&service, &professional, "submitted onboarding")?;

    let submission = service.submit_kyc(&pro, demo_kyc())?;
    println!(
        "  KYC submission {} queued at {}",
        submission.id,
        submission.submitted_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    print_status(&service, &professional, "submitted KYC")?;
    print_queue(&service, &ops)?;

    let approved_id = if args.skip_rejection {
        submission.id
    } else {
        let rejected = service.decide(
            &ops,
            &submission.id,
            DecisionRequest {
                decision: ReviewVerdict::Rejected,
                notes: Some("blurry ID".to_string()),
            },
        )?;
        println!(
            "  reviewer rejected {} ({})",
            rejected.id,
            rejected.review_notes.as_deref().unwrap_or("no notes")
        );
        print_status(&service, &professional, "was rejected")?;

        let resubmitted = service.submit_kyc(&pro, demo_kyc())?;
        println!("  KYC resubmitted as {}", resubmitted.id);
        resubmitted.id
    };

    let approved = service.decide(
        &ops,
        &approved_id,
        DecisionRequest {
            decision: ReviewVerdict::Approved,
            notes: None,
        },
    )?;
    println!("  reviewer approved {}", approved.id);
    print_status(&service, &professional, "was approved")?;

    match service.decide(
        &ops,
        &approved_id,
        DecisionRequest {
            decision: ReviewVerdict::Rejected,
            notes: Some("second look".to_string()),
        },
    ) {
        Ok(_) => println!("  unexpected: second decision recorded"),
        Err(err) => println!("  second decision refused: {}", err.user_message()),
    }
    print_queue(&service, &ops)?;

    if args.json {
        let summary = DemoSummary {
            professional: service.overview(&pro, &professional.id)?,
            pending_after_review: service.pending_queue(&ops, None, None)?.items.len(),
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("  summary unavailable: {err}"),
        }
    }

    Ok(())
}

fn session(account: &Account) -> Session {
    Session {
        account_id: account.id,
        role: account.role,
    }
}

fn print_status(
    service: &MemoryVerificationService,
    account: &Account,
    event: &str,
) -> Result<(), AppError> {
    let overview = service.overview(&session(account), &account.id)?;
    println!(
        "- {} {} -> status {} | dashboard {:?}",
        overview.account.email, event, overview.account.status, overview.dashboard
    );
    Ok(())
}

fn print_queue(service: &MemoryVerificationService, reviewer: &Session) -> Result<(), AppError> {
    let page = service.pending_queue(reviewer, None, None)?;
    if page.items.is_empty() {
        println!("  review queue: empty");
    } else {
        println!("  review queue:");
        for item in &page.items {
            println!("    {} (account {})", item.id, item.account_id);
        }
    }
    Ok(())
}

fn demo_onboarding() -> OnboardingFields {
    OnboardingFields {
        business_name: "Jordan Rivera Beauty".to_string(),
        address: "7 Canal Street, Manchester".to_string(),
        phone: "+44 161 496 0555".to_string(),
        years_experience: Some(8),
        services_offered: BTreeSet::from([
            "Bridal makeup".to_string(),
            "Brow shaping".to_string(),
        ]),
        description: "Freelance makeup artist for weddings and events.".to_string(),
        plan: PlanTag::Trial,
    }
}

fn demo_kyc() -> KycRequest {
    let document = |name: &str, byte: u8| DocumentRef {
        uri: format!("storage://demo/kyc/{name}"),
        content_hash: format!("{byte:02x}").repeat(32),
    };
    KycRequest {
        documents: KycDocuments {
            id_document: document("passport.jpg", 0x11),
            facial_photo: document("selfie.jpg", 0x22),
            business_proof: document("insurance.pdf", 0x33),
        },
        identity: IdentityFields {
            full_name: "Jordan Rivera".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1992, 3, 14),
            id_document_kind: Some(IdDocumentKind::Passport),
            id_document_number: "P9081726".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_fixtures_pass_validation() {
        assert!(
            pamperpro_verification::workflows::professional::validate_onboarding(
                &demo_onboarding()
            )
            .is_ok()
        );
        assert_eq!(demo_kyc().documents.id_document.content_hash.len(), 64);
    }

    #[test]
    fn demo_runs_end_to_end() {
        run_demo(DemoArgs {
            skip_rejection: false,
            json: true,
        })
        .expect("demo completes");
    }
}
