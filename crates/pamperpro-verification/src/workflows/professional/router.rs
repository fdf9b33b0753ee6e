use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::domain::{AccountId, OnboardingFields, Role, SubmissionId};
use super::onboarding::OnboardingStep;
use super::repository::VerificationRepository;
use super::credentials::CredentialError;
use super::service::{
    CredentialCheck, DecisionRequest, KycRequest, Session, SignupRequest, VerificationError,
    VerificationService,
};
use super::validation::ValidationErrors;

pub const ACCOUNT_ID_HEADER: &str = "x-account-id";
pub const ACCOUNT_ROLE_HEADER: &str = "x-account-role";

/// Router builder exposing the verification pipeline over HTTP.
pub fn verification_router<R>(service: Arc<VerificationService<R>>) -> Router
where
    R: VerificationRepository + 'static,
{
    Router::new()
        .route("/api/v1/accounts", post(signup_handler::<R>))
        .route("/api/v1/accounts/:account_id", get(account_handler::<R>))
        .route("/api/v1/sessions", post(session_handler::<R>))
        .route("/api/v1/onboarding", post(onboarding_handler::<R>))
        .route("/api/v1/onboarding/steps/:step", post(step_handler))
        .route(
            "/api/v1/kyc-submissions",
            post(kyc_submit_handler::<R>).get(pending_handler::<R>),
        )
        .route("/api/v1/kyc-submissions/latest", get(latest_handler::<R>))
        .route(
            "/api/v1/kyc-submissions/:submission_id/decision",
            post(decision_handler::<R>),
        )
        .with_state(service)
}

impl IntoResponse for VerificationError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            VerificationError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            VerificationError::InvalidState { .. } => (StatusCode::CONFLICT, "invalid_state"),
            VerificationError::DuplicatePendingSubmission => {
                (StatusCode::CONFLICT, "duplicate_pending_submission")
            }
            VerificationError::DuplicateEmail => (StatusCode::CONFLICT, "duplicate_email"),
            VerificationError::AlreadyReviewed => (StatusCode::CONFLICT, "already_reviewed"),
            VerificationError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            VerificationError::RoleNotEligible { .. } => (StatusCode::FORBIDDEN, "role_not_eligible"),
            VerificationError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            VerificationError::InvalidCredentials | VerificationError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "unauthenticated")
            }
            VerificationError::Credential(_) | VerificationError::Repository(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "unavailable")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "verification request failed");
        }

        let mut payload = json!({
            "error": self.user_message(),
            "code": code,
        });
        if let VerificationError::Validation(errors) = &self {
            payload["fields"] = json!(errors.errors);
        }
        (status, Json(payload)).into_response()
    }
}

/// Identity forwarded by the session gateway.
pub(crate) fn session_from_headers(headers: &HeaderMap) -> Result<Session, VerificationError> {
    let account_id = headers
        .get(ACCOUNT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or(VerificationError::Unauthenticated)?;
    let role = headers
        .get(ACCOUNT_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| serde_json::from_value::<Role>(json!(value.trim())).ok())
        .ok_or(VerificationError::Unauthenticated)?;

    Ok(Session {
        account_id: AccountId(account_id),
        role,
    })
}

/// Body decode failures answer in the same shape as field validation.
fn rejection_response(rejection: JsonRejection) -> Response {
    match rejection {
        JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
            VerificationError::Validation(ValidationErrors::single("body", rejection.body_text()))
                .into_response()
        }
        other => other.into_response(),
    }
}

/// Runs Argon2 work on the blocking pool so async workers stay responsive.
async fn run_blocking<T, F>(work: F) -> Result<T, VerificationError>
where
    F: FnOnce() -> Result<T, VerificationError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| {
            VerificationError::Credential(CredentialError::Interrupted(err.to_string()))
        })?
}

pub(crate) async fn signup_handler<R>(
    State(service): State<Arc<VerificationService<R>>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Response
where
    R: VerificationRepository + 'static,
{
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match run_blocking(move || service.signup(request)).await {
        Ok(account) => (StatusCode::CREATED, Json(account.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn session_handler<R>(
    State(service): State<Arc<VerificationService<R>>>,
    payload: Result<Json<CredentialCheck>, JsonRejection>,
) -> Response
where
    R: VerificationRepository + 'static,
{
    let Json(check) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match run_blocking(move || service.authenticate(check)).await {
        Ok(account) => (StatusCode::OK, Json(account.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn account_handler<R>(
    State(service): State<Arc<VerificationService<R>>>,
    headers: HeaderMap,
    Path(account_id): Path<Uuid>,
) -> Response
where
    R: VerificationRepository + 'static,
{
    let result = session_from_headers(&headers)
        .and_then(|session| service.overview(&session, &AccountId(account_id)));
    match result {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn onboarding_handler<R>(
    State(service): State<Arc<VerificationService<R>>>,
    headers: HeaderMap,
    payload: Result<Json<OnboardingFields>, JsonRejection>,
) -> Response
where
    R: VerificationRepository + 'static,
{
    let Json(fields) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    let result = session_from_headers(&headers)
        .and_then(|session| service.submit_onboarding(&session, fields));
    match result {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn step_handler(
    Path(step): Path<OnboardingStep>,
    payload: Result<Json<OnboardingFields>, JsonRejection>,
) -> Response {
    let Json(fields) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    let errors = step.validate(&fields);
    if errors.is_empty() {
        (StatusCode::OK, Json(json!({ "step": step, "valid": true }))).into_response()
    } else {
        VerificationError::Validation(errors).into_response()
    }
}

pub(crate) async fn kyc_submit_handler<R>(
    State(service): State<Arc<VerificationService<R>>>,
    headers: HeaderMap,
    payload: Result<Json<KycRequest>, JsonRejection>,
) -> Response
where
    R: VerificationRepository + 'static,
{
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    let result =
        session_from_headers(&headers).and_then(|session| service.submit_kyc(&session, request));
    match result {
        Ok(submission) => (StatusCode::ACCEPTED, Json(submission)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LatestQuery {
    account_id: Uuid,
}

pub(crate) async fn latest_handler<R>(
    State(service): State<Arc<VerificationService<R>>>,
    headers: HeaderMap,
    Query(query): Query<LatestQuery>,
) -> Response
where
    R: VerificationRepository + 'static,
{
    let account_id = AccountId(query.account_id);
    let result = session_from_headers(&headers)
        .and_then(|session| service.latest_kyc(&session, &account_id));
    match result {
        Ok(Some(submission)) => (StatusCode::OK, Json(submission)).into_response(),
        Ok(None) => VerificationError::NotFound("kyc submission").into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PendingQuery {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

pub(crate) async fn pending_handler<R>(
    State(service): State<Arc<VerificationService<R>>>,
    headers: HeaderMap,
    Query(query): Query<PendingQuery>,
) -> Response
where
    R: VerificationRepository + 'static,
{
    let result = session_from_headers(&headers).and_then(|session| {
        if let Some(status) = query.status.as_deref() {
            if status != "pending" {
                return Err(ValidationErrors::single(
                    "status",
                    "only pending submissions can be listed",
                )
                .into());
            }
        }
        service.pending_queue(&session, query.cursor.as_deref(), query.limit)
    });
    match result {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn decision_handler<R>(
    State(service): State<Arc<VerificationService<R>>>,
    headers: HeaderMap,
    Path(submission_id): Path<Uuid>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Response
where
    R: VerificationRepository + 'static,
{
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    let submission_id = SubmissionId(submission_id);
    let result = session_from_headers(&headers)
        .and_then(|session| service.decide(&session, &submission_id, request));
    match result {
        Ok(submission) => (StatusCode::OK, Json(submission)).into_response(),
        Err(err) => err.into_response(),
    }
}
