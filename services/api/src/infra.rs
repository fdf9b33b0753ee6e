use metrics_exporter_prometheus::PrometheusHandle;
use pamperpro_verification::config::{AdminBootstrap, AppConfig};
use pamperpro_verification::error::AppError;
use pamperpro_verification::workflows::professional::{
    InMemoryVerificationRepository, Role, VerificationError, VerificationService,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) type MemoryVerificationService = VerificationService<InMemoryVerificationRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wire the verification service over the in-memory repository and create
/// the configured administrator, if any.
pub(crate) fn build_verification_service(
    config: &AppConfig,
) -> Result<Arc<MemoryVerificationService>, AppError> {
    let repository = Arc::new(InMemoryVerificationRepository::new());
    let service = VerificationService::new(repository, config.verification.clone())?;

    if let Some(admin) = &config.bootstrap_admin {
        bootstrap_admin(&service, admin)?;
    }

    Ok(Arc::new(service))
}

pub(crate) fn bootstrap_admin(
    service: &MemoryVerificationService,
    admin: &AdminBootstrap,
) -> Result<(), AppError> {
    if let Some(existing) = service.accounts().find_by_email(&admin.email)? {
        if existing.role != Role::Admin {
            warn!(account_id = %existing.id, "bootstrap e-mail belongs to a non-admin account");
            return Err(VerificationError::DuplicateEmail.into());
        }
        return Ok(());
    }

    let account = service
        .accounts()
        .create(&admin.email, &admin.credential, Role::Admin)?;
    info!(account_id = %account.id, "bootstrap administrator created");
    Ok(())
}
