use serde::{Deserialize, Serialize};

use super::credentials::KdfParams;

pub const DEFAULT_REVIEW_PAGE_SIZE: usize = 25;
pub const MAX_REVIEW_PAGE_SIZE: usize = 100;
pub const DEFAULT_MIN_CREDENTIAL_LENGTH: usize = 8;
pub const DEFAULT_MINIMUM_APPLICANT_AGE: u32 = 18;

/// Tunables for the verification pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPolicy {
    pub review_page_size: usize,
    pub min_credential_length: usize,
    pub minimum_applicant_age: u32,
    pub kdf: KdfParams,
}

impl VerificationPolicy {
    /// Page size for a request, falling back to the default and capped at
    /// [`MAX_REVIEW_PAGE_SIZE`].
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.review_page_size)
            .clamp(1, MAX_REVIEW_PAGE_SIZE)
    }
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            review_page_size: DEFAULT_REVIEW_PAGE_SIZE,
            min_credential_length: DEFAULT_MIN_CREDENTIAL_LENGTH,
            minimum_applicant_age: DEFAULT_MINIMUM_APPLICANT_AGE,
            kdf: KdfParams::default(),
        }
    }
}
