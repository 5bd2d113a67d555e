use pantry_types::models::DonationStatus;
use thiserror::Error;

/// Why a donation cannot take the requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unavailable {
    #[error("someone else has already claimed this donation")]
    ClaimedByOther,
    #[error("you already hold this donation")]
    AlreadyHeld,
    #[error("this donation has expired and is no longer available")]
    Expired,
    #[error("this donation has been deleted and is no longer available")]
    Deleted,
    #[error("this donation is {actual}, expected {expected}")]
    Status {
        expected: DonationStatus,
        actual: DonationStatus,
    },
}

/// Outcome kinds for every core operation. Losing a claim race is one of
/// these, not a panic or a transport error.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("donation {0} not found")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    #[error("invalid donation: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    InvalidStateTransition(Unavailable),

    /// Another intent for the same donation was queued when this round
    /// resolved, or this round's own intent had already been withdrawn.
    /// The caller may start a fresh round.
    #[error("your claim overlapped with another attempt, please try again")]
    ConcurrentClaimDetected { competing: usize },

    #[error("storage failure: {0}")]
    StorageFailure(#[from] anyhow::Error),
}

impl ClaimError {
    /// Stable code for API bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidStateTransition(_) => "invalid_state_transition",
            Self::ConcurrentClaimDetected { .. } => "concurrent_claim_detected",
            Self::StorageFailure(_) => "storage_failure",
        }
    }

    /// Whether running the whole protocol again (with a fresh intent) can
    /// change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageFailure(_) | Self::ConcurrentClaimDetected { .. }
        )
    }
}
