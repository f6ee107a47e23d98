//! crates/study_core/src/error.rs
//!
//! Outcomes the core services report to their callers. Verification failures are
//! kept distinct so a caller can choose between offering "resend" and "retype".

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Verification session expired. Please sign up again.")]
    SessionExpired,
    #[error("Verification code expired. Please request a new one.")]
    CodeExpired,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("Invalid or expired reset token")]
    InvalidResetToken,
    #[error("{0} is already registered")]
    AlreadyRegistered(String),
    #[error("Failed to deliver verification code: {0}")]
    DispatchFailed(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl CoreError {
    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::InvalidInput(_) => "InvalidInput",
            Self::SessionExpired => "SessionExpired",
            Self::CodeExpired => "CodeExpired",
            Self::InvalidCode => "InvalidCode",
            Self::InvalidResetToken => "InvalidResetToken",
            Self::AlreadyRegistered(_) => "AlreadyRegistered",
            Self::DispatchFailed(_) => "DispatchFailed",
            Self::Unauthorized => "Unauthorized",
            Self::PersistenceFailure(_) => "PersistenceFailure",
        }
    }
}

impl From<PortError> for CoreError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => Self::NotFound(what),
            PortError::Unauthorized => Self::Unauthorized,
            PortError::Unexpected(msg) => Self::PersistenceFailure(msg),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
