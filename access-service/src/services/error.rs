use service_core::error::AppError;
use thiserror::Error;

use crate::models::AccountStatus;

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Registration already pending approval")]
    AlreadyPending,

    /// Unknown email, wrong password and unapproved account all look the same.
    #[error("Invalid email or password")]
    AuthenticationFailed,

    #[error("Missing, invalid or expired access grant")]
    Unauthorized,

    #[error("Grant is not authorized for this identity")]
    PermissionDenied,

    #[error("Identity not found")]
    NotFound,

    #[error("Cannot {action} an identity that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: AccountStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(anyhow::Error),

    #[error("Grant delivery failed: {0}")]
    Delivery(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AccessError {
    /// Wrap a persistence failure.
    pub fn store(err: anyhow::Error) -> Self {
        AccessError::StoreUnavailable(err)
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::DuplicateEmail => {
                AppError::Conflict(anyhow::anyhow!("Email already registered"))
            }
            AccessError::AlreadyPending => {
                AppError::Conflict(anyhow::anyhow!("Registration already pending approval"))
            }
            AccessError::AuthenticationFailed => {
                AppError::AuthError(anyhow::anyhow!("Invalid email or password"))
            }
            AccessError::Unauthorized => AppError::Unauthorized(anyhow::anyhow!(
                "Missing, invalid or expired access grant"
            )),
            AccessError::PermissionDenied => {
                AppError::Forbidden(anyhow::anyhow!("Permission denied"))
            }
            AccessError::NotFound => AppError::NotFound(anyhow::anyhow!("Identity not found")),
            e @ AccessError::InvalidTransition { .. } => {
                AppError::Conflict(anyhow::anyhow!(e.to_string()))
            }
            AccessError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            AccessError::StoreUnavailable(e) => AppError::ServiceUnavailable(e),
            AccessError::Delivery(msg) => AppError::EmailError(msg),
            AccessError::Internal(e) => AppError::InternalError(e),
        }
    }
}
