//! HTTP handlers for access-service.
//!
//! Each handler builds a hook context, dispatches to the content type's
//! lifecycle hook and renders what the hook produced.

pub mod admin;
pub mod tokens;
pub mod users;

pub use admin::*;
pub use tokens::*;
pub use users::*;

use service_core::error::AppError;

use crate::{
    hooks::HookOutcome,
    models::{Grant, Identity},
};

pub(crate) fn identity_outcome(outcome: Option<HookOutcome>) -> Result<Identity, AppError> {
    match outcome {
        Some(HookOutcome::Identity(identity)) => Ok(identity),
        _ => Err(AppError::InternalError(anyhow::anyhow!(
            "Lifecycle hook produced no identity"
        ))),
    }
}

pub(crate) fn grant_outcome(outcome: Option<HookOutcome>) -> Result<Grant, AppError> {
    match outcome {
        Some(HookOutcome::Grant(grant)) => Ok(grant),
        _ => Err(AppError::InternalError(anyhow::anyhow!(
            "Lifecycle hook produced no grant"
        ))),
    }
}
