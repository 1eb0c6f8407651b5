use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{AccountStatus, IdentityResponse, PendingRegistration};

#[derive(Clone, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "password123", min_length = 8)]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    #[schema(example = "Ada")]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    #[schema(example = "Lovelace")]
    pub last_name: String,

    #[validate(length(max = 200))]
    #[schema(example = "Analyst")]
    pub position_title: Option<String>,

    #[serde(default)]
    pub purchased_products: Vec<String>,
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SignupResponse {
    #[schema(example = "user@example.com")]
    pub email: String,
    pub account_status: AccountStatus,
    #[schema(example = "Registration received. An administrator will review it shortly.")]
    pub message: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Issued grant metadata. The token itself travels in the configured
/// transport, never in the body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GrantResponse {
    #[schema(example = "user@example.com")]
    pub email: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[schema(example = 604800)]
    pub expires_in: i64,
}

/// Owner-initiated profile change. Absent fields are left untouched.
#[derive(Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,

    #[validate(length(max = 200))]
    pub position_title: Option<String>,

    pub purchased_products: Option<Vec<String>>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub password: Option<String>,
}

impl fmt::Debug for UpdateUserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateUserRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("position_title", &self.position_title)
            .field("purchased_products", &self.purchased_products)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PendingResponse {
    pub pending: Vec<PendingRegistration>,
    #[schema(example = 1)]
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DecisionResponse {
    pub user: IdentityResponse,
    #[schema(example = "Identity approved")]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    #[schema(example = "Identity deleted")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            position_title: None,
            purchased_products: vec![],
        }
    }

    #[test]
    fn signup_validation() {
        assert!(signup("ada@example.com", "password123").validate().is_ok());
        assert!(signup("not-an-email", "password123").validate().is_err());
        assert!(signup("ada@example.com", "short").validate().is_err());
    }

    #[test]
    fn debug_never_shows_passwords() {
        let rendered = format!("{:?}", signup("ada@example.com", "hunter2hunter2"));
        assert!(!rendered.contains("hunter2"));

        let update = UpdateUserRequest {
            password: Some("hunter2hunter2".into()),
            ..Default::default()
        };
        assert!(!format!("{:?}", update).contains("hunter2"));
    }

    #[test]
    fn signup_products_default_to_empty() {
        let req: SignupRequest = serde_json::from_value(serde_json::json!({
            "email": "ada@example.com",
            "password": "password123",
            "first_name": "Ada",
            "last_name": "Lovelace"
        }))
        .unwrap();
        assert!(req.purchased_products.is_empty());
        assert!(req.position_title.is_none());
    }
}
