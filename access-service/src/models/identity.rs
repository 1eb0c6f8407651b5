//! Identity model - a registered user account and its approval status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Account status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Approved => "approved",
            AccountStatus::Rejected => "rejected",
        }
    }

    /// Pending and Approved identities occupy their email; Rejected ones do not.
    pub fn holds_email(&self) -> bool {
        matches!(self, AccountStatus::Pending | AccountStatus::Approved)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AccountStatus::Pending),
            "approved" => Ok(AccountStatus::Approved),
            "rejected" => Ok(AccountStatus::Rejected),
            _ => Err(format!("Invalid account status: {}", s)),
        }
    }
}

/// Canonical form of an email used as the identity key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Identity entity. The email is the primary key.
#[derive(Debug, Clone)]
pub struct Identity {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub position_title: Option<String>,
    pub password_hash: String,
    pub account_status: AccountStatus,
    pub purchased_products: Vec<String>,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new identity awaiting approval.
    pub fn new_pending(
        email: &str,
        first_name: String,
        last_name: String,
        position_title: Option<String>,
        password_hash: String,
        purchased_products: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            email: normalize_email(email),
            first_name,
            last_name,
            position_title,
            password_hash,
            account_status: AccountStatus::Pending,
            purchased_products,
            hidden: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.account_status == AccountStatus::Approved
    }

    /// Convert to sanitized response (no password hash).
    pub fn sanitized(&self) -> IdentityResponse {
        IdentityResponse::from(self.clone())
    }
}

/// Profile fields an owner may change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position_title: Option<String>,
    pub purchased_products: Option<Vec<String>>,
    pub password_hash: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.position_title.is_none()
            && self.purchased_products.is_none()
            && self.password_hash.is_none()
    }

    pub fn apply_to(&self, identity: &mut Identity, now: DateTime<Utc>) {
        if let Some(first_name) = &self.first_name {
            identity.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            identity.last_name = last_name.clone();
        }
        if let Some(title) = &self.position_title {
            identity.position_title = Some(title.clone());
        }
        if let Some(products) = &self.purchased_products {
            identity.purchased_products = products.clone();
        }
        if let Some(hash) = &self.password_hash {
            identity.password_hash = hash.clone();
        }
        identity.updated_at = now;
    }
}

/// Identity response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IdentityResponse {
    #[schema(example = "user@example.com")]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub position_title: Option<String>,
    pub account_status: AccountStatus,
    pub purchased_products: Vec<String>,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Identity> for IdentityResponse {
    fn from(i: Identity) -> Self {
        Self {
            email: i.email,
            first_name: i.first_name,
            last_name: i.last_name,
            position_title: i.position_title,
            account_status: i.account_status,
            purchased_products: i.purchased_products,
            hidden: i.hidden,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}
