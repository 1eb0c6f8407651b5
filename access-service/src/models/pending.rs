use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A signup waiting for an administrator's decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PendingRegistration {
    #[schema(example = "user@example.com")]
    pub email: String,
    pub requested_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn new(email: String, requested_at: DateTime<Utc>) -> Self {
        Self {
            email,
            requested_at,
        }
    }
}
