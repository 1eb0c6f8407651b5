use std::sync::Arc;

use crate::{
    models::{normalize_email, PendingRegistration},
    services::{store::PendingStore, AccessError, Clock},
};

/// Signups waiting for an administrator to approve or reject them.
#[derive(Clone)]
pub struct PendingLedger {
    entries: Arc<dyn PendingStore>,
    clock: Arc<dyn Clock>,
}

impl PendingLedger {
    pub fn new(entries: Arc<dyn PendingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { entries, clock }
    }

    /// Record a pending signup. Fails with `AlreadyPending` if one exists.
    pub async fn enqueue(&self, email: &str) -> Result<(), AccessError> {
        let entry = PendingRegistration::new(normalize_email(email), self.clock.now());

        let inserted = self
            .entries
            .insert_if_absent(&entry)
            .await
            .map_err(AccessError::store)?;

        if !inserted {
            return Err(AccessError::AlreadyPending);
        }

        tracing::info!(email = %entry.email, "Registration queued for approval");
        Ok(())
    }

    /// Remove the entry for `email`. Succeeds when there is none.
    pub async fn clear(&self, email: &str) -> Result<(), AccessError> {
        let email = normalize_email(email);
        let removed = self
            .entries
            .remove(&email)
            .await
            .map_err(AccessError::store)?;

        if removed {
            tracing::debug!(email = %email, "Pending registration cleared");
        }
        Ok(())
    }

    pub async fn contains(&self, email: &str) -> Result<bool, AccessError> {
        self.entries
            .contains(&normalize_email(email))
            .await
            .map_err(AccessError::store)
    }

    /// Oldest first.
    pub async fn list(&self) -> Result<Vec<PendingRegistration>, AccessError> {
        self.entries.list().await.map_err(AccessError::store)
    }
}
