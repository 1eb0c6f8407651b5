//! Identity state machine: signup, approval, rejection, deletion and the
//! owner-side profile operations.

use std::sync::Arc;

use crate::{
    dtos::access::{SignupRequest, UpdateUserRequest},
    models::{normalize_email, AccountStatus, Grant, Identity, PendingRegistration, ProfileChanges},
    services::{AccessError, Clock, CredentialStore, GrantDelivery, GrantIssuer, PendingLedger},
    utils::{hash_password, Password},
};

#[derive(Clone)]
pub struct LifecycleService {
    credentials: CredentialStore,
    ledger: PendingLedger,
    issuer: GrantIssuer,
    delivery: Arc<dyn GrantDelivery>,
    clock: Arc<dyn Clock>,
}

impl LifecycleService {
    pub fn new(
        credentials: CredentialStore,
        ledger: PendingLedger,
        issuer: GrantIssuer,
        delivery: Arc<dyn GrantDelivery>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            ledger,
            issuer,
            delivery,
            clock,
        }
    }

    /// Register a new identity awaiting approval.
    ///
    /// Runs detached from the caller so a dropped request cannot leave an
    /// identity without its ledger entry.
    pub async fn signup(&self, req: SignupRequest) -> Result<Identity, AccessError> {
        let this = self.clone();
        tokio::spawn(async move { this.register(req).await })
            .await
            .map_err(|e| AccessError::Internal(e.into()))?
    }

    async fn register(&self, req: SignupRequest) -> Result<Identity, AccessError> {
        let email = normalize_email(&req.email);

        if self.credentials.exists(&email).await? {
            return Err(AccessError::DuplicateEmail);
        }

        let password_hash = hash_password(&Password::new(req.password))
            .map_err(|e| AccessError::Internal(anyhow::anyhow!("Password hashing error: {}", e)))?;

        let identity = Identity::new_pending(
            &email,
            req.first_name,
            req.last_name,
            req.position_title,
            password_hash.into_string(),
            req.purchased_products,
            self.clock.now(),
        );

        self.credentials.insert_pending(&identity).await?;

        if let Err(e) = self.ledger.enqueue(&email).await {
            if let Err(undo) = self.credentials.remove(&email).await {
                tracing::error!(
                    email = %email,
                    error = %undo,
                    "Failed to roll back identity after ledger error"
                );
            }
            return Err(e);
        }

        tracing::info!(email = %email, "Identity registered, awaiting approval");
        Ok(identity)
    }

    /// Pending -> Approved. Mints a grant and hands it to the delivery
    /// channel; the token is not returned.
    ///
    /// A delivery failure is reported but the approval stands. Any earlier
    /// failure leaves the identity Pending and still queued.
    pub async fn approve(&self, email: &str) -> Result<Identity, AccessError> {
        let email = normalize_email(email);
        let identity = self
            .credentials
            .find(&email)
            .await?
            .ok_or(AccessError::NotFound)?;

        if identity.account_status != AccountStatus::Pending {
            return Err(AccessError::InvalidTransition {
                action: "approve",
                status: identity.account_status,
            });
        }

        if !self
            .credentials
            .set_status(&email, AccountStatus::Pending, AccountStatus::Approved)
            .await?
        {
            return Err(self.lost_race(&email, "approve").await);
        }

        let approved = Identity {
            account_status: AccountStatus::Approved,
            updated_at: self.clock.now(),
            ..identity
        };

        let grant = match self.issuer.grant(&approved).await {
            Ok(grant) => grant,
            Err(e) => {
                self.revert_approval(&email).await;
                return Err(e);
            }
        };

        if let Err(e) = self.ledger.clear(&email).await {
            self.withdraw_grant(&email).await;
            self.revert_approval(&email).await;
            return Err(e);
        }
        tracing::info!(email = %email, expires_at = %grant.expires_at, "Identity approved");

        self.deliver(&approved, &grant).await?;
        Ok(approved)
    }

    /// Pending -> Rejected. On an identity that is not pending this only
    /// clears any leftover ledger entry.
    pub async fn reject(&self, email: &str) -> Result<Identity, AccessError> {
        let email = normalize_email(email);
        let identity = self
            .credentials
            .find(&email)
            .await?
            .ok_or(AccessError::NotFound)?;

        let identity = if identity.account_status == AccountStatus::Pending
            && self
                .credentials
                .set_status(&email, AccountStatus::Pending, AccountStatus::Rejected)
                .await?
        {
            tracing::info!(email = %email, "Identity rejected");
            Identity {
                account_status: AccountStatus::Rejected,
                updated_at: self.clock.now(),
                ..identity
            }
        } else {
            tracing::debug!(
                email = %email,
                status = %identity.account_status,
                "Reject on non-pending identity; clearing ledger only"
            );
            self.credentials
                .find(&email)
                .await?
                .ok_or(AccessError::NotFound)?
        };

        self.ledger.clear(&email).await?;
        Ok(identity)
    }

    /// Remove the identity, its grant and any ledger entry.
    pub async fn delete(&self, email: &str) -> Result<(), AccessError> {
        let email = normalize_email(email);

        if !self.credentials.remove(&email).await? {
            return Err(AccessError::NotFound);
        }

        self.issuer.revoke(&email).await?;
        self.ledger.clear(&email).await?;

        tracing::info!(email = %email, "Identity deleted");
        Ok(())
    }

    pub async fn update_profile(
        &self,
        email: &str,
        req: UpdateUserRequest,
    ) -> Result<Identity, AccessError> {
        let password_hash = match req.password {
            Some(password) => Some(
                hash_password(&Password::new(password))
                    .map_err(|e| {
                        AccessError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
                    })?
                    .into_string(),
            ),
            None => None,
        };

        let changes = ProfileChanges {
            first_name: req.first_name,
            last_name: req.last_name,
            position_title: req.position_title,
            purchased_products: req.purchased_products,
            password_hash,
        };

        if changes.is_empty() {
            return Err(AccessError::Validation("No changes supplied".to_string()));
        }

        let identity = self.credentials.update_profile(email, &changes).await?;
        tracing::info!(email = %identity.email, "Profile updated");
        Ok(identity)
    }

    pub async fn hide(&self, email: &str) -> Result<(), AccessError> {
        self.credentials.set_hidden(email).await?;
        tracing::info!(email = %normalize_email(email), "Identity hidden");
        Ok(())
    }

    /// Identity as seen by `viewer`. Hidden identities are visible to their
    /// owner only.
    pub async fn view(&self, email: &str, viewer: &Grant) -> Result<Identity, AccessError> {
        let identity = self
            .credentials
            .find(email)
            .await?
            .ok_or(AccessError::NotFound)?;

        if identity.hidden && identity.email != viewer.owner {
            return Err(AccessError::NotFound);
        }
        Ok(identity)
    }

    pub async fn pending(&self) -> Result<Vec<PendingRegistration>, AccessError> {
        self.ledger.list().await
    }

    async fn deliver(&self, identity: &Identity, grant: &Grant) -> Result<(), AccessError> {
        self.delivery.deliver(identity, grant).await.map_err(|e| {
            tracing::error!(
                email = %identity.email,
                error = %e,
                "Approval recorded but grant delivery failed"
            );
            e
        })
    }

    async fn revert_approval(&self, email: &str) {
        match self
            .credentials
            .set_status(email, AccountStatus::Approved, AccountStatus::Pending)
            .await
        {
            Ok(true) => tracing::warn!(email = %email, "Approval reverted"),
            Ok(false) => tracing::warn!(email = %email, "Approval not reverted; identity changed"),
            Err(e) => tracing::error!(
                email = %email,
                error = %e,
                "Failed to revert approval"
            ),
        }
    }

    async fn withdraw_grant(&self, email: &str) {
        if let Err(e) = self.issuer.revoke(email).await {
            tracing::error!(
                email = %email,
                error = %e,
                "Failed to revoke grant of abandoned approval"
            );
        }
    }

    async fn lost_race(&self, email: &str, action: &'static str) -> AccessError {
        match self.credentials.find(email).await {
            Ok(Some(current)) => AccessError::InvalidTransition {
                action,
                status: current.account_status,
            },
            Ok(None) => AccessError::NotFound,
            Err(e) => e,
        }
    }
}
