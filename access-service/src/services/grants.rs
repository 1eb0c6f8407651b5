use axum::http::HeaderMap;
use chrono::Duration;
use std::sync::Arc;

use crate::{
    models::{hash_token, normalize_email, Grant, GrantRecord, Identity, DEFAULT_GRANT_TTL_HOURS},
    services::{store::GrantStore, AccessError, Clock, CredentialStore, TokenTransport},
    utils::Password,
};

/// Turns a verified identity into a time-bounded access grant.
#[derive(Clone)]
pub struct GrantIssuer {
    credentials: CredentialStore,
    grants: Arc<dyn GrantStore>,
    clock: Arc<dyn Clock>,
    transport: TokenTransport,
    expire_after: Duration,
}

impl GrantIssuer {
    pub fn new(
        credentials: CredentialStore,
        grants: Arc<dyn GrantStore>,
        clock: Arc<dyn Clock>,
        transport: TokenTransport,
    ) -> Self {
        Self {
            credentials,
            grants,
            clock,
            transport,
            expire_after: Duration::hours(DEFAULT_GRANT_TTL_HOURS),
        }
    }

    pub fn with_expire_after(mut self, expire_after: Duration) -> Self {
        self.expire_after = expire_after;
        self
    }

    pub fn transport(&self) -> &TokenTransport {
        &self.transport
    }

    /// Verify credentials and write a fresh grant to `response`.
    ///
    /// The response never carries a token unless the grant was persisted.
    pub async fn login(
        &self,
        email: &str,
        password: &Password,
        response: &mut HeaderMap,
    ) -> Result<Grant, AccessError> {
        self.transport.clear(response);

        let identity = self.credentials.verify(email, password).await?;
        let grant = self.issue(&identity).await?;

        if let Err(e) = self.transport.write(response, &grant, self.clock.now()) {
            self.transport.clear(response);
            return Err(e);
        }

        tracing::info!(
            email = %grant.owner,
            expires_at = %grant.expires_at,
            "Access granted"
        );
        Ok(grant)
    }

    /// Mint a grant for an approved identity without a password check.
    ///
    /// The token is returned to the caller only; nothing is written to any
    /// response.
    pub async fn grant(&self, identity: &Identity) -> Result<Grant, AccessError> {
        if !identity.is_approved() {
            return Err(AccessError::InvalidTransition {
                action: "grant access to",
                status: identity.account_status,
            });
        }

        let grant = self.issue(identity).await?;
        tracing::info!(
            email = %grant.owner,
            expires_at = %grant.expires_at,
            "Access granted on approval"
        );
        Ok(grant)
    }

    /// Drop the identity's grant. Returns whether one existed.
    pub async fn revoke(&self, email: &str) -> Result<bool, AccessError> {
        let email = normalize_email(email);
        let revoked = self
            .grants
            .remove_for_owner(&email)
            .await
            .map_err(AccessError::store)?;

        if revoked {
            tracing::info!(email = %email, "Access grant revoked");
        }
        Ok(revoked)
    }

    /// Stored grant for a presented token, expired or not.
    pub async fn lookup(&self, token: &str) -> Result<Option<GrantRecord>, AccessError> {
        self.grants
            .find_by_token_hash(&hash_token(token))
            .await
            .map_err(AccessError::store)
    }

    async fn issue(&self, identity: &Identity) -> Result<Grant, AccessError> {
        let grant = Grant::mint(identity.email.clone(), self.clock.now(), self.expire_after)
            .ok_or_else(|| {
                AccessError::Internal(anyhow::anyhow!(
                    "Grant lifetime of {} hours is out of range",
                    self.expire_after.num_hours()
                ))
            })?;

        self.grants
            .put(&grant.to_record())
            .await
            .map_err(AccessError::store)?;

        Ok(grant)
    }
}
