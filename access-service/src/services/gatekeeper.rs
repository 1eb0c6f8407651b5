use axum::http::HeaderMap;
use std::sync::Arc;

use crate::{
    models::{normalize_email, Grant},
    services::{AccessError, Clock, CredentialStore, GrantIssuer},
};

/// Validates presented grants and answers ownership questions.
#[derive(Clone)]
pub struct Gatekeeper {
    issuer: GrantIssuer,
    credentials: CredentialStore,
    clock: Arc<dyn Clock>,
}

impl Gatekeeper {
    pub fn new(issuer: GrantIssuer, credentials: CredentialStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer,
            credentials,
            clock,
        }
    }

    /// Resolve the grant presented on `headers`.
    ///
    /// Fails with `Unauthorized` when no token is presented, the token is
    /// unknown, the grant has expired, or its owner is no longer an approved
    /// identity.
    pub async fn validate(&self, headers: &HeaderMap) -> Result<Grant, AccessError> {
        let token = self
            .issuer
            .transport()
            .read(headers)
            .ok_or(AccessError::Unauthorized)?;

        let record = self
            .issuer
            .lookup(&token)
            .await?
            .ok_or(AccessError::Unauthorized)?;

        if !record.is_valid_at(self.clock.now()) {
            tracing::debug!(email = %record.owner, "Presented grant has expired");
            return Err(AccessError::Unauthorized);
        }

        let owner_active = self
            .credentials
            .find(&record.owner)
            .await?
            .map(|identity| identity.is_approved())
            .unwrap_or(false);

        if !owner_active {
            tracing::warn!(email = %record.owner, "Grant presented for inactive identity");
            return Err(AccessError::Unauthorized);
        }

        Ok(record.with_token(token))
    }

    /// Ownership predicate. Any failure reads as "not the owner".
    pub async fn is_owner(&self, headers: &HeaderMap, target_email: &str) -> bool {
        match self.validate(headers).await {
            Ok(grant) => owns(&grant, target_email),
            Err(_) => false,
        }
    }

    /// Like [`Gatekeeper::is_owner`] but tells a missing grant apart from
    /// someone else's.
    pub async fn require_owner(
        &self,
        headers: &HeaderMap,
        target_email: &str,
    ) -> Result<Grant, AccessError> {
        let grant = self.validate(headers).await?;
        authorize(&grant, target_email)?;
        Ok(grant)
    }
}

fn owns(grant: &Grant, target_email: &str) -> bool {
    grant.owner == normalize_email(target_email)
}

/// Check an already validated grant against a target identity.
pub fn authorize(grant: &Grant, target_email: &str) -> Result<(), AccessError> {
    if owns(grant, target_email) {
        Ok(())
    } else {
        tracing::warn!(
            email = %grant.owner,
            target = %normalize_email(target_email),
            "Grant is not owner of target identity"
        );
        Err(AccessError::PermissionDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountStatus, Identity};
    use crate::services::{store::MemoryStore, ManualClock, TokenTransport};
    use axum::http::{header, HeaderValue};
    use chrono::Duration;

    struct Fixture {
        gatekeeper: Gatekeeper,
        issuer: GrantIssuer,
        credentials: CredentialStore,
        clock: Arc<ManualClock>,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let credentials = CredentialStore::new(store.clone(), clock.clone());
        let issuer = GrantIssuer::new(
            credentials.clone(),
            store,
            clock.clone(),
            TokenTransport::Header,
        );
        let gatekeeper = Gatekeeper::new(issuer.clone(), credentials.clone(), clock.clone());

        for email in ["owner@x.com", "other@x.com"] {
            let identity = Identity::new_pending(
                email,
                "F".into(),
                "L".into(),
                None,
                "$argon2id$unused".into(),
                vec![],
                clock.now(),
            );
            credentials.insert_pending(&identity).await.unwrap();
            credentials
                .set_status(email, AccountStatus::Pending, AccountStatus::Approved)
                .await
                .unwrap();
        }

        Fixture {
            gatekeeper,
            issuer,
            credentials,
            clock,
        }
    }

    async fn headers_for(f: &Fixture, email: &str) -> (HeaderMap, Grant) {
        let identity = f.credentials.find(email).await.unwrap().unwrap();
        let grant = f.issuer.grant(&identity).await.unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", grant.token)).unwrap(),
        );
        (headers, grant)
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_unauthorized() {
        let f = fixture().await;
        assert!(matches!(
            f.gatekeeper.validate(&HeaderMap::new()).await,
            Err(AccessError::Unauthorized)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer forged"));
        assert!(matches!(
            f.gatekeeper.validate(&headers).await,
            Err(AccessError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn valid_strictly_before_expiry() {
        let f = fixture().await;
        let (headers, grant) = headers_for(&f, "owner@x.com").await;

        f.clock.set(grant.expires_at - Duration::milliseconds(1));
        assert!(f.gatekeeper.validate(&headers).await.is_ok());

        f.clock.set(grant.expires_at);
        assert!(matches!(
            f.gatekeeper.validate(&headers).await,
            Err(AccessError::Unauthorized)
        ));

        f.clock.advance(Duration::days(1));
        assert!(matches!(
            f.gatekeeper.validate(&headers).await,
            Err(AccessError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn is_owner_only_for_own_grant() {
        let f = fixture().await;
        let (headers, _) = headers_for(&f, "owner@x.com").await;

        assert!(f.gatekeeper.is_owner(&headers, "owner@x.com").await);
        assert!(f.gatekeeper.is_owner(&headers, " Owner@X.com").await);
        assert!(!f.gatekeeper.is_owner(&headers, "other@x.com").await);
        assert!(!f.gatekeeper.is_owner(&HeaderMap::new(), "owner@x.com").await);
    }

    #[tokio::test]
    async fn require_owner_distinguishes_failures() {
        let f = fixture().await;
        let (headers, _) = headers_for(&f, "owner@x.com").await;

        assert!(f.gatekeeper.require_owner(&headers, "owner@x.com").await.is_ok());
        assert!(matches!(
            f.gatekeeper.require_owner(&headers, "other@x.com").await,
            Err(AccessError::PermissionDenied)
        ));
        assert!(matches!(
            f.gatekeeper.require_owner(&HeaderMap::new(), "owner@x.com").await,
            Err(AccessError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn removed_owner_invalidates_grant() {
        let f = fixture().await;
        let (headers, _) = headers_for(&f, "owner@x.com").await;

        f.credentials.remove("owner@x.com").await.unwrap();

        assert!(matches!(
            f.gatekeeper.validate(&headers).await,
            Err(AccessError::Unauthorized)
        ));
        assert!(!f.gatekeeper.is_owner(&headers, "owner@x.com").await);
    }
}
