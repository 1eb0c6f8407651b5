use std::sync::Arc;

use crate::{
    models::{normalize_email, AccountStatus, Identity, ProfileChanges},
    services::{store::IdentityStore, AccessError, Clock},
    utils::{verify_against_dummy, verify_password, Password, PasswordHashString},
};

/// Identity records and password verification.
#[derive(Clone)]
pub struct CredentialStore {
    identities: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    pub fn new(identities: Arc<dyn IdentityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { identities, clock }
    }

    /// True when the email is held by a Pending or Approved identity.
    pub async fn exists(&self, email: &str) -> Result<bool, AccessError> {
        Ok(self
            .find(email)
            .await?
            .map(|identity| identity.account_status.holds_email())
            .unwrap_or(false))
    }

    pub async fn find(&self, email: &str) -> Result<Option<Identity>, AccessError> {
        self.identities
            .find(&normalize_email(email))
            .await
            .map_err(AccessError::store)
    }

    /// Check a password against the stored hash.
    ///
    /// Unknown email, wrong password and a non-approved account all fail with
    /// the same [`AccessError::AuthenticationFailed`].
    pub async fn verify(&self, email: &str, password: &Password) -> Result<Identity, AccessError> {
        let identity = match self.find(email).await? {
            Some(identity) => identity,
            None => {
                verify_against_dummy(password);
                return Err(AccessError::AuthenticationFailed);
            }
        };

        let stored = PasswordHashString::new(identity.password_hash.clone());
        if verify_password(password, &stored).is_err() {
            tracing::warn!(email = %identity.email, "Password verification failed");
            return Err(AccessError::AuthenticationFailed);
        }

        if !identity.is_approved() {
            tracing::warn!(
                email = %identity.email,
                status = %identity.account_status,
                "Login attempt on unapproved identity"
            );
            return Err(AccessError::AuthenticationFailed);
        }

        Ok(identity)
    }

    /// Atomic insert-if-absent. A Rejected identity under the same email is replaced.
    pub async fn insert_pending(&self, identity: &Identity) -> Result<(), AccessError> {
        let inserted = self
            .identities
            .insert_pending(identity)
            .await
            .map_err(AccessError::store)?;

        if !inserted {
            return Err(AccessError::DuplicateEmail);
        }
        Ok(())
    }

    /// Compare-and-set the account status. Returns `false` if the identity
    /// was not in `from` when the write happened.
    pub async fn set_status(
        &self,
        email: &str,
        from: AccountStatus,
        to: AccountStatus,
    ) -> Result<bool, AccessError> {
        self.identities
            .transition(&normalize_email(email), from, to, self.clock.now())
            .await
            .map_err(AccessError::store)
    }

    pub async fn update_profile(
        &self,
        email: &str,
        changes: &ProfileChanges,
    ) -> Result<Identity, AccessError> {
        self.identities
            .update_profile(&normalize_email(email), changes, self.clock.now())
            .await
            .map_err(AccessError::store)?
            .ok_or(AccessError::NotFound)
    }

    pub async fn set_hidden(&self, email: &str) -> Result<(), AccessError> {
        let updated = self
            .identities
            .set_hidden(&normalize_email(email), true, self.clock.now())
            .await
            .map_err(AccessError::store)?;

        if !updated {
            return Err(AccessError::NotFound);
        }
        Ok(())
    }

    /// Returns whether an identity was removed.
    pub async fn remove(&self, email: &str) -> Result<bool, AccessError> {
        self.identities
            .remove(&normalize_email(email))
            .await
            .map_err(AccessError::store)
    }

    pub async fn health_check(&self) -> Result<(), AccessError> {
        self.identities
            .health_check()
            .await
            .map_err(AccessError::store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{store::MemoryStore, ManualClock};
    use crate::utils::hash_password;

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryStore::new()), Arc::new(ManualClock::default()))
    }

    fn identity(email: &str, password: &str) -> Identity {
        let hash = hash_password(&Password::new(password.to_string())).unwrap();
        Identity::new_pending(
            email,
            "Grace".to_string(),
            "Hopper".to_string(),
            None,
            hash.into_string(),
            vec![],
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn exists_tracks_status() {
        let credentials = store();
        assert!(!credentials.exists("g@x.com").await.unwrap());

        credentials
            .insert_pending(&identity("g@x.com", "password123"))
            .await
            .unwrap();
        assert!(credentials.exists("G@X.com ").await.unwrap());

        credentials
            .set_status("g@x.com", AccountStatus::Pending, AccountStatus::Rejected)
            .await
            .unwrap();
        assert!(!credentials.exists("g@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let credentials = store();
        credentials
            .insert_pending(&identity("g@x.com", "password123"))
            .await
            .unwrap();

        let err = credentials
            .insert_pending(&identity("g@x.com", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::DuplicateEmail));
    }

    #[tokio::test]
    async fn verify_requires_approval_and_correct_password() {
        let credentials = store();
        credentials
            .insert_pending(&identity("g@x.com", "password123"))
            .await
            .unwrap();

        let pending = credentials
            .verify("g@x.com", &Password::new("password123".into()))
            .await;
        assert!(matches!(pending, Err(AccessError::AuthenticationFailed)));

        credentials
            .set_status("g@x.com", AccountStatus::Pending, AccountStatus::Approved)
            .await
            .unwrap();

        let wrong = credentials
            .verify("g@x.com", &Password::new("password124".into()))
            .await;
        assert!(matches!(wrong, Err(AccessError::AuthenticationFailed)));

        let ok = credentials
            .verify(" G@x.com", &Password::new("password123".into()))
            .await
            .unwrap();
        assert_eq!(ok.email, "g@x.com");
    }

    #[tokio::test]
    async fn verify_unknown_email_fails_like_wrong_password() {
        let credentials = store();
        let err = credentials
            .verify("nobody@x.com", &Password::new("password123".into()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), AccessError::AuthenticationFailed.to_string());
    }

    #[tokio::test]
    async fn hide_and_update_unknown_identity_is_not_found() {
        let credentials = store();
        assert!(matches!(
            credentials.set_hidden("nobody@x.com").await,
            Err(AccessError::NotFound)
        ));
        assert!(matches!(
            credentials
                .update_profile("nobody@x.com", &ProfileChanges::default())
                .await,
            Err(AccessError::NotFound)
        ));
    }
}
