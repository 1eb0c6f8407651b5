use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Default lifetime of an access grant.
pub const DEFAULT_GRANT_TTL_HOURS: i64 = 24 * 7;

/// Longest lifetime an access grant may be configured with (ten years).
pub const MAX_GRANT_TTL_HOURS: i64 = 24 * 365 * 10;

/// A time-bounded authorization binding an identity to a bearer token.
///
/// Holds the plaintext token, so it only lives for the duration of the
/// request that minted or presented it. Persisted form is [`GrantRecord`].
#[derive(Clone, PartialEq, Eq)]
pub struct Grant {
    /// Email of the owning identity
    pub owner: String,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Grant {
    /// Mint a grant with a fresh random token. `None` when the expiry falls
    /// outside the representable time range.
    pub fn mint(owner: String, issued_at: DateTime<Utc>, ttl: Duration) -> Option<Self> {
        let expires_at = issued_at.checked_add_signed(ttl)?;
        Some(Self {
            owner,
            token: generate_token(),
            issued_at,
            expires_at,
        })
    }

    /// Whole seconds left at `now`, zero once expired.
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    pub fn to_record(&self) -> GrantRecord {
        GrantRecord {
            owner: self.owner.clone(),
            token_hash: hash_token(&self.token),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grant")
            .field("owner", &self.owner)
            .field("token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Stored grant. Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantRecord {
    pub owner: String,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl GrantRecord {
    /// Valid strictly before `expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Rebuild the in-flight grant around the token that was presented.
    pub fn with_token(self, token: String) -> Grant {
        Grant {
            owner: self.owner,
            token,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        }
    }
}

/// Hash a token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_sets_expiry_from_ttl() {
        let now = Utc::now();
        let grant = Grant::mint("a@x.com".to_string(), now, Duration::days(7)).unwrap();

        assert_eq!(grant.expires_at - grant.issued_at, Duration::days(7));
        assert_eq!(grant.token.len(), 64);
        assert!(grant.to_record().is_valid_at(now));
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let grant = Grant::mint("a@x.com".to_string(), now, Duration::hours(1)).unwrap();

        let record = grant.to_record();

        assert!(record.is_valid_at(grant.expires_at - Duration::milliseconds(1)));
        assert!(!record.is_valid_at(grant.expires_at));
        assert!(!record.is_valid_at(grant.expires_at + Duration::seconds(1)));
        assert_eq!(grant.remaining_seconds(grant.expires_at + Duration::hours(1)), 0);
    }

    #[test]
    fn record_stores_hash_not_token() {
        let grant = Grant::mint("a@x.com".to_string(), Utc::now(), Duration::days(1)).unwrap();
        let record = grant.to_record();

        assert_ne!(record.token_hash, grant.token);
        assert_eq!(record.token_hash, hash_token(&grant.token));
    }

    #[test]
    fn tokens_are_unique() {
        let now = Utc::now();
        let a = Grant::mint("a@x.com".to_string(), now, Duration::days(1)).unwrap();
        let b = Grant::mint("a@x.com".to_string(), now, Duration::days(1)).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn debug_redacts_token() {
        let grant = Grant::mint("a@x.com".to_string(), Utc::now(), Duration::days(1)).unwrap();
        let rendered = format!("{:?}", grant);
        assert!(!rendered.contains(&grant.token));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn mint_refuses_unrepresentable_expiry() {
        let now = Utc::now();
        assert!(Grant::mint("a@x.com".to_string(), now, Duration::MAX).is_none());
        assert!(
            Grant::mint("a@x.com".to_string(), now, Duration::hours(MAX_GRANT_TTL_HOURS)).is_some()
        );
    }
}
