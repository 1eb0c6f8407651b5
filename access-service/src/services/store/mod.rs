//! Persistence seams for identities, pending registrations and grants.
//!
//! Every method that decides on presence is a single atomic step in the
//! backend (entry lock or `INSERT ... ON CONFLICT`), so callers never
//! check-then-act across two calls.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{AccountStatus, GrantRecord, Identity, PendingRegistration, ProfileChanges};

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert a pending identity unless the email is held by a Pending or
    /// Approved identity. A Rejected identity is replaced.
    /// Returns `false` when the email is already held.
    async fn insert_pending(&self, identity: &Identity) -> Result<bool, anyhow::Error>;

    async fn find(&self, email: &str) -> Result<Option<Identity>, anyhow::Error>;

    /// Compare-and-set on account status. Returns `false` if the identity is
    /// missing or not in `from`.
    async fn transition(
        &self,
        email: &str,
        from: AccountStatus,
        to: AccountStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error>;

    async fn update_profile(
        &self,
        email: &str,
        changes: &ProfileChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<Identity>, anyhow::Error>;

    async fn set_hidden(
        &self,
        email: &str,
        hidden: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error>;

    async fn remove(&self, email: &str) -> Result<bool, anyhow::Error>;

    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Returns `false` if an entry for the email already exists.
    async fn insert_if_absent(&self, entry: &PendingRegistration) -> Result<bool, anyhow::Error>;

    /// Returns whether an entry was removed.
    async fn remove(&self, email: &str) -> Result<bool, anyhow::Error>;

    async fn contains(&self, email: &str) -> Result<bool, anyhow::Error>;

    /// Oldest request first.
    async fn list(&self) -> Result<Vec<PendingRegistration>, anyhow::Error>;
}

#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Store a grant, replacing any previous grant of the same owner.
    async fn put(&self, record: &GrantRecord) -> Result<(), anyhow::Error>;

    async fn find_by_token_hash(&self, token_hash: &str)
        -> Result<Option<GrantRecord>, anyhow::Error>;

    async fn remove_for_owner(&self, owner: &str) -> Result<bool, anyhow::Error>;
}
