use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

use super::{GrantStore, IdentityStore, PendingStore};
use crate::models::{AccountStatus, GrantRecord, Identity, PendingRegistration, ProfileChanges};

/// In-process backend. `DashMap` shards give per-key locking; the entry API
/// makes every presence decision atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    identities: Arc<DashMap<String, Identity>>,
    pending: Arc<DashMap<String, PendingRegistration>>,
    grants_by_owner: Arc<DashMap<String, GrantRecord>>,
    owner_by_token: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert_pending(&self, identity: &Identity) -> Result<bool, anyhow::Error> {
        match self.identities.entry(identity.email.clone()) {
            Entry::Occupied(mut existing) => {
                if existing.get().account_status.holds_email() {
                    return Ok(false);
                }
                existing.insert(identity.clone());
                Ok(true)
            }
            Entry::Vacant(slot) => {
                slot.insert(identity.clone());
                Ok(true)
            }
        }
    }

    async fn find(&self, email: &str) -> Result<Option<Identity>, anyhow::Error> {
        Ok(self.identities.get(email).map(|i| i.value().clone()))
    }

    async fn transition(
        &self,
        email: &str,
        from: AccountStatus,
        to: AccountStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        match self.identities.get_mut(email) {
            Some(mut identity) if identity.account_status == from => {
                identity.account_status = to;
                identity.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        email: &str,
        changes: &ProfileChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<Identity>, anyhow::Error> {
        Ok(self.identities.get_mut(email).map(|mut identity| {
            changes.apply_to(&mut identity, at);
            identity.clone()
        }))
    }

    async fn set_hidden(
        &self,
        email: &str,
        hidden: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        Ok(self
            .identities
            .get_mut(email)
            .map(|mut identity| {
                identity.hidden = hidden;
                identity.updated_at = at;
            })
            .is_some())
    }

    async fn remove(&self, email: &str) -> Result<bool, anyhow::Error> {
        Ok(self.identities.remove(email).is_some())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}

#[async_trait]
impl PendingStore for MemoryStore {
    async fn insert_if_absent(&self, entry: &PendingRegistration) -> Result<bool, anyhow::Error> {
        match self.pending.entry(entry.email.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                Ok(true)
            }
        }
    }

    async fn remove(&self, email: &str) -> Result<bool, anyhow::Error> {
        Ok(self.pending.remove(email).is_some())
    }

    async fn contains(&self, email: &str) -> Result<bool, anyhow::Error> {
        Ok(self.pending.contains_key(email))
    }

    async fn list(&self) -> Result<Vec<PendingRegistration>, anyhow::Error> {
        let mut entries: Vec<PendingRegistration> =
            self.pending.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.email.cmp(&b.email))
        });
        Ok(entries)
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn put(&self, record: &GrantRecord) -> Result<(), anyhow::Error> {
        // Owner entry lock serializes concurrent issuance for one identity.
        let entry = self.grants_by_owner.entry(record.owner.clone());

        // Checked under the entry lock: a concurrent delete either removed the
        // identity already, or its `remove_for_owner` waits for this insert.
        if !self.identities.contains_key(&record.owner) {
            return Err(anyhow::anyhow!("Grant owner {} does not exist", record.owner));
        }

        match entry {
            Entry::Occupied(mut existing) => {
                self.owner_by_token.remove(&existing.get().token_hash);
                self.owner_by_token
                    .insert(record.token_hash.clone(), record.owner.clone());
                existing.insert(record.clone());
            }
            Entry::Vacant(slot) => {
                self.owner_by_token
                    .insert(record.token_hash.clone(), record.owner.clone());
                slot.insert(record.clone());
            }
        }
        Ok(())
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<GrantRecord>, anyhow::Error> {
        let owner = match self.owner_by_token.get(token_hash) {
            Some(owner) => owner.value().clone(),
            None => return Ok(None),
        };

        Ok(self
            .grants_by_owner
            .get(&owner)
            .filter(|record| record.token_hash == token_hash)
            .map(|record| record.value().clone()))
    }

    async fn remove_for_owner(&self, owner: &str) -> Result<bool, anyhow::Error> {
        match self.grants_by_owner.remove(owner) {
            Some((_, record)) => {
                self.owner_by_token.remove(&record.token_hash);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
