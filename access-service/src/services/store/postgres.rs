//! PostgreSQL backend.
//!
//! Runtime-checked queries; every presence decision is one statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use super::{GrantStore, IdentityStore, PendingStore};
use crate::models::{AccountStatus, GrantRecord, Identity, PendingRegistration, ProfileChanges};

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS identities (
        email TEXT PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        position_title TEXT,
        password_hash TEXT NOT NULL,
        account_status TEXT NOT NULL,
        purchased_products TEXT[] NOT NULL DEFAULT '{}',
        hidden BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pending_registrations (
        email TEXT PRIMARY KEY REFERENCES identities(email) ON DELETE CASCADE,
        requested_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS grants (
        owner TEXT PRIMARY KEY REFERENCES identities(email) ON DELETE CASCADE,
        token_hash TEXT NOT NULL UNIQUE,
        issued_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_pending_requested_at ON pending_registrations (requested_at)",
];

/// PostgreSQL store wrapper.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct IdentityRow {
    email: String,
    first_name: String,
    last_name: String,
    position_title: Option<String>,
    password_hash: String,
    account_status: String,
    purchased_products: Vec<String>,
    hidden: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdentityRow> for Identity {
    type Error = anyhow::Error;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        Ok(Identity {
            account_status: row
                .account_status
                .parse::<AccountStatus>()
                .map_err(|e| anyhow::anyhow!(e))?,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            position_title: row.position_title,
            password_hash: row.password_hash,
            purchased_products: row.purchased_products,
            hidden: row.hidden,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    owner: String,
    token_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<GrantRow> for GrantRecord {
    fn from(row: GrantRow) -> Self {
        GrantRecord {
            owner: row.owner,
            token_hash: row.token_hash,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
        }
    }
}

impl PgStore {
    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, anyhow::Error> {
        tracing::info!(max_connections, "Connecting to PostgreSQL");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to connect to PostgreSQL: {}", e))?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<(), anyhow::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Access schema ready");
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn insert_pending(&self, identity: &Identity) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO identities (
                email, first_name, last_name, position_title, password_hash,
                account_status, purchased_products, hidden, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (email) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                position_title = EXCLUDED.position_title,
                password_hash = EXCLUDED.password_hash,
                account_status = EXCLUDED.account_status,
                purchased_products = EXCLUDED.purchased_products,
                hidden = EXCLUDED.hidden,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            WHERE identities.account_status = 'rejected'
            "#,
        )
        .bind(&identity.email)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.position_title)
        .bind(&identity.password_hash)
        .bind(identity.account_status.as_str())
        .bind(&identity.purchased_products)
        .bind(identity.hidden)
        .bind(identity.created_at)
        .bind(identity.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find(&self, email: &str) -> Result<Option<Identity>, anyhow::Error> {
        sqlx::query_as::<_, IdentityRow>("SELECT * FROM identities WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(Identity::try_from)
            .transpose()
    }

    async fn transition(
        &self,
        email: &str,
        from: AccountStatus,
        to: AccountStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            r#"
            UPDATE identities SET account_status = $3, updated_at = $4
            WHERE email = $1 AND account_status = $2
            "#,
        )
        .bind(email)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_profile(
        &self,
        email: &str,
        changes: &ProfileChanges,
        at: DateTime<Utc>,
    ) -> Result<Option<Identity>, anyhow::Error> {
        sqlx::query_as::<_, IdentityRow>(
            r#"
            UPDATE identities SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                position_title = COALESCE($4, position_title),
                purchased_products = COALESCE($5, purchased_products),
                password_hash = COALESCE($6, password_hash),
                updated_at = $7
            WHERE email = $1
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.position_title)
        .bind(&changes.purchased_products)
        .bind(&changes.password_hash)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .map(Identity::try_from)
        .transpose()
    }

    async fn set_hidden(
        &self,
        email: &str,
        hidden: bool,
        at: DateTime<Utc>,
    ) -> Result<bool, anyhow::Error> {
        let result =
            sqlx::query("UPDATE identities SET hidden = $2, updated_at = $3 WHERE email = $1")
                .bind(email)
                .bind(hidden)
                .bind(at)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, email: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("DELETE FROM identities WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;
        Ok(())
    }
}

#[async_trait]
impl PendingStore for PgStore {
    async fn insert_if_absent(&self, entry: &PendingRegistration) -> Result<bool, anyhow::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO pending_registrations (email, requested_at)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(&entry.email)
        .bind(entry.requested_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove(&self, email: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("DELETE FROM pending_registrations WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn contains(&self, email: &str) -> Result<bool, anyhow::Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pending_registrations WHERE email = $1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn list(&self) -> Result<Vec<PendingRegistration>, anyhow::Error> {
        let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT email, requested_at FROM pending_registrations ORDER BY requested_at, email",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(email, requested_at)| PendingRegistration::new(email, requested_at))
            .collect())
    }
}

#[async_trait]
impl GrantStore for PgStore {
    async fn put(&self, record: &GrantRecord) -> Result<(), anyhow::Error> {
        sqlx::query(
            r#"
            INSERT INTO grants (owner, token_hash, issued_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (owner) DO UPDATE SET
                token_hash = EXCLUDED.token_hash,
                issued_at = EXCLUDED.issued_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&record.owner)
        .bind(&record.token_hash)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<GrantRecord>, anyhow::Error> {
        let row = sqlx::query_as::<_, GrantRow>(
            "SELECT owner, token_hash, issued_at, expires_at FROM grants WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(GrantRecord::from))
    }

    async fn remove_for_owner(&self, owner: &str) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("DELETE FROM grants WHERE owner = $1")
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
