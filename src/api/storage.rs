//! Postgres-backed credential store.
//!
//! Subjects live in the `subjects` table (see `sql/schema.sql`). Provisioning rows
//! is someone else's job; this store only reads the notification address and
//! replaces the refresh hash.

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool, Row};
use tracing::{info_span, Instrument};

use crate::credentials::{CredentialStore, StoreError, StoredCredential, Subject};

#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Acquire a connection and ping it.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
    }

    async fn subject_exists(&self, subject: &Subject) -> Result<bool, StoreError> {
        let query = "SELECT EXISTS (SELECT 1 FROM subjects WHERE id = $1) AS present";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(subject.as_str())
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to check subject existence")?;

        Ok(row.get::<bool, _>("present"))
    }
}

impl CredentialStore for PgCredentialStore {
    async fn update_credential(
        &self,
        subject: &Subject,
        credential: &StoredCredential,
        expected: Option<&StoredCredential>,
    ) -> Result<(), StoreError> {
        // $4 NULL means unconditional; otherwise the row must still hold the hash we read.
        let query = r"
            UPDATE subjects
            SET refresh_hash = $2, refresh_expires_at = $3, rotated_at = NOW()
            WHERE id = $1 AND ($4::text IS NULL OR refresh_hash = $4)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(subject.as_str())
            .bind(&credential.hash)
            .bind(credential.expires_at)
            .bind(expected.map(|previous| previous.hash.as_str()))
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update refresh credential")?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        if self.subject_exists(subject).await? {
            Err(StoreError::ConcurrentRotation)
        } else {
            Err(StoreError::SubjectNotFound)
        }
    }

    async fn current_credential(&self, subject: &Subject) -> Result<StoredCredential, StoreError> {
        let query = r"
            SELECT refresh_hash, refresh_expires_at
            FROM subjects
            WHERE id = $1 AND refresh_hash IS NOT NULL
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(subject.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to select refresh credential")?
            .ok_or(StoreError::SubjectNotFound)?;

        let hash: String = row.get("refresh_hash");
        // A hash without an expiry is treated as already expired.
        let expires_at: Option<DateTime<Utc>> = row.get("refresh_expires_at");

        Ok(StoredCredential {
            hash,
            expires_at: expires_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
        })
    }

    async fn select_mail(&self, subject: &Subject) -> Result<String, StoreError> {
        let query = "SELECT email FROM subjects WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(subject.as_str())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to select subject email")?
            .ok_or(StoreError::SubjectNotFound)?;

        Ok(row.get("email"))
    }
}
