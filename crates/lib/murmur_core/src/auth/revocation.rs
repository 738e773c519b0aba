//! Revoked-token registry.
//!
//! Tokens are recorded by fingerprint with a TTL mirroring their natural
//! expiry, so the registry never outgrows the set of still-live tokens.
//!
//! Failure policy differs per operation:
//! - [`RevocationRegistry::add`] reports `false` and logs; it never fails the caller.
//! - [`RevocationRegistry::is_revoked`] answers `true` when storage is unavailable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use tracing::{error, info, warn};

use super::{AuthError, token_fingerprint};
use crate::models::auth::RevocationRecord;

/// TTL used when a token's expiry is unknown: 24 hours.
pub const DEFAULT_REVOCATION_TTL_SECS: i64 = 86_400;

/// Durable key-value storage with per-key expiry.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Insert or overwrite a record. Last writer wins.
    async fn put(&self, record: RevocationRecord) -> Result<(), AuthError>;

    /// Whether an unexpired record exists for `fingerprint`.
    async fn exists(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<bool, AuthError>;

    /// Remove records expired at `now`. Returns the number removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError>;
}

/// Seconds a revocation must live: until the token's own expiry, at least 1s.
pub fn revocation_ttl_secs(natural_expires_at: Option<i64>, now: i64) -> i64 {
    match natural_expires_at {
        Some(exp) => (exp - now).max(1),
        None => DEFAULT_REVOCATION_TTL_SECS,
    }
}

/// Revocation registry over a [`RevocationStore`].
pub struct RevocationRegistry {
    store: Arc<dyn RevocationStore>,
}

impl RevocationRegistry {
    pub fn new(store: Arc<dyn RevocationStore>) -> Self {
        Self { store }
    }

    /// Revoke `token` until `natural_expires_at` (unix seconds).
    pub async fn add(&self, token: &str, natural_expires_at: Option<i64>) -> bool {
        let now = Utc::now();
        let ttl = revocation_ttl_secs(natural_expires_at, now.timestamp());
        let fingerprint = token_fingerprint(token);
        let record = RevocationRecord {
            fingerprint: fingerprint.clone(),
            revoked_at: now,
            expires_at: now + chrono::Duration::seconds(ttl),
        };

        match self.store.put(record).await {
            Ok(()) => {
                info!(fingerprint = %&fingerprint[..8], ttl, "token revoked");
                true
            }
            Err(e) => {
                error!(fingerprint = %&fingerprint[..8], error = %e, "failed to record token revocation");
                false
            }
        }
    }

    /// Whether `token` has been revoked. Storage errors count as revoked.
    pub async fn is_revoked(&self, token: &str) -> bool {
        let fingerprint = token_fingerprint(token);
        match self.store.exists(&fingerprint, Utc::now()).await {
            Ok(true) => {
                info!(fingerprint = %&fingerprint[..8], "revoked token presented");
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!(fingerprint = %&fingerprint[..8], error = %e, "revocation check failed; treating token as revoked");
                true
            }
        }
    }

    /// Purge expired records, logging failures.
    pub async fn purge_expired(&self) -> u64 {
        match self.store.purge_expired(Utc::now()).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "revocation purge failed");
                0
            }
        }
    }

    /// Spawn a periodic purge task.
    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = registry.purge_expired().await;
                if purged > 0 {
                    info!(purged, "purged expired revocations");
                }
            }
        })
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store. Not durable; for tests and the `test` provider mode.
#[derive(Debug, Default)]
pub struct MemoryRevocationStore {
    records: DashMap<String, RevocationRecord>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn put(&self, record: RevocationRecord) -> Result<(), AuthError> {
        self.records.insert(record.fingerprint.clone(), record);
        Ok(())
    }

    async fn exists(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<bool, AuthError> {
        let live = match self.records.get(fingerprint) {
            None => return Ok(false),
            Some(r) => r.expires_at > now,
        };
        if !live {
            self.records.remove_if(fingerprint, |_, r| r.expires_at <= now);
        }
        Ok(live)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let before = self.records.len();
        self.records.retain(|_, r| r.expires_at > now);
        Ok((before - self.records.len()) as u64)
    }
}

// =============================================================================
// PostgreSQL store
// =============================================================================

/// Durable store on the `revoked_tokens` table.
#[derive(Debug, Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn put(&self, record: RevocationRecord) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO revoked_tokens (fingerprint, revoked_at, expires_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (fingerprint) DO UPDATE \
             SET revoked_at = EXCLUDED.revoked_at, expires_at = EXCLUDED.expires_at",
        )
        .bind(&record.fingerprint)
        .bind(record.revoked_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<bool, AuthError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE fingerprint = $1 AND expires_at > $2)",
        )
        .bind(fingerprint)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AuthError::StorageError(e.to_string()))?;
        Ok(exists)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::StorageError(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store whose backend is always down.
    struct BrokenStore;

    #[async_trait]
    impl RevocationStore for BrokenStore {
        async fn put(&self, _record: RevocationRecord) -> Result<(), AuthError> {
            Err(AuthError::StorageError("connection refused".into()))
        }

        async fn exists(&self, _fingerprint: &str, _now: DateTime<Utc>) -> Result<bool, AuthError> {
            Err(AuthError::StorageError("connection refused".into()))
        }

        async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<u64, AuthError> {
            Err(AuthError::StorageError("connection refused".into()))
        }
    }

    #[test]
    fn ttl_mirrors_token_expiry() {
        assert_eq!(revocation_ttl_secs(Some(1_000), 400), 600);
        assert_eq!(revocation_ttl_secs(Some(100), 400), 1);
        assert_eq!(revocation_ttl_secs(None, 400), DEFAULT_REVOCATION_TTL_SECS);
    }

    #[tokio::test]
    async fn added_tokens_are_revoked() {
        let registry = RevocationRegistry::new(Arc::new(MemoryRevocationStore::new()));
        let exp = Utc::now().timestamp() + 600;

        assert!(!registry.is_revoked("tok").await);
        assert!(registry.add("tok", Some(exp)).await);
        assert!(registry.is_revoked("tok").await);
        assert!(!registry.is_revoked("other").await);
    }

    #[tokio::test]
    async fn store_keys_by_fingerprint_not_raw_token() {
        let store = Arc::new(MemoryRevocationStore::new());
        let registry = RevocationRegistry::new(store.clone());
        registry.add("raw-secret", None).await;

        assert!(store.records.get("raw-secret").is_none());
        assert!(store.records.get(&token_fingerprint("raw-secret")).is_some());
    }

    #[tokio::test]
    async fn concurrent_adds_for_same_token_leave_it_revoked() {
        let registry = Arc::new(RevocationRegistry::new(Arc::new(MemoryRevocationStore::new())));
        let (a, b) = tokio::join!(registry.add("tok", None), registry.add("tok", None));
        assert!(a && b);
        assert!(registry.is_revoked("tok").await);
    }

    #[tokio::test]
    async fn expired_records_do_not_count() {
        let store = MemoryRevocationStore::new();
        let now = Utc::now();
        store
            .put(RevocationRecord {
                fingerprint: "fp".into(),
                revoked_at: now - chrono::Duration::seconds(10),
                expires_at: now - chrono::Duration::seconds(1),
            })
            .await
            .unwrap();

        assert!(!store.exists("fp", now).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let store = Arc::new(MemoryRevocationStore::new());
        let now = Utc::now();
        for (fp, offset) in [("old", -5), ("live", 500)] {
            store
                .put(RevocationRecord {
                    fingerprint: fp.into(),
                    revoked_at: now,
                    expires_at: now + chrono::Duration::seconds(offset),
                })
                .await
                .unwrap();
        }
        let registry = RevocationRegistry::new(store.clone());
        assert_eq!(registry.purge_expired().await, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_fails_closed_on_check() {
        let registry = RevocationRegistry::new(Arc::new(BrokenStore));
        assert!(registry.is_revoked("anything").await);
    }

    #[tokio::test]
    async fn storage_failure_reports_false_on_add() {
        let registry = RevocationRegistry::new(Arc::new(BrokenStore));
        assert!(!registry.add("anything", None).await);
        assert_eq!(registry.purge_expired().await, 0);
    }
}
