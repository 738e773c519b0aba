//! In-memory cache of token verification results with TTL-based expiry.
//!
//! Keyed by token fingerprint. Successful verifications live for
//! `positive_ttl` (capped at the token's own expiry), rejections for the
//! shorter `negative_ttl` so a flood of bad tokens does not hammer the
//! provider. Provider infrastructure errors are not cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use super::provider::IdentityProvider;
use super::{AuthError, token_fingerprint};
use crate::models::auth::ExternalIdentity;

/// Default TTL for successful verifications: 5 minutes.
pub const DEFAULT_POSITIVE_TTL: Duration = Duration::from_secs(300);

/// Default TTL for rejected tokens: 1 minute.
pub const DEFAULT_NEGATIVE_TTL: Duration = Duration::from_secs(60);

/// Default maximum number of cached tokens.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Cache tuning.
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub positive_ttl: Duration,
    pub negative_ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            positive_ttl: DEFAULT_POSITIVE_TTL,
            negative_ttl: DEFAULT_NEGATIVE_TTL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Verified(ExternalIdentity),
    Rejected(String),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: Outcome,
    expires_at: Instant,
}

/// Verification front for an [`IdentityProvider`].
pub struct TokenVerificationCache {
    provider: Arc<dyn IdentityProvider>,
    entries: DashMap<String, CacheEntry>,
    settings: CacheSettings,
}

impl TokenVerificationCache {
    pub fn new(provider: Arc<dyn IdentityProvider>, settings: CacheSettings) -> Self {
        Self {
            provider,
            entries: DashMap::new(),
            settings,
        }
    }

    /// Resolve a token to its identity, consulting the provider on a miss.
    pub async fn resolve(&self, token: &str) -> Result<ExternalIdentity, AuthError> {
        let key = token_fingerprint(token);

        if let Some(hit) = self.lookup(&key) {
            debug!(fingerprint = %&key[..8], "verification cache hit");
            return match hit {
                Outcome::Verified(identity) => Ok(identity),
                Outcome::Rejected(reason) => Err(AuthError::InvalidToken(reason)),
            };
        }

        match self.provider.verify(token).await {
            Ok(identity) => {
                let ttl = self.positive_ttl_for(&identity);
                self.store(key, Outcome::Verified(identity.clone()), ttl);
                Ok(identity)
            }
            Err(AuthError::InvalidToken(reason)) => {
                self.store(
                    key,
                    Outcome::Rejected(reason.clone()),
                    self.settings.negative_ttl,
                );
                Err(AuthError::InvalidToken(reason))
            }
            Err(e) => Err(e),
        }
    }

    /// Drop any cached result for `token`.
    pub fn invalidate(&self, token: &str) {
        self.entries.remove(&token_fingerprint(token));
    }

    /// Evict expired entries.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                cache.cleanup();
            }
        })
    }

    fn lookup(&self, key: &str) -> Option<Outcome> {
        let now = Instant::now();
        match self.entries.get(key) {
            None => return None,
            Some(entry) if entry.expires_at > now => return Some(entry.outcome.clone()),
            Some(_) => {}
        }
        // Expired: evict lazily.
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        None
    }

    fn store(&self, key: String, outcome: Outcome, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        if self.entries.len() >= self.settings.capacity && !self.entries.contains_key(&key) {
            self.make_room();
        }
        self.entries.insert(
            key,
            CacheEntry {
                outcome,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Sweep expired entries; if still full, evict the entry closest to expiry.
    fn make_room(&self) {
        self.cleanup();
        if self.entries.len() < self.settings.capacity {
            return;
        }
        let victim = self
            .entries
            .iter()
            .min_by_key(|e| e.expires_at)
            .map(|e| e.key().clone());
        if let Some(victim) = victim {
            self.entries.remove(&victim);
        }
    }

    /// Positive TTL, never outliving the token itself.
    fn positive_ttl_for(&self, identity: &ExternalIdentity) -> Duration {
        match identity.expires_at {
            Some(exp) => {
                let remaining = (exp - Utc::now().timestamp()).max(0) as u64;
                self.settings.positive_ttl.min(Duration::from_secs(remaining))
            }
            None => self.settings.positive_ttl,
        }
    }
}
