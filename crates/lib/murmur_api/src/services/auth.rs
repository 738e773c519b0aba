//! Auth service wiring: provider, verification cache, revocation registry,
//! user reconciliation and the session guard, built once per process.

use std::sync::Arc;

use murmur_core::auth::cache::{CacheSettings, TokenVerificationCache};
use murmur_core::auth::firebase::{FirebaseConfig, FirebaseIdentityProvider};
use murmur_core::auth::guard::{Rejection, SessionGuard};
use murmur_core::auth::provider::{IdentityProvider, ProviderKind};
use murmur_core::auth::reconcile::{Reconciled, UserReconciler};
use murmur_core::auth::revocation::{RevocationRegistry, RevocationStore};
use murmur_core::auth::service_account::{AdminCredentials, ServiceAccountKey};
use murmur_core::auth::test_provider::TestIdentityProvider;
use murmur_core::auth::users::UserStore;
use murmur_core::auth::{AuthError, fingerprint_prefix, token_expiry};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::ApiConfig;

/// Auth collaborators shared by handlers and middleware.
#[derive(Clone)]
pub struct AuthServices {
    pub provider: Arc<dyn IdentityProvider>,
    pub verifier: Arc<TokenVerificationCache>,
    pub revocations: Arc<RevocationRegistry>,
    pub reconciler: Arc<UserReconciler>,
    pub users: Arc<dyn UserStore>,
    pub guard: Arc<SessionGuard>,
}

impl AuthServices {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        revocation_store: Arc<dyn RevocationStore>,
        users: Arc<dyn UserStore>,
        cache: CacheSettings,
    ) -> Self {
        let verifier = Arc::new(TokenVerificationCache::new(provider.clone(), cache));
        let revocations = Arc::new(RevocationRegistry::new(revocation_store));
        let reconciler = Arc::new(UserReconciler::new(users.clone()));
        let guard = Arc::new(SessionGuard::new(
            revocations.clone(),
            verifier.clone(),
            reconciler.clone(),
        ));
        Self {
            provider,
            verifier,
            revocations,
            reconciler,
            users,
            guard,
        }
    }

    /// Postgres-backed services with the provider selected by `config`.
    pub fn postgres(config: &ApiConfig, pool: PgPool) -> Result<Self, AuthError> {
        use murmur_core::auth::revocation::PgRevocationStore;
        use murmur_core::auth::users::PgUserStore;

        Ok(Self::new(
            build_provider(config)?,
            Arc::new(PgRevocationStore::new(pool.clone())),
            Arc::new(PgUserStore::new(pool)),
            config.token_cache,
        ))
    }

    /// Revoke the outgoing session token and drop its cached verification.
    ///
    /// Returns whether the revocation was recorded; callers never fail on it.
    pub async fn logout(&self, token: &str) -> bool {
        self.verifier.invalidate(token);
        let recorded = self.revocations.add(token, token_expiry(token)).await;
        if !recorded {
            warn!(fingerprint = %fingerprint_prefix(token), "logout proceeding without revocation");
        }
        recorded
    }

    /// Verify a bearer token, overlay the provider's user record and
    /// reconcile it to a local user.
    pub async fn login_sync(&self, token: &str) -> Result<Reconciled, Rejection> {
        let identity = self.guard.verify(Some(token)).await?;

        let identity = match self.provider.fetch_identity(&identity.subject).await {
            Ok(profile) => identity.with_profile(profile),
            Err(e) => {
                warn!(subject = %identity.subject, error = %e, "provider user lookup failed");
                return Err(Rejection::from(e));
            }
        };

        let reconciled = self.reconciler.reconcile(&identity).await.map_err(|e| {
            warn!(subject = %identity.subject, error = %e, "login sync failed");
            Rejection::from(e)
        })?;
        info!(
            user_id = reconciled.user.id,
            created = reconciled.created,
            "login synced"
        );
        Ok(reconciled)
    }
}

/// Construct the identity provider named by `config`.
pub fn build_provider(config: &ApiConfig) -> Result<Arc<dyn IdentityProvider>, AuthError> {
    match config.identity_provider {
        ProviderKind::Firebase => {
            let (admin, key_project) = admin_credentials(config)?;
            let project_id = match config.firebase_project_id.trim() {
                "" => key_project.unwrap_or_default(),
                id => id.to_string(),
            };
            Ok(Arc::new(FirebaseIdentityProvider::new(FirebaseConfig {
                project_id,
                admin,
            })?))
        }
        ProviderKind::Test => {
            warn!("using the test identity provider; tokens are not signature-checked");
            Ok(Arc::new(TestIdentityProvider::new()))
        }
    }
}

/// Admin credentials from config: a key file wins over a static token.
/// Also returns the key's project id, if any.
fn admin_credentials(config: &ApiConfig) -> Result<(AdminCredentials, Option<String>), AuthError> {
    if let Some(path) = &config.firebase_credentials_file {
        let key = ServiceAccountKey::from_file(path)?;
        info!(client_email = %key.client_email, "using service account for Firebase admin calls");
        let project = key.project_id.clone();
        return Ok((AdminCredentials::ServiceAccount(key), project));
    }
    let admin = match &config.firebase_admin_token {
        Some(token) => AdminCredentials::Static(token.clone()),
        None => AdminCredentials::None,
    };
    Ok((admin, None))
}
