//! Maps a verified external identity onto a local user ("sync on login").

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::AuthError;
use super::users::{InsertOutcome, UserStore};
use crate::models::auth::{ExternalIdentity, LocalUser, NewUser};

/// Display name used when neither the provider nor the email yields one.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub user: LocalUser,
    /// `true` when this call created the row.
    pub created: bool,
}

/// Display name for an identity: provider name, else email local part, else
/// [`FALLBACK_DISPLAY_NAME`].
pub fn display_name_for(identity: &ExternalIdentity) -> String {
    if let Some(name) = identity.display_name.as_deref().map(str::trim)
        && !name.is_empty()
    {
        return name.to_string();
    }
    identity
        .email
        .as_deref()
        .and_then(|email| email.split_once('@'))
        .map(|(local, _)| local)
        .filter(|local| !local.is_empty())
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string()
}

/// Creates or updates the local user for an external identity.
pub struct UserReconciler {
    users: Arc<dyn UserStore>,
}

impl UserReconciler {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn reconcile(&self, identity: &ExternalIdentity) -> Result<Reconciled, AuthError> {
        let email = identity
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(AuthError::NoEmail)?;
        let display_name = display_name_for(identity);

        if let Some(existing) = self.users.find_by_email(email).await? {
            return self.refresh(existing, &display_name, identity).await;
        }

        let new_user = NewUser {
            external_subject: identity.subject.clone(),
            display_name: display_name.clone(),
            email: email.to_string(),
            email_verified_at: identity.email_verified.then(Utc::now),
        };
        match self.users.insert(new_user).await? {
            InsertOutcome::Created(user) => {
                info!(user_id = user.id, subject = %identity.subject, "created local user");
                Ok(Reconciled {
                    user,
                    created: true,
                })
            }
            InsertOutcome::Conflict => {
                // Lost an insert race for the same email; the winner's row is ours.
                let existing = self.users.find_by_email(email).await?.ok_or_else(|| {
                    warn!(subject = %identity.subject, "subject already linked to a different email");
                    AuthError::IdentityConflict(format!(
                        "subject {} is linked to another user",
                        identity.subject
                    ))
                })?;
                self.refresh(existing, &display_name, identity).await
            }
        }
    }

    async fn refresh(
        &self,
        existing: LocalUser,
        display_name: &str,
        identity: &ExternalIdentity,
    ) -> Result<Reconciled, AuthError> {
        let user = if existing.display_name == display_name
            && existing.external_subject == identity.subject
        {
            existing
        } else {
            self.users
                .update_identity(existing.id, display_name, &identity.subject)
                .await
                .inspect_err(|e| {
                    if matches!(e, AuthError::IdentityConflict(_)) {
                        warn!(
                            user_id = existing.id,
                            subject = %identity.subject,
                            "email belongs to a user linked to a different subject"
                        );
                    }
                })?
        };
        Ok(Reconciled {
            user,
            created: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users::MemoryUserStore;

    fn identity(subject: &str, email: Option<&str>, name: Option<&str>) -> ExternalIdentity {
        ExternalIdentity {
            subject: subject.into(),
            email: email.map(str::to_string),
            display_name: name.map(str::to_string),
            email_verified: true,
            expires_at: None,
        }
    }

    fn reconciler() -> (Arc<MemoryUserStore>, UserReconciler) {
        let store = Arc::new(MemoryUserStore::new());
        (store.clone(), UserReconciler::new(store))
    }

    #[test]
    fn display_name_prefers_provider_then_email_then_fallback() {
        assert_eq!(
            display_name_for(&identity("s", Some("bob@example.com"), Some("Bobby"))),
            "Bobby"
        );
        assert_eq!(
            display_name_for(&identity("s", Some("bob@example.com"), Some("  "))),
            "bob"
        );
        assert_eq!(display_name_for(&identity("s", Some("no-at-sign"), None)), "User");
        assert_eq!(display_name_for(&identity("s", None, None)), "User");
    }

    #[tokio::test]
    async fn second_reconcile_reports_existing() {
        let (store, reconciler) = reconciler();
        let id = identity("s1", Some("a@example.com"), None);

        let first = reconciler.reconcile(&id).await.unwrap();
        let second = reconciler.reconcile(&id).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.user.id, second.user.id);
        assert_eq!(store.len(), 1);
        assert!(first.user.email_verified_at.is_some());
    }

    #[tokio::test]
    async fn missing_email_is_rejected_without_creating() {
        let (store, reconciler) = reconciler();
        let result = reconciler.reconcile(&identity("s1", None, Some("Nameless"))).await;

        assert!(matches!(result, Err(AuthError::NoEmail)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn existing_email_adopts_new_subject_and_name() {
        let (store, reconciler) = reconciler();
        reconciler
            .reconcile(&identity("old-sub", Some("a@example.com"), Some("Old")))
            .await
            .unwrap();

        let relinked = reconciler
            .reconcile(&identity("new-sub", Some("a@example.com"), Some("New")))
            .await
            .unwrap();

        assert!(!relinked.created);
        assert_eq!(relinked.user.external_subject, "new-sub");
        assert_eq!(relinked.user.display_name, "New");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_duplicates_resolve_to_one_row() {
        let (store, reconciler) = reconciler();
        let reconciler = Arc::new(reconciler);
        let id = identity("s1", Some("race@example.com"), None);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = reconciler.clone();
                let id = id.clone();
                tokio::spawn(async move { r.reconcile(&id).await })
            })
            .collect();

        let mut created = 0;
        for h in handles {
            if h.await.unwrap().unwrap().created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn relinking_to_a_subject_held_elsewhere_is_a_conflict() {
        let (store, reconciler) = reconciler();
        let a = reconciler
            .reconcile(&identity("s1", Some("a@example.com"), None))
            .await
            .unwrap();
        let b = reconciler
            .reconcile(&identity("s2", Some("b@example.com"), None))
            .await
            .unwrap();

        let result = reconciler
            .reconcile(&identity("s2", Some("a@example.com"), None))
            .await;

        assert!(matches!(result, Err(AuthError::IdentityConflict(_))));
        let by_s2 = store.find_by_subject("s2").await.unwrap().unwrap();
        assert_eq!(by_s2.id, b.user.id);
        let by_email = store.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, a.user.id);
        assert_eq!(by_email.external_subject, "s1");
    }

    #[tokio::test]
    async fn changed_email_for_linked_subject_is_a_conflict() {
        let (store, reconciler) = reconciler();
        reconciler
            .reconcile(&identity("s1", Some("old@example.com"), None))
            .await
            .unwrap();

        let result = reconciler
            .reconcile(&identity("s1", Some("new@example.com"), None))
            .await;

        assert!(matches!(result, Err(AuthError::IdentityConflict(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unverified_email_leaves_verified_at_empty() {
        let (_, reconciler) = reconciler();
        let mut id = identity("s1", Some("u@example.com"), None);
        id.email_verified = false;
        let result = reconciler.reconcile(&id).await.unwrap();
        assert!(result.user.email_verified_at.is_none());
    }
}
