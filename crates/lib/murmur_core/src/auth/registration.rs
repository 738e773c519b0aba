//! Explicit registration of a provider account as a local user.
//!
//! If anything fails after the request has been validated, the external
//! identity is deleted so no orphaned provider account is left behind.

use tracing::{error, info};

use super::AuthError;
use super::provider::{IdentityProvider, delete_identity_best_effort};
use super::users::{InsertOutcome, UserStore};
use crate::models::auth::{LocalUser, NewUser};

/// Registration input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub subject: String,
    pub display_name: String,
    pub email: String,
}

/// Register a new local user for an existing provider account.
pub async fn register(
    provider: &dyn IdentityProvider,
    users: &dyn UserStore,
    registration: Registration,
) -> Result<LocalUser, AuthError> {
    if users.find_by_subject(&registration.subject).await?.is_some() {
        return Err(AuthError::Validation(
            "this provider account is already registered".into(),
        ));
    }
    if users.find_by_email(&registration.email).await?.is_some() {
        return Err(AuthError::Validation("this email is already registered".into()));
    }

    let subject = registration.subject.clone();
    match create(provider, users, registration).await {
        Ok(user) => {
            info!(user_id = user.id, subject = %user.external_subject, "user registered");
            Ok(user)
        }
        Err(e) => {
            error!(subject = %subject, error = %e, "user registration failed");
            delete_identity_best_effort(provider, &subject).await;
            Err(e)
        }
    }
}

async fn create(
    provider: &dyn IdentityProvider,
    users: &dyn UserStore,
    registration: Registration,
) -> Result<LocalUser, AuthError> {
    let remote = provider.fetch_identity(&registration.subject).await?;
    let new_user = NewUser {
        external_subject: registration.subject,
        display_name: registration.display_name,
        email: registration.email,
        email_verified_at: remote.email_verified.then(chrono::Utc::now),
    };
    match users.insert(new_user).await? {
        InsertOutcome::Created(user) => Ok(user),
        InsertOutcome::Conflict => Err(AuthError::Validation(
            "email or provider account is already registered".into(),
        )),
    }
}
