//! Local user storage.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;

use super::AuthError;
use crate::models::auth::{LocalUser, NewUser};

/// Result of an insert guarded by the unique email/subject constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(LocalUser),
    /// Another row already holds the email or subject.
    Conflict,
}

/// Storage for [`LocalUser`] rows.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalUser>, AuthError>;

    async fn find_by_subject(&self, subject: &str) -> Result<Option<LocalUser>, AuthError>;

    /// Insert unless the email or subject is taken.
    async fn insert(&self, user: NewUser) -> Result<InsertOutcome, AuthError>;

    /// Update the display name and external subject of an existing user.
    ///
    /// Fails with [`AuthError::IdentityConflict`] when another user already
    /// holds `subject`.
    async fn update_identity(
        &self,
        id: i64,
        display_name: &str,
        subject: &str,
    ) -> Result<LocalUser, AuthError>;
}

// =============================================================================
// PostgreSQL store
// =============================================================================

type UserRow = (
    i64,
    String,
    String,
    String,
    Option<chrono::DateTime<chrono::Utc>>,
);

fn user_from_row((id, external_subject, display_name, email, email_verified_at): UserRow) -> LocalUser {
    LocalUser {
        id,
        external_subject,
        display_name,
        email,
        email_verified_at,
    }
}

/// User store on the `users` table.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalUser>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, firebase_uid, name, email, email_verified_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<LocalUser>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, firebase_uid, name, email, email_verified_at FROM users WHERE firebase_uid = $1",
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    async fn insert(&self, user: NewUser) -> Result<InsertOutcome, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (firebase_uid, name, email, email_verified_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING \
             RETURNING id, firebase_uid, name, email, email_verified_at",
        )
        .bind(&user.external_subject)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(user.email_verified_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some(row) => InsertOutcome::Created(user_from_row(row)),
            None => InsertOutcome::Conflict,
        })
    }

    async fn update_identity(
        &self,
        id: i64,
        display_name: &str,
        subject: &str,
    ) -> Result<LocalUser, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET name = $2, firebase_uid = $3, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, firebase_uid, name, email, email_verified_at",
        )
        .bind(id)
        .bind(display_name)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e
                && db.is_unique_violation()
            {
                return AuthError::IdentityConflict(format!(
                    "subject {subject} is linked to another user"
                ));
            }
            AuthError::Db(e)
        })?;
        row.map(user_from_row)
            .ok_or_else(|| AuthError::NotFound(format!("user {id}")))
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local user store with the same uniqueness rules as the table.
#[derive(Debug)]
pub struct MemoryUserStore {
    by_id: DashMap<i64, LocalUser>,
    next_id: AtomicI64,
    /// Serialises writes to the unique columns the way a unique index would.
    insert_lock: tokio::sync::Mutex<()>,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self {
            by_id: DashMap::new(),
            next_id: AtomicI64::new(1),
            insert_lock: tokio::sync::Mutex::new(()),
        }
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn find(&self, pred: impl Fn(&LocalUser) -> bool) -> Option<LocalUser> {
        self.by_id
            .iter()
            .find(|u| pred(u.value()))
            .map(|u| u.value().clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalUser>, AuthError> {
        Ok(self.find(|u| u.email == email))
    }

    async fn find_by_subject(&self, subject: &str) -> Result<Option<LocalUser>, AuthError> {
        Ok(self.find(|u| u.external_subject == subject))
    }

    async fn insert(&self, user: NewUser) -> Result<InsertOutcome, AuthError> {
        let _guard = self.insert_lock.lock().await;

        if self
            .find(|u| u.email == user.email || u.external_subject == user.external_subject)
            .is_some()
        {
            return Ok(InsertOutcome::Conflict);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let created = LocalUser {
            id,
            external_subject: user.external_subject,
            display_name: user.display_name,
            email: user.email,
            email_verified_at: user.email_verified_at,
        };
        self.by_id.insert(id, created.clone());
        Ok(InsertOutcome::Created(created))
    }

    async fn update_identity(
        &self,
        id: i64,
        display_name: &str,
        subject: &str,
    ) -> Result<LocalUser, AuthError> {
        let _guard = self.insert_lock.lock().await;

        if self
            .find(|u| u.id != id && u.external_subject == subject)
            .is_some()
        {
            return Err(AuthError::IdentityConflict(format!(
                "subject {subject} is linked to another user"
            )));
        }
        let mut user = self
            .by_id
            .get_mut(&id)
            .ok_or_else(|| AuthError::NotFound(format!("user {id}")))?;
        user.display_name = display_name.to_string();
        user.external_subject = subject.to_string();
        Ok(user.clone())
    }
}
