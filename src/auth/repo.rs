use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User, UserRow};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Persistence for user records. Implementations enforce email uniqueness
/// themselves; callers never rely on a prior lookup for that.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<Option<User>>;
    async fn deactivate(&self, id: Uuid) -> anyhow::Result<Option<User>>;
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, provider, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (name, email, password_hash, provider) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.provider.as_str())
            .fetch_one(&self.db)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
                other => StoreError::Backend(anyhow::Error::new(other).context("insert user")),
            })?;
        Ok(User::try_from(row)?)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET password_hash = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(password_hash)
            .fetch_optional(&self.db)
            .await
            .context("update password")?;
        row.map(User::try_from).transpose()
    }

    async fn deactivate(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET is_active = FALSE, updated_at = now() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("deactivate user")?;
        row.map(User::try_from).transpose()
    }
}
