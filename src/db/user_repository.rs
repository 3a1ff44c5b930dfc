use crate::db::{map_constraint, Database, DbError};
use crate::models::user::User;
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user; `DbError::UsernameTaken` if the name is in use.
    async fn create(&self, user: User) -> Result<User, DbError>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DbError>;

    /// Cheap round trip used by the health endpoint.
    async fn ping(&self) -> Result<(), DbError>;
}

pub struct PgUserRepository {
    db: Database,
}

impl PgUserRepository {
    pub fn new(db: Database) -> Self {
        PgUserRepository { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: User) -> Result<User, DbError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, password_hash, created_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, username, password_hash, created_at",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .fetch_one(&self.db.pool)
        .await
        .map_err(map_constraint)?;

        info!(user_id = %user.id, username = %user.username, "User created in database");

        Ok(user)
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(user)
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.db.pool).await?;
        Ok(())
    }
}
