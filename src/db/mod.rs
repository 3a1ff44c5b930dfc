pub mod memory;
pub mod note_repository;
pub mod user_repository;

use crate::config::DatabaseConfig;
use memory::MemoryStore;
use note_repository::{NoteRepository, PgNoteRepository};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use user_repository::{PgUserRepository, UserRepository};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("username already exists")]
    UsernameTaken,
    #[error("owning user does not exist")]
    UnknownUser,
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await?;
        Ok(Database { pool })
    }

    pub async fn migrate(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

/// Repository handles shared by every worker.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub notes: Arc<dyn NoteRepository>,
}

impl Repositories {
    pub fn postgres(db: Database) -> Self {
        Repositories {
            users: Arc::new(PgUserRepository::new(db.clone())),
            notes: Arc::new(PgNoteRepository::new(db)),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Repositories {
            users: store.clone(),
            notes: store,
        }
    }
}

/// Open the configured backend, applying migrations when asked to.
pub async fn connect(config: &DatabaseConfig) -> Result<Repositories, DbError> {
    if config.is_memory() {
        info!("Using in-memory store; data is lost on exit");
        return Ok(Repositories::in_memory());
    }

    let url = config
        .url()
        .map_err(|e| DbError::Sqlx(sqlx::Error::Configuration(e.into())))?;
    let db = Database::connect(&url, config.max_connections).await?;
    info!(max_connections = config.max_connections, "Database pool ready");

    if config.run_migrations {
        db.migrate().await?;
    }

    Ok(Repositories::postgres(db))
}

/// Classify constraint violations raised by PostgreSQL.
pub(crate) fn map_constraint(err: sqlx::Error) -> DbError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::UsernameTaken,
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => DbError::UnknownUser,
        _ => DbError::Sqlx(err),
    }
}
