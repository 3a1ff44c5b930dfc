use crate::db::{map_constraint, Database, DbError};
use crate::models::note::Note;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a note; `DbError::UnknownUser` if its owner does not exist.
    async fn create(&self, note: Note) -> Result<Note, DbError>;

    /// Notes owned by `user_id`, oldest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Note>, DbError>;
}

pub struct PgNoteRepository {
    db: Database,
}

impl PgNoteRepository {
    pub fn new(db: Database) -> Self {
        PgNoteRepository { db }
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn create(&self, note: Note) -> Result<Note, DbError> {
        let note = sqlx::query_as::<_, Note>(
            "INSERT INTO notes (id, user_id, content, created_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, content, created_at",
        )
        .bind(note.id)
        .bind(note.user_id)
        .bind(&note.content)
        .bind(note.created_at)
        .fetch_one(&self.db.pool)
        .await
        .map_err(map_constraint)?;

        info!(note_id = %note.id, user_id = %note.user_id, "Note created in database");

        Ok(note)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Note>, DbError> {
        let notes = sqlx::query_as::<_, Note>(
            "SELECT id, user_id, content, created_at FROM notes \
             WHERE user_id = $1 \
             ORDER BY created_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(notes)
    }
}
