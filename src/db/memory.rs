//! In-process store used by tests and `DATABASE_URL=memory://`.
//!
//! Mirrors the constraints of the SQL schema: unique usernames and notes
//! that must reference an existing user.

use crate::db::note_repository::NoteRepository;
use crate::db::user_repository::UserRepository;
use crate::db::DbError;
use crate::models::note::Note;
use crate::models::user::User;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    notes: RwLock<Vec<Note>>,
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: User) -> Result<User, DbError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&user.username) {
            return Err(DbError::UsernameTaken);
        }
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(username).cloned())
    }

    async fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[async_trait]
impl NoteRepository for MemoryStore {
    async fn create(&self, note: Note) -> Result<Note, DbError> {
        let owner_exists = self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .any(|u| u.id == note.user_id);
        if !owner_exists {
            return Err(DbError::UnknownUser);
        }

        self.notes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(note.clone());
        Ok(note)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Note>, DbError> {
        let notes = self.notes.read().unwrap_or_else(PoisonError::into_inner);
        let mut owned: Vec<Note> = notes
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_list_orders_by_creation_time_not_insertion() {
        let store = MemoryStore::default();
        let owner = User::new("alice".to_string(), "hash".to_string());
        UserRepository::create(&store, owner.clone()).await.unwrap();

        let base = Utc::now();
        let mut later = Note::new(owner.id, "later".to_string());
        later.created_at = base + Duration::seconds(10);
        let mut earlier = Note::new(owner.id, "earlier".to_string());
        earlier.created_at = base;

        NoteRepository::create(&store, later.clone()).await.unwrap();
        NoteRepository::create(&store, earlier.clone()).await.unwrap();

        let listed = store.list_for_user(owner.id).await.unwrap();
        assert_eq!(listed, vec![earlier, later]);
    }
}
