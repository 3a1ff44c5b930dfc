use crate::db::note_repository::NoteRepository;
use crate::errors::ApiError;
use crate::models::note::Note;
use crate::models::user::AuthenticatedUser;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{debug, info};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct CreateNoteRequest {
    pub content: String,
}

/// List the caller's notes, oldest first
#[utoipa::path(
    get,
    path = "/notes",
    responses(
        (status = 200, description = "Notes owned by the caller", body = [Note]),
        (status = 401, description = "Missing, invalid or expired token", body = crate::errors::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Notes"
)]
pub async fn list_notes(
    user: web::ReqData<AuthenticatedUser>,
    notes: web::Data<dyn NoteRepository>,
) -> Result<HttpResponse, ApiError> {
    let notes = notes.list_for_user(user.id).await?;
    debug!(user_id = %user.id, count = notes.len(), "Listed notes");
    Ok(HttpResponse::Ok().json(notes))
}

/// Create a note owned by the caller
#[utoipa::path(
    post,
    path = "/notes",
    request_body = CreateNoteRequest,
    responses(
        (status = 201, description = "Note created", body = Note),
        (status = 400, description = "Missing or empty content", body = crate::errors::ErrorResponse),
        (status = 401, description = "Missing, invalid or expired token", body = crate::errors::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Notes"
)]
pub async fn create_note(
    user: web::ReqData<AuthenticatedUser>,
    notes: web::Data<dyn NoteRepository>,
    payload: web::Json<CreateNoteRequest>,
) -> Result<HttpResponse, ApiError> {
    let content = payload.into_inner().content;
    if content.trim().is_empty() {
        return Err(ApiError::validation("Content is required"));
    }

    let note = notes.create(Note::new(user.id, content)).await?;

    info!(
        user_id = %user.id,
        username = %user.username,
        note_id = %note.id,
        "User created note"
    );

    Ok(HttpResponse::Created().json(note))
}
