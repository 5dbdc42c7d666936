use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::Note;
use crate::notes::{add_note, add_reaction, add_reply, notes_for_application};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct NoteRequest {
    pub author_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub mentions: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct ReactionRequest {
    pub member_id: Uuid,
    pub reaction: String,
}

/// POST /api/v1/applications/:id/notes
pub async fn handle_add_note(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Json(req): Json<NoteRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let note = add_note(
        state.store.as_ref(),
        application_id,
        req.author_id,
        &req.content,
        req.mentions,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /api/v1/applications/:id/notes
pub async fn handle_list_notes(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<Vec<Note>>, AppError> {
    Ok(Json(
        notes_for_application(state.store.as_ref(), application_id).await?,
    ))
}

/// POST /api/v1/notes/:id/reactions
pub async fn handle_add_reaction(
    State(state): State<AppState>,
    Path(note_id): Path<Uuid>,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<Note>, AppError> {
    if req.reaction.trim().is_empty() {
        return Err(AppError::Validation("reaction is required".to_string()));
    }
    let note = add_reaction(
        state.store.as_ref(),
        note_id,
        req.member_id,
        req.reaction.trim(),
    )
    .await?;
    Ok(Json(note))
}

/// POST /api/v1/notes/:id/replies
pub async fn handle_add_reply(
    State(state): State<AppState>,
    Path(parent_id): Path<Uuid>,
    Json(req): Json<NoteRequest>,
) -> Result<(StatusCode, Json<Note>), AppError> {
    let reply = add_reply(
        state.store.as_ref(),
        parent_id,
        req.author_id,
        &req.content,
        req.mentions,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}
