//! Staff collaboration notes on applications: comments, reactions, threaded replies.

pub mod handlers;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::Note;
use crate::store::{ApplicationStore, StoreError, NOTE_APPLICATION_FKEY};

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("note content must not be empty")]
    EmptyContent,

    #[error("application {0} not found")]
    ApplicationNotFound(Uuid),

    #[error("note {0} not found")]
    NoteNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn translate(err: StoreError, application_id: Uuid) -> NoteError {
    match &err {
        StoreError::ForeignKeyViolation { constraint } if constraint == NOTE_APPLICATION_FKEY => {
            NoteError::ApplicationNotFound(application_id)
        }
        _ => NoteError::Store(err),
    }
}

pub async fn add_note(
    store: &dyn ApplicationStore,
    application_id: Uuid,
    author_id: Uuid,
    content: &str,
    mentions: Vec<Uuid>,
) -> Result<Note, NoteError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(NoteError::EmptyContent);
    }

    let mut tx = store.begin().await?;
    if tx.get_application(application_id).await?.is_none() {
        return Err(NoteError::ApplicationNotFound(application_id));
    }
    let note = Note::new(application_id, author_id, content, mentions);
    tx.insert_note(&note)
        .await
        .map_err(|e| translate(e, application_id))?;
    tx.commit().await.map_err(|e| translate(e, application_id))?;

    info!(note_id = %note.id, %application_id, "Note added");
    Ok(note)
}

/// Adds `member_id` under `reaction`. Reacting twice with the same key is a no-op.
pub async fn add_reaction(
    store: &dyn ApplicationStore,
    note_id: Uuid,
    member_id: Uuid,
    reaction: &str,
) -> Result<Note, NoteError> {
    let mut tx = store.begin().await?;
    let mut note = tx
        .get_note(note_id)
        .await?
        .ok_or(NoteError::NoteNotFound(note_id))?;

    if note.add_reaction(reaction, member_id) {
        tx.add_reaction(note_id, reaction, member_id).await?;
        tx.commit().await?;
    } else {
        debug!(%note_id, %member_id, reaction, "Reaction already present");
        tx.rollback().await?;
    }
    Ok(note)
}

/// Inserts the reply and links it from its parent in one transaction.
pub async fn add_reply(
    store: &dyn ApplicationStore,
    parent_id: Uuid,
    author_id: Uuid,
    content: &str,
    mentions: Vec<Uuid>,
) -> Result<Note, NoteError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(NoteError::EmptyContent);
    }

    let mut tx = store.begin().await?;
    let parent = tx
        .get_note(parent_id)
        .await?
        .ok_or(NoteError::NoteNotFound(parent_id))?;

    let reply = Note::new(parent.application_id, author_id, content, mentions);
    tx.insert_note(&reply)
        .await
        .map_err(|e| translate(e, parent.application_id))?;
    tx.append_reply(parent_id, reply.id).await?;
    tx.commit().await?;

    info!(note_id = %reply.id, %parent_id, "Reply added");
    Ok(reply)
}

pub async fn notes_for_application(
    store: &dyn ApplicationStore,
    application_id: Uuid,
) -> Result<Vec<Note>, NoteError> {
    let mut tx = store.begin().await?;
    if tx.get_application(application_id).await?.is_none() {
        return Err(NoteError::ApplicationNotFound(application_id));
    }
    let notes = tx.notes_for_application(application_id).await?;
    tx.commit().await?;
    Ok(notes)
}
