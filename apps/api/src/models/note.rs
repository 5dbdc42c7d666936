use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Collaboration note left by agency staff on an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub application_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub mentions: Vec<Uuid>,
    /// Reaction key (e.g. an emoji name) to the members who reacted with it.
    pub reactions: BTreeMap<String, Vec<Uuid>>,
    pub reply_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(application_id: Uuid, author_id: Uuid, content: &str, mentions: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_id,
            author_id,
            content: content.to_string(),
            mentions,
            reactions: BTreeMap::new(),
            reply_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Records a reaction with set semantics. Returns false if the member already reacted.
    pub fn add_reaction(&mut self, reaction: &str, member_id: Uuid) -> bool {
        let members = self.reactions.entry(reaction.to_string()).or_default();
        if members.contains(&member_id) {
            return false;
        }
        members.push(member_id);
        true
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub mentions: Vec<Uuid>,
    pub reactions: Json<BTreeMap<String, Vec<Uuid>>>,
    pub reply_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            application_id: row.application_id,
            author_id: row.author_id,
            content: row.content,
            mentions: row.mentions,
            reactions: row.reactions.0,
            reply_ids: row.reply_ids,
            created_at: row.created_at,
        }
    }
}
