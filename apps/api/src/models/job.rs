use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Open,
    Closed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Closed => "closed",
        }
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(JobStatus::Open),
            "closed" => Ok(JobStatus::Closed),
            other => Err(UnknownVariant {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }
}

/// Screening question attached to a job posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQuestion {
    pub id: String,
    pub question: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub title: String,
    pub company_name: String,
    pub department: String,
    pub description: String,
    pub skills: Vec<String>,
    pub status: JobStatus,
    pub questions: Vec<JobQuestion>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn question(&self, id: &str) -> Option<&JobQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub agency_id: Uuid,
    pub title: String,
    pub company_name: String,
    pub department: String,
    pub description: String,
    pub skills: Vec<String>,
    pub status: String,
    pub questions: Json<Vec<JobQuestion>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = UnknownVariant;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            agency_id: row.agency_id,
            title: row.title,
            company_name: row.company_name,
            department: row.department,
            description: row.description,
            skills: row.skills,
            status: row.status.parse()?,
            questions: row.questions.0,
            created_at: row.created_at,
        })
    }
}
