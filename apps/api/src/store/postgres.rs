use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{ApplicationStore, StoreError, StoreTx};
use crate::models::application::ApplicationRow;
use crate::models::job::JobRow;
use crate::models::note::NoteRow;
use crate::models::{Application, ApplicationStatus, Candidate, Job, Note};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => return StoreError::UniqueViolation { constraint },
                Some(FOREIGN_KEY_VIOLATION) => {
                    return StoreError::ForeignKeyViolation { constraint }
                }
                _ => {}
            }
        }
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

/// PostgreSQL-backed store. Uniqueness is enforced by the schema constraints.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// Open Postgres transaction. Dropping it without commit issues a ROLLBACK.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_candidate_by_email(&mut self, email: &str) -> Result<Option<Candidate>, StoreError> {
        Ok(
            sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE email = $1")
                .bind(email)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn get_candidate(&mut self, id: Uuid) -> Result<Option<Candidate>, StoreError> {
        Ok(
            sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn insert_candidate(&mut self, candidate: &Candidate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO candidates
                (id, email, full_name, phone_number, resume_url, linkedin_profile,
                 application_ids, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(candidate.id)
        .bind(&candidate.email)
        .bind(&candidate.full_name)
        .bind(&candidate.phone_number)
        .bind(&candidate.resume_url)
        .bind(&candidate.linkedin_profile)
        .bind(&candidate.application_ids)
        .bind(candidate.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_application_ref(
        &mut self,
        candidate_id: Uuid,
        application_id: Uuid,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE candidates
            SET application_ids = array_append(application_ids, $2)
            WHERE id = $1 AND NOT ($2 = ANY(application_ids))
            "#,
        )
        .bind(candidate_id)
        .bind(application_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 && self.get_candidate(candidate_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "candidate",
                id: candidate_id,
            });
        }
        Ok(())
    }

    async fn remove_application_ref(
        &mut self,
        candidate_id: Uuid,
        application_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE candidates SET application_ids = array_remove(application_ids, $2) WHERE id = $1",
        )
        .bind(candidate_id)
        .bind(application_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_application(
        &mut self,
        candidate_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<Application>, StoreError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE candidate_id = $1 AND job_id = $2",
        )
        .bind(candidate_id)
        .bind(job_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Application::try_from).transpose()?)
    }

    async fn get_application(&mut self, id: Uuid) -> Result<Option<Application>, StoreError> {
        let row = sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Application::try_from).transpose()?)
    }

    async fn insert_application(&mut self, application: &Application) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO applications
                (id, candidate_id, job_id, status, resume_url, cover_letter,
                 additional_data, answers, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(application.id)
        .bind(application.candidate_id)
        .bind(application.job_id)
        .bind(application.status.as_str())
        .bind(&application.resume_url)
        .bind(&application.cover_letter)
        .bind(Json(&application.additional_data))
        .bind(Json(&application.answers))
        .bind(application.submitted_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn applications_for_job(&mut self, job_id: Uuid) -> Result<Vec<Application>, StoreError> {
        let rows = sqlx::query_as::<_, ApplicationRow>(
            "SELECT * FROM applications WHERE job_id = $1 ORDER BY submitted_at ASC",
        )
        .bind(job_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows
            .into_iter()
            .map(Application::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn applications_for_agency(
        &mut self,
        agency_id: Uuid,
    ) -> Result<Vec<Application>, StoreError> {
        let rows = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT a.* FROM applications a
            JOIN jobs j ON j.id = a.job_id
            WHERE j.agency_id = $1
            ORDER BY a.submitted_at ASC
            "#,
        )
        .bind(agency_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows
            .into_iter()
            .map(Application::try_from)
            .collect::<Result<_, _>>()?)
    }

    async fn update_application_status(
        &mut self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, StoreError> {
        let row = sqlx::query_as::<_, ApplicationRow>(
            "UPDATE applications SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Application::try_from).transpose()?)
    }

    async fn delete_application(&mut self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_job(&mut self, job: &Job) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, agency_id, title, company_name, department, description,
                 skills, status, questions, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id)
        .bind(job.agency_id)
        .bind(&job.title)
        .bind(&job.company_name)
        .bind(&job.department)
        .bind(&job.description)
        .bind(&job.skills)
        .bind(job.status.as_str())
        .bind(Json(&job.questions))
        .bind(job.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_job(&mut self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Job::try_from).transpose()?)
    }

    async fn update_job(&mut self, job: &Job) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET title = $2, department = $3, description = $4,
                skills = $5, status = $6, questions = $7
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(&job.title)
        .bind(&job.department)
        .bind(&job.description)
        .bind(&job.skills)
        .bind(job.status.as_str())
        .bind(Json(&job.questions))
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn jobs_for_agency(&mut self, agency_id: Uuid) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE agency_id = $1 ORDER BY created_at ASC",
        )
        .bind(agency_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Job::try_from).collect::<Result<_, _>>()?)
    }

    async fn delete_job(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_note(&mut self, note: &Note) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notes
                (id, application_id, author_id, content, mentions, reactions, reply_ids, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(note.id)
        .bind(note.application_id)
        .bind(note.author_id)
        .bind(&note.content)
        .bind(&note.mentions)
        .bind(Json(&note.reactions))
        .bind(&note.reply_ids)
        .bind(note.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    /// Locks the note row until the transaction ends.
    async fn get_note(&mut self, id: Uuid) -> Result<Option<Note>, StoreError> {
        let row = sqlx::query_as::<_, NoteRow>("SELECT * FROM notes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Note::from))
    }

    async fn notes_for_application(&mut self, application_id: Uuid) -> Result<Vec<Note>, StoreError> {
        let rows = sqlx::query_as::<_, NoteRow>(
            "SELECT * FROM notes WHERE application_id = $1 ORDER BY created_at ASC",
        )
        .bind(application_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Note::from).collect())
    }

    async fn add_reaction(
        &mut self,
        note_id: Uuid,
        reaction: &str,
        member_id: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE notes
            SET reactions = jsonb_set(
                reactions,
                ARRAY[$2::text],
                COALESCE(reactions -> $2::text, '[]'::jsonb) || jsonb_build_array($3::text)
            )
            WHERE id = $1
              AND NOT COALESCE(reactions -> $2::text, '[]'::jsonb) @> jsonb_build_array($3::text)
            "#,
        )
        .bind(note_id)
        .bind(reaction)
        .bind(member_id.to_string())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn append_reply(&mut self, parent_id: Uuid, reply_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE notes
            SET reply_ids = array_append(reply_ids, $2)
            WHERE id = $1 AND NOT ($2 = ANY(reply_ids))
            "#,
        )
        .bind(parent_id)
        .bind(reply_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_notes_for_application(&mut self, application_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM notes WHERE application_id = $1")
            .bind(application_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
