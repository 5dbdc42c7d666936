//! In-process store with the same constraint semantics as the Postgres schema.
//!
//! Each transaction works on a snapshot taken at `begin` and buffers its writes.
//! `commit` replays the buffered writes against the latest committed state, so
//! two transactions that both passed their in-snapshot checks still cannot commit
//! a second row for a unique key: the later committer gets `UniqueViolation`.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    ApplicationStore, StoreError, StoreTx, APPLICATION_CANDIDATE_FKEY, APPLICATION_JOB_FKEY,
    APPLICATION_PAIR_KEY, CANDIDATE_EMAIL_KEY, NOTE_APPLICATION_FKEY,
};
use crate::models::{Application, ApplicationStatus, Candidate, Job, Note};

/// Operations that can be forced to fail with `StoreError::Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    InsertCandidate,
    InsertApplication,
    AppendApplicationRef,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    candidates: HashMap<Uuid, Candidate>,
    applications: HashMap<Uuid, Application>,
    jobs: HashMap<Uuid, Job>,
    notes: HashMap<Uuid, Note>,
}

#[derive(Debug, Clone)]
enum Write {
    InsertCandidate(Candidate),
    AppendApplicationRef { candidate_id: Uuid, application_id: Uuid },
    RemoveApplicationRef { candidate_id: Uuid, application_id: Uuid },
    InsertApplication(Application),
    UpdateApplicationStatus { id: Uuid, status: ApplicationStatus },
    DeleteApplication(Uuid),
    InsertJob(Job),
    UpdateJob(Job),
    DeleteJob(Uuid),
    InsertNote(Note),
    AddReaction { id: Uuid, reaction: String, member_id: Uuid },
    AppendReply { parent_id: Uuid, reply_id: Uuid },
    DeleteNotesForApplication(Uuid),
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

fn foreign_key(constraint: &str) -> StoreError {
    StoreError::ForeignKeyViolation {
        constraint: constraint.to_string(),
    }
}

impl Tables {
    fn apply(&mut self, write: &Write) -> Result<(), StoreError> {
        match write {
            Write::InsertCandidate(candidate) => {
                if self.candidates.values().any(|c| c.email == candidate.email) {
                    return Err(unique(CANDIDATE_EMAIL_KEY));
                }
                self.candidates.insert(candidate.id, candidate.clone());
            }
            Write::AppendApplicationRef {
                candidate_id,
                application_id,
            } => {
                let candidate =
                    self.candidates
                        .get_mut(candidate_id)
                        .ok_or(StoreError::NotFound {
                            entity: "candidate",
                            id: *candidate_id,
                        })?;
                if !candidate.application_ids.contains(application_id) {
                    candidate.application_ids.push(*application_id);
                }
            }
            Write::RemoveApplicationRef {
                candidate_id,
                application_id,
            } => {
                if let Some(candidate) = self.candidates.get_mut(candidate_id) {
                    candidate.application_ids.retain(|id| id != application_id);
                }
            }
            Write::InsertApplication(application) => {
                if !self.candidates.contains_key(&application.candidate_id) {
                    return Err(foreign_key(APPLICATION_CANDIDATE_FKEY));
                }
                if !self.jobs.contains_key(&application.job_id) {
                    return Err(foreign_key(APPLICATION_JOB_FKEY));
                }
                if self.applications.values().any(|a| {
                    a.candidate_id == application.candidate_id && a.job_id == application.job_id
                }) {
                    return Err(unique(APPLICATION_PAIR_KEY));
                }
                self.applications.insert(application.id, application.clone());
            }
            Write::UpdateApplicationStatus { id, status } => {
                if let Some(application) = self.applications.get_mut(id) {
                    application.status = *status;
                }
            }
            Write::DeleteApplication(id) => {
                if self.notes.values().any(|n| n.application_id == *id) {
                    return Err(foreign_key(NOTE_APPLICATION_FKEY));
                }
                self.applications.remove(id);
            }
            Write::InsertJob(job) => {
                self.jobs.insert(job.id, job.clone());
            }
            Write::UpdateJob(job) => {
                if let Some(stored) = self.jobs.get_mut(&job.id) {
                    *stored = job.clone();
                }
            }
            Write::DeleteJob(id) => {
                if self.applications.values().any(|a| a.job_id == *id) {
                    return Err(foreign_key(APPLICATION_JOB_FKEY));
                }
                self.jobs.remove(id);
            }
            Write::InsertNote(note) => {
                if !self.applications.contains_key(&note.application_id) {
                    return Err(foreign_key(NOTE_APPLICATION_FKEY));
                }
                self.notes.insert(note.id, note.clone());
            }
            Write::AddReaction {
                id,
                reaction,
                member_id,
            } => {
                if let Some(note) = self.notes.get_mut(id) {
                    note.add_reaction(reaction, *member_id);
                }
            }
            Write::AppendReply {
                parent_id,
                reply_id,
            } => {
                if let Some(parent) = self.notes.get_mut(parent_id) {
                    if !parent.reply_ids.contains(reply_id) {
                        parent.reply_ids.push(*reply_id);
                    }
                }
            }
            Write::DeleteNotesForApplication(application_id) => {
                self.notes.retain(|_, n| n.application_id != *application_id);
            }
        }
        Ok(())
    }
}

/// Shared handle to an in-memory database. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    committed: Arc<Mutex<Tables>>,
    fail_points: Arc<Mutex<HashSet<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&self, point: FailPoint) -> Result<(), StoreError> {
        let points = self
            .fail_points
            .lock()
            .map_err(|_| StoreError::Unavailable("fail point registry poisoned".to_string()))?;
        if points.contains(&point) {
            return Err(StoreError::Unavailable(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.committed
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Makes every subsequent call at `point` fail until cleared.
    pub fn fail_on(&self, point: FailPoint) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.insert(point);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.clear();
        }
    }

    pub fn committed_candidates(&self) -> Vec<Candidate> {
        self.tables()
            .map(|t| t.candidates.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn committed_applications(&self) -> Vec<Application> {
        self.tables()
            .map(|t| t.applications.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn committed_candidate_by_email(&self, email: &str) -> Option<Candidate> {
        self.committed_candidates()
            .into_iter()
            .find(|c| c.email == email)
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        self.check(FailPoint::Begin)?;
        let snapshot = self.tables()?.clone();
        // Let concurrently started transactions take their snapshots before this one proceeds.
        tokio::task::yield_now().await;
        Ok(Box::new(MemoryTx {
            store: self.clone(),
            working: snapshot,
            writes: Vec::new(),
        }))
    }
}

pub struct MemoryTx {
    store: MemoryStore,
    working: Tables,
    writes: Vec<Write>,
}

impl MemoryTx {
    fn write(&mut self, write: Write) -> Result<(), StoreError> {
        self.working.apply(&write)?;
        self.writes.push(write);
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_candidate_by_email(&mut self, email: &str) -> Result<Option<Candidate>, StoreError> {
        Ok(self
            .working
            .candidates
            .values()
            .find(|c| c.email == email)
            .cloned())
    }

    async fn get_candidate(&mut self, id: Uuid) -> Result<Option<Candidate>, StoreError> {
        Ok(self.working.candidates.get(&id).cloned())
    }

    async fn insert_candidate(&mut self, candidate: &Candidate) -> Result<(), StoreError> {
        self.store.check(FailPoint::InsertCandidate)?;
        self.write(Write::InsertCandidate(candidate.clone()))
    }

    async fn append_application_ref(
        &mut self,
        candidate_id: Uuid,
        application_id: Uuid,
    ) -> Result<(), StoreError> {
        self.store.check(FailPoint::AppendApplicationRef)?;
        self.write(Write::AppendApplicationRef {
            candidate_id,
            application_id,
        })
    }

    async fn remove_application_ref(
        &mut self,
        candidate_id: Uuid,
        application_id: Uuid,
    ) -> Result<(), StoreError> {
        self.write(Write::RemoveApplicationRef {
            candidate_id,
            application_id,
        })
    }

    async fn find_application(
        &mut self,
        candidate_id: Uuid,
        job_id: Uuid,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .working
            .applications
            .values()
            .find(|a| a.candidate_id == candidate_id && a.job_id == job_id)
            .cloned())
    }

    async fn get_application(&mut self, id: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self.working.applications.get(&id).cloned())
    }

    async fn insert_application(&mut self, application: &Application) -> Result<(), StoreError> {
        self.store.check(FailPoint::InsertApplication)?;
        self.write(Write::InsertApplication(application.clone()))
    }

    async fn applications_for_job(&mut self, job_id: Uuid) -> Result<Vec<Application>, StoreError> {
        let mut applications: Vec<_> = self
            .working
            .applications
            .values()
            .filter(|a| a.job_id == job_id)
            .cloned()
            .collect();
        applications.sort_by_key(|a| a.submitted_at);
        Ok(applications)
    }

    async fn applications_for_agency(
        &mut self,
        agency_id: Uuid,
    ) -> Result<Vec<Application>, StoreError> {
        let jobs = &self.working.jobs;
        let mut applications: Vec<_> = self
            .working
            .applications
            .values()
            .filter(|a| jobs.get(&a.job_id).is_some_and(|j| j.agency_id == agency_id))
            .cloned()
            .collect();
        applications.sort_by_key(|a| a.submitted_at);
        Ok(applications)
    }

    async fn update_application_status(
        &mut self,
        id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Option<Application>, StoreError> {
        if !self.working.applications.contains_key(&id) {
            return Ok(None);
        }
        self.write(Write::UpdateApplicationStatus { id, status })?;
        Ok(self.working.applications.get(&id).cloned())
    }

    async fn delete_application(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.write(Write::DeleteApplication(id))
    }

    async fn insert_job(&mut self, job: &Job) -> Result<(), StoreError> {
        self.write(Write::InsertJob(job.clone()))
    }

    async fn get_job(&mut self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.working.jobs.get(&id).cloned())
    }

    async fn update_job(&mut self, job: &Job) -> Result<bool, StoreError> {
        let existed = self.working.jobs.contains_key(&job.id);
        self.write(Write::UpdateJob(job.clone()))?;
        Ok(existed)
    }

    async fn jobs_for_agency(&mut self, agency_id: Uuid) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<_> = self
            .working
            .jobs
            .values()
            .filter(|j| j.agency_id == agency_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    async fn delete_job(&mut self, id: Uuid) -> Result<bool, StoreError> {
        let existed = self.working.jobs.contains_key(&id);
        self.write(Write::DeleteJob(id))?;
        Ok(existed)
    }

    async fn insert_note(&mut self, note: &Note) -> Result<(), StoreError> {
        self.write(Write::InsertNote(note.clone()))
    }

    async fn get_note(&mut self, id: Uuid) -> Result<Option<Note>, StoreError> {
        Ok(self.working.notes.get(&id).cloned())
    }

    async fn notes_for_application(&mut self, application_id: Uuid) -> Result<Vec<Note>, StoreError> {
        let mut notes: Vec<_> = self
            .working
            .notes
            .values()
            .filter(|n| n.application_id == application_id)
            .cloned()
            .collect();
        notes.sort_by_key(|n| n.created_at);
        Ok(notes)
    }

    async fn add_reaction(
        &mut self,
        note_id: Uuid,
        reaction: &str,
        member_id: Uuid,
    ) -> Result<(), StoreError> {
        self.write(Write::AddReaction {
            id: note_id,
            reaction: reaction.to_string(),
            member_id,
        })
    }

    async fn append_reply(&mut self, parent_id: Uuid, reply_id: Uuid) -> Result<(), StoreError> {
        self.write(Write::AppendReply {
            parent_id,
            reply_id,
        })
    }

    async fn delete_notes_for_application(&mut self, application_id: Uuid) -> Result<u64, StoreError> {
        let count = self
            .working
            .notes
            .values()
            .filter(|n| n.application_id == application_id)
            .count() as u64;
        self.write(Write::DeleteNotesForApplication(application_id))?;
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.store.check(FailPoint::Commit)?;
        let mut committed = self.store.tables()?;
        let mut next = committed.clone();
        for write in &self.writes {
            next.apply(write)?;
        }
        *committed = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
