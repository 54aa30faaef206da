use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    AttendanceEntry, AttendanceRecord, ClassSession, Cohort, CohortFilters, Learner,
};
use crate::range::DateRange;

/// Which learners an attendance query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceScope {
    Cohort(Uuid),
    Learner(Uuid),
}

/// Read access to the records owned by the academic CRUD service.
///
/// Implementations return rows in their natural order; rankings use that
/// order to break ties.
#[allow(async_fn_in_trait)]
pub trait AttendanceStore {
    async fn list_cohorts(&self, filters: &CohortFilters) -> Result<Vec<Cohort>, StoreError>;

    async fn find_cohort(&self, cohort_id: Uuid) -> Result<Option<Cohort>, StoreError>;

    async fn find_learner(&self, learner_id: Uuid) -> Result<Option<Learner>, StoreError>;

    async fn list_learners(&self, cohort_id: Uuid) -> Result<Vec<Learner>, StoreError>;

    async fn list_sessions(
        &self,
        cohort_id: Uuid,
        range: &DateRange,
    ) -> Result<Vec<ClassSession>, StoreError>;

    /// Attendance rows joined with their session dates, limited to `range`.
    async fn list_attendance(
        &self,
        scope: AttendanceScope,
        range: &DateRange,
    ) -> Result<Vec<AttendanceEntry>, StoreError>;

    /// Calendar items for the instructor starting at or after `after`.
    async fn count_upcoming_agenda(
        &self,
        instructor_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgendaItem {
    pub instructor_id: Uuid,
    pub starts_at: DateTime<Utc>,
}

/// Vector-backed store; insertion order is the natural row order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    cohorts: Vec<Cohort>,
    learners: Vec<Learner>,
    sessions: Vec<ClassSession>,
    attendance: Vec<AttendanceRecord>,
    agenda: Vec<AgendaItem>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cohort(&mut self, cohort: Cohort) {
        self.cohorts.push(cohort);
    }

    pub fn add_learner(&mut self, learner: Learner) {
        self.learners.push(learner);
    }

    pub fn add_session(&mut self, session: ClassSession) {
        self.sessions.push(session);
    }

    /// Inserts or replaces the record for the (session, learner) pair.
    pub fn record_attendance(&mut self, record: AttendanceRecord) {
        match self.attendance.iter_mut().find(|existing| {
            existing.session_id == record.session_id && existing.learner_id == record.learner_id
        }) {
            Some(existing) => *existing = record,
            None => self.attendance.push(record),
        }
    }

    pub fn add_agenda_item(&mut self, item: AgendaItem) {
        self.agenda.push(item);
    }

    fn session(&self, session_id: Uuid) -> Option<&ClassSession> {
        self.sessions.iter().find(|session| session.id == session_id)
    }
}

impl AttendanceStore for InMemoryStore {
    async fn list_cohorts(&self, filters: &CohortFilters) -> Result<Vec<Cohort>, StoreError> {
        Ok(self
            .cohorts
            .iter()
            .filter(|cohort| filters.matches(cohort))
            .cloned()
            .collect())
    }

    async fn find_cohort(&self, cohort_id: Uuid) -> Result<Option<Cohort>, StoreError> {
        Ok(self.cohorts.iter().find(|cohort| cohort.id == cohort_id).cloned())
    }

    async fn find_learner(&self, learner_id: Uuid) -> Result<Option<Learner>, StoreError> {
        Ok(self.learners.iter().find(|learner| learner.id == learner_id).cloned())
    }

    async fn list_learners(&self, cohort_id: Uuid) -> Result<Vec<Learner>, StoreError> {
        Ok(self
            .learners
            .iter()
            .filter(|learner| learner.cohort_id == cohort_id)
            .cloned()
            .collect())
    }

    async fn list_sessions(
        &self,
        cohort_id: Uuid,
        range: &DateRange,
    ) -> Result<Vec<ClassSession>, StoreError> {
        Ok(self
            .sessions
            .iter()
            .filter(|session| session.cohort_id == cohort_id && range.contains_date(session.date))
            .cloned()
            .collect())
    }

    async fn list_attendance(
        &self,
        scope: AttendanceScope,
        range: &DateRange,
    ) -> Result<Vec<AttendanceEntry>, StoreError> {
        let entries = self
            .attendance
            .iter()
            .filter_map(|record| {
                let session = self.session(record.session_id)?;
                // Cohort scope follows the session, not the learner's current cohort.
                let in_scope = match scope {
                    AttendanceScope::Learner(learner_id) => record.learner_id == learner_id,
                    AttendanceScope::Cohort(cohort_id) => session.cohort_id == cohort_id,
                };
                (in_scope && range.contains_date(session.date)).then(|| AttendanceEntry {
                    session_date: session.date,
                    record: record.clone(),
                })
            })
            .collect();
        Ok(entries)
    }

    async fn count_upcoming_agenda(
        &self,
        instructor_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(self
            .agenda
            .iter()
            .filter(|item| item.instructor_id == instructor_id && item.starts_at >= after)
            .count())
    }
}
