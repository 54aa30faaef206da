use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    AttendanceEntry, AttendanceRecord, ClassSession, Cohort, CohortFilters, CohortStatus, Learner,
};
use crate::range::DateRange;
use crate::store::{AttendanceScope, AttendanceStore};

const COHORT_COLUMNS: &str =
    "SELECT c.id, c.number, c.institution_id, c.program_id, c.instructor_id, c.status \
     FROM academic_records.cohorts c";

const LEARNER_COLUMNS: &str = "SELECT l.id, l.cohort_id, l.display_name, l.document_id \
     FROM academic_records.learners l";

/// Read-only adapter over the academic records schema.
#[derive(Debug, Clone)]
pub struct PgAttendanceStore {
    pool: PgPool,
}

impl PgAttendanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

impl AttendanceStore for PgAttendanceStore {
    async fn list_cohorts(&self, filters: &CohortFilters) -> Result<Vec<Cohort>, StoreError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(COHORT_COLUMNS);
        query.push(" WHERE TRUE");
        if let Some(id) = filters.institution_id {
            query.push(" AND c.institution_id = ").push_bind(id);
        }
        if let Some(id) = filters.program_id {
            query.push(" AND c.program_id = ").push_bind(id);
        }
        if let Some(status) = filters.status {
            query.push(" AND c.status = ").push_bind(status.as_str());
        }
        if let Some(id) = filters.instructor_id {
            query.push(" AND c.instructor_id = ").push_bind(id);
        }
        query.push(" ORDER BY c.number");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(cohort_from_row).collect()
    }

    async fn find_cohort(&self, cohort_id: Uuid) -> Result<Option<Cohort>, StoreError> {
        let row = sqlx::query(&format!("{COHORT_COLUMNS} WHERE c.id = $1"))
            .bind(cohort_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(cohort_from_row).transpose()
    }

    async fn find_learner(&self, learner_id: Uuid) -> Result<Option<Learner>, StoreError> {
        let row = sqlx::query(&format!("{LEARNER_COLUMNS} WHERE l.id = $1"))
            .bind(learner_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(learner_from_row))
    }

    async fn list_learners(&self, cohort_id: Uuid) -> Result<Vec<Learner>, StoreError> {
        let rows = sqlx::query(&format!(
            "{LEARNER_COLUMNS} WHERE l.cohort_id = $1 ORDER BY l.display_name"
        ))
        .bind(cohort_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(learner_from_row).collect())
    }

    async fn list_sessions(
        &self,
        cohort_id: Uuid,
        range: &DateRange,
    ) -> Result<Vec<ClassSession>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.cohort_id, s.session_date
            FROM academic_records.class_sessions s
            WHERE s.cohort_id = $1
              AND (s.session_date::timestamp AT TIME ZONE 'UTC') BETWEEN $2 AND $3
            ORDER BY s.session_date
            "#,
        )
        .bind(cohort_id)
        .bind(range.from())
        .bind(range.to())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ClassSession {
                id: row.get("id"),
                cohort_id: row.get("cohort_id"),
                date: row.get("session_date"),
            })
            .collect())
    }

    async fn list_attendance(
        &self,
        scope: AttendanceScope,
        range: &DateRange,
    ) -> Result<Vec<AttendanceEntry>, StoreError> {
        let scope_clause = match scope {
            AttendanceScope::Cohort(_) => "s.cohort_id = $1",
            AttendanceScope::Learner(_) => "a.learner_id = $1",
        };
        let scope_id = match scope {
            AttendanceScope::Cohort(id) | AttendanceScope::Learner(id) => id,
        };

        let query = format!(
            "SELECT s.session_date, a.session_id, a.learner_id, a.present, a.excused, a.reason \
             FROM academic_records.attendance_records a \
             JOIN academic_records.class_sessions s ON s.id = a.session_id \
             WHERE {scope_clause} \
             AND (s.session_date::timestamp AT TIME ZONE 'UTC') BETWEEN $2 AND $3 \
             ORDER BY s.session_date, a.learner_id"
        );

        let rows = sqlx::query(&query)
            .bind(scope_id)
            .bind(range.from())
            .bind(range.to())
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let session_date: NaiveDate = row.get("session_date");
            entries.push(AttendanceEntry {
                session_date,
                record: AttendanceRecord {
                    session_id: row.get("session_id"),
                    learner_id: row.get("learner_id"),
                    present: row.get("present"),
                    excused: row.get("excused"),
                    reason: row.get("reason"),
                },
            });
        }

        Ok(entries)
    }

    async fn count_upcoming_agenda(
        &self,
        instructor_id: Uuid,
        after: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query(
            "SELECT COUNT(*) AS upcoming FROM academic_records.agenda_items \
             WHERE instructor_id = $1 AND starts_at >= $2",
        )
        .bind(instructor_id)
        .bind(after)
        .fetch_one(&self.pool)
        .await?
        .get("upcoming");

        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn cohort_from_row(row: &PgRow) -> Result<Cohort, StoreError> {
    let status: String = row.get("status");
    let status = status
        .parse::<CohortStatus>()
        .map_err(|_| StoreError::Decode {
            column: "cohorts.status",
            value: status.clone(),
        })?;

    Ok(Cohort {
        id: row.get("id"),
        number: row.get("number"),
        institution_id: row.get("institution_id"),
        program_id: row.get("program_id"),
        instructor_id: row.get("instructor_id"),
        status,
    })
}

fn learner_from_row(row: &PgRow) -> Learner {
    Learner {
        id: row.get("id"),
        cohort_id: row.get("cohort_id"),
        display_name: row.get("display_name"),
        document_id: row.get("document_id"),
    }
}
