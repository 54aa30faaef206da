use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CohortStatus {
    Active,
    Finished,
    Suspended,
}

impl CohortStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CohortStatus::Active => "ACTIVE",
            CohortStatus::Finished => "FINISHED",
            CohortStatus::Suspended => "SUSPENDED",
        }
    }
}

impl fmt::Display for CohortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CohortStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "FINISHED" => Ok(Self::Finished),
            "SUSPENDED" => Ok(Self::Suspended),
            other => Err(format!("unknown cohort status '{other}'")),
        }
    }
}

/// A cohort ("ficha"): one group of learners in one program under one instructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohort {
    pub id: Uuid,
    pub number: String,
    pub institution_id: Uuid,
    pub program_id: Uuid,
    pub instructor_id: Uuid,
    pub status: CohortStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Learner {
    pub id: Uuid,
    pub cohort_id: Uuid,
    pub display_name: String,
    pub document_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSession {
    pub id: Uuid,
    pub cohort_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub session_id: Uuid,
    pub learner_id: Uuid,
    pub present: bool,
    pub excused: bool,
    pub reason: Option<String>,
}

impl AttendanceRecord {
    pub fn is_unexcused_absence(&self) -> bool {
        !self.present && !self.excused
    }

    /// `excused` only counts for absences.
    pub fn is_excused_absence(&self) -> bool {
        !self.present && self.excused
    }
}

/// An attendance record joined with the date of its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub session_date: NaiveDate,
    pub record: AttendanceRecord,
}

impl AttendanceEntry {
    pub fn learner_id(&self) -> Uuid {
        self.record.learner_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Coordinator,
    Instructor,
    Learner,
}

impl Role {
    pub fn sees_all_cohorts(&self) -> bool {
        matches!(self, Role::Admin | Role::Coordinator)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "COORDINATOR" => Ok(Self::Coordinator),
            "INSTRUCTOR" => Ok(Self::Instructor),
            "LEARNER" => Ok(Self::Learner),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The authenticated caller on whose behalf a query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: Uuid,
    pub role: Role,
}

impl Requester {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortFilters {
    pub institution_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub status: Option<CohortStatus>,
    pub instructor_id: Option<Uuid>,
}

impl CohortFilters {
    pub fn for_instructor(instructor_id: Uuid) -> Self {
        Self {
            instructor_id: Some(instructor_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, cohort: &Cohort) -> bool {
        self.institution_id.map_or(true, |id| cohort.institution_id == id)
            && self.program_id.map_or(true, |id| cohort.program_id == id)
            && self.status.map_or(true, |status| cohort.status == status)
            && self.instructor_id.map_or(true, |id| cohort.instructor_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cohort() -> Cohort {
        Cohort {
            id: Uuid::new_v4(),
            number: "2675910".to_string(),
            institution_id: Uuid::new_v4(),
            program_id: Uuid::new_v4(),
            instructor_id: Uuid::new_v4(),
            status: CohortStatus::Active,
        }
    }

    #[test]
    fn excused_flag_is_ignored_for_present_records() {
        let record = AttendanceRecord {
            session_id: Uuid::new_v4(),
            learner_id: Uuid::new_v4(),
            present: true,
            excused: true,
            reason: None,
        };
        assert!(!record.is_excused_absence());
        assert!(!record.is_unexcused_absence());
    }

    #[test]
    fn filters_combine_conjunctively() {
        let cohort = cohort();
        assert!(CohortFilters::default().matches(&cohort));
        assert!(CohortFilters::for_instructor(cohort.instructor_id).matches(&cohort));

        let filters = CohortFilters {
            program_id: Some(cohort.program_id),
            status: Some(CohortStatus::Finished),
            ..CohortFilters::default()
        };
        assert!(!filters.matches(&cohort));
    }

    #[test]
    fn roles_and_statuses_parse_case_insensitively() {
        assert_eq!("coordinator".parse::<Role>(), Ok(Role::Coordinator));
        assert_eq!(" Active ".parse::<CohortStatus>(), Ok(CohortStatus::Active));
        assert!("guest".parse::<Role>().is_err());
    }
}
