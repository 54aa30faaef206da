use serde::Serialize;
use uuid::Uuid;

use crate::risk::LearnerAlert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenteeEntry {
    pub learner_id: Uuid,
    pub unexcused_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortSummary {
    pub cohort_id: Uuid,
    pub total_learners: usize,
    pub total_sessions: usize,
    pub present_count: u32,
    pub excused_absence_count: u32,
    pub unexcused_absence_count: u32,
    pub attendance_rate: f64,
    pub top_absentees: Vec<AbsenteeEntry>,
    pub alerts: Vec<LearnerAlert>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortAlertCount {
    pub cohort_id: Uuid,
    pub alert_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorDashboard {
    pub cohort_count: usize,
    pub learner_count: usize,
    pub session_count: usize,
    pub average_attendance_rate: f64,
    pub alert_count: usize,
    pub top_at_risk_cohorts: Vec<CohortAlertCount>,
    pub upcoming_agenda_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriterionBreakdown {
    pub consecutive_only: usize,
    pub monthly_only: usize,
    pub both: usize,
}

impl CriterionBreakdown {
    pub fn total(&self) -> usize {
        self.consecutive_only + self.monthly_only + self.both
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramAlertCount {
    pub program_id: Uuid,
    pub alert_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortAbsenceCount {
    pub cohort_id: Uuid,
    pub unexcused_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationPanel {
    pub active_cohort_count: usize,
    pub active_learner_count: usize,
    pub alerts_by_criterion: CriterionBreakdown,
    pub program_ranking: Vec<ProgramAlertCount>,
    pub cohort_ranking: Vec<CohortAbsenceCount>,
}
