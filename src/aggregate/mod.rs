//! Cohort, instructor and coordination roll-ups of attendance alerts.
//!
//! Every operation recomputes from the store on each call. Alerts for the
//! dashboards use [`StreakMode::BestRun`]; the live cohort alert list and its
//! export use [`StreakMode::Trailing`].

mod ranking;
mod views;

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use views::{
    AbsenteeEntry, CohortAbsenceCount, CohortAlertCount, CohortSummary, CoordinationPanel,
    CriterionBreakdown, InstructorDashboard, ProgramAlertCount,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::export::{
    self, AlertExportRow, AttendanceExportRow, ExportRow, ALERT_HEADERS, ATTENDANCE_HEADERS,
};
use crate::models::{
    AttendanceEntry, Cohort, CohortFilters, CohortStatus, Learner, Requester, Role,
};
use crate::range::{self, DateRange};
use crate::report;
use crate::risk::{AlertEngine, Criterion, LearnerAlert, StreakMode};
use crate::store::{AttendanceScope, AttendanceStore};

use ranking::{percentage, round2, tally, top_by};

/// Optional narrowing of the coordination panel. Status defaults to active cohorts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelFilters {
    pub institution_id: Option<Uuid>,
    pub program_id: Option<Uuid>,
    pub cohort_status: Option<CohortStatus>,
}

impl PanelFilters {
    fn to_cohort_filters(&self) -> CohortFilters {
        CohortFilters {
            institution_id: self.institution_id,
            program_id: self.program_id,
            status: Some(self.cohort_status.unwrap_or(CohortStatus::Active)),
            instructor_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct AttendanceTally {
    present: u32,
    excused: u32,
    unexcused: u32,
}

impl AttendanceTally {
    fn from_entries(entries: &[AttendanceEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut tally, entry| {
            if entry.record.present {
                tally.present += 1;
            } else if entry.record.excused {
                tally.excused += 1;
            } else {
                tally.unexcused += 1;
            }
            tally
        })
    }

    fn recorded(&self) -> u32 {
        self.present + self.excused + self.unexcused
    }

    fn attendance_rate(&self) -> f64 {
        percentage(self.present, self.recorded())
    }
}

/// Raw rows for one cohort within a range.
struct CohortAttendance {
    cohort: Cohort,
    learners: Vec<Learner>,
    session_count: usize,
    entries: Vec<AttendanceEntry>,
}

impl CohortAttendance {
    fn learner_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.learners.iter().map(|learner| learner.id)
    }

    /// Unexcused absences per learner, in order of first appearance in the rows.
    fn unexcused_by_learner(&self) -> Vec<AbsenteeEntry> {
        tally(
            self.entries
                .iter()
                .filter(|entry| entry.record.is_unexcused_absence())
                .map(|entry| (entry.learner_id(), 1)),
        )
        .into_iter()
        .map(|(learner_id, unexcused_count)| AbsenteeEntry {
            learner_id,
            unexcused_count,
        })
        .collect()
    }
}

/// Best-run evaluation of one cohort, the unit folded by the dashboards.
struct CohortEvaluation {
    cohort_id: Uuid,
    program_id: Uuid,
    learner_count: usize,
    session_count: usize,
    tally: AttendanceTally,
    alerts: Vec<LearnerAlert>,
}

pub struct AggregationEngine<S> {
    store: S,
    config: EngineConfig,
    alerts: AlertEngine,
}

impl<S: AttendanceStore> AggregationEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            alerts: AlertEngine::new(config.thresholds),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolve_range(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        year_month: Option<&str>,
    ) -> Result<DateRange, EngineError> {
        range::resolve(from, to, year_month)
    }

    pub fn export_csv<R: ExportRow>(
        &self,
        rows: &[R],
        headers: &[&str],
    ) -> Result<String, EngineError> {
        Ok(export::to_csv(rows, headers)?)
    }

    /// Single-learner diagnostic; returns the alert even when nothing is flagged.
    pub async fn evaluate_learner_alert(
        &self,
        learner_id: Uuid,
        range: &DateRange,
        requester: &Requester,
    ) -> Result<LearnerAlert, EngineError> {
        ensure_can_read_cohorts(requester)?;
        let learner = self
            .store
            .find_learner(learner_id)
            .await?
            .ok_or_else(|| EngineError::not_found("learner", learner_id))?;
        self.visible_cohort(learner.cohort_id, requester).await?;

        let entries = self
            .store
            .list_attendance(AttendanceScope::Learner(learner_id), range)
            .await?;
        let alert = self
            .alerts
            .evaluate(learner_id, range, &entries, StreakMode::Trailing);
        debug!(%learner_id, criterion = alert.criterion.label(), "evaluated learner alert");
        Ok(alert)
    }

    /// Live alert list of a cohort: current streaks, flagged learners only.
    pub async fn cohort_alerts(
        &self,
        cohort_id: Uuid,
        range: &DateRange,
        requester: &Requester,
    ) -> Result<Vec<LearnerAlert>, EngineError> {
        let cohort = self.visible_cohort(cohort_id, requester).await?;
        let attendance = self.load_cohort(cohort, range).await?;
        let alerts = self.alerts.evaluate_batch(
            attendance.learner_ids(),
            range,
            &attendance.entries,
            StreakMode::Trailing,
        );
        info!(%cohort_id, alerts = alerts.len(), "computed live cohort alerts");
        Ok(alerts)
    }

    pub async fn cohort_summary(
        &self,
        cohort_id: Uuid,
        range: &DateRange,
        requester: &Requester,
    ) -> Result<CohortSummary, EngineError> {
        let cohort = self.visible_cohort(cohort_id, requester).await?;
        let attendance = self.load_cohort(cohort, range).await?;
        let summary = self.summarize(&attendance, range);
        info!(
            %cohort_id,
            learners = summary.total_learners,
            sessions = summary.total_sessions,
            alerts = summary.alerts.len(),
            "computed cohort summary"
        );
        Ok(summary)
    }

    /// Portfolio view over every cohort owned by `instructor_id`.
    pub async fn instructor_dashboard(
        &self,
        instructor_id: Uuid,
        range: &DateRange,
    ) -> Result<InstructorDashboard, EngineError> {
        let cohorts = self
            .store
            .list_cohorts(&CohortFilters::for_instructor(instructor_id))
            .await?;
        let evaluations = self.evaluate_cohorts(cohorts, range).await?;

        let rates: Vec<f64> = evaluations
            .iter()
            .filter(|evaluation| evaluation.tally.recorded() > 0)
            .map(|evaluation| evaluation.tally.attendance_rate())
            .collect();
        let average_attendance_rate = if rates.is_empty() {
            0.0
        } else {
            round2(rates.iter().sum::<f64>() / rates.len() as f64)
        };

        let top_at_risk_cohorts = top_by(
            evaluations
                .iter()
                .map(|evaluation| CohortAlertCount {
                    cohort_id: evaluation.cohort_id,
                    alert_count: evaluation.alerts.len(),
                })
                .collect(),
            self.config.dashboard_ranking_limit,
            |entry| entry.alert_count,
        );

        let upcoming_agenda_count = self
            .store
            .count_upcoming_agenda(instructor_id, Utc::now())
            .await?;

        let dashboard = InstructorDashboard {
            cohort_count: evaluations.len(),
            learner_count: evaluations.iter().map(|e| e.learner_count).sum(),
            session_count: evaluations.iter().map(|e| e.session_count).sum(),
            average_attendance_rate,
            alert_count: evaluations.iter().map(|e| e.alerts.len()).sum(),
            top_at_risk_cohorts,
            upcoming_agenda_count,
        };
        info!(
            %instructor_id,
            cohorts = dashboard.cohort_count,
            alerts = dashboard.alert_count,
            "computed instructor dashboard"
        );
        Ok(dashboard)
    }

    /// Organization-wide panel, restricted to coordinators and admins.
    pub async fn coordination_panel(
        &self,
        filters: &PanelFilters,
        range: &DateRange,
        requester: &Requester,
    ) -> Result<CoordinationPanel, EngineError> {
        if !requester.role.sees_all_cohorts() {
            return Err(EngineError::Forbidden(
                "the coordination panel is limited to coordinators and admins".to_string(),
            ));
        }

        let cohorts = self.store.list_cohorts(&filters.to_cohort_filters()).await?;
        let evaluations = self.evaluate_cohorts(cohorts, range).await?;

        let alerts_by_criterion = evaluations
            .iter()
            .flat_map(|evaluation| &evaluation.alerts)
            .fold(CriterionBreakdown::default(), |mut breakdown, alert| {
                match alert.criterion {
                    Criterion::Consecutive => breakdown.consecutive_only += 1,
                    Criterion::Monthly => breakdown.monthly_only += 1,
                    Criterion::Both => breakdown.both += 1,
                    Criterion::None => {}
                }
                breakdown
            });

        let limit = self.config.panel_ranking_limit;
        let program_ranking = top_by(
            tally(
                evaluations
                    .iter()
                    .map(|evaluation| (evaluation.program_id, evaluation.alerts.len())),
            )
            .into_iter()
            .map(|(program_id, alert_count)| ProgramAlertCount {
                program_id,
                alert_count,
            })
            .collect(),
            limit,
            |entry| entry.alert_count,
        );
        let cohort_ranking = top_by(
            evaluations
                .iter()
                .map(|evaluation| CohortAbsenceCount {
                    cohort_id: evaluation.cohort_id,
                    unexcused_count: evaluation.tally.unexcused,
                })
                .collect(),
            limit,
            |entry| entry.unexcused_count,
        );

        let panel = CoordinationPanel {
            active_cohort_count: evaluations.len(),
            active_learner_count: evaluations.iter().map(|e| e.learner_count).sum(),
            alerts_by_criterion,
            program_ranking,
            cohort_ranking,
        };
        info!(
            cohorts = panel.active_cohort_count,
            alerts = panel.alerts_by_criterion.total(),
            "computed coordination panel"
        );
        Ok(panel)
    }

    /// Attendance detail rows of a cohort, ordered by session date.
    pub async fn export_cohort_attendance(
        &self,
        cohort_id: Uuid,
        range: &DateRange,
        requester: &Requester,
    ) -> Result<String, EngineError> {
        let cohort = self.visible_cohort(cohort_id, requester).await?;
        let mut attendance = self.load_cohort(cohort, range).await?;
        attendance.entries.sort_by_key(|entry| entry.session_date);

        let learners = index_learners(&attendance.learners);
        let rows: Vec<AttendanceExportRow> = attendance
            .entries
            .iter()
            .map(|entry| {
                let (doc_id, name) = learner_labels(&learners, entry.learner_id());
                AttendanceExportRow {
                    date: entry.session_date,
                    cohort_number: attendance.cohort.number.clone(),
                    learner_doc_id: doc_id.to_string(),
                    learner_name: name.to_string(),
                    present: entry.record.present,
                    excused: entry.record.is_excused_absence(),
                    reason: entry.record.reason.clone(),
                }
            })
            .collect();

        info!(%cohort_id, rows = rows.len(), "exporting cohort attendance");
        Ok(export::to_csv(&rows, &ATTENDANCE_HEADERS)?)
    }

    /// The live alert list of a cohort as CSV.
    pub async fn export_cohort_alerts(
        &self,
        cohort_id: Uuid,
        range: &DateRange,
        requester: &Requester,
    ) -> Result<String, EngineError> {
        let cohort = self.visible_cohort(cohort_id, requester).await?;
        let attendance = self.load_cohort(cohort, range).await?;
        let alerts = self.alerts.evaluate_batch(
            attendance.learner_ids(),
            range,
            &attendance.entries,
            StreakMode::Trailing,
        );

        let learners = index_learners(&attendance.learners);
        let rows: Vec<AlertExportRow> = alerts
            .iter()
            .map(|alert| {
                let (doc_id, name) = learner_labels(&learners, alert.learner_id);
                AlertExportRow::new(alert, doc_id, name)
            })
            .collect();

        info!(%cohort_id, rows = rows.len(), "exporting cohort alerts");
        Ok(export::to_csv(&rows, &ALERT_HEADERS)?)
    }

    /// Cohort summary rendered as a markdown report with learner names.
    pub async fn cohort_report(
        &self,
        cohort_id: Uuid,
        range: &DateRange,
        requester: &Requester,
    ) -> Result<String, EngineError> {
        let cohort = self.visible_cohort(cohort_id, requester).await?;
        let attendance = self.load_cohort(cohort, range).await?;
        let summary = self.summarize(&attendance, range);
        Ok(report::build_cohort_report(
            &attendance.cohort,
            range,
            &summary,
            &attendance.learners,
        ))
    }

    fn summarize(&self, attendance: &CohortAttendance, range: &DateRange) -> CohortSummary {
        let tally = AttendanceTally::from_entries(&attendance.entries);
        let top_absentees = top_by(
            attendance.unexcused_by_learner(),
            self.config.top_absentees_limit,
            |entry| entry.unexcused_count,
        );
        let alerts = self.alerts.evaluate_batch(
            attendance.learner_ids(),
            range,
            &attendance.entries,
            StreakMode::BestRun,
        );

        CohortSummary {
            cohort_id: attendance.cohort.id,
            total_learners: attendance.learners.len(),
            total_sessions: attendance.session_count,
            present_count: tally.present,
            excused_absence_count: tally.excused,
            unexcused_absence_count: tally.unexcused,
            attendance_rate: tally.attendance_rate(),
            top_absentees,
            alerts,
        }
    }

    async fn evaluate_cohorts(
        &self,
        cohorts: Vec<Cohort>,
        range: &DateRange,
    ) -> Result<Vec<CohortEvaluation>, EngineError> {
        let mut snapshots = Vec::with_capacity(cohorts.len());
        for cohort in cohorts {
            snapshots.push(self.load_cohort(cohort, range).await?);
        }

        Ok(snapshots
            .iter()
            .map(|attendance| CohortEvaluation {
                cohort_id: attendance.cohort.id,
                program_id: attendance.cohort.program_id,
                learner_count: attendance.learners.len(),
                session_count: attendance.session_count,
                tally: AttendanceTally::from_entries(&attendance.entries),
                alerts: self.alerts.evaluate_batch(
                    attendance.learner_ids(),
                    range,
                    &attendance.entries,
                    StreakMode::BestRun,
                ),
            })
            .collect())
    }

    async fn load_cohort(
        &self,
        cohort: Cohort,
        range: &DateRange,
    ) -> Result<CohortAttendance, EngineError> {
        let learners = self.store.list_learners(cohort.id).await?;
        let session_count = self.store.list_sessions(cohort.id, range).await?.len();
        let entries = self
            .store
            .list_attendance(AttendanceScope::Cohort(cohort.id), range)
            .await?;
        debug!(
            cohort_id = %cohort.id,
            learners = learners.len(),
            sessions = session_count,
            rows = entries.len(),
            "loaded cohort attendance"
        );

        Ok(CohortAttendance {
            cohort,
            learners,
            session_count,
            entries,
        })
    }

    async fn visible_cohort(
        &self,
        cohort_id: Uuid,
        requester: &Requester,
    ) -> Result<Cohort, EngineError> {
        ensure_can_read_cohorts(requester)?;
        let cohort = self
            .store
            .find_cohort(cohort_id)
            .await?
            .ok_or_else(|| EngineError::not_found("cohort", cohort_id))?;

        if requester.role == Role::Instructor && cohort.instructor_id != requester.id {
            return Err(EngineError::Forbidden(format!(
                "cohort {} is not assigned to instructor {}",
                cohort.number, requester.id
            )));
        }
        Ok(cohort)
    }
}

fn ensure_can_read_cohorts(requester: &Requester) -> Result<(), EngineError> {
    match requester.role {
        Role::Admin | Role::Coordinator | Role::Instructor => Ok(()),
        Role::Learner => Err(EngineError::Forbidden(
            "attendance reports require an instructor, coordinator or admin role".to_string(),
        )),
    }
}

fn index_learners(learners: &[Learner]) -> HashMap<Uuid, &Learner> {
    learners.iter().map(|learner| (learner.id, learner)).collect()
}

/// Document id and display name for an export row; blank when the learner is off the roster.
fn learner_labels<'a>(
    learners: &HashMap<Uuid, &'a Learner>,
    learner_id: Uuid,
) -> (&'a str, &'a str) {
    match learners.get(&learner_id) {
        Some(&learner) => (&learner.document_id, &learner.display_name),
        None => {
            warn!(%learner_id, "exporting a row for a learner missing from the cohort roster");
            ("", "")
        }
    }
}
