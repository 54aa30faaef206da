use std::collections::HashMap;
use std::fmt::Write;

use uuid::Uuid;

use crate::aggregate::CohortSummary;
use crate::models::{Cohort, Learner};
use crate::range::{format_instant, DateRange};

pub fn build_cohort_report(
    cohort: &Cohort,
    range: &DateRange,
    summary: &CohortSummary,
    learners: &[Learner],
) -> String {
    let names: HashMap<Uuid, &str> = learners
        .iter()
        .map(|learner| (learner.id, learner.display_name.as_str()))
        .collect();
    let name_of = |id: &Uuid| names.get(id).copied().unwrap_or("unknown learner");

    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Report: Cohort {}", cohort.number);
    let _ = writeln!(
        output,
        "Generated for {} to {} (status {})",
        format_instant(range.from()),
        format_instant(range.to()),
        cohort.status
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Learners: {}", summary.total_learners);
    let _ = writeln!(output, "- Sessions: {}", summary.total_sessions);
    let _ = writeln!(
        output,
        "- Attendance rate: {:.2}% ({} present, {} excused, {} unexcused)",
        summary.attendance_rate,
        summary.present_count,
        summary.excused_absence_count,
        summary.unexcused_absence_count
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Unexcused Absences");

    if summary.top_absentees.is_empty() {
        let _ = writeln!(output, "No unexcused absences recorded for this window.");
    } else {
        for entry in summary.top_absentees.iter() {
            let _ = writeln!(
                output,
                "- {}: {} unexcused",
                name_of(&entry.learner_id),
                entry.unexcused_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Learners At Risk");

    if summary.alerts.is_empty() {
        let _ = writeln!(output, "No learners crossed an alert threshold.");
    } else {
        for alert in summary.alerts.iter() {
            let _ = writeln!(
                output,
                "- {} ({}): longest streak {}, {} unexcused in range",
                name_of(&alert.learner_id),
                alert.criterion.label(),
                alert.consecutive_unexcused,
                alert.monthly_unexcused
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AbsenteeEntry;
    use crate::models::CohortStatus;
    use crate::risk::{Criterion, LearnerAlert};

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
    fn report_lists_absentees_and_alerts_by_name() {
        let cohort = cohort();
        let learner = Learner {
            id: Uuid::new_v4(),
            cohort_id: cohort.id,
            display_name: "Valentina Ríos".to_string(),
            document_id: "1122334455".to_string(),
        };
        let summary = CohortSummary {
            cohort_id: cohort.id,
            total_learners: 1,
            total_sessions: 8,
            present_count: 4,
            excused_absence_count: 0,
            unexcused_absence_count: 4,
            attendance_rate: 50.0,
            top_absentees: vec![AbsenteeEntry {
                learner_id: learner.id,
                unexcused_count: 4,
            }],
            alerts: vec![LearnerAlert {
                learner_id: learner.id,
                consecutive_unexcused: 4,
                monthly_unexcused: 4,
                criterion: Criterion::Consecutive,
            }],
        };
        let range = DateRange::month(2025, 5).unwrap();

        let report = build_cohort_report(&cohort, &range, &summary, &[learner]);
        assert!(report.starts_with("# Attendance Report: Cohort 2675910"));
        assert!(report.contains("- Attendance rate: 50.00% (4 present, 0 excused, 4 unexcused)"));
        assert!(report.contains("- Valentina Ríos: 4 unexcused"));
        assert!(report.contains("- Valentina Ríos (CONSECUTIVE): longest streak 4, 4 unexcused in range"));
    }

    #[test]
    fn empty_summary_reports_quiet_window() {
        let cohort = cohort();
        let summary = CohortSummary {
            cohort_id: cohort.id,
            total_learners: 0,
            total_sessions: 0,
            present_count: 0,
            excused_absence_count: 0,
            unexcused_absence_count: 0,
            attendance_rate: 0.0,
            top_absentees: Vec::new(),
            alerts: Vec::new(),
        };
        let range = DateRange::month(2025, 5).unwrap();

        let report = build_cohort_report(&cohort, &range, &summary, &[]);
        assert!(report.contains("No unexcused absences recorded for this window."));
        assert!(report.contains("No learners crossed an alert threshold."));
    }
}
