use attendance_risk_engine::aggregate::PanelFilters;
use attendance_risk_engine::config::EngineConfig;
use attendance_risk_engine::models::{
    AttendanceEntry, AttendanceRecord, ClassSession, Cohort, CohortStatus, Learner, Requester,
    Role,
};
use attendance_risk_engine::range::{format_instant, resolve};
use attendance_risk_engine::store::InMemoryStore;
use attendance_risk_engine::{
    AggregationEngine, AlertEngine, Criterion, DateRange, EngineError, StreakMode,
};
use chrono::NaiveDate;
use uuid::Uuid;

fn january_day(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).expect("valid january date")
}

fn january() -> DateRange {
    resolve(None, None, Some("2025-01")).expect("valid month")
}

#[test]
fn month_parameter_spans_the_whole_month() {
    let range = resolve(None, None, Some("2024-02")).expect("leap february");
    assert_eq!(format_instant(range.from()), "2024-02-01T00:00:00.000Z");
    assert_eq!(format_instant(range.to()), "2024-02-29T23:59:59.999Z");
}

#[test]
fn early_streak_is_remembered_by_best_run_only() {
    let learner_id = Uuid::new_v4();
    let history: Vec<AttendanceEntry> = [(1, false), (2, false), (3, false), (4, true)]
        .into_iter()
        .map(|(day, present)| AttendanceEntry {
            session_date: january_day(day),
            record: AttendanceRecord {
                session_id: Uuid::new_v4(),
                learner_id,
                present,
                excused: false,
                reason: None,
            },
        })
        .collect();

    let engine = AlertEngine::default();
    let best = engine.evaluate(learner_id, &january(), &history, StreakMode::BestRun);
    assert_eq!(best.consecutive_unexcused, 3);
    assert!(matches!(
        best.criterion,
        Criterion::Consecutive | Criterion::Both
    ));

    let trailing = engine.evaluate(learner_id, &january(), &history, StreakMode::Trailing);
    assert_eq!(trailing.consecutive_unexcused, 0);
    assert_eq!(trailing.criterion, Criterion::None);
}

#[tokio::test]
async fn coordinator_sees_alerts_that_instructors_cannot_reach() {
    let mut store = InMemoryStore::new();
    let instructor = Uuid::new_v4();
    let cohort = Cohort {
        id: Uuid::new_v4(),
        number: "2758321".to_string(),
        institution_id: Uuid::new_v4(),
        program_id: Uuid::new_v4(),
        instructor_id: instructor,
        status: CohortStatus::Active,
    };
    store.add_cohort(cohort.clone());

    let learner = Learner {
        id: Uuid::new_v4(),
        cohort_id: cohort.id,
        display_name: "Santiago Herrera".to_string(),
        document_id: "1098765432".to_string(),
    };
    store.add_learner(learner.clone());

    for day in 1..=6 {
        let session = ClassSession {
            id: Uuid::new_v4(),
            cohort_id: cohort.id,
            date: january_day(day),
        };
        store.add_session(session.clone());
        store.record_attendance(AttendanceRecord {
            session_id: session.id,
            learner_id: learner.id,
            present: false,
            excused: false,
            reason: None,
        });
    }

    let engine = AggregationEngine::new(store, EngineConfig::default());
    let coordinator = Requester::new(Uuid::new_v4(), Role::Coordinator);

    let panel = engine
        .coordination_panel(&PanelFilters::default(), &january(), &coordinator)
        .await
        .expect("coordinator panel");
    assert_eq!(panel.active_cohort_count, 1);
    assert_eq!(panel.alerts_by_criterion.both, 1);
    assert_eq!(panel.cohort_ranking[0].unexcused_count, 6);

    let err = engine
        .coordination_panel(
            &PanelFilters::default(),
            &january(),
            &Requester::new(instructor, Role::Instructor),
        )
        .await
        .expect_err("instructors cannot open the panel");
    assert!(matches!(err, EngineError::Forbidden(_)));

    let dashboard = engine
        .instructor_dashboard(instructor, &january())
        .await
        .expect("instructor dashboard");
    assert_eq!(dashboard.alert_count, 1);
    assert_eq!(dashboard.average_attendance_rate, 0.0);
    assert_eq!(dashboard.top_at_risk_cohorts[0].cohort_id, cohort.id);

    let csv = engine
        .export_cohort_alerts(
            cohort.id,
            &january(),
            &Requester::new(instructor, Role::Instructor),
        )
        .await
        .expect("alert export");
    assert!(csv.ends_with("1098765432,Santiago Herrera,6,6,BOTH"));
}
