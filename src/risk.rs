use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AttendanceEntry;
use crate::range::DateRange;

pub const DEFAULT_CONSECUTIVE_THRESHOLD: u32 = 3;
pub const DEFAULT_MONTHLY_THRESHOLD: u32 = 5;

/// How the consecutive-absence streak is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakMode {
    /// Current run of unexcused absences ending at the most recent session.
    Trailing,
    /// Longest run of unexcused absences anywhere in the range.
    BestRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criterion {
    None,
    Consecutive,
    Monthly,
    Both,
}

impl Criterion {
    pub fn classify(consecutive_hit: bool, monthly_hit: bool) -> Self {
        match (consecutive_hit, monthly_hit) {
            (true, true) => Criterion::Both,
            (true, false) => Criterion::Consecutive,
            (false, true) => Criterion::Monthly,
            (false, false) => Criterion::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Criterion::None => "NONE",
            Criterion::Consecutive => "CONSECUTIVE",
            Criterion::Monthly => "MONTHLY",
            Criterion::Both => "BOTH",
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, Criterion::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerAlert {
    pub learner_id: Uuid,
    pub consecutive_unexcused: u32,
    pub monthly_unexcused: u32,
    pub criterion: Criterion,
}

impl LearnerAlert {
    pub fn is_flagged(&self) -> bool {
        self.criterion.is_alert()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub consecutive: u32,
    pub monthly: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            consecutive: DEFAULT_CONSECUTIVE_THRESHOLD,
            monthly: DEFAULT_MONTHLY_THRESHOLD,
        }
    }
}

/// Classifies learners from their attendance history. Stateless apart from thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertEngine {
    thresholds: AlertThresholds,
}

impl AlertEngine {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate one learner. Entries for other learners or outside `range` are skipped.
    pub fn evaluate<'a, I>(
        &self,
        learner_id: Uuid,
        range: &DateRange,
        entries: I,
        mode: StreakMode,
    ) -> LearnerAlert
    where
        I: IntoIterator<Item = &'a AttendanceEntry>,
    {
        let mut history: Vec<&AttendanceEntry> = entries
            .into_iter()
            .filter(|entry| entry.learner_id() == learner_id)
            .filter(|entry| range.contains_date(entry.session_date))
            .collect();

        let monthly_unexcused = history
            .iter()
            .filter(|entry| entry.record.is_unexcused_absence())
            .count() as u32;
        let consecutive_unexcused = match mode {
            StreakMode::Trailing => trailing_streak(&mut history),
            StreakMode::BestRun => best_run(&mut history),
        };

        LearnerAlert {
            learner_id,
            consecutive_unexcused,
            monthly_unexcused,
            criterion: Criterion::classify(
                consecutive_unexcused >= self.thresholds.consecutive,
                monthly_unexcused >= self.thresholds.monthly,
            ),
        }
    }

    /// Evaluate every listed learner and keep only the flagged ones, in learner order.
    pub fn evaluate_batch<I>(
        &self,
        learner_ids: I,
        range: &DateRange,
        entries: &[AttendanceEntry],
        mode: StreakMode,
    ) -> Vec<LearnerAlert>
    where
        I: IntoIterator<Item = Uuid>,
    {
        let by_learner = group_by_learner(entries);
        learner_ids
            .into_iter()
            .map(|learner_id| {
                let history = by_learner.get(&learner_id).map(Vec::as_slice).unwrap_or(&[]);
                self.evaluate(learner_id, range, history.iter().copied(), mode)
            })
            .filter(LearnerAlert::is_flagged)
            .collect()
    }
}

fn group_by_learner(entries: &[AttendanceEntry]) -> HashMap<Uuid, Vec<&AttendanceEntry>> {
    let mut grouped: HashMap<Uuid, Vec<&AttendanceEntry>> = HashMap::new();
    for entry in entries {
        grouped.entry(entry.learner_id()).or_default().push(entry);
    }
    grouped
}

fn trailing_streak(history: &mut [&AttendanceEntry]) -> u32 {
    history.sort_by(|a, b| b.session_date.cmp(&a.session_date));
    history
        .iter()
        .take_while(|entry| entry.record.is_unexcused_absence())
        .count() as u32
}

fn best_run(history: &mut [&AttendanceEntry]) -> u32 {
    history.sort_by_key(|entry| entry.session_date);
    let (_, longest) = history.iter().fold((0u32, 0u32), |(current, longest), entry| {
        let current = if entry.record.is_unexcused_absence() {
            current + 1
        } else {
            0
        };
        (current, longest.max(current))
    });
    longest
}
