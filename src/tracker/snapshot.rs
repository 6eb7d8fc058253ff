//! Derived progress values held by the tracker.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::progress::metrics::{self, MacroTotals, PillarProgress};
use crate::progress::{CompletedMealEntry, DietKey, HealthAnalysis, ProgressRecord};

/// Everything the dashboard shows, computed from one record state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    /// Local date the "today" values refer to
    pub today: NaiveDate,
    pub hydration_ml: u32,
    pub sleep_hours: f32,
    pub calories_burned: u32,
    pub macros: MacroTotals,
    pub meals: Vec<CompletedMealEntry>,
    pub pillars: PillarProgress,
    pub overall: u8,
    pub diets: BTreeMap<DietKey, u8>,
    pub health: HealthAnalysis,
}

impl ProgressSnapshot {
    pub fn compute(record: &ProgressRecord, today: NaiveDate) -> Self {
        let pillars = metrics::pillar_progress(record);

        Self {
            today,
            hydration_ml: metrics::today_hydration_ml(record, today),
            sleep_hours: metrics::today_sleep_hours(record, today),
            calories_burned: metrics::today_calories_burned(record, today),
            macros: metrics::today_macros(record, today),
            meals: metrics::today_meals_with_feedback(record, today).to_vec(),
            pillars,
            overall: pillars.overall(),
            diets: DietKey::ALL
                .into_iter()
                .map(|diet| (diet, metrics::diet_progress(record, diet)))
                .collect(),
            health: HealthAnalysis::for_day(record, today),
        }
    }
}
