//! Pure derivations over a progress record.
//!
//! Every function takes a record snapshot and the local date to treat as
//! "today"; none of them touch storage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::{
    recipe_key, CompletedMealEntry, DietKey, MealType, ProgressRecord, MINDSET_CHAPTERS,
    NUTRITION_CHAPTERS_PER_DIET, WORKOUT_DAYS,
};

/// Summed nutrition for a set of meals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: u32,
    pub protein_g: f32,
    pub fat_g: f32,
    pub carbs_g: f32,
}

/// Completion percentage for each pillar (0-100).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarProgress {
    pub mindset: u8,
    pub workouts: u8,
    pub nutrition: u8,
}

impl PillarProgress {
    /// Average of the three pillars, rounded.
    pub fn overall(&self) -> u8 {
        let sum = self.mindset as f64 + self.workouts as f64 + self.nutrition as f64;
        (sum / 3.0).round().clamp(0.0, 100.0) as u8
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total) as f64;
    (done / total as f64 * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Water logged today in millilitres.
pub fn today_hydration_ml(record: &ProgressRecord, today: NaiveDate) -> u32 {
    record.daily_log(today).map(|log| log.hydration_ml).unwrap_or(0)
}

/// Sleep logged today in hours.
pub fn today_sleep_hours(record: &ProgressRecord, today: NaiveDate) -> f32 {
    record.daily_log(today).map(|log| log.sleep_hours).unwrap_or(0.0)
}

/// Calories burned today.
pub fn today_calories_burned(record: &ProgressRecord, today: NaiveDate) -> u32 {
    record
        .daily_log(today)
        .map(|log| log.calories_burned)
        .unwrap_or(0)
}

/// Today's completed meals, in the order they were logged.
pub fn today_meals_with_feedback(record: &ProgressRecord, today: NaiveDate) -> &[CompletedMealEntry] {
    record
        .daily_log(today)
        .map(|log| log.completed_meals.as_slice())
        .unwrap_or(&[])
}

/// Sum of calories and macros across today's meals.
pub fn today_macros(record: &ProgressRecord, today: NaiveDate) -> MacroTotals {
    today_meals_with_feedback(record, today)
        .iter()
        .fold(MacroTotals::default(), |mut totals, meal| {
            totals.calories += meal.calories;
            totals.protein_g += meal.protein_g;
            totals.fat_g += meal.fat_g;
            totals.carbs_g += meal.carbs_g;
            totals
        })
}

/// Completion percentage for each pillar.
pub fn pillar_progress(record: &ProgressRecord) -> PillarProgress {
    let nutrition_total = DietKey::ALL.len() * NUTRITION_CHAPTERS_PER_DIET as usize;

    PillarProgress {
        mindset: percent(record.mindset.completed_chapters.len(), MINDSET_CHAPTERS as usize),
        workouts: percent(record.workouts.completed_sessions.len(), WORKOUT_DAYS as usize),
        nutrition: percent(record.nutrition.total_completed_chapters(), nutrition_total),
    }
}

/// Overall program completion (0-100).
pub fn overall_progress(record: &ProgressRecord) -> u8 {
    pillar_progress(record).overall()
}

/// Completion percentage of one diet's education chapters.
pub fn diet_progress(record: &ProgressRecord, diet: DietKey) -> u8 {
    percent(
        record.nutrition.diet(diet).completed_chapters.len(),
        NUTRITION_CHAPTERS_PER_DIET as usize,
    )
}

/// Whether a recipe was marked completed today for a diet.
pub fn is_recipe_completed_today(
    record: &ProgressRecord,
    today: NaiveDate,
    diet: DietKey,
    recipe_name: &str,
) -> bool {
    record
        .nutrition
        .diet(diet)
        .completed_recipes
        .contains(&recipe_key(recipe_name, today))
}

/// Whether today's (diet, meal type) slot is already filled.
pub fn is_meal_type_completed_today(
    record: &ProgressRecord,
    today: NaiveDate,
    diet: DietKey,
    meal_type: MealType,
) -> bool {
    record
        .daily_log(today)
        .and_then(|log| log.meal_in_slot(diet, meal_type))
        .is_some()
}

/// Whether a mindset chapter is available to read.
pub fn is_mindset_chapter_unlocked(record: &ProgressRecord, chapter: u8) -> bool {
    record.mindset.unlocked_chapters.contains(&chapter)
}

/// Whether a workout day is available to train.
pub fn is_workout_day_unlocked(record: &ProgressRecord, day: u8) -> bool {
    record.workouts.unlocked_days.contains(&day)
}
