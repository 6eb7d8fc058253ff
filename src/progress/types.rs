//! Progress record type definitions.
//!
//! The `ProgressRecord` is the single per-user aggregate persisted by the
//! local store and mirrored to the remote store. Field names serialize in
//! camelCase so the persisted JSON keeps the shape the web client wrote.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Current persisted schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Number of mindset chapters in the program.
pub const MINDSET_CHAPTERS: u8 = 10;

/// Number of workout days in the program.
pub const WORKOUT_DAYS: u8 = 21;

/// Number of education chapters per diet.
pub const NUTRITION_CHAPTERS_PER_DIET: u8 = 20;

/// One of the five trackable nutrition protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DietKey {
    Carnivore,
    Lowcarb,
    Keto,
    Fasting,
    Detox,
}

impl DietKey {
    /// All diets, in display order.
    pub const ALL: [DietKey; 5] = [
        DietKey::Carnivore,
        DietKey::Lowcarb,
        DietKey::Keto,
        DietKey::Fasting,
        DietKey::Detox,
    ];

    /// Wire name used in persisted JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            DietKey::Carnivore => "carnivore",
            DietKey::Lowcarb => "lowcarb",
            DietKey::Keto => "keto",
            DietKey::Fasting => "fasting",
            DietKey::Detox => "detox",
        }
    }

    /// Get display name for the diet.
    pub fn display_name(&self) -> &'static str {
        match self {
            DietKey::Carnivore => "Carnivore",
            DietKey::Lowcarb => "Low Carb",
            DietKey::Keto => "Keto",
            DietKey::Fasting => "Intermittent Fasting",
            DietKey::Detox => "Detox",
        }
    }
}

impl std::fmt::Display for DietKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DietKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DietKey::ALL
            .into_iter()
            .find(|diet| diet.as_str() == s)
            .ok_or_else(|| format!("unknown diet: {s}"))
    }
}

/// Meal slot type within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    /// Get display name for the meal type.
    pub fn display_name(&self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
        }
    }
}

/// Display payload shown after a meal is logged. Stored, never interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MealFeedback {
    pub title: String,
    pub message: String,
    pub body_process_description: String,
    pub timeframe_description: String,
    pub icon_key: String,
}

/// A meal logged against a (date, diet, meal type) slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedMealEntry {
    pub diet_key: DietKey,
    pub meal_type: MealType,
    pub recipe_name: String,
    #[serde(default)]
    pub calories: u32,
    #[serde(default)]
    pub protein_g: f32,
    #[serde(default)]
    pub fat_g: f32,
    #[serde(default)]
    pub carbs_g: f32,
    #[serde(default)]
    pub feedback: MealFeedback,
    pub completed_at: DateTime<Utc>,
}

impl CompletedMealEntry {
    /// Check whether this entry occupies the given slot.
    pub fn occupies(&self, diet: DietKey, meal_type: MealType) -> bool {
        self.diet_key == diet && self.meal_type == meal_type
    }
}

/// A completed workout session. Sessions form an append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSession {
    /// Program day (1-21)
    pub day: u8,
    /// Calories burned during the session
    #[serde(default)]
    pub calories_burned: u32,
    /// Session length in minutes
    #[serde(default)]
    pub duration_minutes: u32,
    /// When the session was completed
    pub completed_at: DateTime<Utc>,
}

/// Per-day activity log, keyed by local calendar date in the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyLog {
    pub hydration_ml: u32,
    pub sleep_hours: f32,
    pub calories_burned: u32,
    pub completed_meals: Vec<CompletedMealEntry>,
}

impl DailyLog {
    /// Find the meal logged in a slot, if any.
    pub fn meal_in_slot(&self, diet: DietKey, meal_type: MealType) -> Option<&CompletedMealEntry> {
        self.completed_meals
            .iter()
            .find(|meal| meal.occupies(diet, meal_type))
    }
}

/// Mindset pillar progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MindsetProgress {
    pub completed_chapters: BTreeSet<u8>,
    pub unlocked_chapters: BTreeSet<u8>,
}

impl Default for MindsetProgress {
    fn default() -> Self {
        Self {
            completed_chapters: BTreeSet::new(),
            unlocked_chapters: BTreeSet::from([1]),
        }
    }
}

/// Workout pillar progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkoutProgress {
    pub completed_days: BTreeSet<u8>,
    pub completed_sessions: Vec<WorkoutSession>,
    pub unlocked_days: BTreeSet<u8>,
}

impl Default for WorkoutProgress {
    fn default() -> Self {
        Self {
            completed_days: BTreeSet::new(),
            completed_sessions: Vec::new(),
            unlocked_days: BTreeSet::from([1]),
        }
    }
}

/// Progress within a single diet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DietProgress {
    pub completed_chapters: BTreeSet<u8>,
    /// Composite `{recipeName}_{isoDate}` keys
    pub completed_recipes: BTreeSet<String>,
}

/// Nutrition pillar progress, one entry per diet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutritionProgress {
    pub carnivore: DietProgress,
    pub lowcarb: DietProgress,
    pub keto: DietProgress,
    pub fasting: DietProgress,
    pub detox: DietProgress,
}

impl NutritionProgress {
    pub fn diet(&self, diet: DietKey) -> &DietProgress {
        match diet {
            DietKey::Carnivore => &self.carnivore,
            DietKey::Lowcarb => &self.lowcarb,
            DietKey::Keto => &self.keto,
            DietKey::Fasting => &self.fasting,
            DietKey::Detox => &self.detox,
        }
    }

    pub fn diet_mut(&mut self, diet: DietKey) -> &mut DietProgress {
        match diet {
            DietKey::Carnivore => &mut self.carnivore,
            DietKey::Lowcarb => &mut self.lowcarb,
            DietKey::Keto => &mut self.keto,
            DietKey::Fasting => &mut self.fasting,
            DietKey::Detox => &mut self.detox,
        }
    }

    /// Total completed chapters across all diets.
    pub fn total_completed_chapters(&self) -> usize {
        DietKey::ALL
            .iter()
            .map(|diet| self.diet(*diet).completed_chapters.len())
            .sum()
    }
}

/// Root progress aggregate for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub schema_version: u32,
    #[serde(default)]
    pub mindset: MindsetProgress,
    #[serde(default)]
    pub workouts: WorkoutProgress,
    #[serde(default)]
    pub nutrition: NutritionProgress,
    #[serde(default)]
    pub daily_logs: BTreeMap<NaiveDate, DailyLog>,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressRecord {
    /// Create an empty record at the current schema version.
    pub fn new() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            mindset: MindsetProgress::default(),
            workouts: WorkoutProgress::default(),
            nutrition: NutritionProgress::default(),
            daily_logs: BTreeMap::new(),
        }
    }

    /// Get the log for a date, if one was written.
    pub fn daily_log(&self, date: NaiveDate) -> Option<&DailyLog> {
        self.daily_logs.get(&date)
    }

    /// Get or create the log for a date.
    pub fn daily_log_mut(&mut self, date: NaiveDate) -> &mut DailyLog {
        self.daily_logs.entry(date).or_default()
    }

    /// Zero out quantities JSON cannot carry (NaN, infinity) or that make
    /// no sense (negative), and cap sleep at a full day.
    pub fn clamp_quantities(&mut self) {
        for log in self.daily_logs.values_mut() {
            log.sleep_hours = quantity(log.sleep_hours).min(24.0);
            for meal in &mut log.completed_meals {
                meal.protein_g = quantity(meal.protein_g);
                meal.fat_g = quantity(meal.fat_g);
                meal.carbs_g = quantity(meal.carbs_g);
            }
        }
    }
}

/// A finite, non-negative quantity, or 0.
pub fn quantity(value: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        0.0
    }
}

/// Build the composite key recording a recipe completion on a date.
pub fn recipe_key(recipe_name: &str, date: NaiveDate) -> String {
    format!("{}_{}", recipe_name, date.format("%Y-%m-%d"))
}
