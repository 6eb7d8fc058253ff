//! Persisted record migrations.
//!
//! Each step is a pure `Value -> Value` transform from one schema version to
//! the next. Steps run in order starting from the stored `schemaVersion`
//! (absent means 0), so running the chain on an already-current value is a
//! no-op.
//!
//! - v0: browser-era shape with `hydration.daily[]`, `sleep.daily[]`,
//!   sessions keyed by `dayCompleted`/`duration`, and per-diet
//!   `completedMeals`.
//! - v1: daily arrays folded into `dailyLogs`, sessions carry `day`,
//!   `durationMinutes` and `completedAt`.
//! - v2: per-diet meals moved into `dailyLogs[date].completedMeals`.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use super::types::{DietKey, ProgressRecord, CURRENT_SCHEMA_VERSION};

/// Timestamp used when a legacy entry carries no date at all.
const UNKNOWN_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// Migration errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Invalid record shape: {0}")]
    InvalidShape(String),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

type MigrationStep = fn(Value) -> Result<Value, MigrationError>;

/// Steps indexed by the version they upgrade from.
const STEPS: [(u32, MigrationStep); 2] = [(0, v0_to_v1), (1, v1_to_v2)];

/// A record decoded from persisted JSON.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub record: ProgressRecord,
    /// Version found in the persisted value
    pub from_version: u32,
}

impl DecodedRecord {
    /// Whether any migration step ran.
    pub fn was_upgraded(&self) -> bool {
        self.from_version < CURRENT_SCHEMA_VERSION
    }
}

/// Read the schema version of a persisted value. Absent means 0.
pub fn stored_version(value: &Value) -> Result<u32, MigrationError> {
    match value.get("schemaVersion") {
        None | Some(Value::Null) => Ok(0),
        Some(version) => version
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| MigrationError::InvalidShape(format!("schemaVersion {version} is out of range"))),
    }
}

/// Run every pending step on a persisted value.
pub fn upgrade(mut value: Value) -> Result<Value, MigrationError> {
    if !value.is_object() {
        return Err(MigrationError::InvalidShape(
            "record is not a JSON object".to_string(),
        ));
    }

    for (from, step) in STEPS {
        if stored_version(&value)? == from {
            value = step(value)?;
            tracing::debug!("Migrated progress record from v{} to v{}", from, from + 1);
        }
    }

    Ok(value)
}

/// Decode a persisted value into a current record, upgrading it first.
pub fn decode_record(value: Value) -> Result<DecodedRecord, MigrationError> {
    let from_version = stored_version(&value)?;
    let upgraded = upgrade(value)?;
    let mut record: ProgressRecord = serde_json::from_value(upgraded)?;
    record.clamp_quantities();

    // Records from a newer client keep their version; never move backwards.
    record.schema_version = record.schema_version.max(CURRENT_SCHEMA_VERSION);

    Ok(DecodedRecord {
        record,
        from_version,
    })
}

fn object_mut<'a>(
    value: &'a mut Value,
    field: &str,
) -> Result<&'a mut Map<String, Value>, MigrationError> {
    value
        .as_object_mut()
        .ok_or_else(|| MigrationError::InvalidShape(format!("{field} is not an object")))
}

type DailyLogs = BTreeMap<String, Map<String, Value>>;

fn take_logs(root: &mut Map<String, Value>) -> DailyLogs {
    match root.remove("dailyLogs") {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(date, log)| match log {
                Value::Object(log) => Some((date, log)),
                _ => None,
            })
            .collect(),
        _ => DailyLogs::new(),
    }
}

fn put_logs(root: &mut Map<String, Value>, logs: DailyLogs) {
    let logs = logs
        .into_iter()
        .map(|(date, log)| (date, Value::Object(log)))
        .collect();
    root.insert("dailyLogs".to_string(), Value::Object(logs));
}

fn daily_entry<'a>(logs: &'a mut DailyLogs, date: &str) -> &'a mut Map<String, Value> {
    logs.entry(date.to_string()).or_default()
}

fn add_u64(entry: &mut Map<String, Value>, field: &str, amount: u64) -> Result<(), MigrationError> {
    let current = entry.get(field).and_then(Value::as_u64).unwrap_or(0);
    let total = current
        .checked_add(amount)
        .ok_or_else(|| MigrationError::InvalidShape(format!("{field} total overflows")))?;
    entry.insert(field.to_string(), json!(total));
    Ok(())
}

/// A legacy quantity as a finite, non-negative number that fits in `f32`.
fn legacy_quantity(value: Option<&Value>) -> f64 {
    value
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= f64::from(f32::MAX))
        .unwrap_or(0.0)
}

fn date_of(value: &Value) -> Option<String> {
    value
        .get("date")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            value
                .get("completedAt")
                .and_then(Value::as_str)
                .and_then(|ts| ts.get(..10))
                .map(str::to_string)
        })
}

fn midnight(date: Option<&str>) -> String {
    date.map(|d| format!("{d}T00:00:00Z"))
        .unwrap_or_else(|| UNKNOWN_TIMESTAMP.to_string())
}

/// Fold `hydration`/`sleep` arrays and session calories into `dailyLogs`.
fn v0_to_v1(mut value: Value) -> Result<Value, MigrationError> {
    let root = object_mut(&mut value, "record")?;

    let mut logs = take_logs(root);

    let hydration = root
        .remove("hydration")
        .and_then(|h| h.get("daily").cloned())
        .and_then(|d| d.as_array().cloned())
        .unwrap_or_default();
    for entry in &hydration {
        if let Some(date) = entry.get("date").and_then(Value::as_str) {
            let ml = entry.get("ml").and_then(Value::as_u64).unwrap_or(0);
            add_u64(daily_entry(&mut logs, date), "hydrationMl", ml)?;
        }
    }

    let sleep = root
        .remove("sleep")
        .and_then(|s| s.get("daily").cloned())
        .and_then(|d| d.as_array().cloned())
        .unwrap_or_default();
    for entry in &sleep {
        if let Some(date) = entry.get("date").and_then(Value::as_str) {
            let hours = legacy_quantity(entry.get("hours")).min(24.0);
            daily_entry(&mut logs, date).insert("sleepHours".to_string(), json!(hours));
        }
    }

    if let Some(workouts) = root.get_mut("workouts").and_then(Value::as_object_mut) {
        let sessions = workouts
            .remove("completedSessions")
            .and_then(|s| s.as_array().cloned())
            .unwrap_or_default();

        let mut converted = Vec::with_capacity(sessions.len());
        for session in sessions {
            let Some(day) = session
                .get("dayCompleted")
                .or_else(|| session.get("day"))
                .and_then(Value::as_u64)
            else {
                tracing::warn!("Dropping legacy workout session without a day: {}", session);
                continue;
            };
            let calories = session
                .get("caloriesBurned")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let duration = session
                .get("duration")
                .or_else(|| session.get("durationMinutes"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let date = date_of(&session);

            if let Some(date) = &date {
                add_u64(daily_entry(&mut logs, date), "caloriesBurned", calories)?;
            }

            converted.push(json!({
                "day": day,
                "caloriesBurned": calories,
                "durationMinutes": duration,
                "completedAt": session
                    .get("completedAt")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| midnight(date.as_deref())),
            }));
        }
        workouts.insert("completedSessions".to_string(), Value::Array(converted));
    }

    put_logs(root, logs);
    root.insert("schemaVersion".to_string(), json!(1));
    Ok(value)
}

/// Move per-diet `completedMeals` into the daily logs.
fn v1_to_v2(mut value: Value) -> Result<Value, MigrationError> {
    let root = object_mut(&mut value, "record")?;

    let mut logs = take_logs(root);

    if let Some(nutrition) = root.get_mut("nutrition").and_then(Value::as_object_mut) {
        for diet in DietKey::ALL {
            let Some(progress) = nutrition
                .get_mut(diet.as_str())
                .and_then(Value::as_object_mut)
            else {
                continue;
            };

            progress.remove("completedRecipesDetails");
            let meals = progress
                .remove("completedMeals")
                .and_then(|m| m.as_array().cloned())
                .unwrap_or_default();

            for meal in meals {
                let (Some(date), Some(meal_type), Some(recipe)) = (
                    date_of(&meal),
                    meal.get("mealType").and_then(Value::as_str),
                    meal.get("recipeName")
                        .or_else(|| meal.get("name"))
                        .and_then(Value::as_str),
                ) else {
                    tracing::warn!("Dropping legacy meal without date, type or recipe: {}", meal);
                    continue;
                };

                let feedback = meal.get("feedback").cloned().unwrap_or(Value::Null);
                let completed_at = meal
                    .get("completedAt")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| midnight(Some(&date)));

                let entry = json!({
                    "dietKey": diet.as_str(),
                    "mealType": meal_type,
                    "recipeName": recipe,
                    "calories": meal.get("calories").and_then(Value::as_u64).unwrap_or(0),
                    "proteinG": legacy_quantity(meal.get("protein").or_else(|| meal.get("proteinG"))),
                    "fatG": legacy_quantity(meal.get("fat").or_else(|| meal.get("fatG"))),
                    "carbsG": legacy_quantity(meal.get("carbs").or_else(|| meal.get("carbsG"))),
                    "feedback": {
                        "title": feedback.get("title").cloned().unwrap_or(json!("")),
                        "message": feedback.get("message").cloned().unwrap_or(json!("")),
                        "bodyProcessDescription": feedback.get("bodyProcess").cloned().unwrap_or(json!("")),
                        "timeframeDescription": feedback.get("timeframe").cloned().unwrap_or(json!("")),
                        "iconKey": feedback.get("icon").cloned().unwrap_or(json!("")),
                    },
                    "completedAt": completed_at,
                });

                let day = daily_entry(&mut logs, &date);
                let slot = day
                    .entry("completedMeals".to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !slot.is_array() {
                    *slot = Value::Array(Vec::new());
                }
                if let Some(list) = slot.as_array_mut() {
                    insert_latest_in_slot(list, entry);
                }
            }
        }
    }

    put_logs(root, logs);
    root.insert("schemaVersion".to_string(), json!(2));
    Ok(value)
}

/// One meal per (diet, meal type) per day; the latest completion wins.
fn insert_latest_in_slot(list: &mut Vec<Value>, entry: Value) {
    let same_slot = |other: &Value| {
        other.get("dietKey") == entry.get("dietKey") && other.get("mealType") == entry.get("mealType")
    };

    match list.iter().position(same_slot) {
        Some(index) => {
            let existing_at = list[index].get("completedAt").and_then(Value::as_str).unwrap_or("");
            let new_at = entry.get("completedAt").and_then(Value::as_str).unwrap_or("");
            if new_at > existing_at {
                list[index] = entry;
            }
        }
        None => list.push(entry),
    }
}
