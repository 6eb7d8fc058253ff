//! Unit tests for loading older persisted records.

use personal21::progress::{
    KeyValueStorage, LocalProgressStore, SqliteStorage, CURRENT_SCHEMA_VERSION,
    DEFAULT_PROGRESS_KEY,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;

fn legacy_json() -> String {
    json!({
        "mindset": { "completedChapters": [1, 2], "unlockedChapters": [1, 2, 3] },
        "nutrition": {
            "lowcarb": {
                "completedChapters": [4],
                "completedRecipes": ["Salad_2026-01-20"],
                "completedMeals": [{
                    "date": "2026-01-20",
                    "mealType": "lunch",
                    "recipeName": "Salad",
                    "calories": 310,
                    "protein": 12,
                    "fat": 20,
                    "carbs": 9,
                    "feedback": { "title": "Light", "timeframe": "2h" }
                }]
            }
        },
        "workouts": {
            "completedSessions": [{ "date": "2026-01-20", "caloriesBurned": 210, "duration": 30, "dayCompleted": 2 }],
            "completedDays": [2]
        },
        "hydration": { "daily": [{ "date": "2026-01-20", "ml": 1250 }] }
    })
    .to_string()
}

#[test]
fn test_legacy_record_is_upgraded_on_load() {
    let file = NamedTempFile::new().unwrap();
    let storage = Arc::new(SqliteStorage::open(file.path()).unwrap());
    storage.set(DEFAULT_PROGRESS_KEY, &legacy_json()).unwrap();

    let store = LocalProgressStore::new(storage.clone());
    let record = store.load();

    assert_eq!(record.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(record.mindset.completed_chapters.len(), 2);
    assert_eq!(record.workouts.completed_sessions[0].day, 2);
    assert_eq!(record.nutrition.lowcarb.completed_chapters.len(), 1);

    let log = record
        .daily_log(chrono::NaiveDate::from_ymd_opt(2026, 1, 20).unwrap())
        .unwrap();
    assert_eq!(log.hydration_ml, 1250);
    assert_eq!(log.calories_burned, 210);
    assert_eq!(log.completed_meals[0].feedback.timeframe_description, "2h");

    // The upgraded shape was written back
    let stored: Value = serde_json::from_str(&storage.get(DEFAULT_PROGRESS_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored["schemaVersion"], CURRENT_SCHEMA_VERSION);
    assert!(stored.get("hydration").is_none());
}

#[test]
fn test_second_load_is_a_no_op() {
    let file = NamedTempFile::new().unwrap();
    let storage = Arc::new(SqliteStorage::open(file.path()).unwrap());
    storage.set(DEFAULT_PROGRESS_KEY, &legacy_json()).unwrap();

    let store = LocalProgressStore::new(storage.clone());
    let first = store.load();
    let stored_after_first = storage.get(DEFAULT_PROGRESS_KEY).unwrap();

    let second = store.load();
    assert_eq!(first, second);
    assert_eq!(storage.get(DEFAULT_PROGRESS_KEY).unwrap(), stored_after_first);
}

#[test]
fn test_corrupt_record_falls_back_to_empty() {
    let file = NamedTempFile::new().unwrap();
    let storage = Arc::new(SqliteStorage::open(file.path()).unwrap());
    storage.set(DEFAULT_PROGRESS_KEY, "{\"mindset\": ").unwrap();

    let record = LocalProgressStore::new(storage).load();
    assert!(record.mindset.completed_chapters.is_empty());
    assert_eq!(record.schema_version, CURRENT_SCHEMA_VERSION);
}
