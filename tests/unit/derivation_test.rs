//! Unit tests for progress derivations.

use chrono::{Duration, NaiveDate, Utc};
use personal21::progress::metrics::{
    diet_progress, overall_progress, pillar_progress, today_hydration_ml,
};
use personal21::progress::{
    DietKey, FixedClock, HealthAnalysis, HealthLevel, LocalProgressStore, MemoryStorage,
    ProgressRecord, WorkoutSession,
};
use personal21::sync::MemoryRemoteStore;
use personal21::tracker::{ProgressTracker, TrackerOptions};
use std::sync::Arc;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, day).unwrap()
}

#[test]
fn test_overall_progress_example() {
    let mut record = ProgressRecord::new();
    record.mindset.completed_chapters.extend([1, 2, 3, 4, 5]);
    for day in 1..=10 {
        record.workouts.completed_sessions.push(WorkoutSession {
            day,
            calories_burned: 150,
            duration_minutes: 30,
            completed_at: Utc::now(),
        });
    }
    // 10 chapters spread over three diets
    record.nutrition.carnivore.completed_chapters.extend(1..=4);
    record.nutrition.lowcarb.completed_chapters.extend(1..=3);
    record.nutrition.detox.completed_chapters.extend(1..=3);

    let pillars = pillar_progress(&record);
    assert_eq!((pillars.mindset, pillars.workouts, pillars.nutrition), (50, 48, 10));
    assert_eq!(overall_progress(&record), 36);
    assert_eq!(diet_progress(&record, DietKey::Carnivore), 20);
}

#[test]
fn test_overall_progress_is_clamped() {
    let mut record = ProgressRecord::new();
    // More sessions than program days
    for _ in 0..40 {
        record.workouts.completed_sessions.push(WorkoutSession {
            day: 1,
            calories_burned: 0,
            duration_minutes: 0,
            completed_at: Utc::now(),
        });
    }
    assert_eq!(pillar_progress(&record).workouts, 100);
    assert_eq!(overall_progress(&record), 33);
}

#[test]
fn test_logs_are_keyed_by_calendar_date() {
    let mut record = ProgressRecord::new();
    record.daily_log_mut(date(9)).hydration_ml = 1800;

    assert_eq!(today_hydration_ml(&record, date(9)), 1800);
    assert_eq!(today_hydration_ml(&record, date(10)), 0);
}

#[test]
fn test_tracker_day_rollover() {
    // Late evening, one hour before midnight
    let clock = Arc::new(FixedClock::new(
        date(9).and_hms_opt(23, 0, 0).unwrap().and_utc(),
    ));
    let store = LocalProgressStore::new(Arc::new(MemoryStorage::new()));
    let tracker = ProgressTracker::<MemoryRemoteStore>::local(
        store,
        TrackerOptions {
            clock: clock.clone(),
            ..Default::default()
        },
    );

    tracker.add_water_intake(900);
    tracker.add_sleep_time(6.5);
    assert_eq!(tracker.today_hydration_ml(), 900);

    clock.advance(Duration::hours(2));
    assert_eq!(tracker.today_hydration_ml(), 0);
    assert_eq!(tracker.today_sleep_hours(), 0.0);

    // Yesterday's entry is still there, untouched
    tracker.add_water_intake(200);
    let record = tracker.record();
    assert_eq!(record.daily_log(date(9)).unwrap().hydration_ml, 900);
    assert_eq!(record.daily_log(date(10)).unwrap().hydration_ml, 200);
}

#[test]
fn test_health_analysis_levels() {
    let mut record = ProgressRecord::new();
    let today = date(12);

    let empty = HealthAnalysis::for_day(&record, today);
    assert_eq!(empty.hydration.level, HealthLevel::None);
    assert_eq!(empty.sleep.level, HealthLevel::None);

    let log = record.daily_log_mut(today);
    log.hydration_ml = 400;
    log.sleep_hours = 6.0;
    log.calories_burned = 320;

    let analysis = HealthAnalysis::for_day(&record, today);
    assert_eq!(analysis.hydration.level, HealthLevel::Critical);
    assert_eq!(analysis.sleep.level, HealthLevel::Warning);
    assert_eq!(analysis.activity.level, HealthLevel::Good);
}
