//! Unit tests for tracker completions.
//!
//! Set-based completions are idempotent and each meal slot holds one meal.

use chrono::NaiveDate;
use personal21::progress::{DietKey, FixedClock, LocalProgressStore, MealFeedback, MealType, MemoryStorage};
use personal21::sync::MemoryRemoteStore;
use personal21::tracker::{MealCompletion, MealLog, ProgressTracker, TrackerOptions};
use std::sync::Arc;

fn create_tracker() -> ProgressTracker<MemoryRemoteStore> {
    let clock = Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()));
    let store = LocalProgressStore::new(Arc::new(MemoryStorage::new()));
    ProgressTracker::local(
        store,
        TrackerOptions {
            clock,
            ..Default::default()
        },
    )
}

fn meal(meal_type: MealType, recipe: &str, calories: u32) -> MealLog {
    MealLog {
        meal_type,
        recipe_name: recipe.to_string(),
        calories,
        protein_g: 25.0,
        fat_g: 18.0,
        carbs_g: 6.0,
        feedback: MealFeedback {
            title: "Nice choice".to_string(),
            ..Default::default()
        },
    }
}

#[test]
fn test_mindset_chapter_completion_is_idempotent() {
    let tracker = create_tracker();

    assert!(tracker.complete_mindset_chapter(3));
    assert!(!tracker.complete_mindset_chapter(3));

    let chapters = tracker.record().mindset.completed_chapters;
    assert_eq!(chapters.iter().filter(|c| **c == 3).count(), 1);
    assert_eq!(chapters.len(), 1);
}

#[test]
fn test_nutrition_and_recipe_completion_are_idempotent() {
    let tracker = create_tracker();

    tracker.complete_nutrition_chapter(DietKey::Carnivore, 2);
    tracker.complete_nutrition_chapter(DietKey::Carnivore, 2);
    tracker.mark_recipe_completed(DietKey::Carnivore, "Ribeye");
    tracker.mark_recipe_completed(DietKey::Carnivore, "Ribeye");

    let diet = tracker.record().nutrition.carnivore;
    assert_eq!(diet.completed_chapters.len(), 1);
    assert_eq!(diet.completed_recipes.len(), 1);
    assert!(diet.completed_recipes.contains("Ribeye_2026-05-04"));
}

#[test]
fn test_out_of_range_chapters_are_ignored() {
    let tracker = create_tracker();

    assert!(!tracker.complete_nutrition_chapter(DietKey::Keto, 0));
    assert!(!tracker.complete_nutrition_chapter(DietKey::Keto, 21));
    assert!(tracker.complete_nutrition_chapter(DietKey::Keto, 20));
    assert_eq!(tracker.record().nutrition.keto.completed_chapters.len(), 1);
}

#[test]
fn test_one_meal_per_slot() {
    let tracker = create_tracker();

    let first = tracker.mark_meal_completed(DietKey::Keto, meal(MealType::Breakfast, "Omelete", 400));
    assert_eq!(first, Ok(MealCompletion::Logged));

    // Different recipe, same slot
    let second = tracker.mark_meal_completed(DietKey::Keto, meal(MealType::Breakfast, "Pancakes", 350));
    let err = second.unwrap_err();
    assert_eq!(err.existing_recipe, "Omelete");

    // Same recipe again is a harmless no-op
    let repeat = tracker.mark_meal_completed(DietKey::Keto, meal(MealType::Breakfast, "Omelete", 999));
    assert_eq!(repeat, Ok(MealCompletion::Unchanged));

    let meals = tracker.today_meals_with_feedback();
    assert_eq!(meals.len(), 1);
    assert_eq!(meals[0].calories, 400);
}

#[test]
fn test_slots_are_per_diet_and_meal_type() {
    let tracker = create_tracker();

    assert!(tracker
        .mark_meal_completed(DietKey::Keto, meal(MealType::Breakfast, "Omelete", 400))
        .is_ok());
    assert!(tracker
        .mark_meal_completed(DietKey::Keto, meal(MealType::Lunch, "Salmon", 600))
        .is_ok());
    assert!(tracker
        .mark_meal_completed(DietKey::Carnivore, meal(MealType::Breakfast, "Bacon", 500))
        .is_ok());

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.meals.len(), 3);
    assert_eq!(snapshot.macros.calories, 1500);
    assert!((snapshot.macros.protein_g - 75.0).abs() < f32::EPSILON);

    // Insertion order is preserved
    let names: Vec<_> = snapshot.meals.iter().map(|m| m.recipe_name.as_str()).collect();
    assert_eq!(names, ["Omelete", "Salmon", "Bacon"]);
}

#[test]
fn test_non_finite_macros_do_not_corrupt_the_store() {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(FixedClock::at_date(NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()));
    let tracker = ProgressTracker::<MemoryRemoteStore>::local(
        LocalProgressStore::new(storage.clone()),
        TrackerOptions {
            clock,
            ..Default::default()
        },
    );
    tracker.complete_mindset_chapter(1);
    tracker.complete_mindset_chapter(2);

    let mut log = meal(MealType::Dinner, "Steak", 700);
    log.protein_g = f32::NAN;
    log.fat_g = f32::INFINITY;
    log.carbs_g = -3.0;
    assert_eq!(tracker.mark_meal_completed(DietKey::Keto, log), Ok(MealCompletion::Logged));

    let macros = tracker.today_macros();
    assert_eq!(macros.calories, 700);
    assert_eq!(macros.protein_g, 0.0);
    assert_eq!(macros.fat_g, 0.0);
    assert_eq!(macros.carbs_g, 0.0);

    // A fresh load still sees everything logged before the meal
    let reloaded = LocalProgressStore::new(storage).load();
    assert_eq!(reloaded.mindset.completed_chapters.len(), 2);
    assert_eq!(reloaded, tracker.record());
}

#[test]
fn test_meal_without_recipe_name_is_ignored() {
    let tracker = create_tracker();

    assert_eq!(
        tracker.mark_meal_completed(DietKey::Keto, meal(MealType::Lunch, "  ", 300)),
        Ok(MealCompletion::Unchanged)
    );
    assert!(!tracker.is_meal_type_completed_today(DietKey::Keto, MealType::Lunch));
    assert!(tracker.today_meals_with_feedback().is_empty());

    // The slot is still free for a real meal
    assert_eq!(
        tracker.mark_meal_completed(DietKey::Keto, meal(MealType::Lunch, "Salad", 300)),
        Ok(MealCompletion::Logged)
    );
}
