//! Progress tracker.
//!
//! The single read/write surface for progress. Every mutation:
//! 1. validates its input (invalid input is ignored, not an error)
//! 2. applies the change to the in-memory record and persists it
//! 3. recomputes the derived snapshot
//! 4. re-arms the debounced cloud push when a user is signed in
//! 5. broadcasts [`ProgressEvent::Updated`]
//!
//! Storage and network faults are logged and never returned. The only
//! error a caller sees is [`MealSlotTaken`].

pub mod session;
pub mod snapshot;

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::notify::{Notice, Notifier, TracingNotifier};
use crate::config::AppConfig;
use crate::progress::metrics::{self, MacroTotals};
use crate::progress::types::{
    quantity, recipe_key, MINDSET_CHAPTERS, NUTRITION_CHAPTERS_PER_DIET, WORKOUT_DAYS,
};
use crate::progress::{
    Clock, CompletedMealEntry, DietKey, LocalProgressStore, MealFeedback, MealType,
    ProgressRecord, SystemClock, WorkoutSession,
};
use crate::sync::{CloudSync, Debouncer, RemoteProgressStore};

// Re-exports for convenience
pub use snapshot::ProgressSnapshot;

/// Default quiet period before a cloud push.
pub const DEFAULT_PUSH_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Change notification published by the tracker. Readers re-derive their
/// view through the tracker's read methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A local mutation was applied
    Updated,
    /// The record was replaced by the remote copy
    RemoteApplied,
    /// The debounced push reached the remote store
    Pushed,
    /// The push failed; the next mutation retries
    PushFailed,
}

/// A meal to log against today's slot.
#[derive(Debug, Clone, PartialEq)]
pub struct MealLog {
    pub meal_type: MealType,
    pub recipe_name: String,
    pub calories: u32,
    pub protein_g: f32,
    pub fat_g: f32,
    pub carbs_g: f32,
    pub feedback: MealFeedback,
}

/// Successful outcome of logging a meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealCompletion {
    /// The slot was empty and now holds the meal
    Logged,
    /// The same recipe was already logged in the slot
    Unchanged,
}

/// Today's slot already holds a different recipe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("already logged a meal of this type today")]
pub struct MealSlotTaken {
    pub diet: DietKey,
    pub meal_type: MealType,
    /// Recipe occupying the slot
    pub existing_recipe: String,
}

/// Collaborators and timing for a tracker.
#[derive(Clone)]
pub struct TrackerOptions {
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub push_debounce: Duration,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            notifier: Arc::new(TracingNotifier),
            push_debounce: DEFAULT_PUSH_DEBOUNCE,
        }
    }
}

impl TrackerOptions {
    /// Default collaborators with the configured push window.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            push_debounce: Duration::from_millis(config.sync.debounce_ms),
            ..Self::default()
        }
    }
}

pub(crate) struct Inner<R> {
    store: LocalProgressStore,
    cloud: Option<CloudSync<R>>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    record: RwLock<ProgressRecord>,
    /// Bumped whenever the record changes; guards remote replacement
    revision: AtomicU64,
    snapshot: RwLock<ProgressSnapshot>,
    session: RwLock<Option<Uuid>>,
    debouncer: Debouncer,
    events: broadcast::Sender<ProgressEvent>,
}

impl<R> Inner<R> {
    fn record(&self) -> std::sync::RwLockReadGuard<'_, ProgressRecord> {
        self.record.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_mut(&self) -> std::sync::RwLockWriteGuard<'_, ProgressRecord> {
        self.record.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    fn current_user(&self) -> Option<Uuid> {
        *self.session.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refresh_snapshot(&self) -> ProgressSnapshot {
        let snapshot = ProgressSnapshot::compute(&self.record(), self.clock.today());
        *self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = snapshot.clone();
        snapshot
    }

    fn emit(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Progress facade shared by every screen.
pub struct ProgressTracker<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for ProgressTracker<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteProgressStore> ProgressTracker<R> {
    /// Create a tracker over a local store, optionally backed by a remote.
    pub fn new(store: LocalProgressStore, remote: Option<Arc<R>>, options: TrackerOptions) -> Self {
        let record = store.load();
        let snapshot = ProgressSnapshot::compute(&record, options.clock.today());
        let (events, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(Inner {
                store,
                cloud: remote.map(CloudSync::new),
                clock: options.clock,
                notifier: options.notifier,
                record: RwLock::new(record),
                revision: AtomicU64::new(0),
                snapshot: RwLock::new(snapshot),
                session: RwLock::new(None),
                debouncer: Debouncer::new(options.push_debounce),
                events,
            }),
        }
    }

    /// Create a tracker with no cloud behavior.
    pub fn local(store: LocalProgressStore, options: TrackerOptions) -> Self {
        Self::new(store, None, options)
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.inner.events.subscribe()
    }

    /// Copy of the current record.
    pub fn record(&self) -> ProgressRecord {
        self.inner.record().clone()
    }

    /// Derived values for the current local date.
    ///
    /// Recomputed when the calendar date has moved since the last mutation,
    /// so yesterday's totals never show up as today's.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let cached = self
            .inner
            .snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        if cached.today == self.inner.clock.today() {
            cached
        } else {
            self.inner.refresh_snapshot()
        }
    }

    pub fn today_hydration_ml(&self) -> u32 {
        self.snapshot().hydration_ml
    }

    pub fn today_sleep_hours(&self) -> f32 {
        self.snapshot().sleep_hours
    }

    pub fn today_calories_burned(&self) -> u32 {
        self.snapshot().calories_burned
    }

    pub fn today_macros(&self) -> MacroTotals {
        self.snapshot().macros
    }

    pub fn overall_progress(&self) -> u8 {
        self.snapshot().overall
    }

    pub fn today_meals_with_feedback(&self) -> Vec<CompletedMealEntry> {
        self.snapshot().meals
    }

    pub fn is_recipe_completed_today(&self, diet: DietKey, recipe_name: &str) -> bool {
        metrics::is_recipe_completed_today(
            &self.inner.record(),
            self.inner.clock.today(),
            diet,
            recipe_name,
        )
    }

    pub fn is_meal_type_completed_today(&self, diet: DietKey, meal_type: MealType) -> bool {
        metrics::is_meal_type_completed_today(
            &self.inner.record(),
            self.inner.clock.today(),
            diet,
            meal_type,
        )
    }

    pub fn is_mindset_chapter_unlocked(&self, chapter: u8) -> bool {
        metrics::is_mindset_chapter_unlocked(&self.inner.record(), chapter)
    }

    pub fn is_workout_day_unlocked(&self, day: u8) -> bool {
        metrics::is_workout_day_unlocked(&self.inner.record(), day)
    }

    /// Apply a mutation. `apply` returns whether it changed the record;
    /// unchanged records are not saved, pushed or broadcast.
    fn mutate<F>(&self, action: &str, apply: F) -> bool
    where
        F: FnOnce(&mut ProgressRecord, NaiveDate, DateTime<Utc>) -> bool,
    {
        let today = self.inner.clock.today();
        let now = self.inner.clock.now();

        {
            let mut record = self.inner.record_mut();
            if !apply(&mut *record, today, now) {
                tracing::debug!("{} left progress unchanged", action);
                return false;
            }
            self.inner.revision.fetch_add(1, Ordering::SeqCst);

            // The in-memory record stays authoritative for this session
            if let Err(e) = self.inner.store.save(&*record) {
                tracing::warn!("Failed to persist progress after {}: {}", action, e);
            }
        }

        self.inner.refresh_snapshot();
        self.schedule_push();
        self.inner.emit(ProgressEvent::Updated);
        true
    }

    /// Log water for today. Zero is ignored.
    pub fn add_water_intake(&self, ml: u32) -> bool {
        if ml == 0 {
            tracing::debug!("Ignoring empty water intake");
            return false;
        }

        let changed = self.mutate("add_water_intake", |record, today, _| {
            let log = record.daily_log_mut(today);
            log.hydration_ml = log.hydration_ml.saturating_add(ml);
            true
        });
        if changed {
            self.inner
                .notifier
                .notify(Notice::success(format!("+{} ml of water logged", ml)));
        }
        changed
    }

    /// Record last night's sleep for today. Replaces any earlier value.
    pub fn add_sleep_time(&self, hours: f32) -> bool {
        if !hours.is_finite() || hours <= 0.0 {
            tracing::debug!("Ignoring invalid sleep duration {}", hours);
            return false;
        }
        let hours = hours.min(24.0);

        let changed = self.mutate("add_sleep_time", |record, today, _| {
            let log = record.daily_log_mut(today);
            if log.sleep_hours == hours {
                return false;
            }
            log.sleep_hours = hours;
            true
        });
        if changed {
            self.inner
                .notifier
                .notify(Notice::success(format!("{:.1} h of sleep logged", hours)));
        }
        changed
    }

    /// Mark a mindset chapter read and unlock the next one.
    pub fn complete_mindset_chapter(&self, chapter: u8) -> bool {
        if !(1..=MINDSET_CHAPTERS).contains(&chapter) {
            tracing::debug!("Ignoring mindset chapter {} out of range", chapter);
            return false;
        }

        let changed = self.mutate("complete_mindset_chapter", |record, _, _| {
            let mindset = &mut record.mindset;
            let completed = mindset.completed_chapters.insert(chapter);
            let unlocked = chapter < MINDSET_CHAPTERS && mindset.unlocked_chapters.insert(chapter + 1);
            completed || unlocked
        });
        if changed {
            self.inner
                .notifier
                .notify(Notice::success(format!("Chapter {} completed", chapter)));
        }
        changed
    }

    /// Mark a diet education chapter read.
    pub fn complete_nutrition_chapter(&self, diet: DietKey, chapter: u8) -> bool {
        if !(1..=NUTRITION_CHAPTERS_PER_DIET).contains(&chapter) {
            tracing::debug!("Ignoring {} chapter {} out of range", diet, chapter);
            return false;
        }

        let changed = self.mutate("complete_nutrition_chapter", |record, _, _| {
            record
                .nutrition
                .diet_mut(diet)
                .completed_chapters
                .insert(chapter)
        });
        if changed {
            self.inner.notifier.notify(Notice::success(format!(
                "{} chapter {} completed",
                diet.display_name(),
                chapter
            )));
        }
        changed
    }

    /// Log a workout session. Sessions are appended even when the day
    /// was trained before; the next day is unlocked.
    pub fn complete_workout_session(&self, day: u8, calories_burned: u32, duration_minutes: u32) -> bool {
        if !(1..=WORKOUT_DAYS).contains(&day) {
            tracing::debug!("Ignoring workout day {} out of range", day);
            return false;
        }

        let changed = self.mutate("complete_workout_session", |record, today, now| {
            let workouts = &mut record.workouts;
            workouts.completed_sessions.push(WorkoutSession {
                day,
                calories_burned,
                duration_minutes,
                completed_at: now,
            });
            workouts.completed_days.insert(day);
            if day < WORKOUT_DAYS {
                workouts.unlocked_days.insert(day + 1);
            }

            let log = record.daily_log_mut(today);
            log.calories_burned = log.calories_burned.saturating_add(calories_burned);
            true
        });
        if changed {
            self.inner.notifier.notify(
                Notice::success(format!("Day {} workout completed", day))
                    .with_description(format!("{} kcal burned", calories_burned)),
            );
        }
        changed
    }

    /// Mark a recipe cooked today.
    pub fn mark_recipe_completed(&self, diet: DietKey, recipe_name: &str) -> bool {
        if recipe_name.trim().is_empty() {
            tracing::debug!("Ignoring recipe completion without a name");
            return false;
        }

        self.mutate("mark_recipe_completed", |record, today, _| {
            record
                .nutrition
                .diet_mut(diet)
                .completed_recipes
                .insert(recipe_key(recipe_name, today))
        })
    }

    /// Log a meal in today's (diet, meal type) slot.
    ///
    /// Each slot holds one meal a day. Logging the recipe already in the
    /// slot is a no-op; a different recipe is rejected. A meal without a
    /// recipe name is ignored, and negative or non-finite macros count as 0.
    pub fn mark_meal_completed(
        &self,
        diet: DietKey,
        meal: MealLog,
    ) -> Result<MealCompletion, MealSlotTaken> {
        if meal.recipe_name.trim().is_empty() {
            tracing::debug!("Ignoring meal completion without a recipe name");
            return Ok(MealCompletion::Unchanged);
        }
        let meal = MealLog {
            protein_g: quantity(meal.protein_g),
            fat_g: quantity(meal.fat_g),
            carbs_g: quantity(meal.carbs_g),
            ..meal
        };

        let meal_type = meal.meal_type;
        let title = meal.feedback.title.clone();
        let mut outcome = Ok(MealCompletion::Unchanged);

        self.mutate("mark_meal_completed", |record, today, now| {
            let existing = record
                .daily_log(today)
                .and_then(|log| log.meal_in_slot(diet, meal_type));

            match existing {
                Some(entry) if entry.recipe_name == meal.recipe_name => false,
                Some(entry) => {
                    outcome = Err(MealSlotTaken {
                        diet,
                        meal_type,
                        existing_recipe: entry.recipe_name.clone(),
                    });
                    false
                }
                None => {
                    record
                        .nutrition
                        .diet_mut(diet)
                        .completed_recipes
                        .insert(recipe_key(&meal.recipe_name, today));
                    record.daily_log_mut(today).completed_meals.push(CompletedMealEntry {
                        diet_key: diet,
                        meal_type,
                        recipe_name: meal.recipe_name,
                        calories: meal.calories,
                        protein_g: meal.protein_g,
                        fat_g: meal.fat_g,
                        carbs_g: meal.carbs_g,
                        feedback: meal.feedback,
                        completed_at: now,
                    });
                    outcome = Ok(MealCompletion::Logged);
                    true
                }
            }
        });

        match &outcome {
            Ok(MealCompletion::Logged) => {
                let title = if title.is_empty() {
                    format!("{} logged", meal_type.display_name())
                } else {
                    title
                };
                self.inner.notifier.notify(Notice::success(title));
            }
            Ok(MealCompletion::Unchanged) => {}
            Err(taken) => {
                self.inner.notifier.notify(
                    Notice::error("Meal already logged today").with_description(format!(
                        "{} is already logged for {} today",
                        taken.existing_recipe,
                        meal_type.display_name().to_lowercase()
                    )),
                );
            }
        }
        outcome
    }

    fn schedule_push(&self) {
        let Some(user_id) = self.inner.current_user() else {
            return;
        };
        if self.inner.cloud.is_none() {
            return;
        }

        let inner = Arc::downgrade(&self.inner);
        self.inner.debouncer.schedule(async move {
            if let Some(inner) = inner.upgrade() {
                inner.push_for(user_id).await;
            }
        });
    }

    /// Whether a debounced push is waiting to fire.
    pub fn is_push_pending(&self) -> bool {
        self.inner.debouncer.is_pending()
    }
}

impl<R: RemoteProgressStore> Inner<R> {
    /// Push the latest record if `user_id` is still signed in.
    async fn push_for(&self, user_id: Uuid) -> bool {
        let Some(cloud) = self.cloud.as_ref() else {
            return false;
        };
        if self.current_user() != Some(user_id) {
            tracing::debug!("Dropping push for signed-out user {}", user_id);
            return false;
        }

        let record = self.record().clone();
        match cloud.push_to_cloud(user_id, &record).await {
            Ok(()) => {
                self.emit(ProgressEvent::Pushed);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to push progress for user {}: {}", user_id, e);
                self.emit(ProgressEvent::PushFailed);
                false
            }
        }
    }
}
