//! Local progress store.
//!
//! Persists the per-user progress record on the device and derives
//! read-only metrics from it:
//! - Record types and schema migrations
//! - Key-value storage backends (SQLite, in-memory)
//! - Pure derivations (today's totals, pillar progress, health analysis)

pub mod clock;
pub mod health;
pub mod metrics;
pub mod migration;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use health::{HealthAnalysis, HealthLevel};
pub use metrics::{MacroTotals, PillarProgress};
pub use migration::{DecodedRecord, MigrationError};
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage, StorageError};
pub use store::{LocalProgressStore, DEFAULT_PROGRESS_KEY};
pub use types::{
    CompletedMealEntry, DailyLog, DietKey, DietProgress, MealFeedback, MealType, ProgressRecord,
    WorkoutSession, CURRENT_SCHEMA_VERSION,
};
