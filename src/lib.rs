//! Personal21 - Local-first wellness progress tracking
//!
//! Records daily hydration, sleep, meals, workouts and reading progress on
//! the device, derives dashboard metrics from it, and keeps a per-user copy
//! in a hosted database in sync with debounced pushes and realtime
//! invalidation.

pub mod config;
pub mod notify;
pub mod progress;
pub mod realtime;
pub mod sync;
pub mod tracker;

// Re-export commonly used types
pub use config::AppConfig;
pub use progress::{LocalProgressStore, ProgressRecord};
pub use realtime::RealtimeBridge;
pub use sync::{CloudSync, HttpRemoteStore};
pub use tracker::{MealCompletion, MealLog, MealSlotTaken, ProgressEvent, ProgressTracker};
