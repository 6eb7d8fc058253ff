//! Daily health analysis.
//!
//! Classifies today's hydration, sleep and activity into coarse levels
//! with a short message for the dashboard.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::metrics::{today_calories_burned, today_hydration_ml, today_sleep_hours};
use super::types::ProgressRecord;

/// Daily water target in millilitres.
pub const HYDRATION_TARGET_ML: u32 = 2000;

/// Nightly sleep target in hours.
pub const SLEEP_TARGET_HOURS: f32 = 8.0;

/// Severity of a daily metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    /// Nothing logged yet
    None,
    Critical,
    Warning,
    Good,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HydrationStatus {
    pub level: HealthLevel,
    pub message: &'static str,
    pub current_ml: u32,
    pub target_ml: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepStatus {
    pub level: HealthLevel,
    pub message: &'static str,
    pub current_hours: f32,
    pub target_hours: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityStatus {
    pub level: HealthLevel,
    pub message: &'static str,
    pub calories_burned: u32,
}

/// Today's health overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthAnalysis {
    pub hydration: HydrationStatus,
    pub sleep: SleepStatus,
    pub activity: ActivityStatus,
}

impl HealthAnalysis {
    /// Analyze the record for the given day.
    pub fn for_day(record: &ProgressRecord, today: NaiveDate) -> Self {
        Self {
            hydration: hydration_status(today_hydration_ml(record, today)),
            sleep: sleep_status(today_sleep_hours(record, today)),
            activity: activity_status(today_calories_burned(record, today)),
        }
    }
}

fn hydration_status(ml: u32) -> HydrationStatus {
    let (level, message) = match ml {
        0 => (HealthLevel::None, "Log your water intake"),
        1..=499 => (
            HealthLevel::Critical,
            "Critical hydration. Drink water now to avoid fatigue and headaches.",
        ),
        500..=1499 => (
            HealthLevel::Warning,
            "Low hydration. Drink more water to avoid fatigue and poor digestion.",
        ),
        _ => (
            HealthLevel::Good,
            "Well hydrated. Keep it up to hold your energy and focus.",
        ),
    };

    HydrationStatus {
        level,
        message,
        current_ml: ml,
        target_ml: HYDRATION_TARGET_ML,
    }
}

fn sleep_status(hours: f32) -> SleepStatus {
    let (level, message) = if hours <= 0.0 {
        (HealthLevel::None, "Log your sleep hours")
    } else if hours < 5.0 {
        (
            HealthLevel::Critical,
            "Critical sleep. Under 5h hurts recovery, mood and metabolism.",
        )
    } else if hours < 7.0 {
        (
            HealthLevel::Warning,
            "Not enough sleep. Aim for 7-8h to get the most out of the program.",
        )
    } else {
        (HealthLevel::Good, "Good sleep. Your body is recovering well.")
    };

    SleepStatus {
        level,
        message,
        current_hours: hours,
        target_hours: SLEEP_TARGET_HOURS,
    }
}

fn activity_status(calories: u32) -> ActivityStatus {
    let (level, message) = match calories {
        0 => (HealthLevel::None, "Do today's workout"),
        1..=99 => (
            HealthLevel::Warning,
            "Light activity. Consider a harder session tomorrow.",
        ),
        100..=249 => (HealthLevel::Good, "Good activity. You are on track."),
        _ => (HealthLevel::Good, "Excellent. Intense session completed."),
    };

    ActivityStatus {
        level,
        message,
        calories_burned: calories,
    }
}
