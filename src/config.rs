use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest return-rate window accepted, about ten years.
pub const MAX_RETURN_WINDOW_DAYS: i64 = 3650;

/// Tuning knobs for every analysis entry point, resolved once before a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Relative band around the mean branching factor that still counts as uniform.
    pub uniform_tolerance: f64,
    /// Highest average non-leaf branching factor for a curriculum to read as narrow.
    pub narrow_branching: f64,
    /// Effort assigned to a node whose record omits `estimated_hours`.
    pub default_lesson_hours: f64,
    pub velocity_window_weeks: usize,
    /// Slope threshold, as a share of mean weekly hours, for accelerating/decelerating.
    pub trend_threshold: f64,
    pub points_per_hour: f64,
    pub critical_gap: u8,
    pub important_gap: u8,
    pub return_window_days: i64,
    pub confidence_base: f64,
    pub confidence_step: f64,
    pub confidence_cap: f64,
    pub low_return_rate: f64,
    pub high_gap_score: f64,
    pub top_categories: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            uniform_tolerance: 0.15,
            narrow_branching: 1.5,
            default_lesson_hours: 0.5,
            velocity_window_weeks: 6,
            trend_threshold: 0.10,
            points_per_hour: 2.0,
            critical_gap: 40,
            important_gap: 15,
            return_window_days: 14,
            confidence_base: 0.4,
            confidence_step: 0.03,
            confidence_cap: 0.9,
            low_return_rate: 0.5,
            high_gap_score: 70.0,
            top_categories: 3,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("points_per_hour", self.points_per_hour),
            ("velocity_window_weeks", self.velocity_window_weeks as f64),
            ("return_window_days", self.return_window_days as f64),
        ];
        for (field, value) in positive {
            if value <= 0.0 || value.is_nan() {
                return Err(ConfigError::NonPositive { field, value });
            }
        }

        if self.return_window_days > MAX_RETURN_WINDOW_DAYS {
            return Err(ConfigError::TooLarge {
                field: "return_window_days",
                value: self.return_window_days,
                max: MAX_RETURN_WINDOW_DAYS,
            });
        }

        if self.default_lesson_hours < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "default_lesson_hours",
                value: self.default_lesson_hours,
            });
        }

        let unit = [
            ("uniform_tolerance", self.uniform_tolerance),
            ("trend_threshold", self.trend_threshold),
            ("confidence_base", self.confidence_base),
            ("confidence_cap", self.confidence_cap),
            ("low_return_rate", self.low_return_rate),
        ];
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { field, value });
            }
        }

        Ok(())
    }
}
