//! Adaptive learning analytics and curriculum topology engine.
//!
//! Pure, deterministic computations over a curriculum forest and a learner profile:
//! - [`topology::analyze`] classifies the curriculum's teaching strategy
//! - [`velocity::calculate_velocity`] turns session history into a weekly pace
//! - [`skills::analyze_skill_gaps`] compares skills against the primary career goal
//! - [`analytics::analyze_learning_data`] combines all of the above with engagement
//!   statistics and completion predictions
//!
//! Nothing here reads the clock, touches storage, or keeps state between calls.

pub mod analytics;
pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod report;
pub mod skills;
pub mod topology;
pub mod velocity;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use analytics::analyze_learning_data;
pub use config::EngineConfig;
pub use error::{AnalyticsError, SkillGapError, TopologyError};
pub use skills::analyze_skill_gaps;
pub use velocity::calculate_velocity;
