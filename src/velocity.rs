use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::models::{
    week_index, week_start, CurriculumGraph, LearnerProfile, NodeId, Pace, VelocityResult,
    WeekBucket,
};

/// Weekly effort-hours pace for a learner.
///
/// A completed node counts toward the week of the earliest session that viewed it; its effort is
/// read from `graph`. Never fails: sparse histories come back as `InsufficientData`.
pub fn calculate_velocity(
    profile: &LearnerProfile,
    graph: &CurriculumGraph,
    config: &EngineConfig,
) -> VelocityResult {
    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for session in &profile.sessions {
        buckets.entry(week_index(session.date())).or_default().1 += 1;
    }

    let first_views = first_completion_views(profile);
    for (node_id, viewed_at) in &first_views {
        match graph.effort_hours(node_id) {
            Some(hours) => {
                buckets.entry(week_index(viewed_at.date_naive())).or_default().0 += hours;
            }
            None => warn!(node = %node_id, "completed node missing from curriculum graph"),
        }
    }

    let weekly: Vec<WeekBucket> = buckets
        .iter()
        .map(|(week, (hours, sessions))| WeekBucket {
            week_start: week_start(*week),
            hours: *hours,
            sessions: *sessions,
        })
        .collect();

    if weekly.len() < 2 {
        debug!(
            learner = %profile.learner_id,
            populated_weeks = weekly.len(),
            "not enough weekly history for a velocity trend"
        );
        return VelocityResult {
            hours_per_week: 0.0,
            pace: Pace::InsufficientData,
            slope: 0.0,
            populated_weeks: weekly.len(),
            weekly,
        };
    }

    let hours_per_week = weekly.iter().map(|bucket| bucket.hours).sum::<f64>() / weekly.len() as f64;

    let window_start = buckets.len().saturating_sub(config.velocity_window_weeks.max(2));
    let points: Vec<(f64, f64)> = buckets
        .iter()
        .skip(window_start)
        .map(|(week, (hours, _))| (*week as f64, *hours))
        .collect();
    let slope = slope(&points);

    let threshold = config.trend_threshold * hours_per_week;
    let pace = if slope > threshold {
        Pace::Accelerating
    } else if slope < -threshold {
        Pace::Decelerating
    } else {
        Pace::Steady
    };

    debug!(
        learner = %profile.learner_id,
        hours_per_week,
        slope,
        ?pace,
        "calculated learner velocity"
    );

    VelocityResult {
        hours_per_week,
        pace,
        slope,
        populated_weeks: weekly.len(),
        weekly,
    }
}

/// Earliest session start that viewed each completed node. Completed nodes no session viewed
/// are left out.
fn first_completion_views(profile: &LearnerProfile) -> BTreeMap<&NodeId, DateTime<Utc>> {
    let mut first_views: BTreeMap<&NodeId, DateTime<Utc>> = BTreeMap::new();
    for session in &profile.sessions {
        for node_id in &session.viewed_nodes {
            if !profile.completed_nodes.contains(node_id) {
                continue;
            }
            first_views
                .entry(node_id)
                .and_modify(|earliest| *earliest = (*earliest).min(session.started_at))
                .or_insert(session.started_at);
        }
    }
    first_views
}

/// Least-squares slope of `y` over `x`.
fn slope(points: &[(f64, f64)]) -> f64 {
    let n = points.len() as f64;
    if points.len() < 2 {
        return 0.0;
    }
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (covariance, variance) = points.iter().fold((0.0, 0.0), |(cov, var), (x, y)| {
        (cov + (x - mean_x) * (y - mean_y), var + (x - mean_x).powi(2))
    });

    if variance == 0.0 {
        0.0
    } else {
        covariance / variance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{at, flat_lessons, profile, session};
    use chrono::Duration;

    /// `hours[w]` one-hour lessons completed across week `w`, one session per lesson,
    /// starting Monday 2026-03-02.
    fn weekly_profile(hours: &[usize]) -> (LearnerProfile, CurriculumGraph) {
        let total: usize = hours.iter().sum();
        let graph = flat_lessons(total);
        let mut learner = profile();
        let mut lesson = 0;

        for (week, count) in hours.iter().enumerate() {
            for i in 0..*count {
                let started_at = at(2026, 3, 2, 10)
                    + Duration::days((week * 7 + i % 5) as i64)
                    + Duration::hours((i / 5) as i64);
                let id = format!("lesson-{lesson}");
                learner.sessions.push(session(started_at, Some(45), &[&id]));
                learner.completed_nodes.insert(NodeId::new(id));
                lesson += 1;
            }
        }
        (learner, graph)
    }

    #[test]
    fn no_sessions_is_insufficient_data() {
        let result = calculate_velocity(&profile(), &flat_lessons(3), &EngineConfig::default());
        assert_eq!(result.pace, Pace::InsufficientData);
        assert_eq!(result.hours_per_week, 0.0);
        assert!(result.weekly.is_empty());
    }

    #[test]
    fn single_week_is_insufficient_data() {
        let (learner, graph) = weekly_profile(&[5]);
        let result = calculate_velocity(&learner, &graph, &EngineConfig::default());
        assert_eq!(result.pace, Pace::InsufficientData);
        assert_eq!(result.hours_per_week, 0.0);
        assert_eq!(result.populated_weeks, 1);
    }

    #[test]
    fn even_weeks_are_steady() {
        let (learner, graph) = weekly_profile(&[5, 5, 5, 5]);
        let result = calculate_velocity(&learner, &graph, &EngineConfig::default());

        assert_eq!(learner.sessions.len(), 20);
        assert_eq!(result.pace, Pace::Steady);
        assert!((result.hours_per_week - 5.0).abs() < 1e-9);
        assert_eq!(result.populated_weeks, 4);
        assert!(result.weekly.iter().all(|bucket| bucket.sessions == 5));
    }

    #[test]
    fn rising_hours_accelerate_and_falling_hours_decelerate() {
        let (learner, graph) = weekly_profile(&[1, 2, 3, 4]);
        let result = calculate_velocity(&learner, &graph, &EngineConfig::default());
        assert_eq!(result.pace, Pace::Accelerating);
        assert!((result.slope - 1.0).abs() < 1e-9);

        let (learner, graph) = weekly_profile(&[4, 3, 2, 1]);
        let result = calculate_velocity(&learner, &graph, &EngineConfig::default());
        assert_eq!(result.pace, Pace::Decelerating);
    }

    #[test]
    fn trend_only_uses_recent_window() {
        // Early burst falls outside the six-week window.
        let (learner, graph) = weekly_profile(&[5, 5, 1, 1, 1, 1, 1, 1]);
        let result = calculate_velocity(&learner, &graph, &EngineConfig::default());
        assert_eq!(result.pace, Pace::Steady);
        assert!((result.hours_per_week - 2.0).abs() < 1e-9);
    }

    #[test]
    fn completion_counts_toward_earliest_viewing_session() {
        let graph = flat_lessons(1);
        let mut learner = profile();
        learner.sessions.push(session(at(2026, 3, 10, 9), None, &["lesson-0"]));
        learner.sessions.push(session(at(2026, 3, 3, 9), None, &["lesson-0"]));
        learner.completed_nodes.insert(NodeId::from("lesson-0"));

        let result = calculate_velocity(&learner, &graph, &EngineConfig::default());
        assert_eq!(result.weekly.len(), 2);
        assert_eq!(result.weekly[0].hours, 1.0);
        assert_eq!(result.weekly[1].hours, 0.0);
    }

    #[test]
    fn unknown_completed_nodes_contribute_nothing() {
        let graph = flat_lessons(1);
        let mut learner = profile();
        learner.sessions.push(session(at(2026, 3, 3, 9), None, &["ghost"]));
        learner.sessions.push(session(at(2026, 3, 10, 9), None, &["ghost"]));
        learner.completed_nodes.insert(NodeId::from("ghost"));

        let result = calculate_velocity(&learner, &graph, &EngineConfig::default());
        assert_eq!(result.hours_per_week, 0.0);
        assert_eq!(result.pace, Pace::Steady);
    }
}
