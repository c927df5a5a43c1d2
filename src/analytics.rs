//! Aggregates topology, velocity and skill gaps with session statistics into one
//! [`LearningAnalytics`] record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::AnalyticsError;
use crate::models::{
    week_index, weekday_index, CategoryCount, CurriculumGraph, EngagementStats, LearnerProfile,
    LearningAnalytics, NodeCategory, Pace, PatternStats, Predictions, RiskFactor,
    SkillGapAnalysis, VelocityResult,
};
use crate::skills::analyze_skill_gaps;
use crate::topology;
use crate::velocity::calculate_velocity;

const WEEKDAYS: [chrono::Weekday; 7] = [
    chrono::Weekday::Mon,
    chrono::Weekday::Tue,
    chrono::Weekday::Wed,
    chrono::Weekday::Thu,
    chrono::Weekday::Fri,
    chrono::Weekday::Sat,
    chrono::Weekday::Sun,
];

/// Full analytics for one learner against one curriculum.
///
/// `now` anchors every date window; the system clock is never read. Graph errors surface before
/// goal errors, each tagged with the sub-computation that raised it.
pub fn analyze_learning_data(
    profile: &LearnerProfile,
    graph: &CurriculumGraph,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<LearningAnalytics, AnalyticsError> {
    let topology = topology::analyze(graph, config)?;
    let velocity = calculate_velocity(profile, graph, config);
    let skill_gaps = analyze_skill_gaps(profile, config)?;
    let patterns = pattern_stats(profile, graph, config);
    let engagement = engagement_stats(profile, now, config);
    let predictions = predict(
        profile,
        graph,
        &velocity,
        &skill_gaps,
        &engagement,
        now,
        config,
    );

    info!(
        learner = %profile.learner_id,
        sessions = profile.sessions.len(),
        strategy = topology.strategy.as_str(),
        risks = predictions.risk_factors.len(),
        "learning analytics computed"
    );

    Ok(LearningAnalytics {
        learner_id: profile.learner_id,
        generated_at: now,
        topology,
        velocity,
        skill_gaps,
        patterns,
        engagement,
        predictions,
    })
}

pub fn pattern_stats(
    profile: &LearnerProfile,
    graph: &CurriculumGraph,
    config: &EngineConfig,
) -> PatternStats {
    let mut weekday_tally = [0usize; 7];
    let mut hour_tally = [0usize; 24];
    let mut category_views: BTreeMap<NodeCategory, usize> = BTreeMap::new();

    for session in &profile.sessions {
        weekday_tally[weekday_index(session.started_at.weekday())] += 1;
        hour_tally[session.started_at.hour() as usize] += 1;

        for node_id in &session.viewed_nodes {
            match graph.node(node_id) {
                Some(node) => *category_views.entry(node.category).or_insert(0) += 1,
                None => debug!(node = %node_id, "viewed node missing from curriculum graph"),
            }
        }
    }

    let durations: Vec<f64> = profile
        .sessions
        .iter()
        .filter_map(|session| session.duration_minutes())
        .collect();
    let avg_session_minutes = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };

    let mut top_categories: Vec<CategoryCount> = category_views
        .into_iter()
        .map(|(category, views)| CategoryCount { category, views })
        .collect();
    // Stable sort keeps category order on equal counts.
    top_categories.sort_by(|a, b| b.views.cmp(&a.views));
    top_categories.truncate(config.top_categories);

    PatternStats {
        most_productive_day: argmax(&weekday_tally).map(|index| WEEKDAYS[index]),
        most_productive_hour: argmax(&hour_tally).map(|hour| hour as u32),
        avg_session_minutes,
        top_categories,
        weekday_tally,
        hour_tally,
    }
}

pub fn engagement_stats(
    profile: &LearnerProfile,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> EngagementStats {
    let days: BTreeSet<_> = profile.sessions.iter().map(|session| session.date()).collect();
    let mut longest_run = 0u32;
    let mut run = 0u32;
    let mut previous = None;
    for day in &days {
        run = match previous {
            Some(prev) if *day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest_run = longest_run.max(run);
        previous = Some(*day);
    }

    let active_weeks = profile
        .sessions
        .iter()
        .map(|session| week_index(session.date()))
        .collect::<BTreeSet<_>>()
        .len();

    // A window reaching past the earliest representable instant starts there.
    let window_before = |end: DateTime<Utc>| {
        Duration::try_days(config.return_window_days)
            .and_then(|window| end.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    };
    let recent_start = window_before(now);
    let prior_start = window_before(recent_start);
    let recent_sessions = profile
        .sessions
        .iter()
        .filter(|session| session.started_at > recent_start && session.started_at <= now)
        .count();
    let prior_sessions = profile
        .sessions
        .iter()
        .filter(|session| session.started_at > prior_start && session.started_at <= recent_start)
        .count();

    let return_rate = match (prior_sessions, recent_sessions) {
        (0, 0) => 0.0,
        (0, _) => 1.0,
        (prior, recent) => (recent as f64 / prior as f64).min(1.0),
    };

    EngagementStats {
        current_streak: profile.current_streak,
        longest_streak: longest_run.max(profile.current_streak),
        active_weeks,
        total_sessions: profile.sessions.len(),
        recent_sessions,
        prior_sessions,
        return_rate,
    }
}

pub fn predict(
    profile: &LearnerProfile,
    graph: &CurriculumGraph,
    velocity: &VelocityResult,
    skill_gaps: &SkillGapAnalysis,
    engagement: &EngagementStats,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Predictions {
    let remaining_hours: f64 = graph
        .nodes()
        .iter()
        .filter(|node| !profile.completed_nodes.contains(&node.id))
        .map(|node| node.estimated_hours)
        .sum();

    let weeks_to_complete = (velocity.hours_per_week > 0.0)
        .then(|| (remaining_hours / velocity.hours_per_week).ceil())
        .filter(|weeks| *weeks <= f64::from(u32::MAX))
        .map(|weeks| weeks as u32);
    // No date when the projection runs off the calendar.
    let expected_completion = weeks_to_complete.and_then(|weeks| {
        Duration::try_weeks(i64::from(weeks))
            .and_then(|span| now.date_naive().checked_add_signed(span))
    });

    let confidence = (config.confidence_base
        + config.confidence_step * profile.sessions.len() as f64)
        .min(config.confidence_cap);

    let checks = [
        (
            velocity.pace == Pace::Decelerating,
            RiskFactor::DeceleratingVelocity,
        ),
        (
            engagement.return_rate < config.low_return_rate,
            RiskFactor::LowReturnRate,
        ),
        (
            skill_gaps.overall_score > config.high_gap_score,
            RiskFactor::HighSkillGap,
        ),
        (profile.current_streak == 0, RiskFactor::NoActiveStreak),
    ];
    let risk_factors: Vec<RiskFactor> = checks
        .into_iter()
        .filter_map(|(flagged, factor)| flagged.then_some(factor))
        .collect();

    debug!(
        remaining_hours,
        ?weeks_to_complete,
        confidence,
        ?risk_factors,
        "projected completion"
    );

    Predictions {
        remaining_hours,
        weeks_to_complete,
        expected_completion,
        confidence,
        risk_factors,
    }
}

/// Index of the largest count; the earliest index wins ties. `None` when every count is zero.
fn argmax(tally: &[usize]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (index, &count) in tally.iter().enumerate() {
        if count > 0 && best.map_or(true, |(_, top)| count > top) {
            best = Some((index, count));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GoalPriority, NodeId};
    use crate::test_helpers::{at, flat_lessons, goal, node, profile, session};
    use chrono::{NaiveDate, Weekday};

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn mixed_graph() -> CurriculumGraph {
        CurriculumGraph::new(vec![
            node("web", NodeCategory::Frontend, 0, None, 4.0),
            node("css", NodeCategory::Frontend, 1, Some("web"), 2.0),
            node("api", NodeCategory::Backend, 1, Some("web"), 2.0),
            node("sql", NodeCategory::Databases, 1, Some("web"), 2.0),
        ])
    }

    #[test]
    fn patterns_break_ties_toward_earliest_day_and_hour() {
        let mut learner = profile();
        // 2026-03-03 is a Tuesday, 2026-03-02 a Monday.
        learner.sessions.push(session(at(2026, 3, 3, 15), Some(30), &[]));
        learner.sessions.push(session(at(2026, 3, 2, 9), Some(60), &[]));

        let patterns = pattern_stats(&learner, &mixed_graph(), &config());
        assert_eq!(patterns.most_productive_day, Some(Weekday::Mon));
        assert_eq!(patterns.most_productive_hour, Some(9));
        assert_eq!(patterns.weekday_tally[0], 1);
        assert_eq!(patterns.weekday_tally[1], 1);
    }

    #[test]
    fn open_sessions_skip_the_length_average_but_count_in_tallies() {
        let mut learner = profile();
        learner.sessions.push(session(at(2026, 3, 4, 20), Some(40), &[]));
        learner.sessions.push(session(at(2026, 3, 4, 20), None, &[]));
        learner.sessions.push(session(at(2026, 3, 5, 8), Some(20), &[]));

        let patterns = pattern_stats(&learner, &mixed_graph(), &config());
        assert_eq!(patterns.avg_session_minutes, 30.0);
        assert_eq!(patterns.most_productive_day, Some(Weekday::Wed));
        assert_eq!(patterns.most_productive_hour, Some(20));
        assert_eq!(patterns.hour_tally[20], 2);
    }

    #[test]
    fn empty_history_has_no_productive_slot() {
        let patterns = pattern_stats(&profile(), &mixed_graph(), &config());
        assert_eq!(patterns.most_productive_day, None);
        assert_eq!(patterns.most_productive_hour, None);
        assert_eq!(patterns.avg_session_minutes, 0.0);
        assert!(patterns.top_categories.is_empty());
    }

    #[test]
    fn top_categories_rank_by_views_then_category_order() {
        let mut learner = profile();
        learner
            .sessions
            .push(session(at(2026, 3, 2, 9), None, &["api", "sql", "api", "ghost"]));
        learner.sessions.push(session(at(2026, 3, 3, 9), None, &["css", "sql"]));
        learner.sessions.push(session(at(2026, 3, 4, 9), None, &["web", "sql"]));

        let config = EngineConfig {
            top_categories: 2,
            ..config()
        };
        let patterns = pattern_stats(&learner, &mixed_graph(), &config);
        let ranked: Vec<(NodeCategory, usize)> = patterns
            .top_categories
            .iter()
            .map(|entry| (entry.category, entry.views))
            .collect();
        assert_eq!(
            ranked,
            vec![(NodeCategory::Databases, 3), (NodeCategory::Frontend, 2)]
        );
    }

    #[test]
    fn engagement_windows_and_streaks() {
        let now = at(2026, 4, 1, 12);
        let mut learner = profile();
        learner.current_streak = 1;
        for day in [5, 6, 7, 10] {
            learner.sessions.push(session(at(2026, 3, day, 9), None, &[]));
        }
        learner.sessions.push(session(at(2026, 3, 30, 9), None, &[]));
        learner.sessions.push(session(at(2026, 3, 31, 9), None, &[]));

        let engagement = engagement_stats(&learner, now, &config());
        assert_eq!(engagement.longest_streak, 3);
        assert_eq!(engagement.active_weeks, 3);
        assert_eq!(engagement.prior_sessions, 4);
        assert_eq!(engagement.recent_sessions, 2);
        assert_eq!(engagement.return_rate, 0.5);
    }

    #[test]
    fn return_rate_edge_cases() {
        let now = at(2026, 4, 1, 12);
        let mut learner = profile();
        assert_eq!(engagement_stats(&learner, now, &config()).return_rate, 0.0);

        learner.sessions.push(session(at(2026, 3, 31, 9), None, &[]));
        assert_eq!(engagement_stats(&learner, now, &config()).return_rate, 1.0);

        learner.sessions.push(session(at(2026, 3, 10, 9), None, &[]));
        learner.sessions.push(session(at(2026, 3, 30, 9), None, &[]));
        // Two recent against one prior caps at 1.
        assert_eq!(engagement_stats(&learner, now, &config()).return_rate, 1.0);
    }

    #[test]
    fn completion_date_needs_positive_velocity() {
        let now = at(2026, 4, 1, 12);
        let graph = flat_lessons(10);
        let mut learner = profile();
        learner.completed_nodes.insert(NodeId::from("lesson-0"));
        learner.current_streak = 2;
        learner
            .career_goals
            .push(goal("QA", GoalPriority::Primary, &[("testing", 10, 1.0, false)]));
        let skill_gaps = analyze_skill_gaps(&learner, &config()).unwrap();
        let engagement = engagement_stats(&learner, now, &config());

        let stalled = calculate_velocity(&learner, &graph, &config());
        let predictions = predict(&learner, &graph, &stalled, &skill_gaps, &engagement, now, &config());
        assert_eq!(predictions.remaining_hours, 9.0);
        assert_eq!(predictions.weeks_to_complete, None);
        assert_eq!(predictions.expected_completion, None);
        assert_eq!(predictions.confidence, 0.4);

        let moving = VelocityResult {
            hours_per_week: 2.0,
            pace: Pace::Steady,
            slope: 0.0,
            populated_weeks: 3,
            weekly: Vec::new(),
        };
        let predictions = predict(&learner, &graph, &moving, &skill_gaps, &engagement, now, &config());
        assert_eq!(predictions.weeks_to_complete, Some(5));
        assert_eq!(
            predictions.expected_completion,
            NaiveDate::from_ymd_opt(2026, 5, 6)
        );
        assert_eq!(predictions.risk_factors, vec![RiskFactor::LowReturnRate]);
    }

    #[test]
    fn return_windows_are_half_open_and_ignore_future_sessions() {
        let now = at(2026, 4, 1, 12);
        let mut learner = profile();
        // Exactly fourteen days back closes the prior window, not the recent one.
        learner.sessions.push(session(at(2026, 3, 18, 12), None, &[]));
        learner.sessions.push(session(at(2026, 4, 1, 12), None, &[]));
        learner.sessions.push(session(at(2026, 4, 2, 9), None, &[]));
        // Exactly twenty-eight days back falls outside both windows.
        learner.sessions.push(session(at(2026, 3, 4, 12), None, &[]));

        let engagement = engagement_stats(&learner, now, &config());
        assert_eq!(engagement.recent_sessions, 1);
        assert_eq!(engagement.prior_sessions, 1);
        assert_eq!(engagement.return_rate, 1.0);
        assert_eq!(engagement.total_sessions, 4);
    }

    #[test]
    fn oversized_return_window_covers_all_history() {
        let now = at(2026, 4, 1, 12);
        let mut learner = profile();
        learner.sessions.push(session(at(1990, 1, 1, 9), None, &[]));
        learner.sessions.push(session(at(2026, 3, 31, 9), None, &[]));

        let config = EngineConfig {
            return_window_days: 1_000_000_000,
            ..config()
        };
        let engagement = engagement_stats(&learner, now, &config);
        assert_eq!(engagement.recent_sessions, 2);
        assert_eq!(engagement.prior_sessions, 0);
        assert_eq!(engagement.return_rate, 1.0);
    }

    #[test]
    fn projection_past_the_calendar_has_no_date() {
        let now = at(2026, 4, 1, 12);
        let graph = flat_lessons(10);
        let mut learner = profile();
        learner
            .career_goals
            .push(goal("QA", GoalPriority::Primary, &[]));
        let skill_gaps = analyze_skill_gaps(&learner, &config()).unwrap();
        let engagement = engagement_stats(&learner, now, &config());
        let crawling = |hours_per_week: f64| VelocityResult {
            hours_per_week,
            pace: Pace::Decelerating,
            slope: -1.0,
            populated_weeks: 2,
            weekly: Vec::new(),
        };

        // About a billion weeks: countable, but beyond the last representable date.
        let predictions = predict(
            &learner,
            &graph,
            &crawling(1e-8),
            &skill_gaps,
            &engagement,
            now,
            &config(),
        );
        assert!(predictions.weeks_to_complete.is_some());
        assert_eq!(predictions.expected_completion, None);

        let predictions = predict(
            &learner,
            &graph,
            &crawling(1e-12),
            &skill_gaps,
            &engagement,
            now,
            &config(),
        );
        assert_eq!(predictions.weeks_to_complete, None);
        assert_eq!(predictions.expected_completion, None);
        assert_eq!(predictions.remaining_hours, 10.0);
    }

    #[test]
    fn confidence_caps_at_point_nine() {
        let now = at(2026, 4, 1, 12);
        let graph = flat_lessons(1);
        let mut learner = profile();
        for day in 1..=25 {
            learner.sessions.push(session(at(2026, 3, day, 9), None, &[]));
        }
        learner
            .career_goals
            .push(goal("QA", GoalPriority::Primary, &[]));

        let analytics = analyze_learning_data(&learner, &graph, now, &config()).unwrap();
        assert!((analytics.predictions.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn graph_errors_are_tagged_and_win_over_goal_errors() {
        let learner = profile();
        let err = analyze_learning_data(&learner, &CurriculumGraph::default(), at(2026, 4, 1, 12), &config())
            .unwrap_err();
        assert_eq!(
            err,
            AnalyticsError::Topology(crate::error::TopologyError::EmptyGraph)
        );

        let err = analyze_learning_data(&learner, &flat_lessons(2), at(2026, 4, 1, 12), &config())
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::SkillGap(_)));
    }
}
