use std::fmt::Write;

use serde_json::Value;

use crate::models::{LearningAnalytics, StructuredDescription, TopologyAnalysis};

/// Renders a topology description template into an English sentence.
pub fn render_description(description: &StructuredDescription) -> String {
    let param = |key: &str| -> String {
        match description.params.get(key) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => "unknown".to_string(),
            Some(other) => other.to_string(),
        }
    };

    let shape = format!(
        "{} nodes across {} tiers and {} roots ({} hours, {} branching, {} sequencing)",
        param("node_count"),
        param("tier_count"),
        param("root_count"),
        param("total_hours"),
        param("trend"),
        param("sequencing"),
    );

    match description.template_key.as_str() {
        "topology.breadth_first" => {
            format!("Broad curriculum: survey every topic before going deep. {shape}.")
        }
        "topology.depth_first" => {
            format!("Narrow chains: follow one track to the end before switching. {shape}.")
        }
        "topology.convergent_mastery" => format!(
            "Broad topics narrow into focused lessons; master each branch in turn. {shape}."
        ),
        "topology.spiral_reinforcement" => format!(
            "Topics such as {} return at deeper tiers; revisit them as they reappear. {shape}.",
            param("dominant_category")
        ),
        _ => format!("No single teaching pattern dominates. {shape}."),
    }
}

fn write_topology(output: &mut String, topology: &TopologyAnalysis) {
    let _ = writeln!(output, "## Curriculum Shape");
    let _ = writeln!(output, "Strategy: {}", topology.strategy.as_str());
    let _ = writeln!(output, "{}", render_description(&topology.description));
    let _ = writeln!(output);
    for tier in &topology.tiers {
        let _ = writeln!(
            output,
            "- tier {}: {} nodes, branching {:.2}, avg effort {:.1}h",
            tier.depth, tier.node_count, tier.branching_factor, tier.avg_effort_hours
        );
    }
}

pub fn build_report(analytics: &LearningAnalytics) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Learning Analytics Report");
    let _ = writeln!(
        output,
        "Generated for learner {} at {}",
        analytics.learner_id,
        analytics.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);

    write_topology(&mut output, &analytics.topology);

    let velocity = &analytics.velocity;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Velocity");
    let _ = writeln!(
        output,
        "{:.1} hours/week ({}) across {} active weeks",
        velocity.hours_per_week,
        velocity.pace.as_str(),
        velocity.populated_weeks
    );

    let gaps = &analytics.skill_gaps;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Skill Gaps for {}", gaps.target_role);
    let _ = writeln!(
        output,
        "Overall gap score {:.1}, about {:.0} hours to close",
        gaps.overall_score, gaps.estimated_hours_to_close
    );

    if gaps.gaps.is_empty() {
        let _ = writeln!(output, "No gaps against the target role.");
    } else {
        for gap in gaps.gaps.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {} -> {} (gap {}, {:?})",
                gap.skill, gap.current_level, gap.required_level, gap.gap, gap.priority
            );
        }
    }

    let patterns = &analytics.patterns;
    let engagement = &analytics.engagement;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Habits");
    match (patterns.most_productive_day, patterns.most_productive_hour) {
        (Some(day), Some(hour)) => {
            let _ = writeln!(output, "Most active on {day} around {hour:02}:00");
        }
        _ => {
            let _ = writeln!(output, "No sessions recorded yet.");
        }
    }
    let _ = writeln!(
        output,
        "Average session {:.0} minutes; streak {} (longest {}); return rate {:.0}%",
        patterns.avg_session_minutes,
        engagement.current_streak,
        engagement.longest_streak,
        engagement.return_rate * 100.0
    );
    for entry in &patterns.top_categories {
        let _ = writeln!(output, "- {}: {} views", entry.category, entry.views);
    }

    let predictions = &analytics.predictions;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Outlook");
    match predictions.expected_completion {
        Some(date) => {
            let _ = writeln!(
                output,
                "{:.1} hours remain; expected completion {} (confidence {:.0}%)",
                predictions.remaining_hours,
                date,
                predictions.confidence * 100.0
            );
        }
        None => {
            let _ = writeln!(
                output,
                "{:.1} hours remain; not enough pace data to project a date",
                predictions.remaining_hours
            );
        }
    }

    if predictions.risk_factors.is_empty() {
        let _ = writeln!(output, "No risk factors flagged.");
    } else {
        for factor in &predictions.risk_factors {
            let _ = writeln!(output, "- risk: {}", factor.as_str());
        }
    }

    output
}
