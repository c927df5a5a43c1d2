use tracing::debug;

use crate::config::EngineConfig;
use crate::error::SkillGapError;
use crate::models::{
    CareerGoal, GapPriority, GoalPriority, LearnerProfile, SkillGap, SkillGapAnalysis,
    SkillSnapshot,
};

const WEEKS_PER_MONTH: f64 = 52.0 / 12.0;

pub fn analyze_skill_gaps(
    profile: &LearnerProfile,
    config: &EngineConfig,
) -> Result<SkillGapAnalysis, SkillGapError> {
    let goal = primary_goal(profile).ok_or(SkillGapError::NoCareerGoal {
        learner_id: profile.learner_id,
    })?;

    let mut gaps = Vec::new();
    let mut current_skills = Vec::with_capacity(goal.required_skills.len());
    let mut weighted_gap = 0.0;
    let mut total_weight = 0.0;

    for requirement in &goal.required_skills {
        let current_level = profile.skill_level(&requirement.skill).value();
        let required_level = requirement.min_level.value();
        let gap = required_level.saturating_sub(current_level);

        current_skills.push(SkillSnapshot {
            skill: requirement.skill.clone(),
            current_level,
            required_level,
        });
        weighted_gap += f64::from(gap) * requirement.weight;
        total_weight += requirement.weight;

        if gap == 0 {
            continue;
        }
        gaps.push(SkillGap {
            skill: requirement.skill.clone(),
            current_level,
            required_level,
            gap,
            priority: gap_priority(gap, requirement.essential, config),
            weight: requirement.weight,
        });
    }

    gaps.sort_by(|a, b| {
        b.gap
            .cmp(&a.gap)
            .then(a.priority.cmp(&b.priority))
            .then_with(|| a.skill.cmp(&b.skill))
    });

    let overall_score = if total_weight > 0.0 {
        (weighted_gap / total_weight).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let estimated_hours_to_close = gaps
        .iter()
        .map(|gap| f64::from(gap.gap) / config.points_per_hour)
        .sum::<f64>();

    let weekly_hours_needed = (goal.timeline_months > 0)
        .then(|| estimated_hours_to_close / (f64::from(goal.timeline_months) * WEEKS_PER_MONTH));

    debug!(
        learner = %profile.learner_id,
        role = %goal.target_role,
        gaps = gaps.len(),
        overall_score,
        "analyzed skill gaps"
    );

    Ok(SkillGapAnalysis {
        target_role: goal.target_role.clone(),
        timeline_months: goal.timeline_months,
        overall_score,
        gaps,
        current_skills,
        estimated_hours_to_close,
        weekly_hours_needed,
    })
}

/// The goal marked primary, else the first goal listed.
pub fn primary_goal(profile: &LearnerProfile) -> Option<&CareerGoal> {
    profile
        .career_goals
        .iter()
        .find(|goal| goal.priority == GoalPriority::Primary)
        .or_else(|| profile.career_goals.first())
}

pub fn gap_priority(gap: u8, essential: bool, config: &EngineConfig) -> GapPriority {
    if essential || gap >= config.critical_gap {
        GapPriority::Critical
    } else if gap >= config.important_gap {
        GapPriority::Important
    } else {
        GapPriority::NiceToHave
    }
}
