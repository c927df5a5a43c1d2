use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::models::{
    CareerGoal, CurriculumGraph, CurriculumNode, GoalPriority, LearnerProfile, Level, NodeCategory,
    NodeId, RequiredSkill, Session, SkillName,
};

pub const LEARNER: &str = "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2";

pub fn node(
    id: &str,
    category: NodeCategory,
    depth: u32,
    parent: Option<&str>,
    hours: f64,
) -> CurriculumNode {
    CurriculumNode {
        id: NodeId::from(id),
        category,
        depth,
        parent: parent.map(NodeId::from),
        estimated_hours: hours,
    }
}

/// Single-root tree where every node at tier `i` has `widths[i]` children.
pub fn fan_out_graph(widths: &[usize]) -> CurriculumGraph {
    let mut nodes = vec![node("t0-0", NodeCategory::Backend, 0, None, 1.0)];
    let mut previous = vec!["t0-0".to_string()];

    for (tier, width) in widths.iter().enumerate() {
        let depth = tier as u32 + 1;
        let mut current = Vec::new();
        for parent in &previous {
            for _ in 0..*width {
                let id = format!("t{depth}-{}", current.len());
                nodes.push(node(&id, NodeCategory::Backend, depth, Some(parent), 1.0));
                current.push(id);
            }
        }
        previous = current;
    }

    CurriculumGraph::new(nodes)
}

/// `count` one-hour lessons, all roots.
pub fn flat_lessons(count: usize) -> CurriculumGraph {
    CurriculumGraph::new(
        (0..count)
            .map(|i| node(&format!("lesson-{i}"), NodeCategory::Testing, 0, None, 1.0))
            .collect(),
    )
}

pub fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid test timestamp")
}

pub fn session(started_at: DateTime<Utc>, minutes: Option<i64>, viewed: &[&str]) -> Session {
    Session {
        started_at,
        ended_at: minutes.map(|m| started_at + Duration::minutes(m)),
        viewed_nodes: viewed.iter().map(|id| NodeId::from(*id)).collect(),
    }
}

pub fn skill(name: &str) -> SkillName {
    SkillName::try_from(name).expect("valid skill name")
}

pub fn level(value: i64) -> Level {
    Level::try_from(value).expect("valid level")
}

/// Requirements are `(skill, min_level, weight, essential)`.
pub fn goal(role: &str, priority: GoalPriority, requirements: &[(&str, i64, f64, bool)]) -> CareerGoal {
    CareerGoal {
        target_role: role.to_string(),
        priority,
        timeline_months: 6,
        required_skills: requirements
            .iter()
            .map(|(name, min_level, weight, essential)| RequiredSkill {
                skill: skill(name),
                min_level: level(*min_level),
                weight: *weight,
                essential: *essential,
            })
            .collect(),
    }
}

pub fn profile() -> LearnerProfile {
    LearnerProfile::new(Uuid::parse_str(LEARNER).expect("valid uuid"))
}
