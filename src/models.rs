//! Data model shared by every analysis.
//!
//! Raw `*Record` types mirror what collaborators hand us (JSON/CSV, optional fields). They are
//! resolved once into the fully populated types the algorithms read, so defaults never leak into
//! analysis code.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::ModelError;

pub const DEFAULT_SKILL_WEIGHT: f64 = 1.0;

// ============================================================================
// Identifiers and validated scalars
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeCategory {
    Fundamentals,
    Frontend,
    Backend,
    Databases,
    Devops,
    Cloud,
    Security,
    DataScience,
    MachineLearning,
    Mobile,
    Testing,
    Architecture,
    SoftSkills,
}

impl NodeCategory {
    pub const ALL: [NodeCategory; 13] = [
        Self::Fundamentals,
        Self::Frontend,
        Self::Backend,
        Self::Databases,
        Self::Devops,
        Self::Cloud,
        Self::Security,
        Self::DataScience,
        Self::MachineLearning,
        Self::Mobile,
        Self::Testing,
        Self::Architecture,
        Self::SoftSkills,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fundamentals => "fundamentals",
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Databases => "databases",
            Self::Devops => "devops",
            Self::Cloud => "cloud",
            Self::Security => "security",
            Self::DataScience => "data-science",
            Self::MachineLearning => "machine-learning",
            Self::Mobile => "mobile",
            Self::Testing => "testing",
            Self::Architecture => "architecture",
            Self::SoftSkills => "soft-skills",
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeCategory {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace(['_', ' '], "-");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownCategory(value.to_string()))
    }
}

/// Skill identifier, trimmed and lower-cased so "Testing " and "testing" are one skill.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SkillName(String);

impl SkillName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SkillName {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ModelError::EmptySkillName);
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<&str> for SkillName {
    type Error = ModelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<SkillName> for String {
    fn from(value: SkillName) -> Self {
        value.0
    }
}

impl fmt::Display for SkillName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proficiency on a 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Level(u8);

impl Level {
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Level {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..=100).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ModelError::LevelOutOfRange(value))
        }
    }
}

impl From<Level> for i64 {
    fn from(value: Level) -> Self {
        value.0 as i64
    }
}

// ============================================================================
// Calendar helpers
// ============================================================================

/// Monday-anchored week ordinal. Day 1 of the common era is a Monday, so integer division
/// lines buckets up with ISO weeks.
pub fn week_index(date: NaiveDate) -> i64 {
    (date.num_days_from_ce() as i64 - 1).div_euclid(7)
}

pub fn week_start(index: i64) -> NaiveDate {
    // 0001-01-01 is always representable.
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or(NaiveDate::MIN);
    epoch + Duration::days(index * 7)
}

pub fn weekday_index(day: Weekday) -> usize {
    day.num_days_from_monday() as usize
}

// ============================================================================
// Curriculum graph
// ============================================================================

/// Curriculum node as supplied by a content store, before defaults are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumNodeRecord {
    pub id: String,
    pub category: String,
    pub depth: u32,
    #[serde(default, alias = "parent")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
}

impl CurriculumNodeRecord {
    pub fn resolve(self, config: &EngineConfig) -> Result<CurriculumNode, ModelError> {
        let category = self.category.parse()?;
        let estimated_hours = self
            .estimated_hours
            .unwrap_or(config.default_lesson_hours);
        if estimated_hours < 0.0 || estimated_hours.is_nan() {
            return Err(ModelError::NegativeEffort {
                node_id: self.id,
                hours: estimated_hours,
            });
        }

        Ok(CurriculumNode {
            id: NodeId::new(self.id),
            category,
            depth: self.depth,
            parent: self
                .parent_id
                .map(|parent| parent.trim().to_string())
                .filter(|parent| !parent.is_empty())
                .map(NodeId::new),
            estimated_hours,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurriculumNode {
    pub id: NodeId,
    pub category: NodeCategory,
    pub depth: u32,
    pub parent: Option<NodeId>,
    pub estimated_hours: f64,
}

/// Read-only curriculum forest plus the derived children and tier indices.
///
/// Construction never fails; structural validation happens in the topology analyzer so the
/// offending node can be reported.
#[derive(Debug, Clone, Default)]
pub struct CurriculumGraph {
    nodes: Vec<CurriculumNode>,
    positions: BTreeMap<NodeId, usize>,
    children: BTreeMap<NodeId, Vec<usize>>,
    tiers: BTreeMap<u32, Vec<usize>>,
}

impl CurriculumGraph {
    pub fn new(nodes: Vec<CurriculumNode>) -> Self {
        let mut positions = BTreeMap::new();
        let mut children: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();
        let mut tiers: BTreeMap<u32, Vec<usize>> = BTreeMap::new();

        for (index, node) in nodes.iter().enumerate() {
            positions.entry(node.id.clone()).or_insert(index);
            if let Some(parent) = &node.parent {
                children.entry(parent.clone()).or_default().push(index);
            }
            tiers.entry(node.depth).or_default().push(index);
        }

        Self {
            nodes,
            positions,
            children,
            tiers,
        }
    }

    pub fn from_records(
        records: Vec<CurriculumNodeRecord>,
        config: &EngineConfig,
    ) -> Result<Self, ModelError> {
        let nodes = records
            .into_iter()
            .map(|record| record.resolve(config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(nodes))
    }

    pub fn nodes(&self) -> &[CurriculumNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&CurriculumNode> {
        self.positions.get(id).map(|&index| &self.nodes[index])
    }

    pub fn children(&self, id: &NodeId) -> impl Iterator<Item = &CurriculumNode> + '_ {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .map(|&index| &self.nodes[index])
    }

    pub fn child_count(&self, id: &NodeId) -> usize {
        self.children.get(id).map_or(0, Vec::len)
    }

    pub fn roots(&self) -> impl Iterator<Item = &CurriculumNode> + '_ {
        self.nodes.iter().filter(|node| node.parent.is_none())
    }

    /// Tiers in ascending depth order.
    pub fn tiers(&self) -> impl Iterator<Item = (u32, Vec<&CurriculumNode>)> + '_ {
        self.tiers.iter().map(|(depth, indices)| {
            (
                *depth,
                indices.iter().map(|&index| &self.nodes[index]).collect(),
            )
        })
    }

    pub fn effort_hours(&self, id: &NodeId) -> Option<f64> {
        self.node(id).map(|node| node.estimated_hours)
    }
}

// ============================================================================
// Learner profile
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub viewed_nodes: Vec<NodeId>,
}

impl Session {
    /// Length in minutes; `None` for open sessions or an end stamped before the start.
    pub fn duration_minutes(&self) -> Option<f64> {
        let ended_at = self.ended_at?;
        let seconds = (ended_at - self.started_at).num_seconds();
        if seconds < 0 {
            return None;
        }
        Some(seconds as f64 / 60.0)
    }

    pub fn date(&self) -> NaiveDate {
        self.started_at.date_naive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRating {
    pub skill: SkillName,
    pub level: Level,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GoalPriority {
    Primary,
    Secondary,
    Exploratory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredSkillRecord {
    pub skill: SkillName,
    pub min_level: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequiredSkill {
    pub skill: SkillName,
    pub min_level: Level,
    /// Role-importance weight used by the overall gap score.
    pub weight: f64,
    /// Role-essential skills are always critical when gapped.
    pub essential: bool,
}

impl RequiredSkillRecord {
    pub fn resolve(self) -> Result<RequiredSkill, ModelError> {
        let weight = self.weight.unwrap_or(DEFAULT_SKILL_WEIGHT);
        if weight <= 0.0 || weight.is_nan() {
            return Err(ModelError::InvalidWeight {
                skill: self.skill.to_string(),
                weight,
            });
        }
        Ok(RequiredSkill {
            skill: self.skill,
            min_level: self.min_level,
            weight,
            essential: self.essential.unwrap_or(false),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerGoalRecord {
    pub target_role: String,
    pub priority: GoalPriority,
    pub timeline_months: u32,
    #[serde(default)]
    pub required_skills: Vec<RequiredSkillRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CareerGoal {
    pub target_role: String,
    pub priority: GoalPriority,
    pub timeline_months: u32,
    pub required_skills: Vec<RequiredSkill>,
}

/// Learner profile as persisted by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProfileRecord {
    pub learner_id: Uuid,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub completed_nodes: Vec<NodeId>,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub skills: Vec<SkillRating>,
    #[serde(default)]
    pub career_goals: Vec<CareerGoalRecord>,
}

impl LearnerProfileRecord {
    pub fn resolve(self) -> Result<LearnerProfile, ModelError> {
        let career_goals = self
            .career_goals
            .into_iter()
            .map(|goal| {
                let required_skills = goal
                    .required_skills
                    .into_iter()
                    .map(RequiredSkillRecord::resolve)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, ModelError>(CareerGoal {
                    target_role: goal.target_role,
                    priority: goal.priority,
                    timeline_months: goal.timeline_months,
                    required_skills,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut sessions = self.sessions;
        sessions.sort_by_key(|session| session.started_at);

        Ok(LearnerProfile {
            learner_id: self.learner_id,
            sessions,
            completed_nodes: self.completed_nodes.into_iter().collect(),
            current_streak: self.current_streak,
            skills: self
                .skills
                .into_iter()
                .map(|rating| (rating.skill, rating.level))
                .collect(),
            career_goals,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearnerProfile {
    pub learner_id: Uuid,
    /// Ordered by start time.
    pub sessions: Vec<Session>,
    pub completed_nodes: BTreeSet<NodeId>,
    pub current_streak: u32,
    pub skills: BTreeMap<SkillName, Level>,
    pub career_goals: Vec<CareerGoal>,
}

impl LearnerProfile {
    pub fn new(learner_id: Uuid) -> Self {
        Self {
            learner_id,
            sessions: Vec::new(),
            completed_nodes: BTreeSet::new(),
            current_streak: 0,
            skills: BTreeMap::new(),
            career_goals: Vec::new(),
        }
    }

    /// Unrated skills read as level 0.
    pub fn skill_level(&self, skill: &SkillName) -> Level {
        self.skills.get(skill).copied().unwrap_or_default()
    }
}

// ============================================================================
// Topology output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStats {
    pub depth: u32,
    pub node_count: usize,
    pub leaf_count: usize,
    pub branching_factor: f64,
    pub avg_effort_hours: f64,
    pub total_effort_hours: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchingTrend {
    Convergent,
    Divergent,
    Uniform,
    Irregular,
}

impl BranchingTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Convergent => "convergent",
            Self::Divergent => "divergent",
            Self::Uniform => "uniform",
            Self::Irregular => "irregular",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sequencing {
    Spiral,
    Linear,
}

impl Sequencing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spiral => "spiral",
            Self::Linear => "linear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Characteristic {
    Convergent,
    Divergent,
    Uniform,
    Irregular,
    Spiral,
    Linear,
    Narrow,
    Shallow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeachingStrategy {
    BreadthFirst,
    DepthFirst,
    ConvergentMastery,
    SpiralReinforcement,
    Mixed,
}

impl TeachingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BreadthFirst => "breadth-first",
            Self::DepthFirst => "depth-first",
            Self::ConvergentMastery => "convergent-mastery",
            Self::SpiralReinforcement => "spiral-reinforcement",
            Self::Mixed => "mixed",
        }
    }
}

/// Template key plus parameters; rendering to prose is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredDescription {
    pub template_key: String,
    pub params: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologyAnalysis {
    pub tiers: Vec<TierStats>,
    pub trend: BranchingTrend,
    pub sequencing: Sequencing,
    pub characteristics: Vec<Characteristic>,
    pub strategy: TeachingStrategy,
    pub description: StructuredDescription,
    pub root_count: usize,
    pub node_count: usize,
    pub max_depth: u32,
    pub total_effort_hours: f64,
    pub dominant_category: Option<NodeCategory>,
}

// ============================================================================
// Velocity output
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pace {
    Accelerating,
    Steady,
    Decelerating,
    InsufficientData,
}

impl Pace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accelerating => "accelerating",
            Self::Steady => "steady",
            Self::Decelerating => "decelerating",
            Self::InsufficientData => "insufficient-data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub hours: f64,
    pub sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VelocityResult {
    pub hours_per_week: f64,
    pub pace: Pace,
    /// Hours-per-week change per week across the trend window.
    pub slope: f64,
    pub populated_weeks: usize,
    pub weekly: Vec<WeekBucket>,
}

// ============================================================================
// Skill gap output
// ============================================================================

/// Declared most urgent first so the derived ordering ranks `Critical` lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GapPriority {
    Critical,
    Important,
    NiceToHave,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillGap {
    pub skill: SkillName,
    pub current_level: u8,
    pub required_level: u8,
    pub gap: u8,
    pub priority: GapPriority,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillSnapshot {
    pub skill: SkillName,
    pub current_level: u8,
    pub required_level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillGapAnalysis {
    pub target_role: String,
    pub timeline_months: u32,
    /// Weighted mean gap on a 0-100 scale.
    pub overall_score: f64,
    pub gaps: Vec<SkillGap>,
    pub current_skills: Vec<SkillSnapshot>,
    pub estimated_hours_to_close: f64,
    pub weekly_hours_needed: Option<f64>,
}

// ============================================================================
// Aggregated output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: NodeCategory,
    pub views: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternStats {
    pub most_productive_day: Option<Weekday>,
    pub most_productive_hour: Option<u32>,
    pub avg_session_minutes: f64,
    pub top_categories: Vec<CategoryCount>,
    /// Sessions per weekday, Monday first.
    pub weekday_tally: [usize; 7],
    pub hour_tally: [usize; 24],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngagementStats {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub active_weeks: usize,
    pub total_sessions: usize,
    pub recent_sessions: usize,
    pub prior_sessions: usize,
    pub return_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskFactor {
    DeceleratingVelocity,
    LowReturnRate,
    HighSkillGap,
    NoActiveStreak,
}

impl RiskFactor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeceleratingVelocity => "decelerating-velocity",
            Self::LowReturnRate => "low-return-rate",
            Self::HighSkillGap => "high-skill-gap",
            Self::NoActiveStreak => "no-active-streak",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predictions {
    pub remaining_hours: f64,
    pub weeks_to_complete: Option<u32>,
    pub expected_completion: Option<NaiveDate>,
    pub confidence: f64,
    pub risk_factors: Vec<RiskFactor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningAnalytics {
    pub learner_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub topology: TopologyAnalysis,
    pub velocity: VelocityResult,
    pub skill_gaps: SkillGapAnalysis,
    pub patterns: PatternStats,
    pub engagement: EngagementStats,
    pub predictions: Predictions,
}
