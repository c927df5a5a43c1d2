use thiserror::Error;
use uuid::Uuid;

use crate::models::NodeId;

/// Why a curriculum graph failed the forest check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// The same id is declared more than once, so it can carry two parents.
    DuplicateNode,
    UnknownParent { parent_id: NodeId },
    RootAtDepth { depth: u32 },
    ParentAtRoot,
    DepthMismatch { expected: u32, actual: u32 },
    Cycle,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateNode => write!(f, "node is declared more than once"),
            Self::UnknownParent { parent_id } => {
                write!(f, "parent {parent_id} does not exist")
            }
            Self::RootAtDepth { depth } => {
                write!(f, "node has no parent but sits at depth {depth}")
            }
            Self::ParentAtRoot => write!(f, "node at depth 0 declares a parent"),
            Self::DepthMismatch { expected, actual } => {
                write!(f, "expected depth {expected}, found {actual}")
            }
            Self::Cycle => write!(f, "node is its own ancestor"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("curriculum graph has no nodes")]
    EmptyGraph,

    #[error("malformed curriculum graph at node {node_id}: {reason}")]
    MalformedGraph { node_id: NodeId, reason: MalformedReason },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkillGapError {
    #[error("learner {learner_id} has no career goal")]
    NoCareerGoal { learner_id: Uuid },
}

/// Aggregator failure, tagged with the sub-computation that raised it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("topology analysis failed: {0}")]
    Topology(#[from] TopologyError),

    #[error("skill gap analysis failed: {0}")]
    SkillGap(#[from] SkillGapError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("unknown node category: {0:?}")]
    UnknownCategory(String),

    #[error("skill name must not be empty")]
    EmptySkillName,

    #[error("skill level {0} is outside 0-100")]
    LevelOutOfRange(i64),

    #[error("node {node_id} has negative estimated effort {hours}")]
    NegativeEffort { node_id: String, hours: f64 },

    #[error("skill {skill} has non-positive importance weight {weight}")]
    InvalidWeight { skill: String, weight: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("config field {field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("config field {field} must lie within 0-1, got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("config field {field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: i64,
        max: i64,
    },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid record: {0}")]
    Model(#[from] ModelError),

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("unsupported file extension for {path}")]
    UnsupportedFormat { path: String },
}
