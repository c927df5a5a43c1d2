//! Curriculum shape metrics and teaching-strategy classification.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{MalformedReason, TopologyError};
use crate::models::{
    BranchingTrend, Characteristic, CurriculumGraph, CurriculumNode, NodeCategory, Sequencing,
    StructuredDescription, TeachingStrategy, TierStats, TopologyAnalysis,
};

pub fn analyze(
    graph: &CurriculumGraph,
    config: &EngineConfig,
) -> Result<TopologyAnalysis, TopologyError> {
    validate(graph)?;

    let tiers = tier_stats(graph);
    let factors = trend_factors(&tiers);
    let trend = classify_trend(&factors, config.uniform_tolerance);
    let sequencing = detect_sequencing(graph);

    let traits = ShapeTraits {
        trend,
        sequencing,
        narrow: tiers.len() >= 3 && mean(&factors) <= config.narrow_branching,
        shallow: tiers.len() <= 2,
    };
    // A lone tier has no branching to classify.
    let strategy = if tiers.len() < 2 {
        TeachingStrategy::Mixed
    } else {
        select_strategy(&traits)
    };

    let mut characteristics = vec![
        match trend {
            BranchingTrend::Convergent => Characteristic::Convergent,
            BranchingTrend::Divergent => Characteristic::Divergent,
            BranchingTrend::Uniform => Characteristic::Uniform,
            BranchingTrend::Irregular => Characteristic::Irregular,
        },
        match sequencing {
            Sequencing::Spiral => Characteristic::Spiral,
            Sequencing::Linear => Characteristic::Linear,
        },
    ];
    if traits.narrow {
        characteristics.push(Characteristic::Narrow);
    }
    if traits.shallow {
        characteristics.push(Characteristic::Shallow);
    }

    let root_count = graph.roots().count();
    let total_effort_hours: f64 = tiers.iter().map(|tier| tier.total_effort_hours).sum();
    let max_depth = tiers.last().map_or(0, |tier| tier.depth);
    let dominant_category = dominant_category(graph.nodes());

    debug!(
        nodes = graph.len(),
        tiers = tiers.len(),
        ?trend,
        ?sequencing,
        ?strategy,
        "classified curriculum topology"
    );

    let description = describe(
        strategy,
        &tiers,
        &traits,
        root_count,
        graph.len(),
        total_effort_hours,
        dominant_category,
    );

    Ok(TopologyAnalysis {
        tiers,
        trend,
        sequencing,
        characteristics,
        strategy,
        description,
        root_count,
        node_count: graph.len(),
        max_depth,
        total_effort_hours,
        dominant_category,
    })
}

/// Checks the forest invariant and reports the first offending node in input order.
///
/// Requiring `depth == parent.depth + 1` on every edge also rules out cycles longer than a
/// self-reference, since depth strictly increases along parent pointers.
pub fn validate(graph: &CurriculumGraph) -> Result<(), TopologyError> {
    if graph.is_empty() {
        return Err(TopologyError::EmptyGraph);
    }

    let mut seen = BTreeSet::new();
    for node in graph.nodes() {
        let malformed = |reason| TopologyError::MalformedGraph {
            node_id: node.id.clone(),
            reason,
        };

        if !seen.insert(&node.id) {
            return Err(malformed(MalformedReason::DuplicateNode));
        }

        match &node.parent {
            None if node.depth != 0 => {
                return Err(malformed(MalformedReason::RootAtDepth { depth: node.depth }));
            }
            None => {}
            Some(parent_id) if *parent_id == node.id => {
                return Err(malformed(MalformedReason::Cycle));
            }
            Some(_) if node.depth == 0 => {
                return Err(malformed(MalformedReason::ParentAtRoot));
            }
            Some(parent_id) => {
                let parent = graph.node(parent_id).ok_or_else(|| {
                    malformed(MalformedReason::UnknownParent {
                        parent_id: parent_id.clone(),
                    })
                })?;
                if parent.depth + 1 != node.depth {
                    return Err(malformed(MalformedReason::DepthMismatch {
                        expected: parent.depth + 1,
                        actual: node.depth,
                    }));
                }
            }
        }
    }

    Ok(())
}

pub fn tier_stats(graph: &CurriculumGraph) -> Vec<TierStats> {
    graph
        .tiers()
        .map(|(depth, nodes)| {
            let node_count = nodes.len();
            let child_counts: Vec<usize> = nodes
                .iter()
                .map(|node| graph.child_count(&node.id))
                .collect();
            let total_children: usize = child_counts.iter().sum();
            let total_effort_hours: f64 = nodes.iter().map(|node| node.estimated_hours).sum();

            TierStats {
                depth,
                node_count,
                leaf_count: child_counts.iter().filter(|&&count| count == 0).count(),
                branching_factor: ratio(total_children as f64, node_count),
                avg_effort_hours: ratio(total_effort_hours, node_count),
                total_effort_hours,
            }
        })
        .collect()
}

/// Branching factors that carry trend information. The deepest tier is all leaves in any
/// valid forest, so its zero is dropped.
fn trend_factors(tiers: &[TierStats]) -> Vec<f64> {
    let interior = tiers.len().saturating_sub(1);
    tiers[..interior]
        .iter()
        .map(|tier| tier.branching_factor)
        .collect()
}

pub fn classify_trend(factors: &[f64], tolerance: f64) -> BranchingTrend {
    if factors.len() < 2 {
        return BranchingTrend::Uniform;
    }

    let mean = mean(factors);
    if factors
        .iter()
        .all(|factor| (factor - mean).abs() <= tolerance * mean)
    {
        return BranchingTrend::Uniform;
    }

    if factors.windows(2).all(|pair| pair[0] > pair[1]) {
        BranchingTrend::Convergent
    } else if factors.windows(2).all(|pair| pair[0] < pair[1]) {
        BranchingTrend::Divergent
    } else {
        BranchingTrend::Irregular
    }
}

/// A category is entered wherever a node's category differs from its parent's, and at the root.
/// Under one root, a category entered at two different tiers comes back to material it already
/// owns elsewhere, so the curriculum spirals. Linear curricula give each category a disjoint
/// subtree entered at a single tier.
pub fn detect_sequencing(graph: &CurriculumGraph) -> Sequencing {
    for root in graph.roots() {
        let mut entry_tiers: BTreeMap<NodeCategory, u32> = BTreeMap::new();
        entry_tiers.insert(root.category, root.depth);
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            for child in graph.children(&node.id) {
                stack.push(child);
                if child.category == node.category {
                    continue;
                }
                match entry_tiers.get(&child.category) {
                    Some(&tier) if tier != child.depth => {
                        debug!(
                            root = %root.id,
                            node = %child.id,
                            category = %child.category,
                            first_tier = tier,
                            "category re-entered at another tier"
                        );
                        return Sequencing::Spiral;
                    }
                    Some(_) => {}
                    None => {
                        entry_tiers.insert(child.category, child.depth);
                    }
                }
            }
        }
    }

    Sequencing::Linear
}

#[derive(Debug, Clone, Copy)]
struct ShapeTraits {
    trend: BranchingTrend,
    sequencing: Sequencing,
    narrow: bool,
    shallow: bool,
}

struct StrategyRule {
    rank: u8,
    strategy: TeachingStrategy,
    applies: fn(&ShapeTraits) -> bool,
}

fn is_spiral(traits: &ShapeTraits) -> bool {
    traits.sequencing == Sequencing::Spiral
}

fn is_convergent(traits: &ShapeTraits) -> bool {
    traits.trend == BranchingTrend::Convergent
}

fn is_narrow(traits: &ShapeTraits) -> bool {
    traits.narrow
}

fn is_broad(traits: &ShapeTraits) -> bool {
    traits.trend == BranchingTrend::Divergent || traits.shallow
}

/// Lower rank wins; several matches within the winning rank resolve to `Mixed`.
const STRATEGY_RULES: &[StrategyRule] = &[
    StrategyRule {
        rank: 0,
        strategy: TeachingStrategy::SpiralReinforcement,
        applies: is_spiral,
    },
    StrategyRule {
        rank: 1,
        strategy: TeachingStrategy::ConvergentMastery,
        applies: is_convergent,
    },
    StrategyRule {
        rank: 1,
        strategy: TeachingStrategy::DepthFirst,
        applies: is_narrow,
    },
    StrategyRule {
        rank: 2,
        strategy: TeachingStrategy::BreadthFirst,
        applies: is_broad,
    },
];

fn select_strategy(traits: &ShapeTraits) -> TeachingStrategy {
    let mut winning_rank = None;
    let mut matched = Vec::new();

    for rule in STRATEGY_RULES {
        if winning_rank.is_some_and(|rank| rule.rank > rank) {
            break;
        }
        if (rule.applies)(traits) {
            winning_rank = Some(rule.rank);
            matched.push(rule.strategy);
        }
    }

    match matched.as_slice() {
        [single] => *single,
        _ => TeachingStrategy::Mixed,
    }
}

fn dominant_category(nodes: &[CurriculumNode]) -> Option<NodeCategory> {
    let mut counts: BTreeMap<NodeCategory, usize> = BTreeMap::new();
    for node in nodes {
        *counts.entry(node.category).or_insert(0) += 1;
    }

    let mut best: Option<(NodeCategory, usize)> = None;
    for (category, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((category, count));
        }
    }
    best.map(|(category, _)| category)
}

fn describe(
    strategy: TeachingStrategy,
    tiers: &[TierStats],
    traits: &ShapeTraits,
    root_count: usize,
    node_count: usize,
    total_effort_hours: f64,
    dominant_category: Option<NodeCategory>,
) -> StructuredDescription {
    let widest_tier = tiers
        .iter()
        .fold(None::<&TierStats>, |widest, tier| match widest {
            Some(current) if current.node_count >= tier.node_count => Some(current),
            _ => Some(tier),
        })
        .map(|tier| tier.depth);

    let mut params = BTreeMap::new();
    params.insert("node_count".to_string(), Value::from(node_count));
    params.insert("root_count".to_string(), Value::from(root_count));
    params.insert("tier_count".to_string(), Value::from(tiers.len()));
    params.insert("total_hours".to_string(), Value::from(round2(total_effort_hours)));
    params.insert("trend".to_string(), Value::from(traits.trend.as_str()));
    params.insert(
        "sequencing".to_string(),
        Value::from(traits.sequencing.as_str()),
    );
    params.insert(
        "widest_tier".to_string(),
        widest_tier.map_or(Value::Null, Value::from),
    );
    params.insert(
        "dominant_category".to_string(),
        dominant_category.map_or(Value::Null, |category| Value::from(category.as_str())),
    );

    StructuredDescription {
        template_key: format!("topology.{}", strategy.as_str().replace('-', "_")),
        params,
    }
}

fn mean(values: &[f64]) -> f64 {
    ratio(values.iter().sum(), values.len())
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
