//! File adapters that turn collaborator exports into engine inputs.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::LoadError;
use crate::models::{
    CurriculumGraph, CurriculumNodeRecord, LearnerProfile, LearnerProfileRecord, NodeId, Session,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
}

fn format_of(path: &Path) -> Result<Format, LoadError> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("csv") => Ok(Format::Csv),
        Some("json") => Ok(Format::Json),
        _ => Err(LoadError::UnsupportedFormat {
            path: path.display().to_string(),
        }),
    }
}

/// Reads an engine config from JSON; no path means defaults.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, LoadError> {
    let config = match path {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Loads a curriculum from `.csv` (one node per row) or `.json` (array of nodes).
pub fn load_graph(path: &Path, config: &EngineConfig) -> Result<CurriculumGraph, LoadError> {
    let file = BufReader::new(File::open(path)?);
    let graph = match format_of(path)? {
        Format::Csv => read_graph_csv(file, config)?,
        Format::Json => {
            let records: Vec<CurriculumNodeRecord> = serde_json::from_reader(file)?;
            CurriculumGraph::from_records(records, config)?
        }
    };
    debug!(path = %path.display(), nodes = graph.len(), "loaded curriculum graph");
    Ok(graph)
}

pub fn read_graph_csv<R: Read>(
    reader: R,
    config: &EngineConfig,
) -> Result<CurriculumGraph, LoadError> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for result in reader.deserialize::<CurriculumNodeRecord>() {
        records.push(result?);
    }
    Ok(CurriculumGraph::from_records(records, config)?)
}

pub fn load_profile_record(path: &Path) -> Result<LearnerProfileRecord, LoadError> {
    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

pub fn load_profile(path: &Path) -> Result<LearnerProfile, LoadError> {
    let profile = load_profile_record(path)?.resolve()?;
    debug!(
        path = %path.display(),
        learner = %profile.learner_id,
        sessions = profile.sessions.len(),
        "loaded learner profile"
    );
    Ok(profile)
}

pub fn save_profile_record(path: &Path, record: &LearnerProfileRecord) -> Result<(), LoadError> {
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Merges sessions from a CSV export into `profile`.
///
/// Columns: `started_at`, `ended_at` (optional), `viewed_nodes` and `completed_nodes`
/// (semicolon-separated, optional). Rows whose start time is already recorded are skipped.
/// Returns the number of sessions added.
pub fn import_sessions_csv(
    profile: &mut LearnerProfileRecord,
    csv_path: &Path,
) -> Result<usize, LoadError> {
    #[derive(Deserialize)]
    struct CsvRow {
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
        viewed_nodes: Option<String>,
        completed_nodes: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut known_starts: BTreeSet<DateTime<Utc>> = profile
        .sessions
        .iter()
        .map(|session| session.started_at)
        .collect();
    let mut completed: BTreeSet<NodeId> = profile.completed_nodes.iter().cloned().collect();
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;

        for node_id in split_ids(row.completed_nodes.as_deref()) {
            if completed.insert(node_id.clone()) {
                profile.completed_nodes.push(node_id);
            }
        }

        if !known_starts.insert(row.started_at) {
            continue;
        }
        profile.sessions.push(Session {
            started_at: row.started_at,
            ended_at: row.ended_at,
            viewed_nodes: split_ids(row.viewed_nodes.as_deref()),
        });
        inserted += 1;
    }

    profile.sessions.sort_by_key(|session| session.started_at);
    info!(path = %csv_path.display(), inserted, "imported sessions");
    Ok(inserted)
}

fn split_ids(value: Option<&str>) -> Vec<NodeId> {
    value
        .unwrap_or_default()
        .split(';')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(NodeId::from)
        .collect()
}
