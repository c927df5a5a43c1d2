use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curriculum_analytics::models::{CurriculumGraph, LearnerProfile};
use curriculum_analytics::{loader, report, skills, topology, velocity, EngineConfig};

#[derive(Parser)]
#[command(name = "curriculum-analytics")]
#[command(about = "Curriculum topology and learner analytics engine", long_about = None)]
struct Cli {
    /// JSON file overriding engine defaults
    #[arg(long, global = true, env = "CURRICULUM_ANALYTICS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the teaching strategy of a curriculum
    Topology {
        #[arg(long)]
        graph: PathBuf,
    },
    /// Weekly pace for a learner
    Velocity {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        graph: PathBuf,
    },
    /// Skill gaps against the learner's primary career goal
    Gaps {
        #[arg(long)]
        profile: PathBuf,
    },
    /// Full learning analytics as JSON
    Analyze {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        graph: PathBuf,
        /// Reference time for date windows (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Markdown learning report
    Report {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        graph: PathBuf,
        /// Reference time for date windows (RFC 3339); defaults to the current time
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Merge sessions from a CSV export into a profile file
    ImportSessions {
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        csv: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_inputs(
    config: &EngineConfig,
    profile: &Path,
    graph: &Path,
) -> anyhow::Result<(LearnerProfile, CurriculumGraph)> {
    let profile = loader::load_profile(profile)
        .with_context(|| format!("failed to load profile {}", profile.display()))?;
    let graph = loader::load_graph(graph, config)
        .with_context(|| format!("failed to load curriculum {}", graph.display()))?;
    Ok((profile, graph))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,curriculum_analytics=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = loader::load_config(cli.config.as_deref()).context("invalid engine config")?;

    match cli.command {
        Commands::Topology { graph } => {
            let graph = loader::load_graph(&graph, &config)
                .with_context(|| format!("failed to load curriculum {}", graph.display()))?;
            let analysis = topology::analyze(&graph, &config)?;
            print_json(&analysis)?;
        }
        Commands::Velocity { profile, graph } => {
            let (profile, graph) = load_inputs(&config, &profile, &graph)?;
            print_json(&velocity::calculate_velocity(&profile, &graph, &config))?;
        }
        Commands::Gaps { profile } => {
            let profile = loader::load_profile(&profile)
                .with_context(|| format!("failed to load profile {}", profile.display()))?;
            print_json(&skills::analyze_skill_gaps(&profile, &config)?)?;
        }
        Commands::Analyze {
            profile,
            graph,
            now,
            out,
        } => {
            let (profile, graph) = load_inputs(&config, &profile, &graph)?;
            let now = now.unwrap_or_else(Utc::now);
            let analytics =
                curriculum_analytics::analyze_learning_data(&profile, &graph, now, &config)?;

            let rendered = serde_json::to_string_pretty(&analytics)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Analytics written to {}.", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Commands::Report {
            profile,
            graph,
            now,
            out,
        } => {
            let (profile, graph) = load_inputs(&config, &profile, &graph)?;
            let now = now.unwrap_or_else(Utc::now);
            let analytics =
                curriculum_analytics::analyze_learning_data(&profile, &graph, now, &config)?;

            std::fs::write(&out, report::build_report(&analytics))
                .with_context(|| format!("failed to write report {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::ImportSessions { profile, csv } => {
            let mut record = loader::load_profile_record(&profile)
                .with_context(|| format!("failed to load profile {}", profile.display()))?;
            let inserted = loader::import_sessions_csv(&mut record, &csv)?;
            loader::save_profile_record(&profile, &record)?;
            println!("Inserted {inserted} sessions from {}.", csv.display());
        }
    }

    Ok(())
}
