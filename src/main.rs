use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mtss_reconcile::config::ReconcileConfig;
use mtss_reconcile::dashboard::{self, Dashboard};
use mtss_reconcile::sources::{self, SourcePaths, SourceReport};
use mtss_reconcile::{interventions, report, segments};

#[derive(Parser)]
#[command(name = "mtss-reconcile")]
#[command(about = "Reconciles rosters and mentor assignments into per-student MTSS views", long_about = None)]
struct Cli {
    /// Directory config (unit defaults, legacy viewers, kindergarten classes)
    #[arg(long, env = "MTSS_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Per-source load timeout; a slow source is treated as empty
    #[arg(long, default_value_t = 5000, global = true)]
    timeout_ms: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Roster as a JSON array or CSV file
    #[arg(long)]
    roster: Option<PathBuf>,
    #[arg(long)]
    assignments: Option<PathBuf>,
    #[arg(long)]
    mentors: Option<PathBuf>,
    /// Staff profile to scope the view to; omitted means unrestricted
    #[arg(long)]
    viewer: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the grades and classes a viewer may see
    Segments {
        #[arg(long)]
        viewer: PathBuf,
    },
    /// Merge roster and assignments into per-student JSON
    Merge {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List students by their most critical intervention
    Critical {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ReconcileConfig::load(cli.config.as_deref()).context("failed to load directory config")?;
    let timeout = Duration::from_millis(cli.timeout_ms);

    match cli.command {
        Commands::Segments { viewer } => {
            let viewer = sources::load_viewer(Some(&viewer))
                .await
                .context("failed to load viewer profile")?;
            let segment = segments::derive_segments(&viewer, &config);
            println!("{}", serde_json::to_string_pretty(&segment)?);
        }
        Commands::Merge { inputs, out } => {
            let (dashboard, _) = build(&inputs, &config, timeout).await?;
            let json = serde_json::to_string_pretty(&dashboard.students)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!(
                        "Wrote {} students to {}.",
                        dashboard.students.len(),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }
        Commands::Critical { inputs, limit } => {
            let (dashboard, _) = build(&inputs, &config, timeout).await?;
            let ranked = interventions::rank_by_urgency(&dashboard.students);

            if ranked.is_empty() {
                println!("No students in scope.");
                return Ok(());
            }

            println!("Students by most critical intervention:");
            for (student, critical) in ranked.iter().take(limit) {
                println!(
                    "- {} ({}) {} at {}, next update {}",
                    student.name,
                    student.grade,
                    critical.label(),
                    critical.tier_code().label(),
                    student.next_update
                );
            }
        }
        Commands::Report { inputs, out, limit } => {
            let (dashboard, source_report) = build(&inputs, &config, timeout).await?;
            let report = report::build_report(&dashboard, &source_report, limit);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn build(
    inputs: &Inputs,
    config: &ReconcileConfig,
    timeout: Duration,
) -> anyhow::Result<(Dashboard, SourceReport)> {
    let viewer = sources::load_viewer(inputs.viewer.as_deref())
        .await
        .context("failed to load viewer profile")?;
    let paths = SourcePaths {
        roster: inputs.roster.clone(),
        assignments: inputs.assignments.clone(),
        mentors: inputs.mentors.clone(),
    };
    let (loaded, source_report) = sources::load_sources(&paths, timeout).await;
    Ok((dashboard::reconcile(&loaded, &viewer, config), source_report))
}
