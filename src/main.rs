use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use fairway_dtw::Cancellation;
use fairway_io::{ArtifactStore, ReportReader, ResultWriter, ShipFilterReader};
use fairway_pipeline::{Pipeline, Prediction, RunInputs, Settings, StageKind};
use fairway_track::ShipId;

#[derive(Parser)]
#[command(name = "fairway")]
#[command(about = "Voyage clustering over AIS position reports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to `workers` in the config)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the configured stages and write artifacts to the output folder
    Run {
        /// Path to the TOML settings file
        #[arg(long)]
        config: PathBuf,

        /// Comma-separated stage list overriding `stages` in the config
        #[arg(long, value_delimiter = ',')]
        stages: Option<Vec<String>>,
    },

    /// Assign voyages from a new AIS CSV against a stored, clustered run
    Predict {
        /// Path to the TOML settings file of the stored run
        #[arg(long)]
        config: PathBuf,

        /// AIS CSV with the new reports
        #[arg(long)]
        data: PathBuf,
    },
}

#[derive(Serialize)]
struct PredictOutput {
    run: String,
    n_voyages: usize,
    noise: usize,
    predictions: Vec<Prediction>,
}

/// Load settings and apply command-line overrides.
fn load_settings(path: &Path, threads: Option<usize>) -> Result<Settings> {
    let mut settings = Settings::load(path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    if let Some(threads) = threads {
        settings.workers = threads;
    }
    Ok(settings)
}

fn read_ship_filter(settings: &Settings) -> Result<Option<HashSet<ShipId>>> {
    let Some(path) = &settings.meta_data_path else {
        return Ok(None);
    };
    let ships = ShipFilterReader::new(path)
        .with_column(&settings.ship_id_column)
        .read()
        .context("failed to read ship metadata CSV")?;
    info!(ships = ships.len(), "ship filter loaded");
    Ok(Some(ships))
}

fn read_reports(path: &Path) -> Result<Vec<fairway_track::PositionReport>> {
    let dataset = ReportReader::new(path)
        .read()
        .with_context(|| format!("failed to read AIS CSV {}", path.display()))?;
    info!(
        reports = dataset.reports.len(),
        duplicates_removed = dataset.duplicates_removed,
        missing_ship_id = dataset.missing_ship_id,
        "AIS reports loaded"
    );
    Ok(dataset.reports)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Run { config, stages } => {
            let mut settings = load_settings(&config, cli.threads)?;
            if let Some(stages) = stages {
                settings.stages = stages;
            }
            let pipeline = Pipeline::new(settings).context("invalid settings")?;
            let settings = pipeline.settings();

            let run = settings.resolve_run_name(Utc::now())?;
            info!(run = %run, stages = ?pipeline.plan().stages(), "starting run");
            let store = ArtifactStore::new(&settings.output_folder, run.clone())
                .context("failed to prepare output folder")?;
            let writer = ResultWriter::new(&settings.output_folder, run.clone())
                .context("failed to prepare output folder")?;

            // 1. Collaborator inputs, only when the features stage will consume them
            let reports = if pipeline.plan().contains(StageKind::Features) {
                let Some(path) = &settings.ais_data_path else {
                    bail!("stage features needs `ais_data_path` in {}", config.display());
                };
                Some(read_reports(path)?)
            } else {
                None
            };
            let ship_filter = read_ship_filter(settings)?;

            // 2. Run
            let output = pipeline
                .run(RunInputs {
                    reports,
                    ship_filter,
                    store: Some(store),
                    cancel: Cancellation::new(),
                })
                .with_context(|| format!("run {run} failed"))?;

            // 3. Outputs
            if let Some(clusters) = &output.clusters {
                let path = writer
                    .write_clusters(&clusters.voyage_ids, &clusters.result)
                    .context("failed to write cluster assignment")?;
                info!(path = %path.display(), "cluster assignment written");
            }
            if let Some(handoff) = &output.handoff {
                let path = writer
                    .write_handoff(handoff)
                    .context("failed to write render hand-off")?;
                info!(path = %path.display(), "render hand-off written");
            }
            writer
                .write_summary(&output.diagnostics)
                .context("failed to write run summary")?;

            println!("{}", serde_json::to_string_pretty(&output.diagnostics)?);
        }

        Command::Predict { config, data } => {
            let settings = load_settings(&config, cli.threads)?;
            let run = settings.resolve_run_name(Utc::now())?;
            if settings.run_name == "timestamp" {
                bail!("predict needs a fixed `run_name` to locate the stored run");
            }
            let store = ArtifactStore::new(&settings.output_folder, run.clone())
                .context("failed to open output folder")?;

            let reports = read_reports(&data)?;
            let ship_filter = read_ship_filter(&settings)?;
            let predictions = fairway_pipeline::predict_reports(
                &settings,
                reports,
                ship_filter,
                &store,
                &Cancellation::new(),
            )
            .with_context(|| format!("prediction against run {run} failed"))?;

            let output = PredictOutput {
                run: run.to_string(),
                n_voyages: predictions.len(),
                noise: predictions
                    .iter()
                    .filter(|p| p.assignment.is_noise())
                    .count(),
                predictions,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}
