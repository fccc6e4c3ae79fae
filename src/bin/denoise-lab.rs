//! denoise-lab command line
//!
//! Exit status: 0 when every cell succeeded, 1 when at least one cell failed
//! (the count goes to stderr), 2 on fatal errors (bad config, ledger I/O).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use denoise_lab::config::{DenoiseStudyConfig, NoiseStudyConfig};
use denoise_lab::denoise::AlgorithmId;
use denoise_lab::image::{BitDepth, Image};
use denoise_lab::image_io;
use denoise_lab::ledger::{CanonicalName, Ledger};
use denoise_lab::pipeline::{DenoisePlan, Orchestrator, SweepSpec, SweepSummary};
use tracing_subscriber::EnvFilter;

/// Reproducible noise/denoise experiments for thermal imagery
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Noise configuration file (defaults to the standard suite, seed 42)
    #[arg(long, global = true)]
    noise_config: Option<PathBuf>,

    /// Directory of clean images (overrides the config; synthetic frames
    /// are used when neither is set)
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Output root (overrides the config)
    #[arg(long, global = true)]
    dest: Option<PathBuf>,

    /// Ledger file (defaults to <dest>/ledger.jsonl, or in-memory without a dest)
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the active noise configuration
    Config,
    /// Apply every enabled noise config to every source image
    NoiseSuite,
    /// Run full noise → denoise → metrics cells
    Denoise {
        #[command(flatten)]
        selection: Selection,

        /// Denoise configuration file (variations and noise → algorithm mapping)
        #[arg(long)]
        denoise_config: Option<PathBuf>,

        /// Variation of --algo to run (from the denoise config)
        #[arg(long, requires = "algo")]
        variation: Option<String>,

        /// Run cells on the rayon pool
        #[arg(long)]
        parallel: bool,
    },
    /// Reference-free statistics of an image or a directory of images
    Measure {
        /// Image file or directory
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Selection {
    /// Run a single algorithm
    #[arg(long)]
    algo: Option<String>,

    /// Run the algorithms recommended for each noise type
    #[arg(long)]
    recommended: bool,

    /// Run every algorithm
    #[arg(long)]
    all: bool,
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "tif", "tiff", "jpg", "jpeg"];

fn list_images(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn load_images(source: Option<&Path>) -> anyhow::Result<Vec<Image>> {
    let Some(dir) = source else {
        tracing::info!("no source directory, using synthetic frames");
        return Ok(vec![
            Image::gradient(64, 64, BitDepth::U8)?,
            Image::hot_spots(64, 64, BitDepth::U8)?,
        ]);
    };
    let paths = list_images(dir)?;
    if paths.is_empty() {
        bail!("no images found in {}", dir.display());
    }
    paths
        .iter()
        .map(|p| image_io::load(p).map_err(anyhow::Error::from))
        .collect()
}

fn open_ledger(cli: &Cli, dest: Option<&Path>) -> anyhow::Result<Ledger> {
    let path = cli
        .ledger
        .clone()
        .or_else(|| dest.map(|d| d.join("ledger.jsonl")));
    Ok(match path {
        Some(path) => Ledger::open(path)?,
        None => Ledger::in_memory(),
    })
}

fn report(summary: &SweepSummary) -> ExitCode {
    println!("{summary}");
    if summary.failed.is_empty() {
        return ExitCode::SUCCESS;
    }
    for failed in &summary.failed {
        eprintln!(
            "  {} [{}] at {}: {}",
            failed.cell_id, failed.kind, failed.stage, failed.message
        );
    }
    eprintln!("{} cell(s) failed", summary.failed.len());
    ExitCode::from(1)
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let noise_config = match &cli.noise_config {
        Some(path) => NoiseStudyConfig::load(path)?,
        None => NoiseStudyConfig::default(),
    };
    let source = cli.source.clone().or_else(|| noise_config.source_path.clone());
    let dest = cli.dest.clone().or_else(|| noise_config.destination_path.clone());

    match &cli.command {
        Command::Config => {
            println!("random_seed: {}", noise_config.seed);
            if let Some(s) = &source {
                println!("source: {}", s.display());
            }
            if let Some(d) = &dest {
                println!("destination: {}", d.display());
            }
            println!("noise configs: {}", noise_config.noise.len());
            for config in &noise_config.noise {
                println!("  {}", config.canonical_name());
                for (name, value) in &config.params {
                    println!("    {name}: {value}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::NoiseSuite => {
            let images = load_images(source.as_deref())?;
            let mut orchestrator = Orchestrator::new(open_ledger(cli, dest.as_deref())?);
            if let Some(d) = &dest {
                orchestrator = orchestrator.with_storage_root(d);
            }
            let summary = orchestrator.run_noise_suite(&images, &noise_config.noise)?;
            Ok(report(&summary))
        }
        Command::Denoise {
            selection,
            denoise_config,
            variation,
            parallel,
        } => {
            let study = match denoise_config {
                Some(path) => DenoiseStudyConfig::load(path)?,
                None => DenoiseStudyConfig::default(),
            };
            let plan = if let Some(algo) = &selection.algo {
                AlgorithmId::parse(algo)?;
                let spec = variation
                    .as_ref()
                    .map_or_else(|| algo.clone(), |v| format!("{algo}:{v}"));
                DenoisePlan::Explicit(vec![study.resolve(&spec)?])
            } else if selection.all {
                DenoisePlan::AllAlgorithms(study)
            } else {
                DenoisePlan::RecommendedWith(study)
            };

            let images = load_images(source.as_deref())?;
            let spec = SweepSpec::new(images, noise_config.noise, plan);
            let mut orchestrator = Orchestrator::new(open_ledger(cli, dest.as_deref())?);
            if let Some(d) = &dest {
                orchestrator = orchestrator.with_storage_root(d);
            }
            let summary = if *parallel {
                run_parallel(&orchestrator, &spec)?
            } else {
                orchestrator.run_sweep(&spec)?
            };
            Ok(report(&summary))
        }
        Command::Measure { path } => {
            let paths = if path.is_dir() {
                list_images(path)?
            } else {
                vec![path.clone()]
            };
            let images = paths
                .iter()
                .map(|p| image_io::load(p).map_err(anyhow::Error::from))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let baseline = Orchestrator::new(Ledger::in_memory()).measure_baseline(&images);
            println!("{}", serde_json::to_string_pretty(&baseline)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(feature = "parallel")]
fn run_parallel(orchestrator: &Orchestrator, spec: &SweepSpec) -> anyhow::Result<SweepSummary> {
    Ok(orchestrator.run_sweep_parallel(spec)?)
}

#[cfg(not(feature = "parallel"))]
fn run_parallel(orchestrator: &Orchestrator, spec: &SweepSpec) -> anyhow::Result<SweepSummary> {
    tracing::warn!("built without the `parallel` feature, running sequentially");
    Ok(orchestrator.run_sweep(spec)?)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
