use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use gait_lib::{
    baseline::BaselineTable,
    classify::{classify, Classification},
    detectors::gait::detect,
    engine::{EngineConfig, GaitEngine},
    io::{config as config_io, json as json_io},
    metrics::gait::MetricKind,
    signal::Recording,
    synth::{simulate, SimulationParams},
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "gait",
    version,
    about = "Gait analysis: heel-strike detection, gait metrics and baseline classification"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis on a recording read from stdin or --input
    Analyze {
        #[arg(long)]
        input: Option<PathBuf>,
        /// JSON map of metric name to baseline statistics
        #[arg(long)]
        baseline: Option<PathBuf>,
        /// TOML engine calibration
        #[arg(long)]
        config: Option<PathBuf>,
        /// TOML finding catalog
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Detect heel strikes and stance/swing events only
    Detect {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Classify one metric value against the baseline
    Classify {
        #[arg(long)]
        metric: MetricKind,
        #[arg(long)]
        value: f64,
        #[arg(long)]
        baseline: Option<PathBuf>,
    },
    /// Emit a synthetic walking recording as JSON
    Simulate {
        #[arg(long, default_value_t = 40.0)]
        seconds: f64,
        #[arg(long, default_value_t = 50.0)]
        fs: f64,
        #[arg(long, default_value_t = 115.0)]
        cadence: f64,
        #[arg(long, default_value_t = 0.1)]
        noise: f64,
        #[arg(long, default_value_t = 0.0)]
        irregularity: f64,
        #[arg(long, default_value_t = 0.0)]
        asymmetry: f64,
        #[arg(long)]
        no_pressure: bool,
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Print the built-in reference cohort baseline
    Baseline,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            input,
            baseline,
            config,
            catalog,
        } => cmd_analyze(
            input.as_deref(),
            baseline.as_deref(),
            config.as_deref(),
            catalog.as_deref(),
        )?,
        Commands::Detect { input, config } => cmd_detect(input.as_deref(), config.as_deref())?,
        Commands::Classify {
            metric,
            value,
            baseline,
        } => cmd_classify(metric, value, baseline.as_deref())?,
        Commands::Simulate {
            seconds,
            fs,
            cadence,
            noise,
            irregularity,
            asymmetry,
            no_pressure,
            seed,
        } => cmd_simulate(SimulationParams {
            duration_s: seconds,
            fs,
            cadence_spm: cadence,
            noise,
            irregularity,
            asymmetry,
            with_pressure: !no_pressure,
            seed,
            ..SimulationParams::default()
        })?,
        Commands::Baseline => print_json(&BaselineTable::reference_cohort())?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn read_recording(input: Option<&Path>) -> Result<Recording> {
    match input {
        Some(path) => json_io::read_recording(path),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read recording from stdin")?;
            json_io::parse_recording(&buf)
        }
    }
}

fn load_baseline(path: Option<&Path>) -> Result<BaselineTable> {
    match path {
        Some(path) => json_io::read_baseline(path),
        None => Ok(BaselineTable::reference_cohort()),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => config_io::read_config(path),
        None => Ok(EngineConfig::default()),
    }
}

fn cmd_analyze(
    input: Option<&Path>,
    baseline: Option<&Path>,
    config: Option<&Path>,
    catalog: Option<&Path>,
) -> Result<()> {
    let recording = read_recording(input)?;
    let mut engine = GaitEngine::new(load_baseline(baseline)?).with_config(load_config(config)?);
    if let Some(path) = catalog {
        engine = engine.with_catalog(config_io::read_catalog(path)?);
    }
    let result = engine.analyze(&recording);
    for issue in &result.issues {
        log::info!("issue: {issue}");
    }
    print_json(&result)
}

fn cmd_detect(input: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let recording = read_recording(input)?;
    let config = load_config(config)?;
    print_json(&detect(&recording, &config.detector))
}

#[derive(Serialize)]
struct ClassifyOutput {
    metric: MetricKind,
    value: f64,
    percentile: u8,
    severity: gait_lib::classify::Severity,
    normal_range: [f64; 2],
}

fn cmd_classify(metric: MetricKind, value: f64, baseline: Option<&Path>) -> Result<()> {
    if !value.is_finite() {
        return Err(anyhow!("value must be finite"));
    }
    let table = load_baseline(baseline)?;
    let entry = table
        .get(metric)
        .ok_or_else(|| anyhow!("baseline has no entry for {metric}"))?;
    let Classification {
        percentile,
        severity,
    } = classify(value, entry, metric.direction());
    print_json(&ClassifyOutput {
        metric,
        value,
        percentile,
        severity,
        normal_range: entry.normal_range(),
    })
}

fn cmd_simulate(params: SimulationParams) -> Result<()> {
    if params.fs <= 0.0 || params.duration_s <= 0.0 {
        return Err(anyhow!("--seconds and --fs must be positive"));
    }
    print_json(&simulate(&params))
}
