use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wattburn_core::{PipelineConfig, TtftStrategy};
use wattburn_pipeline::{baseline_from_log, read_required_artifact, Pipeline, RunRecord};

#[derive(Parser)]
#[command(name = "wattburn")]
#[command(about = "Wattburn - on-device LLM energy metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive one run's metrics record from its captured artifacts
    Run {
        /// Path to the battery telemetry capture (logcat dump)
        #[arg(short, long)]
        telemetry: PathBuf,

        /// Path to the inference transcript
        #[arg(short = 'x', long)]
        transcript: PathBuf,

        /// JSON pipeline config; explicit flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Idle baseline current in amps subtracted from every sample
        #[arg(short, long)]
        baseline: Option<f64>,

        /// TTFT strategy (reciprocal-throughput, per-token-timing)
        #[arg(long)]
        ttft: Option<TtftStrategy>,

        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Average an idle telemetry capture to calibrate the baseline current
    Baseline {
        /// Path to the idle telemetry capture
        #[arg(short, long)]
        telemetry: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            telemetry,
            transcript,
            config,
            baseline,
            ttft,
            output,
        } => cmd_run(&telemetry, &transcript, config.as_deref(), baseline, ttft, &output),
        Commands::Baseline { telemetry } => cmd_baseline(&telemetry),
    }
}

fn cmd_run(
    telemetry: &Path,
    transcript: &Path,
    config_path: Option<&Path>,
    baseline: Option<f64>,
    ttft: Option<TtftStrategy>,
    output_format: &str,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(baseline_a) = baseline {
        config.baseline_current_a = baseline_a;
    }
    if let Some(strategy) = ttft {
        config.ttft_strategy = strategy;
    }

    info!(
        telemetry = %telemetry.display(),
        transcript = %transcript.display(),
        baseline_a = config.baseline_current_a,
        "processing run artifacts"
    );
    let record = Pipeline::new(&config).process_files(telemetry, transcript);
    print_record(&record, output_format)?;
    Ok(())
}

fn print_record(record: &RunRecord, output_format: &str) -> Result<()> {
    match output_format {
        "json" => {
            let row: serde_json::Map<String, serde_json::Value> = record
                .to_row()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect();
            println!("{}", serde_json::to_string_pretty(&row)?);
        }
        "csv" => {
            println!("metric,value");
            for (name, value) in record.to_row() {
                if let Some(s) = value.as_str() {
                    println!("{},{}", name, csv_quote(s));
                } else {
                    println!("{},{}", name, value);
                }
            }
        }
        _ => {
            println!();
            println!("Run metrics:");
            println!("{:-<48}", "");
            for (name, value) in record.to_row() {
                if name == "model_response" {
                    continue;
                }
                println!("  {:<26} {}", name, value);
            }
            if record.degraded {
                println!("  {:<26} {}", "response extraction", "degraded");
            }
            let response = &record.inference.model_response;
            if !response.is_empty() {
                println!();
                println!("Model response:");
                println!("{:-<48}", "");
                println!("{}", response);
            }
            println!();
        }
    }
    Ok(())
}

// RFC 4180 field quoting: wrap in quotes, double any embedded quote.
// Embedded newlines stay inside the quoted field.
fn csv_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn cmd_baseline(telemetry: &Path) -> Result<()> {
    let log = read_required_artifact(telemetry)?;
    let estimate = baseline_from_log(&log);

    if estimate.sample_count == 0 {
        anyhow::bail!("no telemetry samples found in {}", telemetry.display());
    }

    println!();
    println!("Baseline estimate ({} samples):", estimate.sample_count);
    println!("{:-<40}", "");
    println!("  Avg voltage: {:.4} V", estimate.avg_voltage_v);
    println!("  Avg current: {:.6} A  <-- use as --baseline", estimate.avg_current_a);
    println!("  Avg power:   {:.4} W", estimate.avg_power_w);
    println!();

    Ok(())
}
