//! Turns one run's captured artifacts — a battery telemetry log and an
//! inference transcript — into a single flat metrics record.
//!
//! The pipeline is batch-style and infallible by design: a missing or
//! damaged artifact surfaces as zeroed columns in the output row, never as
//! an aborted run. Each run is processed by an explicit [`Pipeline`] value;
//! there is no shared state between runs.

pub mod energy;
pub mod record;
pub mod response;
pub mod telemetry;
pub mod transcript;

use std::path::Path;

use tracing::{info, warn};
use wattburn_core::{EnergySummary, InferenceMetrics, PipelineConfig};

pub use energy::{baseline_from_log, integrate, BaselineEstimate, EnergyIntegrator};
pub use record::{assemble, RunRecord};
pub use response::{extract_response, ResponseOutcome, PARSED_MESSAGE_MARKER};
pub use telemetry::{TelemetryParser, TELEMETRY_MARKER};
pub use transcript::{Dialect, TranscriptParser};

#[derive(Debug, Clone)]
pub struct Pipeline {
    telemetry: TelemetryParser,
    transcript: TranscriptParser,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            telemetry: TelemetryParser::new(config.baseline_current_a),
            transcript: TranscriptParser::new(config.ttft_strategy),
        }
    }

    /// Derive one run's record from its captured artifacts. `None` marks a
    /// missing artifact; that side of the record stays at defaults.
    pub fn process_run(
        &self,
        telemetry_log: Option<&str>,
        transcript: Option<&str>,
    ) -> RunRecord {
        let energy = match telemetry_log {
            Some(log) => integrate(self.telemetry.samples(log)),
            None => {
                warn!("telemetry artifact missing, energy columns default to zero");
                EnergySummary::default()
            }
        };

        let (metrics, response) = match transcript {
            Some(text) => (self.transcript.parse(text), extract_response(text)),
            None => {
                warn!("transcript artifact missing, inference columns default to zero");
                (
                    InferenceMetrics::default(),
                    ResponseOutcome::Heuristic(String::new()),
                )
            }
        };

        let record = assemble(energy, metrics, response);
        info!(
            total_energy_j = record.energy.total_energy_j,
            tps = record.inference.gen_tps,
            output_tokens = record.inference.output_token_count,
            degraded = record.degraded,
            "run record assembled"
        );
        record
    }

    /// File-path convenience: an unreadable artifact is treated as missing.
    pub fn process_files(&self, telemetry_path: &Path, transcript_path: &Path) -> RunRecord {
        let telemetry = read_artifact(telemetry_path);
        let transcript = read_artifact(transcript_path);
        self.process_run(telemetry.as_deref(), transcript.as_deref())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

/// Strict read for callers that require the artifact to exist, such as
/// baseline calibration. The run pipeline itself uses the lenient path.
pub fn read_required_artifact(path: &Path) -> wattburn_core::Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            wattburn_core::WattburnError::ArtifactNotFound(path.display().to_string())
        }
        _ => wattburn_core::WattburnError::Io(e),
    })
}

fn read_artifact(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Some(contents),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "artifact unreadable, treating as missing");
            None
        }
    }
}
