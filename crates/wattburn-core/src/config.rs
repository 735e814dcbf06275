use serde::{Deserialize, Serialize};

/// Idle current floor subtracted from every telemetry reading, in amps.
///
/// Measured on the reference device with a 30-minute idle capture
/// (screen on, radios up, no workload). Re-measure with the `baseline`
/// command when switching devices.
pub const DEFAULT_BASELINE_CURRENT_A: f64 = 0.10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Idle current floor in amps, subtracted before power integration.
    #[serde(default = "default_baseline")]
    pub baseline_current_a: f64,
    #[serde(default)]
    pub ttft_strategy: TtftStrategy,
}

fn default_baseline() -> f64 {
    DEFAULT_BASELINE_CURRENT_A
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            baseline_current_a: DEFAULT_BASELINE_CURRENT_A,
            ttft_strategy: TtftStrategy::default(),
        }
    }
}

/// How time-to-first-token is derived from the transcript timings.
///
/// Both approximate prefill latency plus one decode step; they differ in
/// which datum supplies the decode-step duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TtftStrategy {
    /// prefill + 1 / gen_tps. Works in both transcript dialects, since the
    /// compact dialect only reports aggregate throughput.
    #[default]
    ReciprocalThroughput,
    /// prefill + decode ms-per-token / 1000. Only the verbose dialect
    /// exposes per-token timing.
    PerTokenTiming,
}

impl PipelineConfig {
    /// Load from a JSON config file. Fields absent from the file keep
    /// their defaults.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        if config.baseline_current_a < 0.0 {
            return Err(crate::error::WattburnError::Config(format!(
                "baseline_current_a must be non-negative, got {}",
                config.baseline_current_a
            )));
        }
        Ok(config)
    }
}

impl std::str::FromStr for TtftStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reciprocal-throughput" | "reciprocal" => Ok(Self::ReciprocalThroughput),
            "per-token-timing" | "per-token" => Ok(Self::PerTokenTiming),
            other => Err(format!(
                "unknown ttft strategy: {other} (expected reciprocal-throughput or per-token-timing)"
            )),
        }
    }
}
