use serde::{Deserialize, Serialize};

/// One normalized electrical/thermal reading from the device-side monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    pub time_s: f64,
    /// Workload-attributable current in amps, idle baseline already
    /// subtracted and clamped at zero.
    pub current_a: f64,
    pub voltage_v: f64,
    #[serde(default)]
    pub capacity_pct: Option<u8>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
}

impl PowerSample {
    pub fn power_w(&self) -> f64 {
        self.current_a * self.voltage_v
    }
}

/// Aggregate electrical/thermal statistics for one run's telemetry capture.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergySummary {
    pub total_energy_j: f64,
    pub avg_current_a: f64,
    pub avg_voltage_v: f64,
    pub avg_power_w: f64,
    #[serde(default)]
    pub avg_capacity_pct: Option<f64>,
    #[serde(default)]
    pub avg_temperature_c: Option<f64>,
    #[serde(default)]
    pub min_temperature_c: Option<f64>,
    #[serde(default)]
    pub max_temperature_c: Option<f64>,
    pub sample_count: u32,
}

/// Timing and throughput metrics scraped from one inference transcript.
///
/// Every field defaults to zero/empty when the transcript did not yield it;
/// absence of a line is never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceMetrics {
    pub input_token_count: u32,
    pub output_token_count: u32,
    pub prefill_latency_s: f64,
    pub generation_latency_s: f64,
    pub inference_latency_s: f64,
    pub prompt_tps: f64,
    pub gen_tps: f64,
    pub time_to_first_token_s: f64,
    pub model_response: String,
}

impl InferenceMetrics {
    pub fn total_token_count(&self) -> u32 {
        self.input_token_count + self.output_token_count
    }
}
