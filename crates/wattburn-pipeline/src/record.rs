use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wattburn_core::{EnergySummary, InferenceMetrics};

use crate::response::ResponseOutcome;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub energy: EnergySummary,
    pub inference: InferenceMetrics,
    pub energy_per_token_j: f64,
    /// True when the structured response payload was present but corrupt
    /// and the heuristic scrub was used instead.
    pub degraded: bool,
}

pub fn assemble(
    energy: EnergySummary,
    mut inference: InferenceMetrics,
    response: ResponseOutcome,
) -> RunRecord {
    let energy_per_token_j = if inference.output_token_count > 0 {
        energy.total_energy_j / inference.output_token_count as f64
    } else {
        0.0
    };
    let degraded = response.is_degraded();
    inference.model_response = response.into_text();

    RunRecord {
        energy,
        inference,
        energy_per_token_j,
        degraded,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl RunRecord {
    /// Flatten into the fixed result-table columns. Rounding is per column
    /// family: latencies/throughput 3 dp, electrical averages 4 dp, energy
    /// 6 dp, temperatures and capacity 1 dp. Every column is always
    /// present; stored values keep full precision.
    pub fn to_row(&self) -> Vec<(&'static str, Value)> {
        let e = &self.energy;
        let m = &self.inference;
        vec![
            ("prefill_latency", json!(round_to(m.prefill_latency_s, 3))),
            (
                "generation_latency",
                json!(round_to(m.generation_latency_s, 3)),
            ),
            (
                "inference_latency",
                json!(round_to(m.inference_latency_s, 3)),
            ),
            (
                "time_to_first_token",
                json!(round_to(m.time_to_first_token_s, 3)),
            ),
            ("input_tokens", json!(m.input_token_count)),
            ("output_tokens", json!(m.output_token_count)),
            ("total_tokens", json!(m.total_token_count())),
            ("prompt_tps", json!(round_to(m.prompt_tps, 3))),
            ("tps", json!(round_to(m.gen_tps, 3))),
            ("avg_current", json!(round_to(e.avg_current_a, 4))),
            ("avg_voltage", json!(round_to(e.avg_voltage_v, 4))),
            ("avg_power", json!(round_to(e.avg_power_w, 4))),
            (
                "avg_capacity",
                json!(round_to(e.avg_capacity_pct.unwrap_or(0.0), 1)),
            ),
            (
                "avg_temp",
                json!(round_to(e.avg_temperature_c.unwrap_or(0.0), 1)),
            ),
            (
                "min_temp",
                json!(round_to(e.min_temperature_c.unwrap_or(0.0), 1)),
            ),
            (
                "max_temp",
                json!(round_to(e.max_temperature_c.unwrap_or(0.0), 1)),
            ),
            (
                "total_energy_consumption",
                json!(round_to(e.total_energy_j, 6)),
            ),
            ("energy_per_token", json!(round_to(self.energy_per_token_j, 6))),
            ("model_response", json!(m.model_response)),
        ]
    }
}
