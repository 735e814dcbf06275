use serde::{Deserialize, Serialize};
use wattburn_core::{EnergySummary, PowerSample};

use crate::telemetry::TelemetryParser;

/// Trapezoidal energy fold over the sample stream. O(1) state: the
/// previous (time, power) pair plus running accumulators.
#[derive(Debug, Default)]
pub struct EnergyIntegrator {
    prev: Option<(f64, f64)>,
    total_energy_j: f64,
    current_sum: f64,
    voltage_sum: f64,
    power_sum: f64,
    capacity_sum: f64,
    capacity_count: u32,
    temperature_sum: f64,
    temperature_count: u32,
    min_temperature_c: Option<f64>,
    max_temperature_c: Option<f64>,
    count: u32,
}

impl EnergyIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: PowerSample) {
        let power_w = sample.power_w();

        if let Some((prev_t, prev_p)) = self.prev {
            // Duplicate or out-of-order timestamps contribute no energy
            // but still advance the window.
            let dt = sample.time_s - prev_t;
            if dt > 0.0 {
                self.total_energy_j += (power_w + prev_p) / 2.0 * dt;
            }
        }
        self.prev = Some((sample.time_s, power_w));

        self.current_sum += sample.current_a;
        self.voltage_sum += sample.voltage_v;
        self.power_sum += power_w;
        self.count += 1;

        if let Some(capacity) = sample.capacity_pct {
            self.capacity_sum += capacity as f64;
            self.capacity_count += 1;
        }
        if let Some(temp) = sample.temperature_c {
            self.temperature_sum += temp;
            self.temperature_count += 1;
            self.min_temperature_c = Some(self.min_temperature_c.map_or(temp, |m| m.min(temp)));
            self.max_temperature_c = Some(self.max_temperature_c.map_or(temp, |m| m.max(temp)));
        }
    }

    pub fn finish(self) -> EnergySummary {
        if self.count == 0 {
            return EnergySummary::default();
        }
        let n = self.count as f64;
        EnergySummary {
            total_energy_j: self.total_energy_j,
            avg_current_a: self.current_sum / n,
            avg_voltage_v: self.voltage_sum / n,
            avg_power_w: self.power_sum / n,
            avg_capacity_pct: (self.capacity_count > 0)
                .then(|| self.capacity_sum / self.capacity_count as f64),
            avg_temperature_c: (self.temperature_count > 0)
                .then(|| self.temperature_sum / self.temperature_count as f64),
            min_temperature_c: self.min_temperature_c,
            max_temperature_c: self.max_temperature_c,
            sample_count: self.count,
        }
    }
}

pub fn integrate(samples: impl IntoIterator<Item = PowerSample>) -> EnergySummary {
    let mut integrator = EnergyIntegrator::new();
    for sample in samples {
        integrator.push(sample);
    }
    integrator.finish()
}

/// Averages of an idle capture, used to calibrate the baseline constant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineEstimate {
    pub avg_current_a: f64,
    pub avg_voltage_v: f64,
    pub avg_power_w: f64,
    pub sample_count: u32,
}

/// Average an idle telemetry capture with no baseline subtraction.
/// `avg_power_w` is mean current times mean voltage, matching the
/// calibration procedure's reported figure.
pub fn baseline_from_log(log: &str) -> BaselineEstimate {
    let parser = TelemetryParser::new(0.0);
    let summary = integrate(parser.samples(log));
    BaselineEstimate {
        avg_current_a: summary.avg_current_a,
        avg_voltage_v: summary.avg_voltage_v,
        avg_power_w: summary.avg_current_a * summary.avg_voltage_v,
        sample_count: summary.sample_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(time_s: f64, current_a: f64, voltage_v: f64) -> PowerSample {
        PowerSample {
            time_s,
            current_a,
            voltage_v,
            capacity_pct: None,
            temperature_c: None,
        }
    }

    #[test]
    fn test_trapezoid_between_two_samples() {
        // P1 = 0.5*4 = 2 W at t=1, P2 = 1*4 = 4 W at t=3
        // => (2+4)/2 * 2 = 6 J
        let summary = integrate([sample(1.0, 0.5, 4.0), sample(3.0, 1.0, 4.0)]);
        assert!((summary.total_energy_j - 6.0).abs() < 1e-9);
        assert!((summary.avg_power_w - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_samples() {
        let summary = integrate([]);
        assert_eq!(summary, EnergySummary::default());
        assert_eq!(summary.total_energy_j, 0.0);
        assert_eq!(summary.avg_power_w, 0.0);
        assert_eq!(summary.min_temperature_c, None);
    }

    #[test]
    fn test_single_sample_has_zero_energy_but_real_averages() {
        let summary = integrate([sample(5.0, 0.25, 4.0)]);
        assert_eq!(summary.total_energy_j, 0.0);
        assert_eq!(summary.avg_current_a, 0.25);
        assert_eq!(summary.avg_voltage_v, 4.0);
        assert_eq!(summary.avg_power_w, 1.0);
        assert_eq!(summary.sample_count, 1);
    }

    #[test]
    fn test_duplicate_and_backwards_timestamps_contribute_nothing() {
        let summary = integrate([
            sample(1.0, 1.0, 1.0),
            sample(1.0, 1.0, 1.0), // dt = 0
            sample(0.5, 1.0, 1.0), // dt < 0
            sample(1.5, 1.0, 1.0), // dt = 1.0 from the t=0.5 sample
        ]);
        assert!((summary.total_energy_j - 1.0).abs() < 1e-9);
        assert_eq!(summary.sample_count, 4);
    }

    #[test]
    fn test_thermal_extrema_and_optional_averages() {
        let mut integrator = EnergyIntegrator::new();
        integrator.push(PowerSample {
            time_s: 0.0,
            current_a: 0.1,
            voltage_v: 4.0,
            capacity_pct: Some(90),
            temperature_c: Some(30.0),
        });
        integrator.push(PowerSample {
            time_s: 1.0,
            current_a: 0.1,
            voltage_v: 4.0,
            capacity_pct: None,
            temperature_c: Some(36.0),
        });
        let summary = integrator.finish();
        assert_eq!(summary.avg_capacity_pct, Some(90.0));
        assert_eq!(summary.avg_temperature_c, Some(33.0));
        assert_eq!(summary.min_temperature_c, Some(30.0));
        assert_eq!(summary.max_temperature_c, Some(36.0));
    }

    #[test]
    fn test_baseline_from_log() {
        let log = "BatteryMgr:DataCollectionService: stats => 0,100000,4000\n\
                   BatteryMgr:DataCollectionService: stats => 100,300000,4000\n";
        let estimate = baseline_from_log(log);
        assert!((estimate.avg_current_a - 0.2).abs() < 1e-9);
        assert!((estimate.avg_voltage_v - 4.0).abs() < 1e-9);
        assert!((estimate.avg_power_w - 0.8).abs() < 1e-9);
        assert_eq!(estimate.sample_count, 2);
    }
}
