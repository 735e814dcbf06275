//! Battery telemetry log parsing.
//!
//! The device-side monitor logs one line per sample through logcat:
//!
//! ```text
//! BatteryMgr:DataCollectionService: stats => <ts_ms>,<current_uA>,<voltage_mV>[,<capacity_pct>,<temp_deci_c>]
//! ```
//!
//! Everything else in the capture (other logcat tags, service banners) is
//! ignored. A marker line with malformed fields is dropped whole; one bad
//! sample must never abort a multi-hour batch.

use tracing::debug;
use wattburn_core::PowerSample;

/// Logcat tag + prefix emitted by the BatteryManager collection service.
pub const TELEMETRY_MARKER: &str = "BatteryMgr:DataCollectionService: stats =>";

#[derive(Debug, Clone)]
pub struct TelemetryParser {
    baseline_current_a: f64,
}

impl TelemetryParser {
    pub fn new(baseline_current_a: f64) -> Self {
        Self { baseline_current_a }
    }

    /// Parse one capture line into a normalized sample.
    ///
    /// Returns `None` for non-marker lines and for marker lines whose
    /// payload does not parse.
    pub fn parse_line(&self, line: &str) -> Option<PowerSample> {
        let (_, payload) = line.split_once(TELEMETRY_MARKER)?;

        let fields: Vec<&str> = payload.split(',').map(str::trim).collect();
        if fields.len() < 3 {
            debug!(line, "telemetry line has fewer than 3 fields, skipping");
            return None;
        }

        let parsed: Option<Vec<i64>> = fields.iter().map(|f| f.parse::<i64>().ok()).collect();
        let Some(values) = parsed else {
            debug!(line, "telemetry line has non-numeric field, skipping");
            return None;
        };

        let current_a = (values[1].abs() as f64 / 1_000_000.0 - self.baseline_current_a).max(0.0);

        // Out-of-range capacity is a sensor glitch; treat it as absent
        // rather than letting it skew the run average.
        let capacity_pct = values
            .get(3)
            .copied()
            .filter(|c| (0..=100).contains(c))
            .map(|c| c as u8);
        let temperature_c = values.get(4).map(|t| *t as f64 / 10.0);

        Some(PowerSample {
            time_s: values[0] as f64 / 1000.0,
            current_a,
            voltage_v: values[2] as f64 / 1000.0,
            capacity_pct,
            temperature_c,
        })
    }

    /// Lazy pass over a full capture. Borrows the log, so the same capture
    /// can be re-parsed with a different baseline without copying.
    pub fn samples<'a>(&'a self, log: &'a str) -> impl Iterator<Item = PowerSample> + 'a {
        log.lines().filter_map(move |line| self.parse_line(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TelemetryParser {
        TelemetryParser::new(0.10)
    }

    #[test]
    fn test_basic_line() {
        let sample = parser()
            .parse_line("BatteryMgr:DataCollectionService: stats => 1000,150000,3800")
            .unwrap();
        assert_eq!(sample.time_s, 1.0);
        assert!((sample.current_a - 0.05).abs() < 1e-12);
        assert_eq!(sample.voltage_v, 3.8);
        assert_eq!(sample.capacity_pct, None);
        assert_eq!(sample.temperature_c, None);
    }

    #[test]
    fn test_extended_line_with_logcat_prefix() {
        let line = "01-15 10:32:01.123  1234  5678 I BatteryMgr:DataCollectionService: stats => 2500,-420000,4350,87,312";
        let sample = parser().parse_line(line).unwrap();
        assert_eq!(sample.time_s, 2.5);
        assert!((sample.current_a - 0.32).abs() < 1e-12);
        assert_eq!(sample.voltage_v, 4.35);
        assert_eq!(sample.capacity_pct, Some(87));
        assert_eq!(sample.temperature_c, Some(31.2));
    }

    #[test]
    fn test_current_at_baseline_clamps_to_zero() {
        // Reading equal to the 0.10 A baseline must normalize to exactly 0,
        // never negative, regardless of voltage.
        let sample = parser()
            .parse_line("BatteryMgr:DataCollectionService: stats => 0,100000,4000")
            .unwrap();
        assert_eq!(sample.current_a, 0.0);

        let below = parser()
            .parse_line("BatteryMgr:DataCollectionService: stats => 0,40000,3000")
            .unwrap();
        assert_eq!(below.current_a, 0.0);
    }

    #[test]
    fn test_non_marker_line_ignored() {
        assert!(parser().parse_line("ActivityManager: start proc").is_none());
        assert!(parser().parse_line("").is_none());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let p = parser();
        assert!(p
            .parse_line("BatteryMgr:DataCollectionService: stats => 1000,abc,3800")
            .is_none());
        assert!(p
            .parse_line("BatteryMgr:DataCollectionService: stats => 1000,150000")
            .is_none());
        assert!(p
            .parse_line("BatteryMgr:DataCollectionService: stats =>")
            .is_none());
    }

    #[test]
    fn test_out_of_range_capacity_dropped() {
        let sample = parser()
            .parse_line("BatteryMgr:DataCollectionService: stats => 1000,150000,3800,250,301")
            .unwrap();
        assert_eq!(sample.capacity_pct, None);
        assert_eq!(sample.temperature_c, Some(30.1));
    }

    #[test]
    fn test_stream_is_restartable() {
        let log = "noise\n\
                   BatteryMgr:DataCollectionService: stats => 1000,150000,3800\n\
                   BatteryMgr:DataCollectionService: stats => 1000,broken\n\
                   BatteryMgr:DataCollectionService: stats => 2000,150000,3800\n";
        let p = parser();
        assert_eq!(p.samples(log).count(), 2);
        // Same log, different baseline, no interior state carried over.
        let zero = TelemetryParser::new(0.0);
        let first = zero.samples(log).next().unwrap();
        assert!((first.current_a - 0.15).abs() < 1e-12);
        assert_eq!(p.samples(log).count(), 2);
    }
}
