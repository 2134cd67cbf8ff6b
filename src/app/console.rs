//! Console rendering of diagnostic progress.

use std::collections::HashMap;

use colored::*;
use log::debug;

use crate::probe::{Classification, ProbeKind, ProbeResult};
use crate::registry::{RegionTarget, Registry};
use crate::sink::ResultSink;
use crate::speed::SpeedMetric;

/// Prints each result as it arrives, coloured by classification.
pub struct ConsoleSink {
    names: HashMap<String, String>,
}

impl ConsoleSink {
    pub fn new(registry: &Registry) -> Self {
        let names = registry
            .iter()
            .map(|t| (t.region_id().to_string(), t.display_name().to_string()))
            .collect();
        Self { names }
    }

    fn render_probe_line(&self, kind: ProbeKind, result: &ProbeResult) -> String {
        let name = self
            .names
            .get(result.region_id())
            .map(String::as_str)
            .unwrap_or(result.region_id());
        let value = match result.elapsed_millis() {
            Some(ms) => format!("{} ms", ms),
            None => result.display_value(),
        };
        let value = match result.classification(kind) {
            Some(Classification::Good) => value.green(),
            Some(Classification::Degraded) => value.yellow(),
            None => value.red(),
        };
        format!(
            "{:<13} {:<10} ({}) {}",
            kind.to_string(),
            name,
            result.region_id().dimmed(),
            value
        )
    }
}

impl ResultSink for ConsoleSink {
    fn record_probe_result(&mut self, kind: ProbeKind, result: &ProbeResult) {
        println!("{}", self.render_probe_line(kind, result));
    }

    fn reset_region(&mut self, target: &RegionTarget) {
        debug!("{}: Pending", target.region_id());
    }

    fn speed_started(&mut self, metric: SpeedMetric) {
        let what = match metric {
            SpeedMetric::Download => "download speed",
            SpeedMetric::Upload => "upload speed",
            SpeedMetric::Latency => "latency",
        };
        println!("Calculating {}...", what);
    }

    fn record_speed(&mut self, metric: SpeedMetric, value: &str) {
        let unit = match metric {
            SpeedMetric::Latency => "ms",
            SpeedMetric::Download | SpeedMetric::Upload => "Mb/s",
        };
        println!("{:<13} {} {}", metric.field_name(), value.green(), unit);
    }

    fn show_message(&mut self, title: &str, message: &str) {
        eprintln!("⚠️  {}: {}", title.bold().yellow(), message);
    }
}
