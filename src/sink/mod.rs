//! Result sink.
//!
//! Probers and the orchestrator never talk to a presentation layer directly;
//! they report through a [`ResultSink`] passed in by the caller. The console
//! renderer lives in `app`; [`RecordingSink`] keeps every event for inspection.

use crate::probe::{ProbeKind, ProbeResult};
use crate::registry::RegionTarget;
use crate::speed::SpeedMetric;

/// Receiver of diagnostic progress and results.
///
/// Only `record_probe_result` is required; the other hooks default to no-ops
/// so a sink can ignore UI concerns it has no use for.
pub trait ResultSink {
    /// A probe for one region finished.
    fn record_probe_result(&mut self, kind: ProbeKind, result: &ProbeResult);

    /// The region's indicators go back to "Pending".
    fn reset_region(&mut self, _target: &RegionTarget) {}

    /// Start/advance controls are shown or hidden.
    fn set_controls_visible(&mut self, _visible: bool) {}

    /// A speed measurement is about to start.
    fn speed_started(&mut self, _metric: SpeedMetric) {}

    /// A speed measurement finished with its display value.
    fn record_speed(&mut self, _metric: SpeedMetric, _value: &str) {}

    /// A user-visible dialog.
    fn show_message(&mut self, _title: &str, _message: &str) {}
}

/// Everything a [`RecordingSink`] has seen, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    ProbeResult(ProbeKind, ProbeResult),
    RegionReset(String),
    ControlsVisible(bool),
    SpeedStarted(SpeedMetric),
    Speed(SpeedMetric, String),
    Message { title: String, message: String },
}

/// Sink that records every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe results of one kind in the order they were recorded.
    pub fn results(&self, kind: ProbeKind) -> Vec<&ProbeResult> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::ProbeResult(k, r) if *k == kind => Some(r),
                _ => None,
            })
            .collect()
    }

    /// The last dialog shown, if any.
    pub fn last_message(&self) -> Option<(&str, &str)> {
        self.events.iter().rev().find_map(|e| match e {
            SinkEvent::Message { title, message } => Some((title.as_str(), message.as_str())),
            _ => None,
        })
    }
}

impl ResultSink for RecordingSink {
    fn record_probe_result(&mut self, kind: ProbeKind, result: &ProbeResult) {
        self.events
            .push(SinkEvent::ProbeResult(kind, result.clone()));
    }

    fn reset_region(&mut self, target: &RegionTarget) {
        self.events
            .push(SinkEvent::RegionReset(target.region_id().to_string()));
    }

    fn set_controls_visible(&mut self, visible: bool) {
        self.events.push(SinkEvent::ControlsVisible(visible));
    }

    fn speed_started(&mut self, metric: SpeedMetric) {
        self.events.push(SinkEvent::SpeedStarted(metric));
    }

    fn record_speed(&mut self, metric: SpeedMetric, value: &str) {
        self.events
            .push(SinkEvent::Speed(metric, value.to_string()));
    }

    fn show_message(&mut self, title: &str, message: &str) {
        self.events.push(SinkEvent::Message {
            title: title.to_string(),
            message: message.to_string(),
        });
    }
}
