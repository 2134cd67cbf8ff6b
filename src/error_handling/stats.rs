//! Probe outcome statistics tracking.
//!
//! Counts probe outcomes per prober using atomic counters so a run summary
//! can be printed at the end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::OutcomeType;
use crate::probe::{Classification, ProbeKind, ProbeOutcome, ProbeResult};

/// Probe outcome counters.
///
/// One counter per (probe kind, outcome type), all initialized to zero on
/// creation.
pub struct ProbeStats {
    counts: HashMap<(ProbeKind, OutcomeType), AtomicUsize>,
}

impl Default for ProbeStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeStats {
    pub fn new() -> Self {
        let mut counts = HashMap::new();
        for kind in ProbeKind::iter() {
            for outcome in OutcomeType::iter() {
                counts.insert((kind, outcome), AtomicUsize::new(0));
            }
        }
        ProbeStats { counts }
    }

    /// Categorizes a result and increments its counter.
    pub fn record(&self, kind: ProbeKind, result: &ProbeResult) {
        let outcome = Self::categorize(kind, result);
        if let Some(counter) = self.counts.get(&(kind, outcome)) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment counter for {:?}/{:?} which is not in the map",
                kind,
                outcome
            );
        }
    }

    /// Maps a result onto its outcome category.
    pub fn categorize(kind: ProbeKind, result: &ProbeResult) -> OutcomeType {
        match result.outcome() {
            ProbeOutcome::Success => match result.classification(kind) {
                Some(Classification::Good) | None => OutcomeType::SuccessGood,
                Some(Classification::Degraded) => OutcomeType::SuccessDegraded,
            },
            ProbeOutcome::Timeout => OutcomeType::Timeout,
            ProbeOutcome::Error => match result.failure_cause() {
                Some(cause) if cause.is_construction() => OutcomeType::ConstructionError,
                _ => OutcomeType::NetworkError,
            },
        }
    }

    pub fn get_count(&self, kind: ProbeKind, outcome: OutcomeType) -> usize {
        self.counts
            .get(&(kind, outcome))
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total number of recorded results for one prober.
    pub fn total(&self, kind: ProbeKind) -> usize {
        OutcomeType::iter().map(|o| self.get_count(kind, o)).sum()
    }

    /// Number of results that were not a success.
    pub fn total_failures(&self, kind: ProbeKind) -> usize {
        [
            OutcomeType::Timeout,
            OutcomeType::ConstructionError,
            OutcomeType::NetworkError,
        ]
        .into_iter()
        .map(|o| self.get_count(kind, o))
        .sum()
    }
}
