//! Statistics printing.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{OutcomeType, ProbeStats};
use crate::probe::ProbeKind;

/// Prints outcome counts per prober to the log.
pub fn print_probe_statistics(stats: &ProbeStats) {
    for kind in ProbeKind::iter() {
        let total = stats.total(kind);
        if total == 0 {
            continue;
        }
        info!(
            "{} outcomes ({} total, {} failed):",
            kind,
            total,
            stats.total_failures(kind)
        );
        for outcome in OutcomeType::iter() {
            let count = stats.get_count(kind, outcome);
            if count > 0 {
                info!("   {}: {}", outcome.as_str(), count);
            }
        }
    }
}

/// One-line summary of a network stage run.
pub fn print_simple_summary(stats: &ProbeStats, elapsed_seconds: f64) {
    let regions = stats.total(ProbeKind::Connectivity);
    info!(
        "Tested {} region{} ({} connectivity failures, {} latency failures) in {:.1}s",
        regions,
        if regions == 1 { "" } else { "s" },
        stats.total_failures(ProbeKind::Connectivity),
        stats.total_failures(ProbeKind::Latency),
        elapsed_seconds
    );
}
