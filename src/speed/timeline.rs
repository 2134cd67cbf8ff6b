//! Resource timing entries.

use std::time::Duration;

use tokio::time::Instant;

/// Timing of one completed fetch, as offsets from the timeline origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceTiming {
    /// URL of the resource
    pub name: String,
    pub request_start: Duration,
    pub response_start: Duration,
    pub response_end: Duration,
}

/// Ordered record of completed fetches.
#[derive(Debug)]
pub struct PerformanceTimeline {
    origin: Instant,
    entries: Vec<ResourceTiming>,
}

impl Default for PerformanceTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceTimeline {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            entries: Vec::new(),
        }
    }

    /// Time elapsed since the timeline was created.
    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    pub fn push(&mut self, entry: ResourceTiming) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ResourceTiming] {
        &self.entries
    }

    /// The most recently completed entry for `name`.
    pub fn last_matching(&self, name: &str) -> Option<&ResourceTiming> {
        self.entries.iter().rev().find(|e| e.name == name)
    }
}
