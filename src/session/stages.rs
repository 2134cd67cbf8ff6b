//! Readiness-check stage tracker.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter as EnumIterMacro;

/// One step of the readiness-check flow, in flow order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIterMacro, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Identity,
    Location,
    Network,
    Computer,
    Audio,
    Submit,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Identity => "identity",
            Stage::Location => "location",
            Stage::Network => "network",
            Stage::Computer => "computer",
            Stage::Audio => "audio",
            Stage::Submit => "submit",
            Stage::Done => "done",
        }
    }

    /// The stage that follows; `None` for `Done`.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Identity => Some(Stage::Location),
            Stage::Location => Some(Stage::Network),
            Stage::Network => Some(Stage::Computer),
            Stage::Computer => Some(Stage::Audio),
            Stage::Audio => Some(Stage::Submit),
            Stage::Submit => Some(Stage::Done),
            Stage::Done => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display flags of one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFlags {
    pub banner: bool,
    pub current: bool,
    pub complete: bool,
    pub errored: bool,
}

/// Flags for every stage. A fresh tracker starts on `Identity` with its banner shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stages {
    stages: BTreeMap<Stage, StageFlags>,
}

impl Default for Stages {
    fn default() -> Self {
        let mut stages: BTreeMap<Stage, StageFlags> =
            Stage::iter().map(|s| (s, StageFlags::default())).collect();
        stages.insert(
            Stage::Identity,
            StageFlags {
                banner: true,
                current: true,
                ..Default::default()
            },
        );
        Self { stages }
    }
}

impl Stages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self, stage: Stage) -> StageFlags {
        self.stages.get(&stage).copied().unwrap_or_default()
    }

    /// The first stage flagged current.
    pub fn current(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|(_, flags)| flags.current)
            .map(|(stage, _)| *stage)
    }

    /// Keeps `stage` current and marks it errored.
    pub fn page_error(&mut self, stage: Stage) {
        let flags = self.stages.entry(stage).or_default();
        flags.current = true;
        flags.errored = true;
    }

    /// Completes `stage` and makes the next one current.
    pub fn page_success(&mut self, stage: Stage) {
        let flags = self.stages.entry(stage).or_default();
        flags.current = false;
        flags.errored = false;
        flags.complete = true;

        if let Some(next) = stage.next() {
            let flags = self.stages.entry(next).or_default();
            flags.current = true;
            flags.errored = false;
            flags.complete = false;
        }
    }
}
