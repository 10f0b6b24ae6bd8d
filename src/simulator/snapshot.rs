//! Export and import of the simulator's state as JSON.
use super::{SimulatorInput, SimulatorResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The snapshot format version written by this crate
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Why a snapshot could not be imported
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Not JSON, or not shaped like a snapshot
    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Written by an incompatible version
    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(String),
}

/// The simulator's answers and quote at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The answers
    pub data: SimulatorInput,
    /// The quote, if one had been computed
    #[serde(default)]
    pub result: Option<SimulatorResult>,
    /// When the snapshot was taken
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// The format version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

impl Snapshot {
    /// Take a snapshot now
    pub fn new(data: SimulatorInput, result: Option<SimulatorResult>) -> Self {
        Self {
            data,
            result,
            timestamp: Some(Utc::now()),
            version: default_version(),
        }
    }

    /// Serialise as pretty-printed JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("Snapshot is always serialisable")
    }

    /// Parse a snapshot, rejecting anything not shaped like one.
    ///
    /// Fields missing from `data` take their default values.
    pub fn from_json(serialised: &str) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_str(serialised)?;
        if snapshot.version.split('.').next() != SNAPSHOT_VERSION.split('.').next() {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }

        Ok(snapshot)
    }
}
