use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Sensor input ─────────────────────────────────────────────────

/// One raw measurement from the position sensor. Transient: consumed by the
/// signal filter and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius of uncertainty in meters. Samples above the configured
    /// accuracy bound never reach the coordinator.
    pub horizontal_accuracy: f64,
    pub timestamp: DateTime<Utc>,
}

/// A position sample that passed the accuracy filter and is eligible to
/// trigger a metadata fetch. No identity beyond its coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualifyingEvent {
    pub latitude: f64,
    pub longitude: f64,
}

/// Authorization status reported by the position sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// Full grant — background tracking allowed.
    Always,
    /// Tracking works only while the app is in the foreground.
    ForegroundOnly,
    Denied,
    Restricted,
    NotDetermined,
}

/// Raw failure codes emitted by the position sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorFault {
    /// The user revoked permission while tracking was active.
    Denied,
    /// A deferred-updates request failed. Transient: the next sample
    /// re-attempts deferral.
    Deferral,
    /// Anything else. Swallowed (logged, not surfaced).
    Other(String),
}

// ─── Acquired records ─────────────────────────────────────────────

/// One acquired point of interest: a fetched metadata subject plus its
/// optional locally fetched image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Server-assigned identifier. Unique across the index; correlation key
    /// for image-fetch completions.
    pub id: String,
    pub server: String,
    pub farm: u32,
    pub secret: String,
    /// Where the image lives on disk. `None` until the download completes.
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

impl PhotoRecord {
    pub fn new(id: impl Into<String>, server: impl Into<String>, farm: u32, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            server: server.into(),
            farm,
            secret: secret.into(),
            local_path: None,
        }
    }
}
