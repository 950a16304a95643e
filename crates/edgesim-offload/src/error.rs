//! Configuration errors.
//!
//! These are the only failures that abort a simulation run. Rejected tasks are ordinary outcomes and never show up
//! here.

use thiserror::Error;

use crate::mobility::AccessPointId;
use crate::task::DeviceId;

/// Error caused by an invalid simulation setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("can't parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unknown simulation scenario: {0}")]
    UnknownScenario(String),
    #[error("unknown offloading policy: {0}")]
    UnknownTierPolicy(String),
    #[error("unknown VM placement policy: {0}")]
    UnknownPlacementPolicy(String),
    #[error("unknown link class: {0}")]
    UnknownLinkClass(String),
    #[error("no network model is configured for link class {0}")]
    MissingLink(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("no location for device {device} at time {time:.3}")]
    MissingLocation { device: DeviceId, time: f64 },
    #[error("access point {access_point} is out of range (configured {count})")]
    UnknownAccessPoint { access_point: AccessPointId, count: u32 },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
