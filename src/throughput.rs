//! Throughput classification for `read_container_metadata`.
//!
//! A throughput read either yields an offer or fails with a status code. Some
//! of those failures are informational for the caller (the container shares
//! database throughput, or the emulator does not implement offers) and are
//! folded into [`ThroughputInfo`] instead of failing the tool call.

use serde::Serialize;

use crate::backend::{BackendError, ThroughputProperties};

/// Message for containers without dedicated throughput.
pub const SHARED_MESSAGE: &str = "Throughput is provisioned at database level";

/// Message when the backend cannot serve throughput reads.
pub const UNSUPPORTED_MESSAGE: &str =
    "Unable to read throughput (emulator limitation or unsupported operation)";

/// Caller-facing throughput state. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ThroughputInfo {
    /// Dedicated, manually provisioned throughput.
    Manual {
        /// Provisioned RU/s
        ru_per_second: u32,
    },
    /// Dedicated autoscale throughput.
    Autoscale {
        /// Autoscale ceiling in RU/s
        max_ru_per_second: u32,
    },
    /// Throughput comes from the database.
    Shared {
        /// Explanation
        message: String,
    },
    /// The backend could not tell.
    Unknown {
        /// Explanation
        message: String,
    },
    /// The read failed for another reason.
    Error {
        /// Backend code or detail
        message: String,
    },
}

/// How a failed throughput read is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThroughputCategory {
    /// 404: no dedicated offer.
    Shared,
    /// 400: offers endpoint not supported.
    Unknown,
    /// Anything else.
    Error,
}

impl ThroughputCategory {
    /// Map a response status to its category. Total over all statuses.
    pub fn from_status(status: Option<u16>) -> Self {
        match status {
            Some(404) => ThroughputCategory::Shared,
            Some(400) => ThroughputCategory::Unknown,
            _ => ThroughputCategory::Error,
        }
    }
}

/// Classify the outcome of a throughput read.
pub fn classify(outcome: Result<ThroughputProperties, BackendError>) -> ThroughputInfo {
    match outcome {
        Ok(ThroughputProperties {
            manual: Some(ru), ..
        }) => ThroughputInfo::Manual { ru_per_second: ru },
        Ok(ThroughputProperties {
            autoscale_max: Some(max),
            ..
        }) => ThroughputInfo::Autoscale {
            max_ru_per_second: max,
        },
        Ok(_) => ThroughputInfo::Unknown {
            message: "Throughput offer has neither manual nor autoscale settings".to_string(),
        },
        Err(err) => match ThroughputCategory::from_status(err.status) {
            ThroughputCategory::Shared => ThroughputInfo::Shared {
                message: SHARED_MESSAGE.to_string(),
            },
            ThroughputCategory::Unknown => ThroughputInfo::Unknown {
                message: UNSUPPORTED_MESSAGE.to_string(),
            },
            ThroughputCategory::Error => ThroughputInfo::Error {
                message: format!(
                    "Failed to read throughput: {}",
                    err.code.as_deref().unwrap_or(&err.message)
                ),
            },
        },
    }
}
