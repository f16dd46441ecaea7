//! Resource limits.
//!
//! Scan, row and detail limits bound wide (`all`/`catalog`) queries by
//! truncating them. The full-record and expensive-attribute limits reject
//! a request outright.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cost bounds applied while aggregating a wide query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceLimits {
    /// Maximum candidate events examined by a wide query.
    #[serde(default = "default_max_events_scanned")]
    pub max_events_scanned: usize,

    /// Maximum rows returned by a wide query.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Maximum detail records loaded by a wide `full` query.
    #[serde(default = "default_max_detail_events")]
    pub max_detail_events: usize,

    /// Maximum events a `full` request may name.
    #[serde(default = "default_max_full_events")]
    pub max_full_events: usize,

    /// Maximum events a request for an expensive attribute may cover.
    #[serde(default = "default_max_expensive_events")]
    pub max_expensive_events: usize,

    /// Upper bound (exclusive) for `radius`, `width` and `height`.
    #[serde(default = "default_max_angle_arcsec")]
    pub max_angle_arcsec: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_events_scanned: default_max_events_scanned(),
            max_rows: default_max_rows(),
            max_detail_events: default_max_detail_events(),
            max_full_events: default_max_full_events(),
            max_expensive_events: default_max_expensive_events(),
            max_angle_arcsec: default_max_angle_arcsec(),
        }
    }
}

fn default_max_events_scanned() -> usize {
    100_000
}

fn default_max_rows() -> usize {
    100_000
}

fn default_max_detail_events() -> usize {
    1_000
}

fn default_max_full_events() -> usize {
    1_000
}

fn default_max_expensive_events() -> usize {
    100
}

fn default_max_angle_arcsec() -> f64 {
    36_000.0
}

/// Which limit a query ran into.
///
/// The first three kinds truncate and travel as response metadata. The
/// last two are carried by [`crate::errors::QueryError::TooExpensive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLimitExceeded {
    EventsScanned { limit: usize },
    Rows { limit: usize },
    DetailEvents { limit: usize },
    FullEvents { limit: usize },
    ExpensiveEvents { limit: usize },
}

impl ResourceLimitExceeded {
    /// Short identifier used in response headers and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceLimitExceeded::EventsScanned { .. } => "max-events-scanned",
            ResourceLimitExceeded::Rows { .. } => "max-rows",
            ResourceLimitExceeded::DetailEvents { .. } => "max-detail-events",
            ResourceLimitExceeded::FullEvents { .. } => "max-full-events",
            ResourceLimitExceeded::ExpensiveEvents { .. } => "max-expensive-events",
        }
    }

    pub fn limit(&self) -> usize {
        match self {
            ResourceLimitExceeded::EventsScanned { limit }
            | ResourceLimitExceeded::Rows { limit }
            | ResourceLimitExceeded::DetailEvents { limit }
            | ResourceLimitExceeded::FullEvents { limit }
            | ResourceLimitExceeded::ExpensiveEvents { limit } => *limit,
        }
    }
}

impl fmt::Display for ResourceLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLimitExceeded::EventsScanned { limit } => {
                write!(f, "Too many events scanned: stopped after {}", limit)
            }
            ResourceLimitExceeded::Rows { limit } => {
                write!(f, "Too many rows: result truncated to {}", limit)
            }
            ResourceLimitExceeded::DetailEvents { limit } => {
                write!(f, "Too many detail records: stopped after {}", limit)
            }
            ResourceLimitExceeded::FullEvents { limit } => {
                write!(f, "Full records can be requested for at most {} events", limit)
            }
            ResourceLimitExceeded::ExpensiveEvents { limit } => write!(
                f,
                "Spectrum data can be requested for at most {} events",
                limit
            ),
        }
    }
}
