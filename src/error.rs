//! Error taxonomy for the detection core.
//!
//! Per-region failures (`InsufficientLabels`, `ClassifierFailure`,
//! `RegionOutOfBounds`) degrade a single verdict to `error`. Catalog and
//! configuration failures abort before any pass is admitted.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("insufficient labels: {0}")]
    InsufficientLabels(String),

    #[error("classifier failure: {0}")]
    ClassifierFailure(String),

    #[error("workspace catalog not found: {}", .0.display())]
    CatalogMissing(PathBuf),

    #[error("workspace catalog malformed: {0}")]
    CatalogMalformed(String),

    #[error("invalid thresholds: present={present}, uncertain={uncertain} (present must be >= uncertain)")]
    InvalidThresholds { present: f32, uncertain: f32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("incomplete pass: {0}")]
    IncompletePass(String),

    #[error("region {region} lies outside the {width}x{height} frame")]
    RegionOutOfBounds {
        region: String,
        width: u32,
        height: u32,
    },
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
