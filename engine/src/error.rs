//! Error types for the acoustics engine
//!
//! Only construction and configuration can fail. The per-tick path never
//! returns errors; it degrades to audibly safe defaults instead.

use glam::IVec3;
use std::path::PathBuf;

/// Top-level error returned by engine construction
#[derive(Debug, thiserror::Error)]
pub enum AcousticsError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while loading or validating an [`crate::config::AcousticsConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f32,
    },

    #[error("Distance bands must satisfy 0 < near < mid < far (got {near}, {mid}, {far})")]
    UnorderedBands { near: f32, mid: f32, far: f32 },
}

/// Failure of the external block-lookup capability
///
/// Never surfaced to callers: the raycast treats a failed lookup as an
/// unknown solid block.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldAccessError {
    #[error("Block {0} is not loaded")]
    Unloaded(IVec3),

    #[error("Block {pos} lookup failed: {reason}")]
    Lookup { pos: IVec3, reason: String },
}
