//! Error types for fabric operations.
//!
//! Only recoverable conditions live here. Broken topology (an interval
//! joining a joint to itself, a face with a repeated joint, an index past
//! the live count) is a caller bug and panics instead.

use thiserror::Error;

use crate::types::{ERROR_SENTINEL, InstanceIndex};

/// Which fixed-capacity table an operation ran out of room in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Joints,
    Intervals,
    Faces,
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Table::Joints => "joint",
            Table::Intervals => "interval",
            Table::Faces => "face",
        };
        f.write_str(name)
    }
}

/// Main error type for fabric operations.
#[derive(Error, Debug)]
pub enum FabricError {
    /// A table is full. Growth runs into this routinely.
    #[error("{table} table is full (capacity {capacity})")]
    CapacityExceeded { table: Table, capacity: u16 },

    /// Caller-provided backing buffer cannot hold the layout.
    #[error("backing buffer too small: need {needed} bytes, got {provided}")]
    BufferTooSmall { needed: usize, provided: usize },

    /// Instance slot does not exist in this arena.
    #[error("instance {index} out of range (arena holds {count})")]
    InstanceOutOfRange { index: InstanceIndex, count: u16 },

    /// Terrain mask input was rejected before anything was written.
    #[error("terrain mask rejected: {0}")]
    Terrain(String),

    /// A face snapshot could not be re-located after compaction.
    #[error("face with joints {joints:?} no longer exists")]
    FaceNotFound { joints: [u16; 3] },

    /// A gene string held something other than die symbols.
    #[error("gene rejected: {0}")]
    Gene(String),

    /// Physics configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type for fabric operations.
pub type Result<T> = std::result::Result<T, FabricError>;

impl FabricError {
    /// Create a terrain validation error.
    pub fn terrain(msg: impl Into<String>) -> Self {
        Self::Terrain(msg.into())
    }

    /// Create a gene parsing error.
    pub fn gene(msg: impl Into<String>) -> Self {
        Self::Gene(msg.into())
    }

    /// Shorthand for a full table.
    pub fn full(table: Table, capacity: u16) -> Self {
        Self::CapacityExceeded { table, capacity }
    }

    /// True when the error only means "no room left", which growth treats
    /// as a normal stopping point.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

/// Collapses a create result to a raw index, [`ERROR_SENTINEL`] on any
/// failure. For callers that read indices straight off the buffers.
pub fn index_or_sentinel(result: Result<u16>) -> u16 {
    result.unwrap_or(ERROR_SENTINEL)
}
