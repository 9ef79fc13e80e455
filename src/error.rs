// Error Module - Typed errors for the structure and animation core
use thiserror::Error;

/// Errors raised by the structure model and the animations drawing onto it.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("vertex index {index} out of range (structure has {count} vertices)")]
    InvalidVertex { index: usize, count: usize },

    #[error("edge index {index} out of range (structure has {count} edges)")]
    InvalidEdge { index: usize, count: usize },

    #[error("LED index {index} out of range (edge {edge} has {count} LEDs)")]
    InvalidLed { edge: usize, index: usize, count: usize },

    #[error("structure has not been finalized")]
    NotFinalized,

    #[error("structure is finalized, topology can no longer change")]
    AlreadyFinalized,

    #[error("rotation axis has zero length")]
    DegenerateAxis,

    #[error("unknown animation: {0}")]
    UnknownAnimation(String),

    #[error("color palette is empty")]
    EmptyPalette,
}

pub type Result<T> = std::result::Result<T, EngineError>;
