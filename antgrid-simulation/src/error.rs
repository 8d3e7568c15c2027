use antgrid_core::{Color, ColorParseError};
use thiserror::Error;

/// Why a rule set was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("Rules cannot be empty")]
    Empty,

    #[error("Invalid rule format: cellColor and turnDirection are required")]
    MissingField,

    #[error("Invalid turn direction: turnDirection must be LEFT or RIGHT")]
    InvalidTurn,

    #[error(transparent)]
    InvalidColor(#[from] ColorParseError),

    #[error("Rules cannot have the same cell color ({0})")]
    DuplicateColor(Color),
}

/// Error taxonomy reported to clients. Every kind is recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: rules, colors, positions, dimensions.
    Validation,
    /// Operation not allowed in the current state.
    State,
    /// Participant limit reached.
    Capacity,
}

/// Errors returned by [`crate::GameEngine`] operations. A failed operation
/// leaves engine state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Maximum number of participants reached")]
    CapacityReached,

    #[error("Participant not found")]
    ParticipantNotFound,

    #[error("Participant already has an ant")]
    AlreadyHasAnt,

    #[error("Participant has no ant")]
    NoAnt,

    #[error("An ant already exists at this position")]
    PositionOccupied,

    #[error("Position out of bounds")]
    OutOfBounds,

    #[error("Tile is colored by another participant")]
    NotOwner,

    #[error("Game configuration can only change before any ant is placed")]
    GameStarted,

    #[error("Grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("Tick interval must be positive")]
    InvalidTickInterval,

    #[error(transparent)]
    InvalidRule(#[from] RuleError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::CapacityReached => ErrorKind::Capacity,
            EngineError::OutOfBounds
            | EngineError::InvalidDimensions { .. }
            | EngineError::InvalidTickInterval
            | EngineError::InvalidRule(_) => ErrorKind::Validation,
            EngineError::ParticipantNotFound
            | EngineError::AlreadyHasAnt
            | EngineError::NoAnt
            | EngineError::PositionOccupied
            | EngineError::NotOwner
            | EngineError::GameStarted => ErrorKind::State,
        }
    }
}
