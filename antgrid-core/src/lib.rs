//! Data model shared by the antgrid engine and its synchronization layer.

mod color;
mod entity;
mod geometry;
mod grid;

pub use color::{Color, ColorParseError};
pub use entity::{Ant, AntId, Participant, ParticipantId, Rule, RuleSet};
pub use geometry::{Direction, Position, PositionParseError, Turn};
pub use grid::{CellMap, Grid};
