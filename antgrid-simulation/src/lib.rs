//! Multiplayer Langton's-ant engine.
//!
//! Participants join, each places one ant with a rule set, and every tick
//! moves all ants simultaneously over a shared toroidal grid. The engine
//! knows nothing about the network; the transport crate drives it.

mod engine;
mod error;
pub mod movement;
pub mod rules;

pub use engine::{Departure, EngineSettings, GameEngine, TickSummary};
pub use error::{EngineError, ErrorKind, RuleError};
pub use rules::RawRule;
