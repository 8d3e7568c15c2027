use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use uuid::Uuid;

use crate::{Color, Direction, Position, Turn};

/// Unique identifier of a connected participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier of a placed ant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AntId(Uuid);

impl AntId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AntId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated `(trigger color -> turn)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub cell_color: Color,
    pub turn_direction: Turn,
}

impl Rule {
    pub const fn new(cell_color: Color, turn_direction: Turn) -> Self {
        Self { cell_color, turn_direction }
    }
}

/// Rule lists hold a handful of entries, so they live inline.
pub type RuleSet = SmallVec<[Rule; 4]>;

/// An autonomous agent on the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ant {
    pub id: AntId,
    pub position: Position,
    pub direction: Direction,
    /// Owning participant's color.
    pub color: Color,
    pub rules: RuleSet,
}

impl Ant {
    /// Linear scan; trigger colors are unique within one ant.
    pub fn rule_for(&self, color: Color) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.cell_color == color)
    }

    /// Whether the rule list covers both WHITE and the ant's own color.
    pub fn has_mandatory_rules(&self) -> bool {
        self.rule_for(Color::WHITE).is_some() && self.rule_for(self.color).is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub color: Color,
    pub ant_id: Option<AntId>,
}
