use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Integer grid coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Cell key form used on the wire: `"x,y"`.
impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid cell key '{0}': expected \"x,y\"")]
pub struct PositionParseError(pub String);

impl FromStr for Position {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PositionParseError(s.to_string());
        let (x, y) = s.split_once(',').ok_or_else(err)?;
        Ok(Position {
            x: x.trim().parse().map_err(|_| err())?,
            y: y.trim().parse().map_err(|_| err())?,
        })
    }
}

/// Facing direction. Cyclic order is UP, RIGHT, DOWN, LEFT.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const CYCLE: [Direction; 4] = [Direction::Up, Direction::Right, Direction::Down, Direction::Left];

    fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }

    /// LEFT is the previous entry in the cycle, RIGHT the next.
    pub fn turn(self, turn: Turn) -> Direction {
        let step = match turn {
            Turn::Left => Self::CYCLE.len() - 1,
            Turn::Right => 1,
        };
        Self::CYCLE[(self.index() + step) % Self::CYCLE.len()]
    }

    /// Unit step in screen coordinates (y grows downwards).
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }
}

/// Turn applied by a rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Turn {
    Left,
    Right,
}

impl FromStr for Turn {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEFT" => Ok(Turn::Left),
            "RIGHT" => Ok(Turn::Right),
            _ => Err(()),
        }
    }
}
