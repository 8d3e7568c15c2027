//! Sparse cell storage and the canonical cell-map wire form.
//!
//! Only painted cells are stored; an absent entry is WHITE. Painting a cell
//! back to WHITE removes its entry, so memory follows the painted area rather
//! than `width * height`.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::{Color, Position};

/// Toroidal grid of colored cells.
#[derive(Debug, Clone)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: HashMap<Position, Color>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: HashMap::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether `pos` lies in `[0, width) x [0, height)`.
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    /// Stored color at `pos`, WHITE when nothing is stored.
    pub fn color_at(&self, pos: Position) -> Color {
        self.cells.get(&pos).copied().unwrap_or(Color::WHITE)
    }

    /// Sets the color of `pos` and returns the previous color.
    pub fn paint(&mut self, pos: Position, color: Color) -> Color {
        let previous = if color.is_white() {
            self.cells.remove(&pos)
        } else {
            self.cells.insert(pos, color)
        };
        previous.unwrap_or(Color::WHITE)
    }

    /// Number of non-white cells.
    pub fn painted_len(&self) -> usize {
        self.cells.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, Color)> + '_ {
        self.cells.iter().map(|(pos, color)| (*pos, *color))
    }

    /// Ordered snapshot of every painted cell.
    pub fn snapshot(&self) -> CellMap {
        self.iter().collect()
    }

    /// Resets every cell of `color` to WHITE and returns the reverted cells.
    pub fn clear_color(&mut self, color: Color) -> CellMap {
        let mut cleared = CellMap::new();
        self.cells.retain(|pos, stored| {
            if *stored == color {
                cleared.insert(*pos, Color::WHITE);
                false
            } else {
                true
            }
        });
        cleared
    }

    /// Changes dimensions and drops every painted cell.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.cells.clear();
    }
}

/// Ordered `position -> color` map.
///
/// Serialized as a JSON object keyed by `"x,y"`. Tick diffs, tile flips,
/// leave cleanup and chunked initial transfer all go through this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellMap(BTreeMap<Position, Color>);

impl CellMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `color` for `pos`, replacing any earlier entry.
    pub fn insert(&mut self, pos: Position, color: Color) {
        self.0.insert(pos, color);
    }

    pub fn get(&self, pos: Position) -> Option<Color> {
        self.0.get(&pos).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, Color)> + '_ {
        self.0.iter().map(|(pos, color)| (*pos, *color))
    }

    /// Splits into consecutive maps of at most `size` entries each.
    pub fn chunks(&self, size: usize) -> Vec<CellMap> {
        let entries: Vec<(Position, Color)> = self.iter().collect();
        entries
            .chunks(size.max(1))
            .map(|chunk| chunk.iter().copied().collect())
            .collect()
    }
}

impl FromIterator<(Position, Color)> for CellMap {
    fn from_iter<I: IntoIterator<Item = (Position, Color)>>(iter: I) -> Self {
        CellMap(iter.into_iter().collect())
    }
}

impl Extend<(Position, Color)> for CellMap {
    fn extend<I: IntoIterator<Item = (Position, Color)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl Serialize for CellMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (pos, color) in &self.0 {
            map.serialize_entry(&pos.to_string(), color)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CellMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CellMapVisitor;

        impl<'de> Visitor<'de> for CellMapVisitor {
            type Value = CellMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of \"x,y\" keys to hex colors")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<CellMap, A::Error> {
                let mut cells = CellMap::new();
                while let Some((key, color)) = access.next_entry::<String, Color>()? {
                    let pos = key.parse::<Position>().map_err(serde::de::Error::custom)?;
                    cells.insert(pos, color);
                }
                Ok(cells)
            }
        }

        deserializer.deserialize_map(CellMapVisitor)
    }
}
