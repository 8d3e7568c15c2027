//! 24-bit RGB colors in their canonical `#RRGGBB` form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a string is not a `#RRGGBB` hex color.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid cell color: cellColor must be a valid hex color, got '{0}'")]
pub struct ColorParseError(pub String);

/// An opaque 24-bit RGB color.
///
/// Colors compare by value, so `#ff00aa` and `#FF00AA` are the same color.
/// [`Color::WHITE`] is reserved for blank, unowned cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color(u32);

impl Color {
    /// Blank cell color. Never assigned to a participant.
    pub const WHITE: Color = Color(0xFF_FF_FF);

    /// Largest encodable RGB value.
    pub const MAX_RGB: u32 = 0xFF_FF_FF;

    /// Builds a color from a packed `0xRRGGBB` value, or `None` if it has bits
    /// above the low 24.
    pub const fn from_rgb(rgb: u32) -> Option<Self> {
        if rgb > Self::MAX_RGB {
            None
        } else {
            Some(Color(rgb))
        }
    }

    /// Packed `0xRRGGBB` value.
    pub const fn rgb(self) -> u32 {
        self.0
    }

    pub fn is_white(self) -> bool {
        self == Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.0)
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('#')
            .filter(|d| d.len() == 6 && d.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| ColorParseError(s.to_string()))?;

        u32::from_str_radix(digits, 16)
            .map(Color)
            .map_err(|_| ColorParseError(s.to_string()))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
