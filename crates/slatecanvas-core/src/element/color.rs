//! RGBA colors in the hex notation used by documents and board files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Spelling of "no fill" in documents and board files.
pub const TRANSPARENT: &str = "transparent";

/// Color string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color {0:?}")]
pub struct ColorParseError(pub String);

/// Serializable color representation (RGBA8), written as a hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Default stroke color for new elements.
    pub const SLATE_ORANGE: Color = Color::rgb(0xff, 0x8a, 0x65);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// `#rrggbb` for opaque colors, `#rrggbbaa` otherwise.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    /// Accepts `#rgb`, `#rrggbb` and `#rrggbbaa` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }

        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map(|v| v * 17).map_err(|_| err());

        match hex.len() {
            3 => Ok(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Format an optional fill, `None` being [`TRANSPARENT`].
pub fn fill_to_string(fill: Option<Color>) -> String {
    fill.map_or_else(|| TRANSPARENT.to_string(), |c| c.to_hex())
}

/// Parse an optional fill. The empty string (proto3 default) also means no fill.
pub fn parse_fill(s: &str) -> Result<Option<Color>, ColorParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(TRANSPARENT) {
        Ok(None)
    } else {
        trimmed.parse().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!("#ff8a65".parse::<Color>().unwrap(), Color::SLATE_ORANGE);
        assert_eq!("#FFF".parse::<Color>().unwrap(), Color::rgb(255, 255, 255));
        assert_eq!("#10b98180".parse::<Color>().unwrap(), Color::new(0x10, 0xb9, 0x81, 0x80));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("red".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
        assert!("".parse::<Color>().is_err());
    }

    #[test]
    fn test_hex_output() {
        assert_eq!(Color::rgb(0x3d, 0x45, 0x54).to_hex(), "#3d4554");
        assert_eq!(Color::new(1, 2, 3, 4).to_hex(), "#01020304");
    }

    #[test]
    fn test_serde_as_hex() {
        let json = serde_json::to_string(&Color::SLATE_ORANGE).unwrap();
        assert_eq!(json, "\"#ff8a65\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::SLATE_ORANGE);
        assert!(serde_json::from_str::<Color>("\"orange\"").is_err());
    }

    #[test]
    fn test_fill_sentinel() {
        assert_eq!(parse_fill("transparent").unwrap(), None);
        assert_eq!(parse_fill("").unwrap(), None);
        assert_eq!(parse_fill("#000000").unwrap(), Some(Color::BLACK));
        assert_eq!(fill_to_string(None), TRANSPARENT);
        assert_eq!(fill_to_string(Some(Color::BLACK)), "#000000");
    }
}
