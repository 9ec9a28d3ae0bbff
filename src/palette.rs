//! Gradient colorizer
//!
//! Ranked charts paint the extremal bar(s) with reserved highlight colors and
//! shade every other bar along a two-stop RGB ramp, so color intensity
//! follows rank.

use crate::transform::SortOrder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear interpolation in RGB space; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let channel = |a: u8, b: u8| -> u8 {
            let v = a as f64 + (b as f64 - a as f64) * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Color {
            r: channel(self.r, other.r),
            g: channel(self.g, other.g),
            b: channel(self.b, other.b),
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::parse_color_literal(s)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Which end(s) of the ranking get a reserved color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightMode {
    #[default]
    HighlightMax,
    HighlightMin,
    HighlightBoth,
}

impl FromStr for HighlightMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" | "highlight_max" => Ok(HighlightMode::HighlightMax),
            "min" | "highlight_min" => Ok(HighlightMode::HighlightMin),
            "both" | "highlight_both" => Ok(HighlightMode::HighlightBoth),
            other => Err(format!("unknown highlight mode '{}' (expected max, min or both)", other)),
        }
    }
}

/// Reserved and gradient colors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientPalette {
    pub max: Color,
    pub min: Color,
    /// Gradient start, used by the entry closest to the highlighted end
    pub base: Color,
    /// Gradient end
    pub fade: Color,
}

impl Default for GradientPalette {
    fn default() -> Self {
        Self {
            max: Color::new(255, 0, 0),
            min: Color::new(0, 128, 0),
            base: Color::new(0, 0, 255),
            fade: Color::new(211, 211, 211),
        }
    }
}

impl GradientPalette {
    pub fn interpolate(&self, t: f64) -> Color {
        self.base.lerp(self.fade, t)
    }
}

/// Assign one color per value of an already sorted sequence.
///
/// The max end sits at index 0 for descending order and at the last index
/// for ascending order. Non-highlighted entries get `interpolate(i / m)` where
/// `i` counts them in table order and `m` is how many there are.
pub fn colorize(
    values: &[f64],
    order: SortOrder,
    mode: HighlightMode,
    palette: &GradientPalette,
) -> Vec<Color> {
    let n = values.len();
    match n {
        0 => return Vec::new(),
        1 => {
            let single = match mode {
                HighlightMode::HighlightMin => palette.min,
                HighlightMode::HighlightMax | HighlightMode::HighlightBoth => palette.max,
            };
            return vec![single];
        }
        _ => {}
    }

    let max_idx = match order {
        SortOrder::Descending => 0,
        SortOrder::Ascending => n - 1,
    };
    let min_idx = n - 1 - max_idx;

    let (max_slot, min_slot) = match mode {
        HighlightMode::HighlightMax => (Some(max_idx), None),
        HighlightMode::HighlightMin => (None, Some(min_idx)),
        HighlightMode::HighlightBoth => (Some(max_idx), Some(min_idx)),
    };
    let highlighted = max_slot.iter().count() + min_slot.iter().count();
    let m = n - highlighted;

    let mut colors = Vec::with_capacity(n);
    let mut i = 0usize;
    for pos in 0..n {
        if Some(pos) == max_slot {
            colors.push(palette.max);
        } else if Some(pos) == min_slot {
            colors.push(palette.min);
        } else {
            colors.push(palette.interpolate(i as f64 / m as f64));
            i += 1;
        }
    }
    colors
}
