// Literal parsers for colors and `key=value` arguments

pub mod assignment;
pub mod color;
pub mod lexer;

use crate::palette::Color;

pub use assignment::parse_assignment;
pub use color::parse_color;

/// Parse a color literal, reporting failures as plain text
pub fn parse_color_literal(input: &str) -> Result<Color, String> {
    parse_color(input)
        .map(|(_, color)| color)
        .map_err(|_| format!("invalid color '{}'", input))
}

/// Parse a `key=value` argument, reporting failures as plain text
pub fn parse_assignment_arg(input: &str) -> Result<(String, String), String> {
    parse_assignment(input)
        .map(|(_, pair)| pair)
        .map_err(|_| format!("expected KEY=VALUE, got '{}'", input))
}
