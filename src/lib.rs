// Library exports for rankchart

pub mod cache;
pub mod coerce;
pub mod config;
pub mod csv_reader;
pub mod data;
pub mod error;
pub mod export;
pub mod graph;
pub mod palette;
pub mod parser;
pub mod preprocessor;
pub mod runtime;
pub mod spreadsheet;

// Pipeline stages
pub mod ir;
pub mod resolve;
pub mod transform;

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

impl OutputFormat {
    /// Pick the format from a file extension, if it names one
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(OutputFormat::Png),
            "svg" => Some(OutputFormat::Svg),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(OutputFormat::from_path(Path::new("out/chart.SVG")), Some(OutputFormat::Svg));
        assert_eq!(OutputFormat::from_path(Path::new("chart.png")), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::from_path(Path::new("chart.pdf")), None);
        assert_eq!(OutputFormat::from_path(Path::new("chart")), None);
    }
}
