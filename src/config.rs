//! Dashboard configuration
//!
//! A page is described by its roles (with their synonym tables), the
//! statistic, the sort order and the colors. Configurations come from a JSON
//! file or from one of the built-in presets (prices, subway, population,
//! mbti).

use crate::csv_reader::TextEncoding;
use crate::error::{DashboardError, Result};
use crate::ir::ChartKind;
use crate::palette::{Color, GradientPalette, HighlightMode};
use crate::resolve::{RoleKind, RoleSpec};
use crate::transform::{SortOrder, Statistic};
use crate::RenderOptions;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const PRESET_NAMES: &[&str] = &["prices", "subway", "population", "mbti"];

const MBTI_TYPES: &[&str] = &[
    "INTJ", "INTP", "ENTJ", "ENTP", "INFJ", "INFP", "ENFJ", "ENFP", "ISTJ", "ISFJ", "ESTJ", "ESFJ",
    "ISTP", "ISFP", "ESTP", "ESFP",
];

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Title template, see `preprocessor::expand_variables`
    #[serde(default)]
    pub title: Option<String>,
    pub roles: Vec<RoleSpec>,
    /// Chart the value columns themselves, grouped under this key name
    #[serde(default)]
    pub melt: Option<String>,
    #[serde(default)]
    pub statistic: Statistic,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub highlight: HighlightMode,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub palette: GradientPalette,
    #[serde(default)]
    pub chart: ChartKind,
    #[serde(default = "TextEncoding::default_chain")]
    pub encodings: Vec<TextEncoding>,
    #[serde(default)]
    pub render: RenderOptions,
}

impl DashboardConfig {
    pub fn new(roles: Vec<RoleSpec>) -> Self {
        Self {
            title: None,
            roles,
            melt: None,
            statistic: Statistic::default(),
            order: SortOrder::default(),
            highlight: HighlightMode::default(),
            top_n: None,
            palette: GradientPalette::default(),
            chart: ChartKind::default(),
            encodings: TextEncoding::default_chain(),
            render: RenderOptions::default(),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| DashboardError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Built-in page configurations
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "prices" => Some(prices_preset()),
            "subway" => Some(subway_preset()),
            "population" => Some(population_preset()),
            "mbti" => Some(mbti_preset()),
            _ => None,
        }
    }

    pub fn roles_of(&self, kind: RoleKind) -> impl Iterator<Item = &RoleSpec> {
        self.roles.iter().filter(move |r| r.kind == kind)
    }

    pub fn role(&self, name: &str) -> Option<&RoleSpec> {
        self.roles.iter().find(|r| r.name == name)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for role in &self.roles {
            if role.name.trim().is_empty() {
                return Err(DashboardError::invalid_config("role names must not be empty"));
            }
            if !seen.insert(role.name.as_str()) {
                return Err(DashboardError::invalid_config(format!(
                    "role '{}' is declared twice",
                    role.name
                )));
            }
        }
        let has_value = self.roles_of(RoleKind::Value).next().is_some();
        if self.melt.is_some() {
            if self.roles_of(RoleKind::Group).next().is_some() {
                return Err(DashboardError::invalid_config(
                    "melt takes its groups from the value columns; remove the group roles",
                ));
            }
            if !has_value {
                return Err(DashboardError::invalid_config("melt needs a value role"));
            }
        } else if self.roles_of(RoleKind::Group).next().is_none() {
            return Err(DashboardError::invalid_config("at least one group role is required"));
        }
        if self.statistic != Statistic::Count && !has_value {
            return Err(DashboardError::invalid_config(format!(
                "statistic '{}' needs a value role",
                self.statistic
            )));
        }
        if self.top_n == Some(0) {
            return Err(DashboardError::invalid_config("top_n must be at least 1"));
        }
        if self.encodings.is_empty() {
            return Err(DashboardError::invalid_config("at least one encoding is required"));
        }
        Ok(())
    }
}

fn prices_preset() -> DashboardConfig {
    let mut config = DashboardConfig::new(vec![
        RoleSpec::new(
            "product",
            RoleKind::Category,
            &["product", "상품", "item", "name", "품목"],
        ),
        RoleSpec::new(
            "region",
            RoleKind::Group,
            &["dong", "region", "area", "neighborhood", "district", "지역", "구", "동"],
        ),
        RoleSpec::new("price", RoleKind::Value, &["price", "가격", "amount", "cost"]),
    ]);
    config.title = Some("$product: $statistic $price by $region".to_string());
    config.statistic = Statistic::Mean;
    config.order = SortOrder::Ascending;
    config.highlight = HighlightMode::HighlightBoth;
    config.palette = GradientPalette {
        max: Color::new(255, 0, 0),
        min: Color::new(0, 128, 0),
        base: Color::new(128, 128, 128),
        fade: Color::new(211, 211, 211),
    };
    config
}

fn subway_preset() -> DashboardConfig {
    let mut config = DashboardConfig::new(vec![
        RoleSpec::new("date", RoleKind::Category, &["사용일자", "date"]),
        RoleSpec::new("line", RoleKind::Category, &["노선명", "line"]),
        RoleSpec::new("station", RoleKind::Group, &["역명", "station"]),
        RoleSpec::new("boarding", RoleKind::Value, &["승차총승객수", "boarding"]),
        RoleSpec::new("alighting", RoleKind::Value, &["하차총승객수", "alighting"]),
    ]);
    config.title = Some("$date / $line: top $top_n stations by riders".to_string());
    config.statistic = Statistic::Sum;
    config.order = SortOrder::Descending;
    config.highlight = HighlightMode::HighlightMax;
    config.top_n = Some(10);
    // rgba(0,0,255,0.83) fading to rgba(0,0,255,0.27) over white
    config.palette = GradientPalette {
        max: Color::new(255, 0, 0),
        min: Color::new(0, 128, 0),
        base: Color::new(43, 43, 255),
        fade: Color::new(186, 186, 255),
    };
    config
}

fn population_preset() -> DashboardConfig {
    let mut config = DashboardConfig::new(vec![
        RoleSpec::new(
            "region",
            RoleKind::Group,
            &["행정동명", "행정동", "법정동", "지역", "region", "district", "name", "country"],
        ),
        RoleSpec::new(
            "population",
            RoleKind::Value,
            &["총인구", "total", "population", "pop"],
        )
        .with_numeric_fallback(),
    ]);
    config.title = Some("Top $top_n $region by $population".to_string());
    config.statistic = Statistic::Sum;
    config.order = SortOrder::Descending;
    config.highlight = HighlightMode::HighlightMax;
    config.top_n = Some(15);
    config
}

fn mbti_preset() -> DashboardConfig {
    let mut config = DashboardConfig::new(vec![
        RoleSpec::new("country", RoleKind::Category, &["country", "nation", "국가"]),
        RoleSpec::new("types", RoleKind::Value, MBTI_TYPES).with_all_matches(),
    ]);
    config.melt = Some("type".to_string());
    config.title = Some("$country: MBTI types".to_string());
    config.statistic = Statistic::Mean;
    config.order = SortOrder::Descending;
    config.highlight = HighlightMode::HighlightMax;
    config
}
