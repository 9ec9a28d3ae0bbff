use crate::palette::{Color, HighlightMode};
use crate::resolve::RoleBinding;
use crate::transform::{SortOrder, Statistic};
use serde::Serialize;

// =============================================================================
// Phase 1: Aggregation
// =============================================================================

/// One reduced statistic per distinct group key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    /// Group key, one entry per group column
    pub keys: Vec<String>,
    /// Value of the selected statistic
    pub value: f64,
    /// Number of valid numeric values in the group
    pub count: usize,
    pub min: f64,
    pub max: f64,
}

impl AggregatedRow {
    /// Category label shown on the chart axis
    pub fn label(&self) -> String {
        self.keys.join(" / ")
    }
}

/// Aggregated rows sorted by `value` in `order`, ties broken by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedTable {
    pub group_columns: Vec<String>,
    pub value_label: String,
    pub statistic: Statistic,
    pub order: SortOrder,
    pub rows: Vec<AggregatedRow>,
}

impl AggregatedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.value).collect()
    }

    /// Name of the statistic column in exports, e.g. `mean_price`
    pub fn statistic_column(&self) -> String {
        format!("{}_{}", self.statistic, self.value_label)
    }
}

/// The rows at the max and min ends of a sorted table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extremes {
    pub max: AggregatedRow,
    pub min: AggregatedRow,
}

impl Extremes {
    /// Taken positionally, so they agree with the highlighted entries.
    pub fn from_table(table: &AggregatedTable) -> Option<Self> {
        let first = table.rows.first()?;
        let last = table.rows.last()?;
        let (max, min) = match table.order {
            SortOrder::Descending => (first, last),
            SortOrder::Ascending => (last, first),
        };
        Some(Self {
            max: max.clone(),
            min: min.clone(),
        })
    }
}

// =============================================================================
// Phase 2: Presentation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
}

impl std::str::FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            other => Err(format!("unknown chart kind '{}' (expected bar or line)", other)),
        }
    }
}

/// Everything a page shows for one selection: the table, one color per
/// row, the extremes and the labels for the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub chart: ChartKind,
    pub highlight: HighlightMode,
    pub binding: RoleBinding,
    pub selection: Vec<(String, String)>,
    pub table: AggregatedTable,
    pub colors: Vec<Color>,
    pub extremes: Extremes,
    /// Rows excluded because their value was not a number
    pub dropped_rows: usize,
    /// Groups before top-N truncation
    pub total_groups: usize,
}
