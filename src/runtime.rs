// Page runtime: one full pipeline run per control change

use crate::cache::DatasetCache;
use crate::config::DashboardConfig;
use crate::data::Dataset;
use crate::error::{DashboardError, Result, Severity};
use crate::ir::{DashboardView, Extremes};
use crate::palette;
use crate::preprocessor::expand_variables;
use crate::resolve::{resolve_dataset_roles, RoleBinding, RoleKind};
use crate::transform::{aggregate, AggregateRequest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_TITLE: &str = "$statistic of $value by $group";

/// The user's controls for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    /// `role=value` choices for category roles
    pub selection: Vec<(String, String)>,
    /// `role=column` manual bindings
    pub overrides: Vec<(String, String)>,
}

/// Run load-independent steps of the pipeline on an already loaded dataset.
pub fn build_view(
    config: &DashboardConfig,
    data: &Dataset,
    request: &PageRequest,
) -> Result<DashboardView> {
    // 1. Resolve roles
    let binding = resolve_dataset_roles(data, &config.roles, &request.overrides)?;

    // 2. Translate the selection into column filters
    let mut filters = Vec::with_capacity(request.selection.len());
    for (role_name, value) in &request.selection {
        let column = category_column(config, &binding, role_name)?;
        filters.push((column, value.clone()));
    }

    let columns_of = |kind: RoleKind| -> Vec<usize> {
        config
            .roles_of(kind)
            .flat_map(|r| binding.indices(&r.name))
            .collect()
    };

    // 3. Aggregate
    let aggregation = aggregate(
        data,
        &AggregateRequest {
            filters,
            group_columns: columns_of(RoleKind::Group),
            value_columns: columns_of(RoleKind::Value),
            melt: config.melt.clone(),
            statistic: config.statistic,
            order: config.order,
            top_n: config.top_n,
        },
    )?;
    let table = aggregation.table;

    // 4. Colorize
    let colors = palette::colorize(&table.values(), table.order, config.highlight, &config.palette);
    let extremes = Extremes::from_table(&table).ok_or_else(|| DashboardError::EmptySelection {
        selection: describe_selection(&request.selection),
    })?;

    // 5. Labels
    let group_label = table.group_columns.join(" / ");
    let variables = title_variables(config, &binding, request, &group_label, &table.value_label);
    let template = config.title.as_deref().unwrap_or(DEFAULT_TITLE);
    let title = expand_variables(template, &variables)?;

    info!(
        groups = table.len(),
        total_groups = aggregation.total_groups,
        dropped = aggregation.dropped,
        "built dashboard view"
    );

    Ok(DashboardView {
        title,
        x_label: group_label,
        y_label: format!("{} {}", table.statistic, table.value_label),
        chart: config.chart,
        highlight: config.highlight,
        binding,
        selection: request.selection.clone(),
        colors,
        extremes,
        dropped_rows: aggregation.dropped,
        total_groups: aggregation.total_groups,
        table,
    })
}

/// Sorted distinct values of a category role's column (dropdown options).
pub fn category_options(
    config: &DashboardConfig,
    data: &Dataset,
    overrides: &[(String, String)],
    role_name: &str,
) -> Result<Vec<String>> {
    let binding = resolve_dataset_roles(data, &config.roles, overrides)?;
    let column = category_column(config, &binding, role_name)?;
    Ok(data.distinct_values(column))
}

/// Position of the column bound to a category role
fn category_column(
    config: &DashboardConfig,
    binding: &RoleBinding,
    role_name: &str,
) -> Result<usize> {
    let role = config
        .role(role_name)
        .ok_or_else(|| DashboardError::invalid_config(format!("unknown role '{}'", role_name)))?;
    if role.kind != RoleKind::Category {
        return Err(DashboardError::invalid_config(format!(
            "role '{}' is not a category role",
            role_name
        )));
    }
    binding
        .columns(role_name)
        .first()
        .map(|c| c.index)
        .ok_or_else(|| DashboardError::invalid_config(format!("role '{}' is not bound", role_name)))
}

fn title_variables(
    config: &DashboardConfig,
    binding: &RoleBinding,
    request: &PageRequest,
    group_label: &str,
    value_label: &str,
) -> HashMap<String, String> {
    let mut vars: HashMap<String, String> = binding
        .iter()
        .filter_map(|(role, _)| Some((role.to_string(), binding.label(role)?)))
        .collect();
    for (role, value) in &request.selection {
        vars.insert(role.clone(), value.clone());
    }
    vars.insert("statistic".to_string(), config.statistic.to_string());
    vars.insert("group".to_string(), group_label.to_string());
    vars.insert("value".to_string(), value_label.to_string());
    vars.insert(
        "top_n".to_string(),
        config
            .top_n
            .map(|n| n.to_string())
            .unwrap_or_else(|| "all".to_string()),
    );
    vars
}

fn describe_selection(selection: &[(String, String)]) -> String {
    if selection.is_empty() {
        return "(all rows)".to_string();
    }
    selection
        .iter()
        .map(|(role, value)| format!("{}={}", role, value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A configured page bound to one input file.
pub struct Session {
    config: DashboardConfig,
    source: PathBuf,
    cache: DatasetCache,
}

impl Session {
    pub fn new(config: DashboardConfig, source: impl Into<PathBuf>) -> Self {
        Self {
            config,
            source: source.into(),
            cache: DatasetCache::new(),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    pub fn dataset(&mut self) -> Result<Arc<Dataset>> {
        self.cache.load_path(&self.source, &self.config.encodings)
    }

    pub fn render(&mut self, request: &PageRequest) -> Result<DashboardView> {
        let data = self.dataset()?;
        build_view(&self.config, &data, request)
    }

    pub fn options(&mut self, role: &str, overrides: &[(String, String)]) -> Result<Vec<String>> {
        let data = self.dataset()?;
        category_options(&self.config, &data, overrides, role)
    }
}

/// What the page shows after one run.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Rendered(Box<DashboardView>),
    /// Nothing to chart for this selection; the page stays usable
    Warning(String),
    /// Input or configuration has to be fixed first
    Blocked(String),
}

/// Page boundary: every pipeline error becomes a message instead of a crash.
pub fn run_page(session: &mut Session, request: &PageRequest) -> PageOutcome {
    match session.render(request) {
        Ok(view) => PageOutcome::Rendered(Box::new(view)),
        Err(err) => outcome_for_error(&err),
    }
}

pub fn outcome_for_error(err: &DashboardError) -> PageOutcome {
    match err.severity() {
        Severity::Warning => {
            warn!(error = %err, "selection produced no data");
            PageOutcome::Warning(err.user_message())
        }
        Severity::Blocking => {
            warn!(error = %err, "page blocked");
            PageOutcome::Blocked(err.user_message())
        }
    }
}
