use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a column is used for in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// Filterable by a user selection (the dropdown)
    Category,
    /// Grouping key of the aggregated table
    Group,
    /// Numeric column reduced by the statistic
    Value,
}

/// A semantic role and the column names it is known by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    pub kind: RoleKind,
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Bind every matching column instead of the leftmost one
    #[serde(default)]
    pub all_matches: bool,
    /// When no synonym matches, bind every remaining numeric column
    /// (coordinates excluded)
    #[serde(default)]
    pub numeric_fallback: bool,
}

impl RoleSpec {
    pub fn new(name: &str, kind: RoleKind, synonyms: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            all_matches: false,
            numeric_fallback: false,
        }
    }

    pub fn with_all_matches(mut self) -> Self {
        self.all_matches = true;
        self
    }

    pub fn with_numeric_fallback(mut self) -> Self {
        self.numeric_fallback = true;
        self
    }
}

/// A column picked for a role, by position so duplicate headers stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundColumn {
    pub index: usize,
    pub name: String,
}

/// Role name → concrete column(s), in role declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RoleBinding {
    bindings: Vec<(String, Vec<BoundColumn>)>,
}

impl RoleBinding {
    pub fn columns(&self, role: &str) -> &[BoundColumn] {
        self.bindings
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, cols)| cols.as_slice())
            .unwrap_or(&[])
    }

    /// First bound column name
    pub fn column(&self, role: &str) -> Option<&str> {
        self.columns(role).first().map(|c| c.name.as_str())
    }

    pub fn indices(&self, role: &str) -> Vec<usize> {
        self.columns(role).iter().map(|c| c.index).collect()
    }

    /// Bound column names joined with `+`
    pub fn label(&self, role: &str) -> Option<String> {
        let cols = self.columns(role);
        if cols.is_empty() {
            return None;
        }
        Some(
            cols.iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join("+"),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[BoundColumn])> {
        self.bindings
            .iter()
            .map(|(r, cols)| (r.as_str(), cols.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Exact,
    Substring,
}

/// Unclaimed columns (left to right) matching any synonym in this pass.
/// Exact compares case-insensitively; Substring accepts containment either way.
fn matching_columns(
    columns: &[String],
    synonyms: &[String],
    claimed: &[bool],
    pass: Pass,
) -> Vec<usize> {
    let wanted: Vec<String> = synonyms
        .iter()
        .map(|s| normalize(s))
        .filter(|s| !s.is_empty())
        .collect();
    columns
        .iter()
        .enumerate()
        .filter(|(idx, col)| {
            let col = normalize(col);
            !claimed[*idx]
                && !col.is_empty()
                && wanted.iter().any(|w| match pass {
                    Pass::Exact => *w == col,
                    Pass::Substring => col.contains(w.as_str()) || w.contains(col.as_str()),
                })
        })
        .map(|(idx, _)| idx)
        .collect()
}

/// Latitude/longitude style columns are numeric but never quantities.
fn is_coordinate(name: &str) -> bool {
    let name = normalize(name);
    name == "x"
        || name == "y"
        || ["lat", "lon", "lng", "위도", "경도"]
            .iter()
            .any(|k| name.contains(k))
}

/// Bind every role to a column by header names alone.
///
/// Manual overrides win, then every role gets an exact pass, then the roles
/// still unbound get a substring pass. A column is bound to at most one role
/// and ties go to the leftmost column.
pub fn resolve_roles(
    columns: &[String],
    roles: &[RoleSpec],
    overrides: &[(String, String)],
) -> Result<RoleBinding> {
    resolve_with(columns, roles, overrides, |_| false)
}

/// Like [`resolve_roles`], and roles with `numeric_fallback` that are still
/// unbound take every unclaimed numeric column of the dataset.
pub fn resolve_dataset_roles(
    data: &Dataset,
    roles: &[RoleSpec],
    overrides: &[(String, String)],
) -> Result<RoleBinding> {
    resolve_with(&data.headers, roles, overrides, |idx| data.is_numeric_column(idx))
}

fn resolve_with(
    columns: &[String],
    roles: &[RoleSpec],
    overrides: &[(String, String)],
    is_numeric: impl Fn(usize) -> bool,
) -> Result<RoleBinding> {
    let mut claimed = vec![false; columns.len()];
    let mut resolved: Vec<Vec<usize>> = vec![Vec::new(); roles.len()];

    for (role_name, column) in overrides {
        let role_idx = roles
            .iter()
            .position(|r| &r.name == role_name)
            .ok_or_else(|| {
                DashboardError::invalid_config(format!(
                    "column override for unknown role '{}'",
                    role_name
                ))
            })?;
        let wanted = normalize(column);
        let col_idx = columns
            .iter()
            .position(|c| normalize(c) == wanted)
            .ok_or_else(|| DashboardError::Configuration {
                role: role_name.clone(),
                available: columns.to_vec(),
            })?;
        debug!(role = %role_name, column = %columns[col_idx], "role bound by override");
        // Repeated overrides add columns to multi-column roles, otherwise the last one wins
        if !roles[role_idx].all_matches {
            for previous in resolved[role_idx].drain(..) {
                claimed[previous] = false;
            }
        }
        if !resolved[role_idx].contains(&col_idx) {
            claimed[col_idx] = true;
            resolved[role_idx].push(col_idx);
        }
    }

    for pass in [Pass::Exact, Pass::Substring] {
        for (role_idx, role) in roles.iter().enumerate() {
            if !resolved[role_idx].is_empty() {
                continue;
            }
            let mut found = matching_columns(columns, &role.synonyms, &claimed, pass);
            if !role.all_matches {
                found.truncate(1);
            }
            for col_idx in found {
                debug!(role = %role.name, column = %columns[col_idx], ?pass, "role bound by synonym");
                claimed[col_idx] = true;
                resolved[role_idx].push(col_idx);
            }
        }
    }

    for (role_idx, role) in roles.iter().enumerate() {
        if !resolved[role_idx].is_empty() || !role.numeric_fallback {
            continue;
        }
        let numeric: Vec<usize> = (0..columns.len())
            .filter(|&idx| !claimed[idx] && !is_coordinate(&columns[idx]) && is_numeric(idx))
            .collect();
        for &col_idx in &numeric {
            claimed[col_idx] = true;
        }
        debug!(role = %role.name, columns = numeric.len(), "role bound to numeric columns");
        resolved[role_idx] = numeric;
    }

    let mut bindings = Vec::with_capacity(roles.len());
    for (role, col_indices) in roles.iter().zip(resolved) {
        if col_indices.is_empty() {
            return Err(DashboardError::Configuration {
                role: role.name.clone(),
                available: columns.to_vec(),
            });
        }
        let bound = col_indices
            .into_iter()
            .map(|index| BoundColumn {
                index,
                name: columns[index].clone(),
            })
            .collect();
        bindings.push((role.name.clone(), bound));
    }

    Ok(RoleBinding { bindings })
}
