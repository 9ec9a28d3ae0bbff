use crate::coerce::{self, Coerced};
use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use crate::ir::{AggregatedRow, AggregatedTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Reduction applied to the values of each group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    #[default]
    Mean,
    Median,
    Min,
    Max,
    Sum,
    Count,
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Sum => "sum",
            Statistic::Count => "count",
        };
        f.write_str(name)
    }
}

impl FromStr for Statistic {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" | "avg" | "average" => Ok(Statistic::Mean),
            "median" => Ok(Statistic::Median),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "sum" | "total" => Ok(Statistic::Sum),
            "count" => Ok(Statistic::Count),
            other => Err(format!("unknown statistic '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Descending,
    Ascending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" => Ok(SortOrder::Descending),
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            other => Err(format!("unknown sort order '{}' (expected asc or desc)", other)),
        }
    }
}

/// Column-level description of one aggregation, by column position.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRequest {
    /// `(column, value)` equality filters applied before grouping
    pub filters: Vec<(usize, String)>,
    pub group_columns: Vec<usize>,
    /// Summed per row; empty only for `count`
    pub value_columns: Vec<usize>,
    /// Wide table: every value column becomes a group keyed by its header,
    /// under a key column of this name. `group_columns` must be empty.
    pub melt: Option<String>,
    pub statistic: Statistic,
    pub order: SortOrder,
    pub top_n: Option<usize>,
}

/// Aggregated table plus bookkeeping about the rows that went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub table: AggregatedTable,
    /// Filtered values that were not a number (rows, or cells when melting)
    pub dropped: usize,
    /// Groups before top-N truncation
    pub total_groups: usize,
}

/// Main entry point: filter, coerce, group, reduce and sort.
pub fn aggregate(data: &Dataset, request: &AggregateRequest) -> Result<Aggregation> {
    match &request.melt {
        Some(_) => {
            if !request.group_columns.is_empty() {
                return Err(DashboardError::invalid_config(
                    "a melted table takes its groups from the value columns",
                ));
            }
            if request.value_columns.is_empty() {
                return Err(DashboardError::invalid_config("melting needs value columns"));
            }
        }
        None => {
            if request.group_columns.is_empty() {
                return Err(DashboardError::invalid_config("at least one group column is required"));
            }
            if request.value_columns.is_empty() && request.statistic != Statistic::Count {
                return Err(DashboardError::invalid_config(format!(
                    "statistic '{}' needs a value column",
                    request.statistic
                )));
            }
        }
    }

    // 1. Column Indices
    let columns = request
        .filters
        .iter()
        .map(|(idx, _)| idx)
        .chain(&request.group_columns)
        .chain(&request.value_columns);
    for &idx in columns {
        check_col_index(&data.headers, idx)?;
    }
    let value_names: Vec<&str> = request
        .value_columns
        .iter()
        .map(|&idx| data.headers[idx].as_str())
        .collect();

    // 2. Filter
    let selected: Vec<&Vec<String>> = data
        .rows
        .iter()
        .filter(|row| request.filters.iter().all(|(idx, val)| row[*idx] == *val))
        .collect();
    debug!(rows = data.len(), selected = selected.len(), "applied selection");

    // 3. Coerce and 4. Group
    let mut groups: BTreeMap<Vec<String>, Vec<f64>> = BTreeMap::new();
    let dropped = match &request.melt {
        Some(_) => melt_groups(&selected, &request.value_columns, &value_names, &mut groups),
        None => {
            let coerced = if request.value_columns.is_empty() {
                Coerced {
                    values: vec![Some(1.0); selected.len()],
                    dropped: 0,
                }
            } else {
                let columns: Vec<Vec<&str>> = request
                    .value_columns
                    .iter()
                    .map(|&idx| selected.iter().map(|row| row[idx].as_str()).collect())
                    .collect();
                coerce::coerce_row_sums(&columns)
            };
            for (row, value) in selected.iter().zip(&coerced.values) {
                if let Some(v) = value {
                    let key: Vec<String> =
                        request.group_columns.iter().map(|&idx| row[idx].clone()).collect();
                    groups.entry(key).or_default().push(*v);
                }
            }
            coerced.dropped
        }
    };
    if dropped > 0 {
        warn!(
            dropped,
            columns = ?value_names,
            "excluded values that are not a number"
        );
    }

    if groups.is_empty() {
        return Err(DashboardError::EmptySelection {
            selection: describe_filters(&data.headers, &request.filters),
        });
    }

    // 5. Reduce
    let mut rows: Vec<AggregatedRow> = groups
        .into_iter()
        .map(|(keys, values)| reduce_group(keys, values, request.statistic))
        .collect();

    // 6. Sort
    sort_rows(&mut rows, request.order);
    let total_groups = rows.len();
    if let Some(n) = request.top_n {
        rows.truncate(n);
    }

    let (group_columns, value_label) = match &request.melt {
        Some(key_column) => (vec![key_column.clone()], "value".to_string()),
        None => {
            let group_columns = request
                .group_columns
                .iter()
                .map(|&idx| data.headers[idx].clone())
                .collect();
            let value_label = if value_names.is_empty() {
                "rows".to_string()
            } else {
                value_names.join("+")
            };
            (group_columns, value_label)
        }
    };

    Ok(Aggregation {
        table: AggregatedTable {
            group_columns,
            value_label,
            statistic: request.statistic,
            order: request.order,
            rows,
        },
        dropped,
        total_groups,
    })
}

/// One group per value column, keyed by its header; returns dropped cells.
fn melt_groups(
    selected: &[&Vec<String>],
    value_columns: &[usize],
    value_names: &[&str],
    groups: &mut BTreeMap<Vec<String>, Vec<f64>>,
) -> usize {
    let mut dropped = 0;
    for (&idx, &name) in value_columns.iter().zip(value_names) {
        let coerced = coerce::coerce_numeric(selected.iter().map(|row| row[idx].as_str()));
        dropped += coerced.dropped;
        let values: Vec<f64> = coerced.valid().collect();
        if !values.is_empty() {
            groups.entry(vec![name.to_string()]).or_default().extend(values);
        }
    }
    dropped
}

fn check_col_index(headers: &[String], idx: usize) -> Result<()> {
    if idx < headers.len() {
        Ok(())
    } else {
        Err(DashboardError::invalid_config(format!(
            "column {} is out of range ({} columns)",
            idx,
            headers.len()
        )))
    }
}

fn describe_filters(headers: &[String], filters: &[(usize, String)]) -> String {
    if filters.is_empty() {
        return "(all rows)".to_string();
    }
    filters
        .iter()
        .map(|(idx, val)| format!("{}={}", headers[*idx], val))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sort by value in `order`; equal values fall back to the key, ascending.
pub fn sort_rows(rows: &mut [AggregatedRow], order: SortOrder) {
    rows.sort_by(|a, b| {
        let by_value = match order {
            SortOrder::Descending => b.value.total_cmp(&a.value),
            SortOrder::Ascending => a.value.total_cmp(&b.value),
        };
        by_value.then_with(|| a.keys.cmp(&b.keys))
    });
}

fn reduce_group(keys: Vec<String>, mut values: Vec<f64>, statistic: Statistic) -> AggregatedRow {
    values.sort_by(|a, b| a.total_cmp(b));
    let count = values.len();
    let min = values[0];
    let max = values[count - 1];
    let sum: f64 = values.iter().sum();

    let value = match statistic {
        Statistic::Mean => sum / count as f64,
        Statistic::Median => percentile(&values, 0.5),
        Statistic::Min => min,
        Statistic::Max => max,
        Statistic::Sum => sum,
        Statistic::Count => count as f64,
    };

    AggregatedRow {
        keys,
        value,
        count,
        min,
        max,
    }
}

fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted_data[0];
    }

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_data(rows: &[(&str, &str)]) -> Dataset {
        Dataset::new(
            vec!["k".to_string(), "v".to_string()],
            rows.iter()
                .map(|(k, v)| vec![k.to_string(), v.to_string()])
                .collect(),
        )
        .unwrap()
    }

    fn request(statistic: Statistic, order: SortOrder) -> AggregateRequest {
        AggregateRequest {
            filters: vec![],
            group_columns: vec![0],
            value_columns: vec![1],
            melt: None,
            statistic,
            order,
            top_n: None,
        }
    }

    fn pairs(table: &AggregatedTable) -> Vec<(String, f64)> {
        table.rows.iter().map(|r| (r.label(), r.value)).collect()
    }

    #[test]
    fn test_mean_descending() {
        let data = make_data(&[("A", "10"), ("A", "20"), ("B", "5")]);
        let agg = aggregate(&data, &request(Statistic::Mean, SortOrder::Descending)).unwrap();
        assert_eq!(
            pairs(&agg.table),
            vec![("A".to_string(), 15.0), ("B".to_string(), 5.0)]
        );
        assert_eq!(agg.table.rows[0].count, 2);
        assert_eq!((agg.table.rows[0].min, agg.table.rows[0].max), (10.0, 20.0));
        assert_eq!(agg.dropped, 0);
    }

    #[test]
    fn test_ties_broken_by_key_in_both_orders() {
        let data = make_data(&[("C", "5"), ("A", "5"), ("B", "9"), ("D", "1")]);
        let desc = aggregate(&data, &request(Statistic::Sum, SortOrder::Descending)).unwrap();
        let labels: Vec<String> = desc.table.rows.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["B", "A", "C", "D"]);

        let asc = aggregate(&data, &request(Statistic::Sum, SortOrder::Ascending)).unwrap();
        let labels: Vec<String> = asc.table.rows.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["D", "A", "C", "B"]);
    }

    #[test]
    fn test_each_statistic() {
        let data = make_data(&[("A", "1"), ("A", "2"), ("A", "3"), ("A", "10")]);
        let value = |s| aggregate(&data, &request(s, SortOrder::Descending)).unwrap().table.rows[0].value;
        assert_eq!(value(Statistic::Mean), 4.0);
        assert_eq!(value(Statistic::Median), 2.5);
        assert_eq!(value(Statistic::Min), 1.0);
        assert_eq!(value(Statistic::Max), 10.0);
        assert_eq!(value(Statistic::Sum), 16.0);
        assert_eq!(value(Statistic::Count), 4.0);
    }

    #[test]
    fn test_group_without_valid_values_is_dropped() {
        let data = make_data(&[("A", "1,200"), ("B", "N/A"), ("B", ""), ("C", "3")]);
        let agg = aggregate(&data, &request(Statistic::Mean, SortOrder::Descending)).unwrap();
        assert_eq!(
            pairs(&agg.table),
            vec![("A".to_string(), 1200.0), ("C".to_string(), 3.0)]
        );
        assert_eq!(agg.dropped, 2);
    }

    #[test]
    fn test_filter_and_multi_key() {
        let data = Dataset::new(
            vec!["date".into(), "line".into(), "station".into(), "on".into(), "off".into()],
            vec![
                vec!["d1".into(), "L2".into(), "Gangnam".into(), "100".into(), "50".into()],
                vec!["d1".into(), "L2".into(), "Jamsil".into(), "80".into(), "90".into()],
                vec!["d1".into(), "L1".into(), "Seoul".into(), "500".into(), "500".into()],
                vec!["d2".into(), "L2".into(), "Gangnam".into(), "1".into(), "1".into()],
            ],
        )
        .unwrap();
        let req = AggregateRequest {
            filters: vec![(0, "d1".into()), (1, "L2".into())],
            group_columns: vec![1, 2],
            value_columns: vec![3, 4],
            melt: None,
            statistic: Statistic::Sum,
            order: SortOrder::Descending,
            top_n: None,
        };
        let agg = aggregate(&data, &req).unwrap();
        assert_eq!(
            pairs(&agg.table),
            vec![("L2 / Jamsil".to_string(), 170.0), ("L2 / Gangnam".to_string(), 150.0)]
        );
        assert_eq!(agg.table.value_label, "on+off");
        assert_eq!(agg.table.statistic_column(), "sum_on+off");
    }

    #[test]
    fn test_top_n() {
        let data = make_data(&[("A", "1"), ("B", "2"), ("C", "3"), ("D", "4")]);
        let mut req = request(Statistic::Sum, SortOrder::Descending);
        req.top_n = Some(2);
        let agg = aggregate(&data, &req).unwrap();
        assert_eq!(
            pairs(&agg.table),
            vec![("D".to_string(), 4.0), ("C".to_string(), 3.0)]
        );
        assert_eq!(agg.total_groups, 4);
    }

    #[test]
    fn test_count_without_value_column() {
        let data = make_data(&[("A", "x"), ("A", "y"), ("B", "z")]);
        let mut req = request(Statistic::Count, SortOrder::Descending);
        req.value_columns.clear();
        let agg = aggregate(&data, &req).unwrap();
        assert_eq!(
            pairs(&agg.table),
            vec![("A".to_string(), 2.0), ("B".to_string(), 1.0)]
        );
        assert_eq!(agg.table.value_label, "rows");
    }

    #[test]
    fn test_empty_selection() {
        let data = make_data(&[("A", "N/A")]);
        let err = aggregate(&data, &request(Statistic::Mean, SortOrder::Descending)).unwrap_err();
        assert!(matches!(err, DashboardError::EmptySelection { .. }));

        let data = make_data(&[("A", "1")]);
        let mut req = request(Statistic::Mean, SortOrder::Descending);
        req.filters = vec![(0, "Z".into())];
        match aggregate(&data, &req).unwrap_err() {
            DashboardError::EmptySelection { selection } => assert_eq!(selection, "k=Z"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_requests() {
        let data = make_data(&[("A", "1")]);
        let mut req = request(Statistic::Mean, SortOrder::Descending);
        req.value_columns.clear();
        assert!(matches!(aggregate(&data, &req), Err(DashboardError::InvalidConfig(_))));

        let mut req = request(Statistic::Mean, SortOrder::Descending);
        req.group_columns = vec![7];
        assert!(matches!(aggregate(&data, &req), Err(DashboardError::InvalidConfig(_))));
    }

    #[test]
    fn test_deterministic() {
        let data = make_data(&[("B", "2"), ("A", "2"), ("C", "7"), ("A", "4")]);
        let req = request(Statistic::Mean, SortOrder::Descending);
        let first = aggregate(&data, &req).unwrap();
        for _ in 0..5 {
            assert_eq!(aggregate(&data, &req).unwrap(), first);
        }
    }

    #[test]
    fn test_statistic_names() {
        assert_eq!("avg".parse::<Statistic>(), Ok(Statistic::Mean));
        assert_eq!(Statistic::Median.to_string(), "median");
        assert_eq!("asc".parse::<SortOrder>(), Ok(SortOrder::Ascending));
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_duplicate_headers_use_positions() {
        let data = Dataset::new(
            vec!["k".into(), "v".into(), "v".into()],
            vec![
                vec!["A".into(), "1".into(), "100".into()],
                vec!["B".into(), "2".into(), "200".into()],
            ],
        )
        .unwrap();
        let mut req = request(Statistic::Sum, SortOrder::Descending);
        req.value_columns = vec![2];
        let agg = aggregate(&data, &req).unwrap();
        assert_eq!(
            pairs(&agg.table),
            vec![("B".to_string(), 200.0), ("A".to_string(), 100.0)]
        );
    }

    fn mbti() -> Dataset {
        Dataset::new(
            vec!["Country".into(), "INTJ".into(), "ENFP".into(), "ISTP".into()],
            vec![
                vec!["Korea".into(), "0.05".into(), "0.12".into(), "n/a".into()],
                vec!["Japan".into(), "0.04".into(), "0.09".into(), "0.07".into()],
            ],
        )
        .unwrap()
    }

    fn melt_request(filters: Vec<(usize, String)>) -> AggregateRequest {
        AggregateRequest {
            filters,
            group_columns: vec![],
            value_columns: vec![1, 2, 3],
            melt: Some("type".to_string()),
            statistic: Statistic::Mean,
            order: SortOrder::Descending,
            top_n: None,
        }
    }

    #[test]
    fn test_melt_selected_row() {
        let agg = aggregate(&mbti(), &melt_request(vec![(0, "Korea".into())])).unwrap();
        assert_eq!(
            pairs(&agg.table),
            vec![("ENFP".to_string(), 0.12), ("INTJ".to_string(), 0.05)]
        );
        assert_eq!(agg.dropped, 1);
        assert_eq!(agg.table.group_columns, vec!["type"]);
        assert_eq!(agg.table.value_label, "value");
        assert_eq!(agg.total_groups, 2);
    }

    #[test]
    fn test_melt_all_rows_reduces_per_column() {
        let mut req = melt_request(vec![]);
        req.statistic = Statistic::Max;
        let agg = aggregate(&mbti(), &req).unwrap();
        assert_eq!(
            pairs(&agg.table),
            vec![
                ("ENFP".to_string(), 0.12),
                ("ISTP".to_string(), 0.07),
                ("INTJ".to_string(), 0.05),
            ]
        );
        assert_eq!(agg.table.rows[0].count, 2);
    }

    #[test]
    fn test_melt_rejects_group_columns() {
        let mut req = melt_request(vec![]);
        req.group_columns = vec![0];
        assert!(matches!(aggregate(&mbti(), &req), Err(DashboardError::InvalidConfig(_))));

        let mut req = melt_request(vec![]);
        req.value_columns.clear();
        assert!(matches!(aggregate(&mbti(), &req), Err(DashboardError::InvalidConfig(_))));
    }

    #[test]
    fn test_melt_unknown_country_is_empty() {
        let err = aggregate(&mbti(), &melt_request(vec![(0, "Peru".into())])).unwrap_err();
        match err {
            DashboardError::EmptySelection { selection } => assert_eq!(selection, "Country=Peru"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
