use crate::coerce::parse_number;
use crate::error::{DashboardError, Result};
use serde_json::Value;
use std::collections::BTreeSet;

/// Raw tabular input: every cell is kept as text, the empty string marks a
/// missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset, padding short rows so every row has one cell per header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let width = headers.len();
        let mut normalized = Vec::with_capacity(rows.len());
        for (idx, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(DashboardError::data_load(
                    "dataset",
                    format!(
                        "row {} has {} fields but the header has {}",
                        idx + 1,
                        row.len(),
                        width
                    ),
                ));
            }
            row.resize(width, String::new());
            normalized.push(row);
        }
        Ok(Self {
            headers,
            rows: normalized,
        })
    }

    /// Create a dataset from a JSON array of objects
    pub fn from_json(value: &Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| DashboardError::data_load("json", "input must be an array of objects"))?;

        if array.is_empty() {
            return Err(DashboardError::data_load("json", "input array is empty"));
        }

        let first_obj = array[0]
            .as_object()
            .ok_or_else(|| DashboardError::data_load("json", "items in array must be objects"))?;

        let headers: Vec<String> = first_obj.keys().cloned().collect();

        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| DashboardError::data_load("json", "items in array must be objects"))?;

            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let val_str = match obj.get(header) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::Bool(b)) => b.to_string(),
                    Some(Value::Null) | None => String::new(),
                    _ => {
                        return Err(DashboardError::data_load(
                            "json",
                            format!("unsupported value type for field '{}'", header),
                        ))
                    }
                };
                row.push(val_str);
            }
            rows.push(row);
        }

        Self::new(headers, rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when the column has at least one value and every non-missing
    /// value parses as a number.
    pub fn is_numeric_column(&self, column: usize) -> bool {
        let mut seen = false;
        for value in self.rows.iter().filter_map(|row| row.get(column)) {
            if value.trim().is_empty() {
                continue;
            }
            if parse_number(value).is_none() {
                return false;
            }
            seen = true;
        }
        seen
    }

    /// Sorted distinct non-missing values of a column.
    pub fn distinct_values(&self, column: usize) -> Vec<String> {
        let values: BTreeSet<&str> = self
            .rows
            .iter()
            .filter_map(|row| row.get(column))
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
            .collect();
        values.into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pads_short_rows() {
        let data = Dataset::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec!["1".to_string()]],
        )
        .unwrap();
        assert_eq!(data.rows[0], vec!["1".to_string(), String::new()]);
    }

    #[test]
    fn test_rejects_long_rows() {
        let res = Dataset::new(
            vec!["a".to_string()],
            vec![vec!["1".to_string(), "2".to_string()]],
        );
        assert!(matches!(res, Err(DashboardError::DataLoad { .. })));
    }

    #[test]
    fn test_from_json() {
        let value = json!([
            {"product": "apple", "price": 1200},
            {"product": "banana", "price": null}
        ]);
        let data = Dataset::from_json(&value).unwrap();
        assert_eq!(data.len(), 2);
        let price = data.headers.iter().position(|h| h == "price").unwrap();
        assert_eq!(data.rows[0][price], "1200");
        assert_eq!(data.rows[1][price], "");
    }

    #[test]
    fn test_from_json_rejects_scalars() {
        assert!(Dataset::from_json(&json!({"a": 1})).is_err());
        assert!(Dataset::from_json(&json!([])).is_err());
        assert!(Dataset::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_distinct_values_sorted() {
        let data = Dataset::new(
            vec!["line".to_string()],
            vec![
                vec!["2호선".to_string()],
                vec!["1호선".to_string()],
                vec!["2호선".to_string()],
                vec![" ".to_string()],
            ],
        )
        .unwrap();
        assert_eq!(data.distinct_values(0), vec!["1호선", "2호선"]);
    }

    #[test]
    fn test_numeric_columns() {
        let data = Dataset::new(
            vec!["name".to_string(), "male".to_string(), "note".to_string(), "blank".to_string()],
            vec![
                vec!["a".to_string(), "1,200".to_string(), "3".to_string(), String::new()],
                vec!["b".to_string(), String::new(), "n/a".to_string(), String::new()],
            ],
        )
        .unwrap();
        assert!(!data.is_numeric_column(0));
        assert!(data.is_numeric_column(1));
        assert!(!data.is_numeric_column(2));
        assert!(!data.is_numeric_column(3));
    }
}
