// Spreadsheet (.xlsx / .xls) input

use crate::data::Dataset;
use crate::error::{DashboardError, Result};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use std::path::Path;
use tracing::info;

const EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Whether the path names a workbook format calamine can open
pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

fn cell_text(cell: &Data) -> String {
    cell.as_string().unwrap_or_else(|| cell.to_string())
}

/// Read the first worksheet. The first row holds the headers; every other
/// cell is kept as its displayed text, empty cells as "".
pub fn read_spreadsheet(path: &Path) -> Result<Dataset> {
    let name = path.display().to_string();
    let mut workbook =
        open_workbook_auto(path).map_err(|e| DashboardError::data_load(&name, e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DashboardError::data_load(&name, "workbook has no worksheets"))?
        .map_err(|e| DashboardError::data_load(&name, e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| DashboardError::data_load(&name, "worksheet is empty"))?
        .iter()
        .map(|c| cell_text(c).trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(DashboardError::data_load(&name, "worksheet has no header row"));
    }

    let rows: Vec<Vec<String>> = rows.map(|row| row.iter().map(cell_text).collect()).collect();
    let dataset = Dataset::new(headers, rows).map_err(|e| match e {
        DashboardError::DataLoad { reason, .. } => DashboardError::data_load(&name, reason),
        other => other,
    })?;
    info!(
        source = %name,
        rows = dataset.len(),
        columns = dataset.headers.len(),
        "loaded worksheet"
    );
    Ok(dataset)
}
