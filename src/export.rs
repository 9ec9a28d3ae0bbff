// CSV download of the aggregated table

use crate::ir::AggregatedTable;
use anyhow::{Context, Result};
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialize the table as UTF-8 CSV. With `bom` the bytes start with a
/// byte-order mark so spreadsheet applications pick the right encoding.
pub fn table_to_csv(table: &AggregatedTable, bom: bool) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if bom {
        buffer.extend_from_slice(UTF8_BOM);
    }

    {
        let mut writer = csv::Writer::from_writer(&mut buffer);

        let mut header: Vec<String> = table.group_columns.clone();
        header.push(table.statistic_column());
        header.extend(["count", "min", "max"].map(String::from));
        writer.write_record(&header).context("Failed to write CSV header")?;

        for row in &table.rows {
            let mut record = row.keys.clone();
            record.push(row.value.to_string());
            record.push(row.count.to_string());
            record.push(row.min.to_string());
            record.push(row.max.to_string());
            writer.write_record(&record).context("Failed to write CSV row")?;
        }

        writer.flush().context("Failed to flush CSV writer")?;
    }

    Ok(buffer)
}

pub fn write_table_csv(table: &AggregatedTable, path: &Path, bom: bool) -> Result<()> {
    let bytes = table_to_csv(table, bom)?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::AggregatedRow;
    use crate::transform::{SortOrder, Statistic};

    fn table() -> AggregatedTable {
        AggregatedTable {
            group_columns: vec!["동".to_string()],
            value_label: "price".to_string(),
            statistic: Statistic::Mean,
            order: SortOrder::Ascending,
            rows: vec![
                AggregatedRow {
                    keys: vec!["서구, 2동".to_string()],
                    value: 900.0,
                    count: 1,
                    min: 900.0,
                    max: 900.0,
                },
                AggregatedRow {
                    keys: vec!["중구".to_string()],
                    value: 1250.5,
                    count: 2,
                    min: 1200.0,
                    max: 1301.0,
                },
            ],
        }
    }

    #[test]
    fn test_plain_csv() {
        let bytes = table_to_csv(&table(), false).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "동,mean_price,count,min,max\n\"서구, 2동\",900,1,900,900\n중구,1250.5,2,1200,1301\n"
        );
    }

    #[test]
    fn test_bom_prefix() {
        let bytes = table_to_csv(&table(), true).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert!(std::str::from_utf8(&bytes[3..]).unwrap().starts_with("동,"));
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agg.csv");
        write_table_csv(&table(), &path, false).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("동,mean_price"));
    }
}
