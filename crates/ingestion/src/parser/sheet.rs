//! XLSX and CSV parsing
//!
//! Each sheet becomes one markdown-table unit: header row first, column
//! count normalized to the widest row, missing cells rendered empty.

use super::fetch_bytes;
use calamine::Reader;
use tracing::debug;
use verdant_common::errors::{AppError, Result};

/// Fetch an XLSX from a signed URL and convert it, one unit per worksheet
pub async fn parse_xlsx(url: &str) -> Result<Vec<String>> {
    let bytes = fetch_bytes(url).await?;
    debug!(size = bytes.len(), "xlsx fetched");
    xlsx_to_units(&bytes)
}

/// Fetch a CSV from a signed URL and convert it as a single sheet
pub async fn parse_csv(url: &str, filename: &str) -> Result<Vec<String>> {
    let bytes = fetch_bytes(url).await?;
    debug!(size = bytes.len(), "csv fetched");
    csv_to_units(&bytes, filename)
}

/// Convert XLSX bytes into markdown tables
pub fn xlsx_to_units(bytes: &[u8]) -> Result<Vec<String>> {
    let cursor = std::io::Cursor::new(bytes.to_vec());
    let mut workbook =
        calamine::Xlsx::new(cursor).map_err(|e| AppError::ParseConversionError {
            message: e.to_string(),
        })?;

    let mut units = Vec::new();
    for (name, range) in workbook.worksheets() {
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        debug!(sheet = %name, rows = rows.len(), "sheet read");
        units.push(render_sheet(&name, &rows));
    }

    Ok(units)
}

/// Convert CSV bytes into one markdown table named after the file
pub fn csv_to_units(bytes: &[u8], filename: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::ParseConversionError {
            message: e.to_string(),
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let name = filename.rsplit('/').next().unwrap_or(filename);
    let name = name.strip_suffix(".csv").unwrap_or(name);
    Ok(vec![render_sheet(name, &rows)])
}

/// Render one sheet as a markdown table under a `# Sheet:` heading.
/// Column count is normalized to the widest row.
pub fn render_sheet(name: &str, rows: &[Vec<String>]) -> String {
    let mut md = format!("# Sheet: {}\n\n", name);

    if rows.is_empty() {
        return md;
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let norm = |row: &Vec<String>| -> Vec<String> {
        (0..width)
            .map(|i| row.get(i).cloned().unwrap_or_default())
            .collect()
    };

    let header = norm(&rows[0]);
    md.push_str(&format!("| {} |\n", header.join(" | ")));
    md.push_str(&format!(
        "| {} |\n",
        vec!["---"; width].join(" | ")
    ));
    for row in &rows[1..] {
        md.push_str(&format!("| {} |\n", norm(row).join(" | ")));
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sheet_normalizes_width() {
        let rows = vec![
            vec!["name".to_string(), "value".to_string()],
            vec!["a".to_string(), "1".to_string(), "extra".to_string()],
            vec!["b".to_string()],
        ];
        let md = render_sheet("Budget", &rows);

        assert!(md.starts_with("# Sheet: Budget\n\n"));
        // Header padded to the widest row (3 columns)
        assert!(md.contains("| name | value |  |"));
        assert!(md.contains("| --- | --- | --- |"));
        assert!(md.contains("| a | 1 | extra |"));
        assert!(md.contains("| b |  |  |"));
    }

    #[test]
    fn test_render_empty_sheet_is_heading_only() {
        let md = render_sheet("Empty", &[]);
        assert_eq!(md, "# Sheet: Empty\n\n");
    }

    #[test]
    fn test_csv_to_units() {
        let csv = b"name,value\nsolar,42\nwind,7";
        let units = csv_to_units(csv, "metrics/energy.csv").unwrap();

        assert_eq!(units.len(), 1);
        assert!(units[0].starts_with("# Sheet: energy\n\n"));
        assert!(units[0].contains("| name | value |"));
        assert!(units[0].contains("| solar | 42 |"));
        assert!(units[0].contains("| wind | 7 |"));
    }

    #[test]
    fn test_csv_ragged_rows_render_empty_cells() {
        let csv = b"a,b,c\n1\n2,3";
        let units = csv_to_units(csv, "data.csv").unwrap();
        assert!(units[0].contains("| 1 |  |  |"));
        assert!(units[0].contains("| 2 | 3 |  |"));
    }

    #[test]
    fn test_xlsx_invalid_bytes_is_conversion_error() {
        let err = xlsx_to_units(b"not an xlsx").unwrap_err();
        assert!(matches!(err, AppError::ParseConversionError { .. }));
    }
}
