//! Parsing and validation of submitted URL lists.

use crate::error::{AppError, Result};
use crate::models::ScrapeTarget;
use calamine::{Reader, open_workbook_auto_from_rs};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;

const BOM: char = '\u{feff}';

/// Reads URLs out of an uploaded file: the first column of a `.csv` or of the
/// first sheet of an `.xlsx`/`.xls` workbook, or one per line of a `.txt`.
/// Blank entries are dropped.
pub fn parse_url_list(filename: &str, bytes: &[u8]) -> Result<Vec<String>> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if matches!(extension.as_str(), "xlsx" | "xls") {
        return parse_workbook(filename, bytes);
    }

    let content = String::from_utf8_lossy(bytes);
    let content = content.trim_start_matches(BOM);

    match extension.as_str() {
        "csv" => parse_csv(content),
        "txt" => Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()),
        _ => Err(AppError::UnsupportedFileType(filename.to_string())),
    }
}

/// A first cell without a dot is a column name like `url` or `website`.
fn looks_like_header(cell: &str) -> bool {
    !cell.contains('.')
}

fn parse_csv(content: &str) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut urls = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let Some(cell) = record.get(0).map(str::trim) else {
            continue;
        };
        if index == 0 && looks_like_header(cell) {
            tracing::debug!("Skipping CSV header row '{}'", cell);
            continue;
        }
        if !cell.is_empty() {
            urls.push(cell.to_string());
        }
    }
    Ok(urls)
}

fn parse_workbook(filename: &str, bytes: &[u8]) -> Result<Vec<String>> {
    let spreadsheet_error = |reason: String| AppError::Spreadsheet {
        file: filename.to_string(),
        reason,
    };

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| spreadsheet_error(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| spreadsheet_error("workbook has no sheets".to_string()))?
        .map_err(|e| spreadsheet_error(e.to_string()))?;

    let mut urls = Vec::new();
    for (index, row) in range.rows().enumerate() {
        let Some(cell) = row.first() else {
            continue;
        };
        let cell = cell.to_string();
        let cell = cell.trim();
        if index == 0 && looks_like_header(cell) {
            tracing::debug!("Skipping spreadsheet header row '{}'", cell);
            continue;
        }
        if !cell.is_empty() {
            urls.push(cell.to_string());
        }
    }
    Ok(urls)
}

/// Turns raw URL strings into a batch, enforcing the caller's limit.
pub fn validate_batch(urls: Vec<String>, max_urls: usize) -> Result<Vec<ScrapeTarget>> {
    let targets: Vec<ScrapeTarget> = urls
        .into_iter()
        .map(ScrapeTarget::new)
        .filter(|t| !t.as_str().is_empty())
        .collect();

    if targets.is_empty() {
        return Err(AppError::EmptyBatch);
    }
    if targets.len() > max_urls {
        return Err(AppError::TooManyUrls {
            count: targets.len(),
            max: max_urls,
        });
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_first_column_with_header() {
        let csv = "\u{feff}website,notes\nacme.io,main\n\"https://shop.acme.io\",\"x, y\"\n,empty\n";
        let urls = parse_url_list("list.CSV", csv.as_bytes()).unwrap();
        assert_eq!(urls, vec!["acme.io", "https://shop.acme.io"]);
    }

    #[test]
    fn test_csv_without_header() {
        let urls = parse_url_list("list.csv", b"acme.io\nsample.org\n").unwrap();
        assert_eq!(urls, vec!["acme.io", "sample.org"]);
    }

    #[test]
    fn test_txt_one_per_line() {
        let urls = parse_url_list("urls.txt", b"acme.io\r\n\r\n  sample.org  \n").unwrap();
        assert_eq!(urls, vec!["acme.io", "sample.org"]);
    }

    fn workbook(rows: &[&str]) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (row, value) in rows.iter().enumerate() {
            sheet.write_string(row as u32, 0, *value).unwrap();
            sheet.write_string(row as u32, 1, "note").unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_xlsx_first_column_of_first_sheet() {
        let bytes = workbook(&["Website", "acme.io", "", "  https://shop.acme.io "]);
        let urls = parse_url_list("Leads.XLSX", &bytes).unwrap();
        assert_eq!(urls, vec!["acme.io", "https://shop.acme.io"]);
    }

    #[test]
    fn test_xlsx_without_header() {
        let bytes = workbook(&["acme.io", "sample.org"]);
        let urls = parse_url_list("urls.xlsx", &bytes).unwrap();
        assert_eq!(urls, vec!["acme.io", "sample.org"]);
    }

    #[test]
    fn test_corrupt_workbook_is_validation_error() {
        let err = parse_url_list("urls.xlsx", b"acme.io").unwrap_err();
        assert!(matches!(err, AppError::Spreadsheet { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn test_unknown_types_rejected() {
        for name in ["urls.json", "urls.pdf", "urls"] {
            let err = parse_url_list(name, b"acme.io").unwrap_err();
            assert!(matches!(err, AppError::UnsupportedFileType(_)), "{}", name);
        }
    }

    #[test]
    fn test_validate_batch_limits() {
        let urls: Vec<String> = (0..101).map(|i| format!("site{}.io", i)).collect();
        let err = validate_batch(urls.clone(), 100).unwrap_err();
        assert!(matches!(err, AppError::TooManyUrls { count: 101, max: 100 }));

        assert_eq!(validate_batch(urls, 101).unwrap().len(), 101);
        assert!(matches!(
            validate_batch(vec!["  ".into(), String::new()], 100),
            Err(AppError::EmptyBatch)
        ));
    }
}
