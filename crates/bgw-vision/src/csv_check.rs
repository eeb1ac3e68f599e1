// SPDX-License-Identifier: MIT OR Apache-2.0
//! CSV pre-validation.
//!
//! Runs before any model tokens are spent. RFC 4180 quoting (including
//! doubled quotes) is honored by the `csv` reader, so a quoted field
//! containing commas or newlines counts as one column.

use bgw_error::{ErrorCode, ErrorDto};

/// Upload ceiling for CSV bodies.
pub const CSV_MAX_BYTES: usize = 10 * 1024 * 1024;
/// Row ceiling, header excluded.
pub const CSV_MAX_ROWS: usize = 10_000;

/// What validation learned about an acceptable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvStats {
    /// Data rows, header excluded.
    pub row_count: usize,
    /// Columns in the header.
    pub column_count: usize,
}

/// Validate a CSV body: non-empty, within size and row budgets, and every
/// row's column count equal to the header's.
pub fn validate_csv(text: &str) -> Result<CsvStats, ErrorDto> {
    if text.trim().is_empty() {
        return Err(ErrorDto::new(ErrorCode::InvalidRequest, "CSV body is empty"));
    }
    if text.len() > CSV_MAX_BYTES {
        return Err(ErrorDto::new(
            ErrorCode::FileTooLarge,
            format!("CSV exceeds {} bytes", CSV_MAX_BYTES),
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(false)
        .from_reader(text.as_bytes());

    let column_count = reader
        .headers()
        .map_err(|e| {
            ErrorDto::new(ErrorCode::InvalidRequest, format!("unreadable CSV header: {e}"))
        })?
        .len();
    if column_count == 0 {
        return Err(ErrorDto::new(ErrorCode::InvalidRequest, "CSV header is empty"));
    }

    let mut row_count = 0usize;
    for (index, record) in reader.records().enumerate() {
        record.map_err(|e| {
            ErrorDto::new(
                ErrorCode::InvalidRequest,
                format!("row {}: {e}", index + 2),
            )
        })?;
        row_count += 1;
        if row_count > CSV_MAX_ROWS {
            return Err(ErrorDto::new(
                ErrorCode::InvalidRequest,
                format!("CSV exceeds {CSV_MAX_ROWS} rows"),
            ));
        }
    }

    if row_count == 0 {
        return Err(ErrorDto::new(ErrorCode::InvalidRequest, "CSV has no data rows"));
    }

    Ok(CsvStats {
        row_count,
        column_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_csv_passes() {
        let stats = validate_csv("Title,Author,ISBN\n1984,George Orwell,\nDune,Frank Herbert,9780441013593\n").unwrap();
        assert_eq!(stats.row_count, 2);
        assert_eq!(stats.column_count, 3);
    }

    #[test]
    fn quoted_commas_and_doubled_quotes_are_one_column() {
        let stats = validate_csv(
            "Title,Author\n\"Hello, World\",\"O\"\"Brien, Flann\"\n",
        )
        .unwrap();
        assert_eq!(stats.row_count, 1);
        assert_eq!(stats.column_count, 2);
    }

    #[test]
    fn empty_body_is_invalid() {
        let err = validate_csv("   \n  ").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }

    #[test]
    fn oversized_body_is_file_too_large() {
        let mut body = String::from("Title\n");
        body.push_str(&"x\n".repeat(CSV_MAX_BYTES / 2 + 1));
        let err = validate_csv(&body).unwrap_err();
        assert_eq!(err.code, ErrorCode::FileTooLarge);
    }

    #[test]
    fn row_10_001_fails_validation() {
        let mut body = String::from("Title\n");
        for i in 0..(CSV_MAX_ROWS + 1) {
            body.push_str(&format!("book {i}\n"));
        }
        let err = validate_csv(&body).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.contains("rows"));
    }

    #[test]
    fn exactly_10_000_rows_passes() {
        let mut body = String::from("Title\n");
        for i in 0..CSV_MAX_ROWS {
            body.push_str(&format!("book {i}\n"));
        }
        assert_eq!(validate_csv(&body).unwrap().row_count, CSV_MAX_ROWS);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = validate_csv("Title,Author\nDune,Frank Herbert,EXTRA\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert!(err.message.contains("row 2"));
    }

    #[test]
    fn header_only_file_has_no_data() {
        let err = validate_csv("Title,Author,ISBN\n").unwrap_err();
        assert!(err.message.contains("no data rows"));
    }
}
