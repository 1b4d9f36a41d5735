//! Transaction loading using Polars

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{PatronageError, Result};

const CUSTOMER_COLUMN: &str = "CustomerID";
const DATE_COLUMN: &str = "InvoiceDate";
const ROW_COLUMN: &str = "__row";

/// Datetime layouts accepted for `InvoiceDate`, tried in order
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

/// A single purchase line reduced to what patronage needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub customer_id: i64,
    pub invoice_date: NaiveDateTime,
}

/// Load processed transactions from a CSV file
///
/// Only `CustomerID` and `InvoiceDate` are read. Rows without a customer are
/// dropped; float-encoded identifiers such as `17850.0` are cast to integers.
///
/// # Arguments
/// * `path` - Path to the processed CSV file
///
/// # Returns
/// * Transactions in file order
pub fn load_transactions(path: impl AsRef<Path>) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PatronageError::FileNotFound(path.to_path_buf()));
    }
    if std::fs::metadata(path)?.len() == 0 {
        return Err(PatronageError::EmptyData(path.to_path_buf()));
    }

    let lazy = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .finish()?;

    let schema = lazy.clone().schema()?;
    for required in [CUSTOMER_COLUMN, DATE_COLUMN] {
        if schema.get(required).is_none() {
            return Err(PatronageError::MissingColumn(required.to_string()));
        }
    }

    // 1-based data row, numbered before any rows are dropped
    let df = lazy
        .with_row_index(ROW_COLUMN, Some(1))
        .filter(col(CUSTOMER_COLUMN).is_not_null())
        .select([
            col(ROW_COLUMN),
            col(CUSTOMER_COLUMN).cast(DataType::Int64),
            col(DATE_COLUMN).cast(DataType::String),
        ])
        .collect()?;

    if df.height() == 0 {
        return Err(PatronageError::EmptyData(path.to_path_buf()));
    }
    debug!(rows = df.height(), "scanned transaction rows");

    let rows = df.column(ROW_COLUMN)?.idx()?;
    let customer_ids = df.column(CUSTOMER_COLUMN)?.i64()?;
    let invoice_dates = df.column(DATE_COLUMN)?.str()?;

    let mut transactions = Vec::with_capacity(df.height());
    for (row, (customer_id, invoice_date)) in rows
        .into_iter()
        .zip(customer_ids.into_iter().zip(invoice_dates.into_iter()))
    {
        // Casting can null out identifiers that were not numeric
        let Some(customer_id) = customer_id else {
            continue;
        };
        let raw = invoice_date.unwrap_or_default();
        let invoice_date = parse_invoice_date(raw).ok_or_else(|| PatronageError::InvalidDate {
            row: row.map_or(0, |r| r as usize),
            value: raw.to_string(),
        })?;
        transactions.push(Transaction {
            customer_id,
            invoice_date,
        });
    }

    if transactions.is_empty() {
        return Err(PatronageError::EmptyData(path.to_path_buf()));
    }

    info!(
        transactions = transactions.len(),
        path = %path.display(),
        "loaded processed transactions"
    );
    Ok(transactions)
}

/// Parse an invoice timestamp in any of the layouts seen in processed exports
pub fn parse_invoice_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS.iter().take(3) {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, DATETIME_FORMATS[3]) {
        return Some(parsed);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country").unwrap();
        writeln!(file, "536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-01 08:26:00,2.55,17850.0,United Kingdom").unwrap();
        writeln!(file, "536365,71053,WHITE METAL LANTERN,6,2010-12-01 08:26:00,3.39,17850.0,United Kingdom").unwrap();
        writeln!(file, "536366,22633,HAND WARMER UNION JACK,6,2010-12-08 08:28:00,1.85,,United Kingdom").unwrap();
        writeln!(file, "536367,84406B,CREAM CUPID HEARTS COAT HANGER,8,2010-12-09 08:34:00,2.75,13047.0,United Kingdom").unwrap();
        file
    }

    #[test]
    fn test_load_transactions() {
        let test_file = create_test_csv();
        let transactions = load_transactions(test_file.path()).unwrap();

        // The row without a CustomerID is dropped
        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions[0].customer_id, 17850);
        assert_eq!(transactions[2].customer_id, 13047);
        assert_eq!(transactions[2].invoice_date.hour(), 8);
    }

    #[test]
    fn test_missing_file() {
        let result = load_transactions("definitely/not/a/file.csv");
        assert!(matches!(result, Err(PatronageError::FileNotFound(_))));
    }

    #[test]
    fn test_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let result = load_transactions(file.path());
        assert!(matches!(result, Err(PatronageError::EmptyData(_))));
    }

    #[test]
    fn test_missing_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "InvoiceNo,InvoiceDate").unwrap();
        writeln!(file, "536365,2010-12-01 08:26:00").unwrap();

        let result = load_transactions(file.path());
        assert!(matches!(result, Err(PatronageError::MissingColumn(ref c)) if c == "CustomerID"));
    }

    #[test]
    fn test_invalid_date_row_counts_dropped_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "InvoiceDate,CustomerID").unwrap();
        writeln!(file, "2010-12-01 08:26:00,").unwrap();
        writeln!(file, "2010-12-01 09:00:00,").unwrap();
        writeln!(file, "garbage,17850").unwrap();

        let result = load_transactions(file.path());
        assert!(matches!(
            result,
            Err(PatronageError::InvalidDate { row: 3, ref value }) if value == "garbage"
        ));
    }

    #[test]
    fn test_invalid_date_reports_row() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "InvoiceDate,CustomerID").unwrap();
        writeln!(file, "2010-12-01 08:26:00,17850").unwrap();
        writeln!(file, "not a date,17850").unwrap();

        let result = load_transactions(file.path());
        match result {
            Err(PatronageError::InvalidDate { row, value }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "not a date");
            }
            other => panic!("Expected InvalidDate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_invoice_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2010, 12, 1)
            .unwrap()
            .and_hms_opt(8, 26, 0)
            .unwrap();

        assert_eq!(parse_invoice_date("2010-12-01 08:26:00"), Some(expected));
        assert_eq!(parse_invoice_date("2010-12-01T08:26:00"), Some(expected));
        assert_eq!(parse_invoice_date("2010-12-01 08:26"), Some(expected));
        assert_eq!(parse_invoice_date("2010-12-01T08:26:00Z"), Some(expected));
        assert_eq!(parse_invoice_date("12/1/2010 8:26"), Some(expected));
        assert_eq!(
            parse_invoice_date("2010-12-01"),
            NaiveDate::from_ymd_opt(2010, 12, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_invoice_date("  "), None);
        assert_eq!(parse_invoice_date("01.12.2010"), None);
    }
}
