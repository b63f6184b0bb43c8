// Primitives for reading tables out of uploaded files.

use std::io::Cursor;

use calamine::{DataType, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use log::{debug, warn};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use snafu::{OptionExt, ResultExt};

use crate::config::*;

/// A table of text cells with a header row.
///
/// Every format is normalized into this shape before validation, so that the
/// validator and the importer never see the difference between a CSV file and a
/// workbook.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Table {
        Table { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The number of data rows (the header is not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// The raw cell, if the column exists. Short rows read as blank cells.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        let cells = self.rows.get(row)?;
        Some(cells.get(idx).map(|s| s.as_str()).unwrap_or(""))
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        (0..self.rows.len()).map(move |index| Row { table: self, index })
    }

    /// The first rows of the table as JSON objects keyed by column name.
    /// Blank cells are rendered as null.
    pub fn preview(&self, limit: usize) -> Vec<JSMap<String, JSValue>> {
        self.rows()
            .take(limit)
            .map(|row| {
                self.columns
                    .iter()
                    .map(|col| {
                        let value = match row.field(col) {
                            Field::Present(s) => JSValue::String(s.to_string()),
                            _ => JSValue::Null,
                        };
                        (col.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }

    /// Parses comma-separated text. The first record is the header.
    pub fn from_csv(content: &[u8]) -> ImportResult<Table> {
        let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
        if content.iter().all(|b| b.is_ascii_whitespace()) {
            return EmptyFileSnafu {}.fail();
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(content);
        let columns: Vec<String> = rdr
            .headers()
            .context(CsvParseSnafu {})?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        debug!("from_csv: header: {:?}", columns);

        let mut rows: Vec<Vec<String>> = Vec::new();
        for record_r in rdr.records() {
            let record = record_r.context(CsvParseSnafu {})?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }
        debug!("from_csv: {} data rows", rows.len());
        Ok(Table::new(columns, rows))
    }

    /// Reads a worksheet of an Excel workbook: the named one or else the first one.
    ///
    /// The first row of the sheet is the header. Rows without any content are skipped.
    pub fn from_xlsx(content: &[u8], worksheet: Option<&str>) -> ImportResult<Table> {
        let mut workbook: Xlsx<_> =
            Xlsx::new(Cursor::new(content.to_vec())).context(OpeningExcelSnafu {})?;
        let wrange = match worksheet {
            Some(name) => workbook
                .worksheet_range(name)
                .context(MissingWorksheetSnafu { name })?
                .context(OpeningExcelSnafu {})?,
            None => workbook
                .worksheet_range_at(0)
                .context(EmptyFileSnafu {})?
                .context(OpeningExcelSnafu {})?,
        };

        let mut iter = wrange.rows();
        let header = iter.next().context(EmptyFileSnafu {})?;
        let columns: Vec<String> = header
            .iter()
            .map(|c| cell_text(c).trim().to_string())
            .collect();
        debug!("from_xlsx: header: {:?}", columns);

        let rows: Vec<Vec<String>> = iter
            .filter(|row| row.iter().any(|c| !matches!(c, DataType::Empty)))
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        debug!("from_xlsx: {} data rows", rows.len());
        Ok(Table::new(columns, rows))
    }
}

/// Renders a spreadsheet cell the way a user would have typed it.
fn cell_text(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        // Spreadsheets store every number as a float: 12 comes back as 12.0.
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::DateTime(serial) => excel_date_text(*serial),
        DataType::Error(e) => {
            warn!("cell_text: error cell {:?} read as blank", e);
            "".to_string()
        }
        DataType::Empty => "".to_string(),
        #[allow(unreachable_patterns)]
        other => format!("{:?}", other),
    }
}

// Excel serial dates count days from 1899-12-30.
fn excel_date_text(serial: f64) -> String {
    let base = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0));
    match base {
        Some(base) => {
            let dt = base + Duration::milliseconds((serial * 86_400_000.0).round() as i64);
            if serial.fract() == 0.0 {
                dt.date().to_string()
            } else {
                dt.to_string()
            }
        }
        None => serial.to_string(),
    }
}

/// A data row of a table.
#[derive(Debug, Clone, Copy)]
pub struct Row<'t> {
    table: &'t Table,
    index: usize,
}

impl<'t> Row<'t> {
    /// The row number as shown in a spreadsheet: the header is line 1.
    pub fn number(&self) -> usize {
        self.index + 2
    }

    pub fn field(&self, column: &str) -> Field<&'t str> {
        match self.table.cell(self.index, column) {
            None => Field::Absent,
            Some(s) if s.trim().is_empty() => Field::Blank,
            Some(s) => Field::Present(s.trim()),
        }
    }
}

/// The state of one cell, as seen by the importer.
///
/// The difference between an absent column and a blank cell matters when an
/// existing record is updated: a blank cell clears the stored value while an
/// absent column leaves it alone.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Field<T> {
    /// The column does not exist in the file.
    Absent,
    /// The column exists but the cell is empty.
    Blank,
    Present(T),
}

impl<T> Field<T> {
    pub fn present(self) -> Option<T> {
        match self {
            Field::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Field<U> {
        match self {
            Field::Absent => Field::Absent,
            Field::Blank => Field::Blank,
            Field::Present(v) => Field::Present(f(v)),
        }
    }

    pub fn try_map<U, E, F: FnOnce(T) -> Result<U, E>>(self, f: F) -> Result<Field<U>, E> {
        Ok(match self {
            Field::Absent => Field::Absent,
            Field::Blank => Field::Blank,
            Field::Present(v) => Field::Present(f(v)?),
        })
    }

    /// Value of a field that has a default.
    pub fn or(self, default: T) -> T {
        self.present().unwrap_or(default)
    }

    /// Value of a nullable field, given what is currently stored.
    pub fn merge(self, stored: Option<T>) -> Option<T> {
        match self {
            Field::Absent => stored,
            Field::Blank => None,
            Field::Present(v) => Some(v),
        }
    }
}

/// Parses an integer. Integral decimals such as "12.0" are accepted since
/// spreadsheet exports often write counts that way.
pub(crate) fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return Some(i);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        Some(f as i64)
    } else {
        None
    }
}

pub(crate) fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

pub(crate) fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_header_and_rows() {
        let t = Table::from_csv(b" name , code\nDhaka,D1\nKhulna,\n").unwrap();
        assert_eq!(t.columns(), &["name".to_string(), "code".to_string()]);
        assert_eq!(t.len(), 2);
        let rows: Vec<Row> = t.rows().collect();
        assert_eq!(rows[0].number(), 2);
        assert_eq!(rows[0].field("name"), Field::Present("Dhaka"));
        assert_eq!(rows[1].field("code"), Field::Blank);
        assert_eq!(rows[1].field("bengali_name"), Field::Absent);
    }

    #[test]
    fn csv_byte_order_mark() {
        let t = Table::from_csv(b"\xEF\xBB\xBFname\nA\n").unwrap();
        assert!(t.has_column("name"));
    }

    #[test]
    fn csv_short_rows_are_blank() {
        let t = Table::from_csv(b"name,code,total_voters\nDhaka,D1\n").unwrap();
        let row = t.rows().next().unwrap();
        assert_eq!(row.field("total_voters"), Field::Blank);
    }

    #[test]
    fn csv_empty() {
        assert!(matches!(
            Table::from_csv(b"  \n"),
            Err(ImportError::EmptyFile {})
        ));
    }

    #[test]
    fn csv_header_only() {
        let t = Table::from_csv(b"name,code\n").unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn xlsx_garbage() {
        assert!(matches!(
            Table::from_xlsx(b"not a workbook", None),
            Err(ImportError::OpeningExcel { .. })
        ));
    }

    #[test]
    fn spreadsheet_cells() {
        assert_eq!(cell_text(&DataType::Float(12.0)), "12");
        assert_eq!(cell_text(&DataType::Float(12.5)), "12.5");
        assert_eq!(cell_text(&DataType::Int(7)), "7");
        assert_eq!(cell_text(&DataType::Bool(true)), "true");
        assert_eq!(cell_text(&DataType::Empty), "");
        assert_eq!(cell_text(&DataType::DateTime(45292.0)), "2024-01-01");
    }

    #[test]
    fn preview_limits_rows() {
        let mut content = String::from("name,code\n");
        for i in 0..15 {
            content.push_str(&format!("N{},\n", i));
        }
        let t = Table::from_csv(content.as_bytes()).unwrap();
        let p = t.preview(10);
        assert_eq!(p.len(), 10);
        assert_eq!(p[0].get("name"), Some(&JSValue::String("N0".to_string())));
        assert_eq!(p[0].get("code"), Some(&JSValue::Null));
    }

    #[test]
    fn field_merge_rules() {
        assert_eq!(Field::Present(3).merge(Some(1)), Some(3));
        assert_eq!(Field::<i64>::Blank.merge(Some(1)), None);
        assert_eq!(Field::<i64>::Absent.merge(Some(1)), Some(1));
        assert_eq!(Field::<bool>::Absent.or(true), true);
        assert_eq!(Field::<bool>::Blank.or(true), true);
        assert_eq!(Field::Present(false).or(true), false);
    }

    #[test]
    fn numbers_and_flags() {
        assert_eq!(parse_int("12"), Some(12));
        assert_eq!(parse_int(" 12.0 "), Some(12));
        assert_eq!(parse_int("12.5"), None);
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_float("23.8"), Some(23.8));
        assert_eq!(parse_float("NaN"), None);
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
