// Primitives for writing CSV files.

use serde::Serialize;

use crate::admin::*;

/// Renders a table, header included.
pub fn table_to_csv(table: &Table) -> AdminResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    {
        let mut wtr = csv::Writer::from_writer(&mut buf);
        wtr.write_record(table.columns()).context(WritingCsvSnafu {})?;
        for row in table.rows() {
            let cells: Vec<&str> = table
                .columns()
                .iter()
                .map(|c| row.field(c).present().unwrap_or(""))
                .collect();
            wtr.write_record(&cells).context(WritingCsvSnafu {})?;
        }
        wtr.flush().context(FlushingCsvSnafu {})?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Renders records, with a header taken from the field names.
pub fn records_to_csv<T: Serialize>(records: &[T]) -> AdminResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    {
        let mut wtr = csv::Writer::from_writer(&mut buf);
        for r in records {
            wtr.serialize(r).context(WritingCsvSnafu {})?;
        }
        wtr.flush().context(FlushingCsvSnafu {})?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
