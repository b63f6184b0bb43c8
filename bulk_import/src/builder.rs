use crate::table::Table;

/// A builder for tables held in memory.
///
/// Useful for callers that already have the content in structured form,
/// and for tests.
///
/// ```
/// use bulk_import::builder::Builder;
/// use bulk_import::{validate, EntityKind};
///
/// let table = Builder::new(&["name", "code"])
///     .row(&["Dhaka", "D1"])
///     .row(&["Khulna", "D2"])
///     .build();
///
/// assert_eq!(table.len(), 2);
/// assert!(validate(&table, EntityKind::Division).is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    _columns: Vec<String>,
    _rows: Vec<Vec<String>>,
}

impl Builder {
    pub fn new(columns: &[&str]) -> Builder {
        Builder {
            _columns: columns.iter().map(|c| c.to_string()).collect(),
            _rows: Vec::new(),
        }
    }

    /// Adds a row of cells, in the order of the columns.
    ///
    /// Rows shorter than the header are accepted: the missing cells read as blank.
    pub fn row(mut self, cells: &[&str]) -> Builder {
        self._rows.push(cells.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn build(self) -> Table {
        Table::new(self._columns, self._rows)
    }
}
