//! Statistics tables.

use crate::OpFamily;

/// Label of the aggregate row.
pub const SUM_LABEL: &str = "sum";

/// Label of the single row of a table built from a response without data.
pub const NO_IO_LABEL: &str = "no I/O happened";

/// One row of a [`StatTable`]: a host (or the aggregate) and its counters.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatRow {
    /// Row label: [`SUM_LABEL`] or the host address.
    pub label: String,
    /// Counter values indexed by counter id. `None` if the server sent no value.
    pub values: Vec<Option<String>>,
}

impl StatRow {
    fn new(label: impl Into<String>, op_count: usize) -> Self {
        Self {
            label: label.into(),
            values: vec![None; op_count],
        }
    }

    /// Store a value at a table column (column 0 is the label).
    ///
    /// Returns false, without storing anything, if the column is outside the
    /// table.
    pub fn set_column(&mut self, column: usize, value: impl Into<String>) -> bool {
        if column == 0 || column > self.values.len() {
            return false;
        }
        self.values[column - 1] = Some(value.into());
        true
    }

    /// Value of the counter with the given id.
    pub fn value(&self, op_id: usize) -> Option<&str> {
        self.values.get(op_id)?.as_deref()
    }
}

/// A grid of operation counters.
///
/// Row 0 is always the aggregate row; the following rows are per host in
/// the order the server sent them. Column 0 holds the row label and column
/// `id + 1` the counter with that id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatTable {
    pub family: OpFamily,
    pub rows: Vec<StatRow>,
}

impl StatTable {
    /// Create an empty table for the given counter family.
    pub fn new(family: OpFamily) -> Self {
        Self {
            family,
            rows: Vec::new(),
        }
    }

    /// The placeholder table used when the response carried no statistics.
    pub fn no_data(family: OpFamily) -> Self {
        let mut table = Self::new(family);
        table.push_row(NO_IO_LABEL);
        table
    }

    /// Append a row and return it for filling.
    pub fn push_row(&mut self, label: impl Into<String>) -> &mut StatRow {
        let op_count = self.family.op_count();
        self.rows.push(StatRow::new(label, op_count));
        let last = self.rows.len() - 1;
        &mut self.rows[last]
    }

    /// Number of columns including the label column.
    pub fn column_count(&self) -> usize {
        self.family.column_count()
    }

    /// Number of rows including the aggregate row.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether this is the placeholder table of a response without data.
    pub fn has_data(&self) -> bool {
        self.rows.first().is_some_and(|row| row.label != NO_IO_LABEL)
    }

    /// The per-host rows.
    pub fn hosts(&self) -> &[StatRow] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Cell text at a grid position, with column 0 being the row label.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        let row = self.rows.get(row)?;
        match column {
            0 => Some(row.label.as_str()),
            c => row.value(c - 1),
        }
    }

    /// Numeric value of a named counter in a row.
    pub fn counter(&self, row: usize, op_name: &str) -> Option<u64> {
        let op_id = self.family.op_id(op_name)?;
        self.rows.get(row)?.value(op_id)?.trim().parse().ok()
    }

    /// Column headers: an empty label column followed by the counter names.
    pub fn headers(&self) -> Vec<&'static str> {
        std::iter::once("").chain(self.family.op_names().iter().copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_column_bounds() {
        let mut table = StatTable::new(OpFamily::Storage);
        let row = table.push_row(SUM_LABEL);

        assert!(row.set_column(1, "10"));
        assert!(row.set_column(20, "5"));
        assert!(!row.set_column(0, "label"));
        assert!(!row.set_column(21, "overflow"));

        assert_eq!(table.cell(0, 0), Some("sum"));
        assert_eq!(table.cell(0, 1), Some("10"));
        assert_eq!(table.cell(0, 20), Some("5"));
        assert_eq!(table.cell(0, 2), None);
        assert_eq!(table.cell(0, 21), None);
    }

    #[test]
    fn test_counter_lookup() {
        let mut table = StatTable::new(OpFamily::Storage);
        table.push_row(SUM_LABEL).set_column(13, "1200");
        table.push_row("10.0.0.1").set_column(13, " 300 ");

        assert_eq!(table.counter(0, "ops-wr"), Some(1200));
        assert_eq!(table.counter(1, "ops-wr"), Some(300));
        assert_eq!(table.counter(1, "ops-rd"), None);
        assert_eq!(table.hosts().len(), 1);
    }

    #[test]
    fn test_no_data_table() {
        let table = StatTable::no_data(OpFamily::Metadata);
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.cell(0, 0), Some(NO_IO_LABEL));
        assert!(!table.has_data());
        assert!(table.hosts().is_empty());
    }

    #[test]
    fn test_headers() {
        let table = StatTable::new(OpFamily::Metadata);
        let headers = table.headers();
        assert_eq!(headers.len(), table.column_count());
        assert_eq!(headers[1], "sum");
    }
}
