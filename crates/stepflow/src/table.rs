//! Tabular step arguments.

use std::fmt;

/// Error raised when a row does not fit the table header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("table row has {actual} cells but the header has {expected}")]
pub struct TableShapeError {
    /// Number of header cells.
    pub expected: usize,
    /// Number of cells in the rejected row.
    pub actual: usize,
}

/// A data table attached to a step: a header row followed by body rows.
///
/// # Examples
///
/// ```
/// use stepflow::Table;
///
/// let mut table = Table::new(["name", "age"]);
/// table.add_row(["Ada", "36"]).unwrap();
/// assert_eq!(table.row_count(), 1);
/// assert_eq!(table.cell(0, "age"), Some("36"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table with the given header.
    #[must_use]
    pub fn new<I, S>(header: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            header: header.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a body row.
    ///
    /// # Errors
    ///
    /// Returns [`TableShapeError`] when the row width differs from the header.
    pub fn add_row<I, S>(&mut self, row: I) -> Result<(), TableShapeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let row: Vec<String> = row.into_iter().map(Into::into).collect();
        if row.len() != self.header.len() {
            return Err(TableShapeError {
                expected: self.header.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Header cells.
    #[must_use]
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Body rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of body rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Look up a body cell by row index and column name.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.header.iter().position(|name| name == column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }
}

impl From<&gherkin::Table> for Table {
    fn from(table: &gherkin::Table) -> Self {
        let mut rows = table.rows.iter();
        let header = rows.next().cloned().unwrap_or_default();
        Self {
            header,
            rows: rows.cloned().collect(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in std::iter::once(&self.header).chain(&self.rows) {
            f.write_str("|")?;
            for cell in row {
                write!(f, " {cell} |")?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "test tables have valid shapes")]
mod tests {
    use super::*;

    #[test]
    fn rejects_rows_of_the_wrong_width() {
        let mut table = Table::new(["a", "b"]);
        let err = table.add_row(["only one"]).unwrap_err();
        assert_eq!(err, TableShapeError { expected: 2, actual: 1 });
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn renders_as_pipe_table() {
        let mut table = Table::new(["item"]);
        table.add_row(["cucumber"]).unwrap();
        assert_eq!(table.to_string(), "| item |\n| cucumber |\n");
    }

    #[test]
    fn gherkin_tables_split_header_from_body() {
        let source = gherkin::Table {
            rows: vec![
                vec!["k".to_string(), "v".to_string()],
                vec!["x".to_string(), "1".to_string()],
            ],
            span: gherkin::Span { start: 0, end: 0 },
            position: gherkin::LineCol { line: 0, col: 0 },
        };
        let table = Table::from(&source);
        assert_eq!(table.header(), ["k".to_string(), "v".to_string()]);
        assert_eq!(table.cell(0, "v"), Some("1"));
    }
}
