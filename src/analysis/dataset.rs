//! Tabular analysis results.

use std::fmt;

/// A dataset column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub unit: String,
    /// Position within every row
    pub index: usize,
}

/// Rows captured for one sweep combination.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    /// Sweep assignment, e.g. `R2.r=1000`, or `default`
    pub title: String,
    pub rows: Vec<Vec<f64>>,
}

/// Columns plus rows grouped by sweep combination.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<Column>,
    groups: Vec<RowGroup>,
}

impl Dataset {
    /// Create an empty dataset with `(name, unit)` columns.
    pub fn new<I, N, U>(columns: I) -> Self
    where
        I: IntoIterator<Item = (N, U)>,
        N: Into<String>,
        U: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .enumerate()
                .map(|(index, (name, unit))| Column {
                    name: name.into(),
                    unit: unit.into(),
                    index,
                })
                .collect(),
            groups: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_groups(&self) -> &[RowGroup] {
        &self.groups
    }

    /// Start a new row group; following rows land in it.
    pub fn begin_group(&mut self, title: impl Into<String>) {
        self.groups.push(RowGroup {
            title: title.into(),
            rows: Vec::new(),
        });
    }

    /// Append a row to the current group, opening a `default` group if
    /// none exists.
    pub fn push_row(&mut self, row: Vec<f64>) {
        debug_assert_eq!(row.len(), self.columns.len());
        if self.groups.is_empty() {
            self.begin_group("default");
        }
        if let Some(group) = self.groups.last_mut() {
            group.rows.push(row);
        }
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Values of one column within one group.
    pub fn column(&self, group: usize, name: &str) -> Option<Vec<f64>> {
        let index = self.column_index(name)?;
        let group = self.groups.get(group)?;
        Some(group.rows.iter().map(|row| row[index]).collect())
    }

    /// Total number of rows across all groups.
    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            writeln!(f, "# {}", group.title)?;
            let header: Vec<String> = self
                .columns
                .iter()
                .map(|c| format!("{:>14}", format!("{}[{}]", c.name, c.unit)))
                .collect();
            writeln!(f, "{}", header.join(" "))?;
            for row in &group.rows {
                let cells: Vec<String> = row.iter().map(|v| format!("{:>14.6e}", v)).collect();
                writeln!(f, "{}", cells.join(" "))?;
            }
        }
        Ok(())
    }
}
