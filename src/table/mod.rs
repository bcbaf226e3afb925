//! Decision tables: ordered rows of literal or wildcard cells, queried with
//! first-match-wins semantics.

mod source;

use crate::ast::Value;
use crate::error::{LookupError, TableError};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Cell text that matches any looked-up value.
pub const WILDCARD: &str = "*";

/// A single table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Literal(Value),
    Wildcard,
}

impl Cell {
    pub fn matches(&self, wanted: &Value) -> bool {
        match self {
            Cell::Wildcard => true,
            Cell::Literal(value) => value == wanted,
        }
    }

    /// The value carried by the cell; wildcards carry none.
    pub fn value(&self) -> Value {
        match self {
            Cell::Literal(value) => value.clone(),
            Cell::Wildcard => Value::Null,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Literal(value) => value.to_json(),
            Cell::Wildcard => serde_json::Value::String(WILDCARD.to_string()),
        }
    }
}

/// An ordered set of rows sharing one set of named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl DecisionTable {
    /// Builds a table, checking that column names are unique and rows are not ragged.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        if columns.is_empty() {
            return Err(TableError::NoColumns);
        }
        if let Some(duplicate) = columns.iter().duplicates().next() {
            return Err(TableError::DuplicateColumn(duplicate.clone()));
        }
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    row: index,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Returns an error naming the first of `columns` the table does not have.
    pub fn require_columns<'c>(
        &self,
        columns: impl IntoIterator<Item = &'c str>,
    ) -> Result<(), TableError> {
        for column in columns {
            if self.column_index(column).is_none() {
                return Err(TableError::UnknownColumn(column.to_string()));
            }
        }
        Ok(())
    }

    /// Finds the first row, in table order, whose cells match every key value.
    ///
    /// Only the key columns take part in matching; wildcard cells match
    /// anything, so a trailing all-wildcard row acts as the default.
    pub fn lookup(&self, wanted: &[(&str, &Value)]) -> Result<usize, LookupError> {
        let keys = wanted
            .iter()
            .map(|(column, value)| {
                self.column_index(column)
                    .map(|index| (index, *value))
                    .ok_or_else(|| LookupError::MissingKey(column.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.rows
            .iter()
            .position(|row| keys.iter().all(|(index, value)| row[*index].matches(value)))
            .ok_or_else(|| LookupError::NoMatch {
                keys: wanted
                    .iter()
                    .map(|(column, value)| format!("{}={}", column, value))
                    .join(", "),
            })
    }

    /// The value of `column` in row `row`, or `None` if either is out of range.
    pub fn value(&self, row: usize, column: &str) -> Option<Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|cells| cells[index].value())
    }

    /// JSON form accepted by the `table_lookup` node: a header plus array rows.
    pub fn to_json(&self) -> (serde_json::Value, serde_json::Value) {
        let columns = serde_json::Value::from(self.columns.clone());
        let rows = self
            .rows
            .iter()
            .map(|row| serde_json::Value::Array(row.iter().map(Cell::to_json).collect()))
            .collect::<Vec<_>>();
        (columns, serde_json::Value::Array(rows))
    }
}
