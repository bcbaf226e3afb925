use super::{Cell, DecisionTable, WILDCARD};
use crate::ast::Value;
use crate::error::TableError;

impl DecisionTable {
    /// Reads a table from CSV text whose first line is the header.
    ///
    /// Cells are typed on the way in: `*` is a wildcard, an empty cell is
    /// null, `true`/`false` are booleans, numeric text is a number and
    /// anything else stays a string.
    pub fn from_csv_str(text: &str) -> Result<Self, TableError> {
        Self::from_csv_reader(text.as_bytes(), b',')
    }

    pub fn from_csv_reader<R: std::io::Read>(reader: R, delimiter: u8) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns = reader
            .headers()
            .map_err(|e| TableError::Csv(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| match e.kind() {
                csv::ErrorKind::UnequalLengths {
                    expected_len, len, ..
                } => TableError::RaggedRow {
                    row: index,
                    expected: *expected_len as usize,
                    found: *len as usize,
                },
                _ => TableError::Csv(e.to_string()),
            })?;
            rows.push(record.iter().map(parse_csv_cell).collect());
        }

        Self::new(columns, rows)
    }

    /// Reads a table from JSON rows.
    ///
    /// With `columns`, every row must be an array in column order. Without
    /// them, rows must be objects and the columns are taken from the first row.
    pub fn from_json_rows(
        columns: Option<Vec<String>>,
        rows: &[serde_json::Value],
    ) -> Result<Self, TableError> {
        let columns = match columns {
            Some(columns) => columns,
            None => match rows.first() {
                Some(serde_json::Value::Object(first)) => first.keys().cloned().collect(),
                Some(_) => return Err(TableError::InvalidRow { row: 0 }),
                None => return Err(TableError::NoColumns),
            },
        };

        let mut parsed_rows = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let cells = match row {
                serde_json::Value::Array(values) => {
                    if values.len() != columns.len() {
                        return Err(TableError::RaggedRow {
                            row: index,
                            expected: columns.len(),
                            found: values.len(),
                        });
                    }
                    values
                        .iter()
                        .zip(&columns)
                        .map(|(value, column)| parse_json_cell(index, column, value))
                        .collect::<Result<Vec<_>, _>>()?
                }
                serde_json::Value::Object(map) => {
                    if map.len() != columns.len() {
                        return Err(TableError::RaggedRow {
                            row: index,
                            expected: columns.len(),
                            found: map.len(),
                        });
                    }
                    columns
                        .iter()
                        .map(|column| match map.get(column) {
                            Some(value) => parse_json_cell(index, column, value),
                            None => Err(TableError::InvalidCell {
                                row: index,
                                column: column.clone(),
                            }),
                        })
                        .collect::<Result<Vec<_>, _>>()?
                }
                _ => return Err(TableError::InvalidRow { row: index }),
            };
            parsed_rows.push(cells);
        }

        Self::new(columns, parsed_rows)
    }
}

fn parse_csv_cell(text: &str) -> Cell {
    if text == WILDCARD {
        return Cell::Wildcard;
    }
    let value = match text {
        "" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => text
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
    };
    Cell::Literal(value)
}

fn parse_json_cell(row: usize, column: &str, value: &serde_json::Value) -> Result<Cell, TableError> {
    if value.as_str() == Some(WILDCARD) {
        return Ok(Cell::Wildcard);
    }
    Value::from_json(value)
        .map(Cell::Literal)
        .ok_or_else(|| TableError::InvalidCell {
            row,
            column: column.to_string(),
        })
}
