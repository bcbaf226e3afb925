use crate::ast::Value;
use crate::error::RecordError;
use ahash::AHashMap;
use std::fs;
use std::path::Path;

/// One input record: field name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: AHashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Builds a record from a JSON object whose values are all scalars.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, RecordError> {
        match value {
            serde_json::Value::Object(map) => Self::from_json_map(map),
            _ => Err(RecordError::NotAnObject(0)),
        }
    }

    pub fn from_json_map(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self, RecordError> {
        map.iter()
            .map(|(name, value)| {
                Value::from_json(value)
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| RecordError::UnsupportedValue(name.clone()))
            })
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut fields = self.fields.iter().collect::<Vec<_>>();
        fields.sort_by(|a, b| a.0.cmp(b.0));
        serde_json::Value::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl From<AHashMap<String, Value>> for Record {
    fn from(fields: AHashMap<String, Value>) -> Self {
        Self { fields }
    }
}

/// An ordered batch of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    records: Vec<Record>,
}

impl RecordBatch {
    pub fn from_records(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Row layout: `[{"a": 1, "b": 2}, {"a": 3, "b": 4}]`.
    pub fn from_rows(rows: &[serde_json::Value]) -> Result<Self, RecordError> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| match row {
                serde_json::Value::Object(map) => Record::from_json_map(map),
                _ => Err(RecordError::NotAnObject(index)),
            })
            .collect()
    }

    /// Column layout: `{"a": [1, 3], "b": [2, 4]}`. Every column must have
    /// the same length.
    pub fn from_columns(
        columns: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, RecordError> {
        let columns = columns
            .iter()
            .map(|(name, values)| match values {
                serde_json::Value::Array(values) => Ok((name, values)),
                _ => Err(RecordError::InvalidShape),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let expected = columns.first().map_or(0, |(_, values)| values.len());
        if let Some((name, values)) = columns.iter().find(|(_, values)| values.len() != expected) {
            return Err(RecordError::ColumnLengthMismatch {
                column: name.to_string(),
                expected,
                found: values.len(),
            });
        }

        (0..expected)
            .map(|row| {
                columns
                    .iter()
                    .map(|(name, values)| {
                        Value::from_json(&values[row])
                            .map(|value| (name.to_string(), value))
                            .ok_or_else(|| RecordError::UnsupportedValue(name.to_string()))
                    })
                    .collect::<Result<Record, _>>()
            })
            .collect()
    }

    /// Accepts either layout.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self, RecordError> {
        match value {
            serde_json::Value::Array(rows) => Self::from_rows(rows),
            serde_json::Value::Object(columns) => Self::from_columns(columns),
            _ => Err(RecordError::InvalidShape),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, RecordError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| RecordError::JsonParseError(e.to_string()))?;
        Self::from_json_value(&value)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| RecordError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }
}

impl FromIterator<Record> for RecordBatch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RecordBatch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
