use crate::ast::Value;
use crate::error::EvaluationError;
use std::collections::BTreeMap;

/// What the terminal node of one traversal emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub output: Value,
    pub message: Value,
    pub extras: BTreeMap<String, Value>,
}

impl ResultRecord {
    pub fn new(output: Value) -> Self {
        Self {
            output,
            message: Value::Null,
            extras: BTreeMap::new(),
        }
    }

    /// `{"output": .., "message": .., ...extras}`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = self
            .extras
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        object.insert("output".to_string(), self.output.to_json());
        object.insert("message".to_string(), self.message.to_json());
        serde_json::Value::Object(object)
    }
}

/// Per-record outcomes of a batch, in input order.
#[derive(Debug, Clone)]
pub struct ResultBatch {
    rows: Vec<Result<ResultRecord, EvaluationError>>,
}

impl ResultBatch {
    pub fn new(rows: Vec<Result<ResultRecord, EvaluationError>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Result<ResultRecord, EvaluationError>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Result<ResultRecord, EvaluationError>> {
        self.rows
    }

    pub fn get(&self, index: usize) -> Option<&Result<ResultRecord, EvaluationError>> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Output of every slot; failed slots read as `Null`.
    pub fn outputs(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.as_ref().map_or(Value::Null, |r| r.output.clone()))
            .collect()
    }

    pub fn messages(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| row.as_ref().map_or(Value::Null, |r| r.message.clone()))
            .collect()
    }

    /// Records that were evaluated before the deadline, whether they succeeded or not.
    pub fn completed(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| !matches!(row, Err(EvaluationError::DeadlineExceeded)))
            .count()
    }

    pub fn failures(&self) -> Vec<(usize, &EvaluationError)> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(index, row)| row.as_ref().err().map(|e| (index, e)))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        self.rows.iter().any(Result::is_err)
    }

    /// Failed slots become `{"output": null, "message": null, "error": "<reason>"}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.rows
                .iter()
                .map(|row| match row {
                    Ok(result) => result.to_json(),
                    Err(e) => serde_json::json!({
                        "output": null,
                        "message": null,
                        "error": e.to_string(),
                    }),
                })
                .collect(),
        )
    }
}
