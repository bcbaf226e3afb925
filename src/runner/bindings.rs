use crate::ast::Value;
use crate::data::Record;
use ahash::AHashMap;

/// The environment of one traversal: the record's fields plus the values
/// computed so far, keyed by node id (and `node.column` for table extras).
pub(super) struct Bindings<'r> {
    record: &'r Record,
    values: AHashMap<String, Value>,
}

impl<'r> Bindings<'r> {
    pub(super) fn new(record: &'r Record) -> Self {
        Self {
            record,
            values: AHashMap::new(),
        }
    }

    pub(super) fn field(&self, name: &str) -> Value {
        self.record.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Null when the node was not visited in this traversal.
    pub(super) fn node(&self, id: &str) -> Value {
        self.values.get(id).cloned().unwrap_or(Value::Null)
    }

    pub(super) fn bind(&mut self, key: String, value: Value) {
        self.values.insert(key, value);
    }
}
