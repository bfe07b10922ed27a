use std::collections::BTreeMap;

use crate::value::Value;

/// Column-oriented batch of dataset records.
///
/// Each field maps to one value per sample. Fields are kept sorted by name
/// so that iteration (and therefore conversion and error reporting) is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    columns: BTreeMap<String, Vec<Value>>,
}

impl RecordBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a column, returning the one it replaced.
    pub fn insert(&mut self, field: impl Into<String>, values: Vec<Value>) -> Option<Vec<Value>> {
        self.columns.insert(field.into(), values)
    }

    /// Builder form of `insert`.
    pub fn with_column(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.insert(field, values);
        self
    }

    pub fn get(&self, field: &str) -> Option<&[Value]> {
        self.columns.get(field).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Vec<Value>> {
        self.columns.get_mut(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Vec<Value>> {
        self.columns.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.columns.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of samples, taken from the longest column.
    pub fn num_rows(&self) -> usize {
        self.columns.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn into_columns(self) -> BTreeMap<String, Vec<Value>> {
        self.columns
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<Value>)> for RecordBatch {
    fn from_iter<I: IntoIterator<Item = (K, Vec<Value>)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl IntoIterator for RecordBatch {
    type Item = (String, Vec<Value>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<Value>>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_iterate_sorted() {
        let batch = RecordBatch::new()
            .with_column("label", vec![Value::Int64(1)])
            .with_column("action", vec![Value::Null, Value::Null]);
        assert_eq!(batch.fields().collect::<Vec<_>>(), ["action", "label"]);
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn insert_replaces_column() {
        let mut batch: RecordBatch = [("mask", vec![Value::Null])].into_iter().collect();
        let old = batch.insert("mask", vec![Value::Bool(true)]);
        assert_eq!(old, Some(vec![Value::Null]));
        assert_eq!(batch.get("mask"), Some(&[Value::Bool(true)][..]));
        assert!(batch.get("missing").is_none());
    }
}
