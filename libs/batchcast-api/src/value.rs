use image::DynamicImage;

use crate::tensor::Tensor;

/// Key under which encoded image records carry their raw bytes.
pub const DEFAULT_BYTES_KEY: &str = "bytes";

/// One sample of one field in a `RecordBatch`.
///
/// Variants by role:
/// - `Image`: decoded pixel grid.
/// - `Map`: generic mapping; an encoded image record is a `Map` with a
///   bytes entry (`{"bytes": ..., "path": ...}`).
/// - `Null`: absent value.
/// - `Bool`, `Int64`, `Float64`, `Array`: scalar or array-like.
/// - `String`, `Bytes`: carried through, no numeric form.
/// - `Tensor`: already converted.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),

    /// Recursive: nested sequences.
    Array(Vec<Value>),
    /// Ordered key/value pairs. Keys are unique.
    Map(Vec<(String, Value)>),

    Image(DynamicImage),
    Tensor(Tensor),
}

impl Value {
    /// Build an encoded image record: `{"bytes": <bytes>, "path": null}`.
    pub fn encoded_image(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Map(vec![
            (DEFAULT_BYTES_KEY.to_string(), Value::Bytes(bytes.into())),
            ("path".to_string(), Value::Null),
        ])
    }

    /// Short variant name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Image(_) => "image",
            Value::Tensor(_) => "tensor",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Look up `key` in a `Map`. `None` for other variants or a missing key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// True for a `Map` holding `bytes_key`.
    pub fn is_encoded_image(&self, bytes_key: &str) -> bool {
        self.get(bytes_key).is_some()
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<DynamicImage> for Value {
    fn from(v: DynamicImage) -> Self {
        Value::Image(v)
    }
}

impl From<Tensor> for Value {
    fn from(v: Tensor) -> Self {
        Value::Tensor(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
