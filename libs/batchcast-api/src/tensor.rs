use ndarray::{ArrayD, IxDyn};

use crate::error::TransformError;
use crate::value::Value;

/// Element type of a `Tensor`.
///
/// Ordered by promotion rank: mixing kinds in one nested sequence
/// yields the highest of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DType {
    Bool,
    Int64,
    Float32,
}

/// Numeric n-dimensional array, tagged by element type.
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    Bool(ArrayD<bool>),
    Int64(ArrayD<i64>),
    Float32(ArrayD<f32>),
}

impl Tensor {
    pub fn dtype(&self) -> DType {
        match self {
            Tensor::Bool(_) => DType::Bool,
            Tensor::Int64(_) => DType::Int64,
            Tensor::Float32(_) => DType::Float32,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Tensor::Bool(a) => a.shape(),
            Tensor::Int64(a) => a.shape(),
            Tensor::Float32(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            Tensor::Float32(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&ArrayD<i64>> {
        match self {
            Tensor::Int64(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<&ArrayD<bool>> {
        match self {
            Tensor::Bool(a) => Some(a),
            _ => None,
        }
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(a: ArrayD<f32>) -> Self {
        Tensor::Float32(a)
    }
}

impl From<ArrayD<i64>> for Tensor {
    fn from(a: ArrayD<i64>) -> Self {
        Tensor::Int64(a)
    }
}

impl From<ArrayD<bool>> for Tensor {
    fn from(a: ArrayD<bool>) -> Self {
        Tensor::Bool(a)
    }
}

#[derive(Clone, Copy)]
enum Leaf {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Leaf {
    fn dtype(self) -> DType {
        match self {
            Leaf::Bool(_) => DType::Bool,
            Leaf::Int(_) => DType::Int64,
            Leaf::Float(_) => DType::Float32,
        }
    }

    fn as_i64(self) -> i64 {
        match self {
            Leaf::Bool(b) => i64::from(b),
            Leaf::Int(i) => i,
            Leaf::Float(f) => f as i64,
        }
    }

    fn as_f32(self) -> f32 {
        match self {
            Leaf::Bool(b) => f32::from(u8::from(b)),
            Leaf::Int(i) => i as f32,
            Leaf::Float(f) => f as f32,
        }
    }
}

/// Generic numeric tensor construction.
///
/// - `Bool` / `Int64` / `Float64` → 0-d tensor (`Float64` narrows to float32).
/// - `Array` → shape taken from the nesting; ragged nesting is rejected.
///   Element type is promoted bool < int64 < float32; an empty array is
///   float32 of shape `[0]`.
/// - `Tensor` → an equal tensor. Inside an `Array`, only 0-d tensors are
///   accepted, as scalars; higher-rank tensor elements are rejected.
/// - Anything else has no numeric form.
impl TryFrom<&Value> for Tensor {
    type Error = TransformError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        if let Value::Tensor(t) = value {
            return Ok(t.clone());
        }

        // The guessed shape is only trusted once every leaf matched it.
        let shape = nested_shape(value);
        let mut leaves = Vec::new();
        collect_leaves(value, &shape, &mut leaves)?;

        let dtype = leaves
            .iter()
            .map(|l| l.dtype())
            .max()
            .unwrap_or(DType::Float32);
        let dim = IxDyn(&shape);

        let tensor = match dtype {
            DType::Bool => Tensor::Bool(ArrayD::from_shape_vec(
                dim,
                leaves.iter().map(|l| l.as_i64() != 0).collect(),
            )?),
            DType::Int64 => Tensor::Int64(ArrayD::from_shape_vec(
                dim,
                leaves.iter().map(|l| l.as_i64()).collect(),
            )?),
            DType::Float32 => Tensor::Float32(ArrayD::from_shape_vec(
                dim,
                leaves.iter().map(|l| l.as_f32()).collect(),
            )?),
        };
        Ok(tensor)
    }
}

impl TryFrom<Value> for Tensor {
    type Error = TransformError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Tensor(t) => Ok(t),
            other => Tensor::try_from(&other),
        }
    }
}

/// Shape implied by following the first element of every nesting level.
fn nested_shape(value: &Value) -> Vec<usize> {
    let mut shape = Vec::new();
    let mut current = value;
    while let Value::Array(items) = current {
        shape.push(items.len());
        match items.first() {
            Some(first) => current = first,
            None => break,
        }
    }
    shape
}

fn collect_leaves(
    value: &Value,
    shape: &[usize],
    out: &mut Vec<Leaf>,
) -> Result<(), TransformError> {
    match (shape.split_first(), value) {
        (Some((&len, rest)), Value::Array(items)) => {
            if items.len() != len {
                return Err(TransformError::conversion(format!(
                    "ragged nested sequence: expected {len} elements, found {}",
                    items.len()
                )));
            }
            items.iter().try_for_each(|item| collect_leaves(item, rest, out))
        }
        (Some(_), other) => Err(TransformError::conversion(format!(
            "ragged nested sequence: expected array, found {}",
            other.type_name()
        ))),
        (None, Value::Bool(b)) => {
            out.push(Leaf::Bool(*b));
            Ok(())
        }
        (None, Value::Int64(i)) => {
            out.push(Leaf::Int(*i));
            Ok(())
        }
        (None, Value::Float64(f)) => {
            out.push(Leaf::Float(*f));
            Ok(())
        }
        (None, Value::Array(_)) => Err(TransformError::conversion(
            "ragged nested sequence: expected scalar, found array",
        )),
        (None, Value::Tensor(t)) => {
            let leaf = scalar_leaf(t).ok_or_else(|| {
                TransformError::conversion(format!(
                    "nested tensor of shape {:?} is not a scalar",
                    t.shape()
                ))
            })?;
            out.push(leaf);
            Ok(())
        }
        (None, other) => Err(TransformError::conversion(format!(
            "{} value has no numeric tensor representation",
            other.type_name()
        ))),
    }
}

/// The single element of a 0-d tensor.
fn scalar_leaf(tensor: &Tensor) -> Option<Leaf> {
    if tensor.ndim() != 0 {
        return None;
    }
    match tensor {
        Tensor::Bool(a) => a.iter().next().map(|&b| Leaf::Bool(b)),
        Tensor::Int64(a) => a.iter().next().map(|&i| Leaf::Int(i)),
        Tensor::Float32(a) => a.iter().next().map(|&f| Leaf::Float(f64::from(f))),
    }
}
