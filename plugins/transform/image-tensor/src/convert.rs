use batchcast_api::batch::RecordBatch;
use batchcast_api::error::TransformError;
use batchcast_api::schema::{BatchSchema, FieldKind};
use batchcast_api::tensor::Tensor;
use batchcast_api::value::{DEFAULT_BYTES_KEY, Value};

use crate::pixels::{decode_image, image_to_tensor};

/// Knobs shared by every field conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Key holding raw bytes inside encoded image records.
    pub bytes_key: String,
    /// Divide integer pixel values into `[0, 1]`.
    pub scale_pixels: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            bytes_key: DEFAULT_BYTES_KEY.to_string(),
            scale_pixels: true,
        }
    }
}

/// Convert every field of `batch` into tensors, in place.
///
/// A field's kind comes from `schema`; fields the schema does not name are
/// sniffed once from their first sample. Converted columns are committed only
/// after every field succeeded, so on error `batch` is unchanged.
pub fn convert_batch(
    batch: &mut RecordBatch,
    schema: &BatchSchema,
    options: &ConvertOptions,
) -> Result<(), TransformError> {
    let mut converted = Vec::with_capacity(batch.len());

    for (field, values) in batch.iter() {
        let kind = schema
            .kind(field)
            .unwrap_or_else(|| FieldKind::sniff(values.first(), &options.bytes_key));

        let column = convert_column(kind, values, options)
            .map_err(|e| e.with_context(format!("field '{field}'")))?;

        match column {
            Some(column) => {
                tracing::debug!(field, kind = ?kind, samples = column.len(), "converted field");
                converted.push((field.to_string(), column));
            }
            None => tracing::trace!(field, "field left as is"),
        }
    }

    for (field, column) in converted {
        batch.insert(field, column);
    }
    Ok(())
}

/// Convert one column according to `kind`.
///
/// Returns `None` for `Absent` fields, which are left untouched.
pub fn convert_column(
    kind: FieldKind,
    values: &[Value],
    options: &ConvertOptions,
) -> Result<Option<Vec<Value>>, TransformError> {
    if kind == FieldKind::Absent {
        return Ok(None);
    }

    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            convert_sample(kind, value, options)
                .map(Value::Tensor)
                .map_err(|e| e.with_context(format!("sample {i}")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn convert_sample(
    kind: FieldKind,
    value: &Value,
    options: &ConvertOptions,
) -> Result<Tensor, TransformError> {
    match kind {
        FieldKind::Image => match value {
            Value::Image(img) => image_to_tensor(img, options.scale_pixels),
            other => Err(mismatch(kind, other)),
        },
        FieldKind::EncodedImage => {
            let bytes = encoded_bytes(value, &options.bytes_key)?;
            let img = decode_image(bytes)?;
            image_to_tensor(&img, options.scale_pixels)
        }
        FieldKind::Numeric => Tensor::try_from(value),
        FieldKind::Absent => Err(TransformError::conversion("absent fields are not converted")),
    }
}

fn encoded_bytes<'a>(value: &'a Value, bytes_key: &str) -> Result<&'a [u8], TransformError> {
    if !matches!(value, Value::Map(_)) {
        return Err(mismatch(FieldKind::EncodedImage, value));
    }
    match value.get(bytes_key) {
        Some(Value::Bytes(bytes)) => Ok(bytes),
        Some(Value::Null) | None => Err(TransformError::decode(format!(
            "encoded image record has no '{bytes_key}'"
        ))),
        Some(other) => Err(TransformError::decode(format!(
            "'{bytes_key}' holds {}, expected bytes",
            other.type_name()
        ))),
    }
}

fn mismatch(kind: FieldKind, value: &Value) -> TransformError {
    TransformError::conversion(format!(
        "{kind:?} field holds a {} sample",
        value.type_name()
    ))
}
