use std::collections::BTreeMap;

use crate::batch::RecordBatch;
use crate::error::TransformError;
use crate::value::Value;

/// How the samples of one field are converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Decoded images → channel-first float tensors.
    Image,
    /// `{"bytes": ...}` records → decode, then as `Image`.
    EncodedImage,
    /// Left untouched.
    Absent,
    /// Scalars and nested sequences → numeric tensors.
    Numeric,
}

impl FieldKind {
    /// Derive the kind of a field from its first sample.
    ///
    /// A field without samples has nothing to convert and is `Absent`.
    pub fn sniff(first: Option<&Value>, bytes_key: &str) -> Self {
        match first {
            None | Some(Value::Null) => FieldKind::Absent,
            Some(Value::Image(_)) => FieldKind::Image,
            Some(v) if v.is_encoded_image(bytes_key) => FieldKind::EncodedImage,
            Some(_) => FieldKind::Numeric,
        }
    }
}

/// Field name → kind.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct BatchSchema {
    fields: BTreeMap<String, FieldKind>,
}

impl BatchSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(field.into(), kind);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, kind: FieldKind) {
        self.fields.insert(field.into(), kind);
    }

    pub fn kind(&self, field: &str) -> Option<FieldKind> {
        self.fields.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FieldKind)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Derive a schema once from the first sample of every field.
    pub fn infer(batch: &RecordBatch, bytes_key: &str) -> Self {
        Self {
            fields: batch
                .iter()
                .map(|(field, values)| {
                    (field.to_string(), FieldKind::sniff(values.first(), bytes_key))
                })
                .collect(),
        }
    }

    /// Entries of `other` override entries of `self`.
    pub fn merge(mut self, other: BatchSchema) -> Self {
        self.fields.extend(other.fields);
        self
    }

    /// Parse an explicit declaration: `{"field": "encoded_image", ...}`.
    pub fn from_json_str(s: &str) -> Result<Self, TransformError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_features_str(s: &str) -> Result<Self, TransformError> {
        let features: serde_json::Value = serde_json::from_str(s)?;
        Self::from_features(&features)
    }

    /// Derive kinds from a Hugging Face `datasets` feature declaration,
    /// e.g. `{"observation.image": {"_type": "Image"}, "index": {"_type": "Value", "dtype": "int64"}}`.
    pub fn from_features(features: &serde_json::Value) -> Result<Self, TransformError> {
        let obj = features
            .as_object()
            .ok_or_else(|| TransformError::schema("features must be an object"))?;

        let mut schema = Self::new();
        for (name, feature) in obj {
            let kind = feature_kind(feature).map_err(|e| e.with_context(format!("feature '{name}'")))?;
            schema.set(name.clone(), kind);
        }
        Ok(schema)
    }
}

fn feature_kind(feature: &serde_json::Value) -> Result<FieldKind, TransformError> {
    // Legacy list form: `[inner]` is a sequence of `inner`.
    if let Some(items) = feature.as_array() {
        return match items.first() {
            Some(inner) => sequence_kind(inner),
            None => Err(TransformError::schema("empty list feature")),
        };
    }

    let obj = feature
        .as_object()
        .ok_or_else(|| TransformError::schema("feature must be an object or a list"))?;

    let Some(ty) = obj.get("_type").and_then(|t| t.as_str()) else {
        // Nested dict of sub-features.
        return Ok(FieldKind::Absent);
    };

    match ty {
        "Image" => Ok(FieldKind::EncodedImage),
        "Value" | "Array2D" | "Array3D" | "Array4D" | "Array5D" => {
            let dtype = obj.get("dtype").and_then(|d| d.as_str()).unwrap_or_default();
            Ok(dtype_kind(dtype))
        }
        "ClassLabel" => Ok(FieldKind::Numeric),
        "Sequence" | "List" | "LargeList" => match obj.get("feature") {
            Some(inner) => sequence_kind(inner),
            None => Err(TransformError::schema(format!("{ty} feature without inner 'feature'"))),
        },
        "VideoFrame" | "Video" | "Audio" | "Translation" | "TranslationVariableLanguages" => {
            Ok(FieldKind::Absent)
        }
        other => Err(TransformError::schema(format!("unknown feature type '{other}'"))),
    }
}

fn sequence_kind(inner: &serde_json::Value) -> Result<FieldKind, TransformError> {
    Ok(match feature_kind(inner)? {
        FieldKind::Numeric => FieldKind::Numeric,
        _ => FieldKind::Absent,
    })
}

fn dtype_kind(dtype: &str) -> FieldKind {
    match dtype {
        "" | "null" | "string" | "large_string" | "binary" | "large_binary" => FieldKind::Absent,
        _ => FieldKind::Numeric,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DEFAULT_BYTES_KEY;

    #[test]
    fn sniff_looks_at_first_sample_only() {
        let k = |v: Option<&Value>| FieldKind::sniff(v, DEFAULT_BYTES_KEY);
        assert_eq!(k(None), FieldKind::Absent);
        assert_eq!(k(Some(&Value::Null)), FieldKind::Absent);
        assert_eq!(k(Some(&Value::encoded_image(vec![0u8]))), FieldKind::EncodedImage);
        assert_eq!(k(Some(&Value::Int64(3))), FieldKind::Numeric);
        assert_eq!(k(Some(&Value::Map(vec![]))), FieldKind::Numeric);
        let img = image::DynamicImage::new_rgb8(1, 1);
        assert_eq!(k(Some(&Value::Image(img))), FieldKind::Image);
    }

    #[test]
    fn infer_and_merge() {
        let batch = RecordBatch::new()
            .with_column("image", vec![Value::encoded_image(vec![0u8])])
            .with_column("label", vec![Value::Int64(3), Value::Null])
            .with_column("mask", vec![Value::Null, Value::Int64(1)]);
        let inferred = BatchSchema::infer(&batch, DEFAULT_BYTES_KEY);
        assert_eq!(inferred.kind("image"), Some(FieldKind::EncodedImage));
        assert_eq!(inferred.kind("label"), Some(FieldKind::Numeric));
        assert_eq!(inferred.kind("mask"), Some(FieldKind::Absent));

        let merged = inferred.merge(BatchSchema::new().with_field("mask", FieldKind::Numeric));
        assert_eq!(merged.kind("mask"), Some(FieldKind::Numeric));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn explicit_declaration_from_json() {
        let schema =
            BatchSchema::from_json_str(r#"{"observation.image": "encoded_image", "done": "numeric"}"#)
                .unwrap();
        assert_eq!(schema.kind("observation.image"), Some(FieldKind::EncodedImage));
        assert_eq!(schema.kind("done"), Some(FieldKind::Numeric));

        let err = BatchSchema::from_json_str(r#"{"x": "pixels"}"#).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Schema);
    }

    #[test]
    fn kinds_from_dataset_features() {
        let features = serde_json::json!({
            "observation.image": {"_type": "Image"},
            "observation.state": {
                "_type": "Sequence",
                "feature": {"_type": "Value", "dtype": "float32"},
                "length": 8
            },
            "timestamp": {"_type": "Value", "dtype": "float32"},
            "task": {"_type": "Value", "dtype": "string"},
            "observation.video": {"_type": "VideoFrame"},
            "tags": [{"_type": "Value", "dtype": "string"}],
            "episode": {"_type": "ClassLabel", "names": ["a", "b"]}
        });
        let schema = BatchSchema::from_features(&features).unwrap();
        assert_eq!(schema.kind("observation.image"), Some(FieldKind::EncodedImage));
        assert_eq!(schema.kind("observation.state"), Some(FieldKind::Numeric));
        assert_eq!(schema.kind("timestamp"), Some(FieldKind::Numeric));
        assert_eq!(schema.kind("task"), Some(FieldKind::Absent));
        assert_eq!(schema.kind("observation.video"), Some(FieldKind::Absent));
        assert_eq!(schema.kind("tags"), Some(FieldKind::Absent));
        assert_eq!(schema.kind("episode"), Some(FieldKind::Numeric));
    }

    #[test]
    fn unknown_feature_type_is_a_schema_error() {
        let features = serde_json::json!({"pointcloud": {"_type": "PointCloud"}});
        let err = BatchSchema::from_features(&features).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Schema);
        assert!(err.message.contains("pointcloud"), "{err}");
    }
}
