use std::fmt;

/// Error kind for transform errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Plugin configuration is invalid.
    Config,
    /// Encoded image bytes are malformed, unsupported or missing.
    Decode,
    /// A sample has no numeric tensor representation, or does not match
    /// the kind of its field.
    Conversion,
    /// A field schema declaration could not be understood.
    Schema,
}

/// Transform error, returned by `BatchTransform::apply` and friends.
#[derive(Debug)]
pub struct TransformError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TransformError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Decode, message: msg.into() }
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Conversion, message: msg.into() }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Schema, message: msg.into() }
    }

    /// Add context to the error, preserving the original ErrorKind.
    ///
    /// Produces: `"context: original message"`.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        Self {
            kind: self.kind,
            message: format!("{ctx}: {}", self.message),
        }
    }

    pub fn is_decode(&self) -> bool {
        self.kind == ErrorKind::Decode
    }

    pub fn is_conversion(&self) -> bool {
        self.kind == ErrorKind::Conversion
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransformError {}

// ---------------------------------------------------------------------------
// From impls: library error types → TransformError with correct ErrorKind
// ---------------------------------------------------------------------------

impl From<image::ImageError> for TransformError {
    fn from(e: image::ImageError) -> Self {
        Self::decode(e.to_string())
    }
}

impl From<ndarray::ShapeError> for TransformError {
    fn from(e: ndarray::ShapeError) -> Self {
        Self::conversion(e.to_string())
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(e: serde_json::Error) -> Self {
        Self::schema(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_kind() {
        let err = TransformError::decode("bad header").with_context("sample 3");
        assert!(err.is_decode());
        assert_eq!(err.message, "sample 3: bad header");
        assert_eq!(err.to_string(), "Decode: sample 3: bad header");
    }

    #[test]
    fn image_errors_are_decode_errors() {
        let err: TransformError = image::load_from_memory(b"not-an-image").unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::Decode);
    }
}
