use std::sync::Arc;

use batchcast_api::batch::RecordBatch;
use batchcast_api::error::TransformError;
use batchcast_api::transform::BatchTransform;

use crate::config::BatchcastConfig;
use crate::error::EngineError;
use crate::host::{Installation, TransformHost, install_plugin};

/// Reference `TransformHost`: hands every materialized batch to the active
/// transform, or passes it through untouched when none is installed.
pub struct BatchPipeline {
    name: String,
    transform: Option<Arc<dyn BatchTransform>>,
}

impl std::fmt::Debug for BatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPipeline")
            .field("name", &self.name)
            .field("transform", &self.transform_name())
            .finish()
    }
}

impl BatchPipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: None,
        }
    }

    /// Create the pipeline and best-effort install the configured transform.
    pub fn bootstrap(config: &BatchcastConfig) -> Result<(Self, Installation), EngineError> {
        let mut pipeline = Self::new(config.name.clone());
        let installation = match &config.transform {
            Some(transform) => install_plugin(Some(&mut pipeline), transform)?,
            None => {
                tracing::info!(pipeline = %pipeline.name, "no transform configured");
                Installation::Unavailable
            }
        };
        Ok((pipeline, installation))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform_name(&self) -> Option<&str> {
        self.transform.as_deref().map(|t| t.name())
    }

    /// Run the active transform over `batch`.
    pub fn materialize(&self, mut batch: RecordBatch) -> Result<RecordBatch, TransformError> {
        if let Some(transform) = &self.transform {
            transform.apply(&mut batch).map_err(|e| {
                tracing::error!(
                    pipeline = %self.name,
                    transform = %transform.name(),
                    error = %e,
                    "batch transform failed"
                );
                e
            })?;
        }
        Ok(batch)
    }
}

impl TransformHost for BatchPipeline {
    fn host_name(&self) -> &str {
        &self.name
    }

    fn set_batch_transform(
        &mut self,
        transform: Arc<dyn BatchTransform>,
    ) -> Option<Arc<dyn BatchTransform>> {
        self.transform.replace(transform)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use batchcast_api::value::Value;
    use batchcast_transform_image_tensor::ImageTensorTransform;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    use super::*;
    use crate::host::install;

    fn png_pixel() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1, 1, Rgb([10, 20, 30])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn passes_through_without_transform() {
        let pipeline = BatchPipeline::new("eval");
        let batch = RecordBatch::new().with_column("image", vec![Value::encoded_image(png_pixel())]);
        assert_eq!(pipeline.materialize(batch.clone()).unwrap(), batch);
    }

    #[test]
    fn materializes_with_installed_transform() {
        let mut pipeline = BatchPipeline::new("train");
        install(Some(&mut pipeline), Arc::new(ImageTensorTransform::new()));

        let batch = RecordBatch::new()
            .with_column("image", vec![Value::encoded_image(png_pixel())])
            .with_column("label", vec![Value::from(vec![3i64])])
            .with_column("mask", vec![Value::Null]);
        let out = pipeline.materialize(batch).unwrap();

        assert_eq!(out.get("image").unwrap()[0].as_tensor().unwrap().shape(), &[3, 1, 1]);
        assert_eq!(out.get("label").unwrap()[0].as_tensor().unwrap().shape(), &[1]);
        assert_eq!(out.get("mask"), Some(&[Value::Null][..]));
    }

    #[test]
    fn transform_errors_propagate() {
        let mut pipeline = BatchPipeline::new("train");
        install(Some(&mut pipeline), Arc::new(ImageTensorTransform::new()));

        let batch = RecordBatch::new()
            .with_column("image", vec![Value::encoded_image(b"not-an-image".to_vec())]);
        let err = pipeline.materialize(batch).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn reinstall_replaces_previous_transform() {
        let mut pipeline = BatchPipeline::new("train");
        let first = pipeline.set_batch_transform(Arc::new(ImageTensorTransform::new()));
        assert!(first.is_none());
        let second = pipeline.set_batch_transform(Arc::new(ImageTensorTransform::new()));
        assert_eq!(second.map(|t| t.name().to_string()).as_deref(), Some("image-tensor"));
    }

    #[test]
    fn bootstrap_without_plugin_present() {
        let config = BatchcastConfig::parse(
            r#"
            name = "train"
            [transform]
            name = "image-tensor"
            plugin = "/nonexistent/libbatchcast_transform_image_tensor.so"
            "#,
        )
        .unwrap();
        let (pipeline, installation) = BatchPipeline::bootstrap(&config).unwrap();
        assert_eq!(installation, Installation::Unavailable);
        assert_eq!(pipeline.name(), "train");
        assert!(pipeline.transform_name().is_none());

        let (_, installation) = BatchPipeline::bootstrap(&BatchcastConfig::parse("").unwrap()).unwrap();
        assert_eq!(installation, Installation::Unavailable);
    }
}
