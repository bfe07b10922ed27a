//! Image-aware batch transform.
//!
//! Turns the fields of a `RecordBatch` into tensors: decoded images and
//! `{"bytes": ...}` encoded image records become `[C, H, W]` float tensors,
//! scalars and nested sequences become numeric tensors, absent fields stay
//! as they are.

pub mod convert;
pub mod pixels;

use batchcast_api::ConfigParams;
use batchcast_api::batch::RecordBatch;
use batchcast_api::config::ConfigValues;
use batchcast_api::error::TransformError;
use batchcast_api::schema::BatchSchema;
use batchcast_api::transform::BatchTransform;
use batchcast_api::value::DEFAULT_BYTES_KEY;

pub use convert::{ConvertOptions, convert_batch, convert_column};

/// Plugin configuration.
#[derive(ConfigParams, Debug, Clone, PartialEq)]
pub struct ImageTensorConfig {
    #[param(description = "Key holding the raw bytes inside encoded image records")]
    pub bytes_key: String,

    #[param(description = "Divide integer pixel values into [0, 1]")]
    pub scale_pixels: bool,

    #[param(description = "JSON object of declared field kinds, e.g. {\"image\": \"encoded_image\"}")]
    pub schema: String,

    #[param(description = "JSON of a datasets feature declaration to derive field kinds from")]
    pub features: String,
}

impl Default for ImageTensorConfig {
    fn default() -> Self {
        Self {
            bytes_key: DEFAULT_BYTES_KEY.to_string(),
            scale_pixels: true,
            schema: String::new(),
            features: String::new(),
        }
    }
}

/// Converts record batches into tensors. Stateless between batches.
#[derive(Debug, Clone, Default)]
pub struct ImageTensorTransform {
    schema: BatchSchema,
    options: ConvertOptions,
}

impl ImageTensorTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare field kinds up front. Undeclared fields are sniffed.
    pub fn with_schema(mut self, schema: BatchSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn from_config(values: &ConfigValues) -> Result<Self, TransformError> {
        Self::try_from(ImageTensorConfig::from_config(values)?)
    }

    pub fn schema(&self) -> &BatchSchema {
        &self.schema
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }
}

impl TryFrom<ImageTensorConfig> for ImageTensorTransform {
    type Error = TransformError;

    fn try_from(config: ImageTensorConfig) -> Result<Self, Self::Error> {
        if config.bytes_key.is_empty() {
            return Err(TransformError::config("bytes_key must not be empty"));
        }

        let mut schema = BatchSchema::new();
        if !config.features.is_empty() {
            schema = BatchSchema::from_features_str(&config.features)
                .map_err(|e| e.with_context("features"))?;
        }
        if !config.schema.is_empty() {
            let declared =
                BatchSchema::from_json_str(&config.schema).map_err(|e| e.with_context("schema"))?;
            schema = schema.merge(declared);
        }

        Ok(Self {
            schema,
            options: ConvertOptions {
                bytes_key: config.bytes_key,
                scale_pixels: config.scale_pixels,
            },
        })
    }
}

impl BatchTransform for ImageTensorTransform {
    fn name(&self) -> &str {
        "image-tensor"
    }

    fn apply(&self, batch: &mut RecordBatch) -> Result<(), TransformError> {
        convert_batch(batch, &self.schema, &self.options)
    }
}

// ---------------------------------------------------------------------------
// FFI exports for dynamic (.so) loading
// ---------------------------------------------------------------------------

batchcast_api::bc_abi_version_fn!();
batchcast_api::bc_config_params_fn!(ImageTensorConfig);
batchcast_api::bc_destroy_fn!();

/// # Safety
///
/// `config_ptr` must point to a valid `ConfigValues` owned by the engine.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn bc_create_transform(
    config_ptr: *const (),
) -> batchcast_api::ffi::PluginCreateResult {
    let config = unsafe { batchcast_api::ffi::config_from_ptr(config_ptr) };
    match ImageTensorTransform::from_config(config) {
        Ok(transform) => batchcast_api::ffi::plugin_ok(Box::new(
            Box::new(transform) as Box<dyn BatchTransform>,
        )),
        Err(e) => batchcast_api::ffi::plugin_err(&e.to_string()),
    }
}
