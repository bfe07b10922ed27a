use batchcast_engine::config::{BatchcastConfig, ConfigParser};
use batchcast_engine::error::EngineError;

/// HCL config loader, e.g.
///
/// ```hcl
/// name = "train"
///
/// transform {
///   name   = "image-tensor"
///   plugin = "target/release/libbatchcast_transform_image_tensor.so"
///   config = {
///     scale_pixels = true
///   }
/// }
/// ```
pub struct HclParser;

impl ConfigParser for HclParser {
    fn extensions(&self) -> &[&str] {
        &["hcl"]
    }

    fn parse(&self, content: &str) -> Result<BatchcastConfig, EngineError> {
        hcl::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
    }
}
