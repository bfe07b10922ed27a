use std::path::Path;
use std::sync::Arc;

use batchcast_api::transform::BatchTransform;

use crate::config::TransformConfig;
use crate::error::EngineError;
use crate::plugin_host;

/// A data-loading pipeline that accepts a batch transform from outside.
///
/// This is the whole integration contract: the pipeline calls the installed
/// transform on every batch it materializes.
pub trait TransformHost {
    /// Host name for logs.
    fn host_name(&self) -> &str;

    /// Make `transform` the active batch transform, returning the previous one.
    fn set_batch_transform(
        &mut self,
        transform: Arc<dyn BatchTransform>,
    ) -> Option<Arc<dyn BatchTransform>>;
}

/// Outcome of a best-effort install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Installation {
    Installed,
    /// Nothing to install into (or nothing to install). Not a fault.
    Unavailable,
}

impl Installation {
    pub fn is_installed(self) -> bool {
        self == Installation::Installed
    }
}

/// Install `transform` into `host`, if there is one.
pub fn install(
    host: Option<&mut dyn TransformHost>,
    transform: Arc<dyn BatchTransform>,
) -> Installation {
    let Some(host) = host else {
        tracing::warn!(transform = %transform.name(), "no transform host present, transform not installed");
        return Installation::Unavailable;
    };

    let previous = host.set_batch_transform(Arc::clone(&transform));
    tracing::info!(
        host = %host.host_name(),
        transform = %transform.name(),
        replaced = ?previous.as_ref().map(|p| p.name().to_string()),
        "installed batch transform"
    );
    Installation::Installed
}

/// Load the configured transform plugin and install it into `host`.
///
/// No host, or no plugin library at the configured path → `Unavailable`.
/// A plugin that exists but cannot be loaded or configured is an error.
pub fn install_plugin(
    host: Option<&mut dyn TransformHost>,
    config: &TransformConfig,
) -> Result<Installation, EngineError> {
    let Some(host) = host else {
        tracing::warn!(transform = %config.name, "no transform host present, plugin not loaded");
        return Ok(Installation::Unavailable);
    };

    let path = Path::new(&config.plugin);
    if !path.exists() {
        tracing::warn!(
            transform = %config.name,
            plugin = %config.plugin,
            "transform plugin not found, transform not installed"
        );
        return Ok(Installation::Unavailable);
    }

    let transform = plugin_host::load_transform(path, config.config.as_ref())
        .map_err(|e| e.with_context(format!("transform '{}'", config.name)))?;
    tracing::info!(transform = %config.name, plugin = %config.plugin, "loaded transform plugin");

    Ok(install(Some(host), Arc::new(transform)))
}

#[cfg(test)]
mod tests {
    use batchcast_transform_image_tensor::ImageTensorTransform;

    use super::*;
    use crate::pipeline::BatchPipeline;

    #[test]
    fn install_without_host_reports_unavailable() {
        let outcome = install(None, Arc::new(ImageTensorTransform::new()));
        assert_eq!(outcome, Installation::Unavailable);
        assert!(!outcome.is_installed());
    }

    #[test]
    fn install_into_pipeline() {
        let mut pipeline = BatchPipeline::new("train");
        let outcome = install(Some(&mut pipeline), Arc::new(ImageTensorTransform::new()));
        assert!(outcome.is_installed());
        assert_eq!(pipeline.transform_name(), Some("image-tensor"));
    }

    #[test]
    fn missing_plugin_file_is_not_a_fault() {
        let mut pipeline = BatchPipeline::new("train");
        let config = TransformConfig {
            name: "image-tensor".into(),
            plugin: "/nonexistent/libbatchcast_transform_image_tensor.so".into(),
            config: None,
        };
        let outcome = install_plugin(Some(&mut pipeline), &config).unwrap();
        assert_eq!(outcome, Installation::Unavailable);
        assert!(pipeline.transform_name().is_none());

        assert_eq!(install_plugin(None, &config).unwrap(), Installation::Unavailable);
    }

    #[test]
    fn unloadable_plugin_is_an_error() {
        let file = tempfile::Builder::new().suffix(".so").tempfile().unwrap();
        let mut pipeline = BatchPipeline::new("train");
        let config = TransformConfig {
            name: "broken".into(),
            plugin: file.path().display().to_string(),
            config: None,
        };
        let err = install_plugin(Some(&mut pipeline), &config).unwrap_err();
        assert!(err.to_string().contains("transform 'broken'"), "{err}");
        assert!(pipeline.transform_name().is_none());
    }
}
