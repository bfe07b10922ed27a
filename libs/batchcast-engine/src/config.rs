use std::path::Path;

use serde::Deserialize;

use crate::error::EngineError;

/// Root configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchcastConfig {
    /// Pipeline name (for logs).
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    /// Transform plugin to install. `None` → batches pass through as-is.
    #[serde(default)]
    pub transform: Option<TransformConfig>,
}

fn default_pipeline_name() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransformConfig {
    pub name: String,
    /// Path to the transform .so plugin.
    pub plugin: String,
    /// Plugin parameters, validated against the plugin's declarations.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

/// Config file format loader, selected by file extension.
pub trait ConfigParser: Send + Sync {
    fn extensions(&self) -> &[&str];
    fn parse(&self, content: &str) -> Result<BatchcastConfig, EngineError>;
}

pub struct TomlParser;

impl ConfigParser for TomlParser {
    fn extensions(&self) -> &[&str] {
        &["toml"]
    }

    fn parse(&self, content: &str) -> Result<BatchcastConfig, EngineError> {
        toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
    }
}

impl BatchcastConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        Self::load_with(path, &[&TomlParser])
    }

    /// Load configuration with the first parser claiming the file's extension.
    pub fn load_with(
        path: impl AsRef<Path>,
        parsers: &[&dyn ConfigParser],
    ) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let parser = parsers
            .iter()
            .find(|p| p.extensions().contains(&ext))
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "{}: no config parser for extension '{ext}'",
                    path.display()
                ))
            })?;

        let content = std::fs::read_to_string(path)?;
        parser
            .parse(&content)
            .map_err(|e| e.with_context(path.display()))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        TomlParser.parse(toml_str)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
name = "train"

[transform]
name = "image-tensor"
plugin = "target/release/libbatchcast_transform_image_tensor.so"

[transform.config]
bytes_key = "bytes"
scale_pixels = false
schema = { "observation.image" = "encoded_image" }
"#;

    #[test]
    fn parses_transform_section() {
        let config = BatchcastConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.name, "train");

        let transform = config.transform.unwrap();
        assert_eq!(transform.name, "image-tensor");
        let params = transform.config.unwrap();
        assert_eq!(params["scale_pixels"], serde_json::json!(false));
        assert_eq!(
            params["schema"],
            serde_json::json!({"observation.image": "encoded_image"})
        );
    }

    #[test]
    fn empty_config_has_defaults() {
        let config = BatchcastConfig::parse("").unwrap();
        assert_eq!(config.name, "default");
        assert!(config.transform.is_none());
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = BatchcastConfig::parse("[transform]\nname = 3").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = BatchcastConfig::load(file.path()).unwrap();
        assert_eq!(config.name, "train");
    }

    #[test]
    fn unreadable_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BatchcastConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)), "{err}");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = BatchcastConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("no config parser"), "{err}");
    }
}
