use std::collections::{HashMap, HashSet};
use std::path::Path;

use libloading::{Library, Symbol};

use batchcast_api::batch::RecordBatch;
use batchcast_api::config::{ConfigParam, ConfigValues, ParamType, ParamValue};
use batchcast_api::error::TransformError;
use batchcast_api::ffi::{
    AbiVersionFn, BC_ABI_VERSION, ConfigParamsFn, CreatePluginFn, DestroyPluginFn,
    PluginCreateResult,
};
use batchcast_api::transform::BatchTransform;

use crate::error::EngineError;

/// A loaded .so transform library with ABI version already verified.
pub struct PluginLib {
    _lib: Library,
    config_params_fn: ConfigParamsFn,
    create_fn: CreatePluginFn,
    destroy_fn: DestroyPluginFn,
}

impl PluginLib {
    /// Load a transform plugin from `path`, verify ABI version, resolve symbols.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            EngineError::Config(format!("failed to load plugin '{}': {e}", path.display()))
        })?;

        let abi_fn: Symbol<AbiVersionFn> =
            unsafe { lib.get(b"bc_abi_version") }.map_err(|e| missing(path, "bc_abi_version", e))?;

        let plugin_abi = unsafe { abi_fn() };
        if plugin_abi != BC_ABI_VERSION {
            return Err(EngineError::Config(format!(
                "plugin '{}' ABI version mismatch: plugin={plugin_abi}, host={BC_ABI_VERSION}",
                path.display()
            )));
        }

        let config_params_fn: ConfigParamsFn = *unsafe { lib.get::<ConfigParamsFn>(b"bc_config_params") }
            .map_err(|e| missing(path, "bc_config_params", e))?;
        let create_fn: CreatePluginFn = *unsafe { lib.get::<CreatePluginFn>(b"bc_create_transform") }
            .map_err(|e| missing(path, "bc_create_transform", e))?;
        let destroy_fn: DestroyPluginFn = *unsafe { lib.get::<DestroyPluginFn>(b"bc_destroy_transform") }
            .map_err(|e| missing(path, "bc_destroy_transform", e))?;

        Ok(Self {
            _lib: lib,
            config_params_fn,
            create_fn,
            destroy_fn,
        })
    }

    /// Get plugin's declared config parameters.
    pub fn config_params(&self) -> Vec<ConfigParam> {
        let ptr = unsafe { (self.config_params_fn)() };
        if ptr.is_null() {
            return Vec::new();
        }
        unsafe { *Box::from_raw(ptr as *mut Vec<ConfigParam>) }
    }

    /// Call the plugin's create function with validated ConfigValues.
    pub fn create(&self, config: &ConfigValues) -> Result<PluginTransform, EngineError> {
        let result: PluginCreateResult =
            unsafe { (self.create_fn)(config as *const ConfigValues as *const ()) };

        if result.plugin_ptr.is_null() {
            let msg = if !result.error_ptr.is_null() && result.error_len > 0 {
                // Take back the error string allocated by the plugin.
                let bytes = unsafe {
                    Box::from_raw(core::ptr::slice_from_raw_parts_mut(
                        result.error_ptr,
                        result.error_len,
                    ))
                };
                String::from_utf8_lossy(&bytes).into_owned()
            } else {
                "unknown error".to_string()
            };
            return Err(EngineError::Config(format!("plugin create failed: {msg}")));
        }

        Ok(PluginTransform {
            ptr: result.plugin_ptr as *mut Box<dyn BatchTransform>,
            destroy_fn: self.destroy_fn,
        })
    }
}

fn missing(path: &Path, symbol: &str, e: libloading::Error) -> EngineError {
    EngineError::Config(format!(
        "plugin '{}' missing {symbol} symbol: {e}",
        path.display()
    ))
}

/// A transform object owned by a plugin library.
///
/// Dropping it hands the object back to the plugin's `bc_destroy_transform`.
pub struct PluginTransform {
    ptr: *mut Box<dyn BatchTransform>,
    destroy_fn: DestroyPluginFn,
}

// The pointee is a `dyn BatchTransform`, which is `Send + Sync`, and is
// exclusively owned by this handle.
unsafe impl Send for PluginTransform {}
unsafe impl Sync for PluginTransform {}

impl PluginTransform {
    fn inner(&self) -> &dyn BatchTransform {
        unsafe { &**self.ptr }
    }
}

impl BatchTransform for PluginTransform {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn apply(&self, batch: &mut RecordBatch) -> Result<(), TransformError> {
        self.inner().apply(batch)
    }
}

impl Drop for PluginTransform {
    fn drop(&mut self) {
        unsafe { (self.destroy_fn)(self.ptr as *mut ()) }
    }
}

// ---------------------------------------------------------------------------
// Config parsing & validation (format-independent)
// ---------------------------------------------------------------------------

/// Parse plugin config into format-independent key-value pairs.
///
/// `config` is a `serde_json::Value` already deserialized from TOML or HCL.
///
/// - Rejects unknown keys (not declared in `params`).
/// - Converts values to `ParamValue` based on declared `ParamType`.
///
/// Returns only the keys present in the config source.
/// Defaults and required-checks are handled by `validate_and_build`.
pub fn parse_plugin_config(
    config: Option<&serde_json::Value>,
    params: &[ConfigParam],
) -> Result<HashMap<String, ParamValue>, EngineError> {
    let obj = match config {
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => {
            return Err(EngineError::Config(
                "plugin config must be a table/object".into(),
            ))
        }
        None => return Ok(HashMap::new()),
    };

    let known: HashSet<&str> = params.iter().map(|p| p.name.as_str()).collect();
    if let Some(key) = obj.keys().find(|k| !known.contains(k.as_str())) {
        return Err(EngineError::Config(format!("unknown parameter '{key}'")));
    }

    params
        .iter()
        .filter_map(|param| obj.get(&param.name).map(|v| (param, v)))
        .map(|(param, v)| value_to_param_value(v, param).map(|pv| (param.name.clone(), pv)))
        .collect()
}

/// Build `ConfigValues` from parsed key-value pairs.
///
/// For each declared param:
/// - If present in `parsed`: use the value.
/// - If absent with default: use default value.
/// - If absent and required: return error.
pub fn validate_and_build(
    parsed: &HashMap<String, ParamValue>,
    params: &[ConfigParam],
) -> Result<ConfigValues, EngineError> {
    let mut values = ConfigValues::new();

    for param in params {
        match (parsed.get(&param.name), &param.default) {
            (Some(v), _) => values.set(&param.name, v.clone()),
            (None, Some(default)) => values.set(&param.name, default.clone()),
            (None, None) if param.required => {
                return Err(EngineError::Config(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }
            (None, None) => {}
        }
    }

    Ok(values)
}

/// Convert a single value to a ParamValue according to the declared type.
fn value_to_param_value(
    val: &serde_json::Value,
    param: &ConfigParam,
) -> Result<ParamValue, EngineError> {
    let expected = |what: &str| {
        EngineError::Config(format!("parameter '{}': expected {what}", param.name))
    };

    match param.param_type {
        ParamType::Bool => val.as_bool().map(ParamValue::Bool).ok_or_else(|| expected("bool")),
        ParamType::I64 => val.as_i64().map(ParamValue::I64).ok_or_else(|| expected("integer")),
        ParamType::U64 => {
            if let Some(u) = val.as_u64() {
                return Ok(ParamValue::U64(u));
            }
            match val.as_i64() {
                Some(i) => Err(EngineError::Config(format!(
                    "parameter '{}': expected non-negative integer, got {i}",
                    param.name
                ))),
                None => Err(expected("integer")),
            }
        }
        ParamType::F64 => val.as_f64().map(ParamValue::F64).ok_or_else(|| expected("float")),
        ParamType::Str => Ok(ParamValue::Str(flatten_value(val))),
    }
}

/// Flatten a value into a string for flat config transport.
///
/// Scalars are converted directly (no quoting).
/// Arrays and objects are serialized as JSON strings.
fn flatten_value(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => val.to_string(),
    }
}

/// Load a transform plugin from a .so file.
///
/// 1. Load .so, verify ABI version.
/// 2. Call `bc_config_params()` to get declared params.
/// 3. Parse config → raw values, validate, build ConfigValues.
/// 4. Call `bc_create_transform(&config_values)`.
pub fn load_transform(
    path: &Path,
    config: Option<&serde_json::Value>,
) -> Result<PluginTransform, EngineError> {
    let lib = PluginLib::load(path)?;
    let params = lib.config_params();
    let raw = parse_plugin_config(config, &params)?;
    let config_values = validate_and_build(&raw, &params)?;
    let transform = lib.create(&config_values)?;
    // Leak the library to keep the .so loaded for the transform's lifetime.
    std::mem::forget(lib);
    Ok(transform)
}

#[cfg(test)]
mod tests {
    use batchcast_transform_image_tensor::{ImageTensorConfig, ImageTensorTransform};
    use serde_json::json;

    use super::*;

    fn params() -> Vec<ConfigParam> {
        ImageTensorConfig::config_params()
    }

    #[test]
    fn nested_tables_are_flattened_to_json() {
        let config = json!({
            "scale_pixels": false,
            "schema": {"observation.image": "encoded_image"}
        });
        let raw = parse_plugin_config(Some(&config), &params()).unwrap();
        let values = validate_and_build(&raw, &params()).unwrap();

        assert_eq!(values.get_bool("scale_pixels"), Some(false));
        assert_eq!(values.get_str("bytes_key"), Some("bytes"));
        assert_eq!(
            values.get_str("schema"),
            Some(r#"{"observation.image":"encoded_image"}"#)
        );

        let transform = ImageTensorTransform::from_config(&values).unwrap();
        assert!(transform.schema().kind("observation.image").is_some());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let config = json!({"resize": 224});
        let err = parse_plugin_config(Some(&config), &params()).unwrap_err();
        assert!(err.to_string().contains("unknown parameter 'resize'"), "{err}");
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let config = json!({"scale_pixels": "yes"});
        let err = parse_plugin_config(Some(&config), &params()).unwrap_err();
        assert!(err.to_string().contains("expected bool"), "{err}");

        let err = parse_plugin_config(Some(&json!([1, 2])), &params()).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn required_params_must_be_present() {
        let params = vec![ConfigParam {
            name: "channels".into(),
            param_type: ParamType::U64,
            required: true,
            default: None,
            description: "channel count".into(),
        }];
        let err = validate_and_build(&HashMap::new(), &params).unwrap_err();
        assert!(err.to_string().contains("missing required parameter 'channels'"));

        let err = parse_plugin_config(Some(&json!({"channels": -3})), &params).unwrap_err();
        assert!(err.to_string().contains("non-negative"), "{err}");

        let raw = parse_plugin_config(Some(&json!({"channels": 3})), &params).unwrap();
        let values = validate_and_build(&raw, &params).unwrap();
        assert_eq!(values.get_u64("channels"), Some(3));
    }

    #[test]
    fn missing_library_is_a_config_error() {
        let err = load_transform(Path::new("/nonexistent/libnothing.so"), None)
            .err()
            .unwrap();
        assert!(err.to_string().contains("failed to load plugin"), "{err}");
    }
}
