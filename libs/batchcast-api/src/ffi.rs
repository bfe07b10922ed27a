use crate::config::{ConfigParam, ConfigValues};

/// Current ABI version. Host checks this against plugin's `bc_abi_version()`.
pub const BC_ABI_VERSION: u32 = 1;

/// FFI return struct from `bc_create_transform`.
#[repr(C)]
pub struct PluginCreateResult {
    /// Pointer to the created transform (Box<Box<dyn BatchTransform>>).
    /// Null if creation failed.
    pub plugin_ptr: *mut (),
    /// Pointer to a heap-allocated error string.
    /// Null if creation succeeded.
    pub error_ptr: *mut u8,
    /// Length of the error string.
    pub error_len: usize,
}

/// Type signature for `bc_abi_version` symbol.
pub type AbiVersionFn = unsafe extern "C" fn() -> u32;

/// Type signature for `bc_config_params` symbol.
/// Returns a pointer to a boxed `Vec<ConfigParam>`. Caller takes ownership.
pub type ConfigParamsFn = unsafe extern "C" fn() -> *mut ();

/// Type signature for `bc_create_transform`.
/// Takes a pointer to engine-owned `ConfigValues` (plugin borrows, does not own).
pub type CreatePluginFn = unsafe extern "C" fn(*const ()) -> PluginCreateResult;

/// Type signature for `bc_destroy_transform`.
pub type DestroyPluginFn = unsafe extern "C" fn(*mut ());

/// Helper: create a successful `PluginCreateResult` from a trait object.
pub fn plugin_ok<T: ?Sized>(plugin: Box<Box<T>>) -> PluginCreateResult {
    PluginCreateResult {
        plugin_ptr: Box::into_raw(plugin) as *mut (),
        error_ptr: std::ptr::null_mut(),
        error_len: 0,
    }
}

/// Helper: create a failed `PluginCreateResult` from an error message.
pub fn plugin_err(msg: &str) -> PluginCreateResult {
    let bytes = msg.as_bytes().to_vec().into_boxed_slice();
    let len = bytes.len();
    PluginCreateResult {
        plugin_ptr: std::ptr::null_mut(),
        error_ptr: Box::into_raw(bytes) as *mut u8,
        error_len: len,
    }
}

/// Helper: return config params from plugin to engine.
/// Engine will reconstruct as `Box<Vec<ConfigParam>>` and take ownership.
pub fn config_params_ok(params: Vec<ConfigParam>) -> *mut () {
    Box::into_raw(Box::new(params)) as *mut ()
}

/// Cast an FFI config pointer to a `&ConfigValues` reference.
///
/// # Safety
///
/// `ptr` must be a valid pointer to a `ConfigValues` value owned by the engine.
pub unsafe fn config_from_ptr<'a>(ptr: *const ()) -> &'a ConfigValues {
    unsafe { &*(ptr as *const ConfigValues) }
}

/// Macro: export `bc_abi_version` function.
#[macro_export]
macro_rules! bc_abi_version_fn {
    () => {
        #[unsafe(no_mangle)]
        pub extern "C" fn bc_abi_version() -> u32 {
            $crate::ffi::BC_ABI_VERSION
        }
    };
}

/// Macro: export `bc_config_params` function.
///
/// - `bc_config_params_fn!(MyConfigType)`: uses `MyConfigType::config_params()` from derive.
/// - `bc_config_params_fn!([])`: manual list (e.g. empty for transforms with no config).
#[macro_export]
macro_rules! bc_config_params_fn {
    ([$($param:expr),* $(,)?]) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn bc_config_params() -> *mut () {
            $crate::ffi::config_params_ok(vec![$($param),*])
        }
    };
    ($config_type:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn bc_config_params() -> *mut () {
            $crate::ffi::config_params_ok(<$config_type>::config_params())
        }
    };
}

/// Macro: export `bc_destroy_transform` for a boxed `BatchTransform`.
#[macro_export]
macro_rules! bc_destroy_fn {
    () => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn bc_destroy_transform(ptr: *mut ()) {
            if !ptr.is_null() {
                let _ = unsafe {
                    Box::from_raw(ptr as *mut Box<dyn $crate::transform::BatchTransform>)
                };
            }
        }
    };
}
