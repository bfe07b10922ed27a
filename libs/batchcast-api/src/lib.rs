pub mod batch;
pub mod config;

pub use batchcast_api_derive::ConfigParams;
pub mod error;
pub mod ffi;
pub mod schema;
pub mod tensor;
pub mod transform;
pub mod value;
