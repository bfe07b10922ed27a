pub mod config;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod plugin_host;
