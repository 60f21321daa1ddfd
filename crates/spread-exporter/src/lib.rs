pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod exposition;
pub mod logger;
pub mod sampler;
pub mod server;
pub mod spread;
pub mod store;

pub use config::ExporterConfig;
pub use error::{ConfigError, InvalidQuoteError, SampleError};
