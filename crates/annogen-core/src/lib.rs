pub mod config;
pub mod environment;
pub mod error;
pub mod registry;
pub mod traits;
pub mod types;

pub use config::{
    AnnogenConfig, ConfigError, ConfigManager, LoggingConfig, OutputConfig, PerformanceConfig,
    ScanConfig,
};
pub use environment::*;
pub use error::*;
pub use registry::*;
pub use traits::*;
pub use types::*;
