use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const LOCAL_CONFIG_FILE: &str = ".annogen.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for Annogen
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnnogenConfig {
    /// Source discovery settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Generated artifact settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Worker pool settings
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Extra glob patterns to scan even when ignored
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Glob patterns to skip
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Scan `_test.go` files for markers
    #[serde(default)]
    pub include_tests: bool,

    /// Suffix of generated files; such files are never scanned
    #[serde(default = "default_generated_suffix")]
    pub generated_suffix: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_patterns: vec![],
            exclude_patterns: default_exclude_patterns(),
            include_tests: false,
            generated_suffix: default_generated_suffix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// File name written into each directory for constructor-family output
    #[serde(default = "default_constructor_file")]
    pub constructor_file: String,

    /// File name written into each directory for mapper output
    #[serde(default = "default_mapper_file")]
    pub mapper_file: String,

    /// Compute artifacts without writing them
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            constructor_file: default_constructor_file(),
            mapper_file: default_mapper_file(),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: pretty, compact
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PerformanceConfig {
    /// Dispatch worker threads (0 = one per core)
    #[serde(default)]
    pub num_threads: usize,
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/.git/**".to_string(),
        "**/vendor/**".to_string(),
        "**/testdata/**".to_string(),
        "**/node_modules/**".to_string(),
    ]
}
fn default_generated_suffix() -> String {
    ".gen.go".to_string()
}
fn default_constructor_file() -> String {
    "constructor.gen.go".to_string()
}
fn default_mapper_file() -> String {
    "mappers.gen.go".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with layered lookup
pub struct ConfigManager {
    config: AnnogenConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (`ANNOGEN_*`, `RUST_LOG`)
    /// 2. Explicit config file, else `<project>/.annogen.toml`, else `~/.annogen/config.toml`
    /// 3. Sensible defaults
    pub fn load(project_root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, config_path) = Self::load_config_file(project_root, explicit)?;
        let config = Self::apply_env_overrides(config);
        Self::validate_config(&config)?;

        match &config_path {
            Some(path) => info!("Config file: {}", path.display()),
            None => debug!("No config file found, using defaults"),
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    fn load_config_file(
        project_root: &Path,
        explicit: Option<&Path>,
    ) -> Result<(AnnogenConfig, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            let config = Self::read_toml_file(path)?;
            return Ok((config, Some(path.to_path_buf())));
        }

        let local_config = project_root.join(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            let config = Self::read_toml_file(&local_config)?;
            return Ok((config, Some(local_config)));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".annogen").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((AnnogenConfig::default(), None))
    }

    pub fn read_toml_file(path: &Path) -> Result<AnnogenConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: AnnogenConfig) -> AnnogenConfig {
        if let Ok(level) = std::env::var("RUST_LOG") {
            // Only plain levels; directive strings are left to the EnvFilter.
            if is_log_level(&level) {
                config.logging.level = level;
            }
        }
        if let Ok(level) = std::env::var("ANNOGEN_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(format) = std::env::var("ANNOGEN_LOG_FORMAT") {
            config.logging.format = format;
        }
        if let Ok(dry_run) = std::env::var("ANNOGEN_DRY_RUN") {
            config.output.dry_run = dry_run.to_lowercase() == "true" || dry_run == "1";
        }
        if let Ok(threads) = std::env::var("ANNOGEN_THREADS") {
            if let Ok(n) = threads.parse() {
                config.performance.num_threads = n;
            }
        }
        if let Ok(tests) = std::env::var("ANNOGEN_INCLUDE_TESTS") {
            config.scan.include_tests = tests.to_lowercase() == "true" || tests == "1";
        }

        config
    }

    pub fn validate_config(config: &AnnogenConfig) -> Result<(), ConfigError> {
        if !is_log_level(&config.logging.level) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                config.logging.level
            )));
        }

        match config.logging.format.as_str() {
            "pretty" | "compact" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, compact",
                    other
                )))
            }
        }

        if config.scan.generated_suffix.is_empty() {
            return Err(ConfigError::ValidationError(
                "scan.generated_suffix must not be empty".to_string(),
            ));
        }

        for (key, name) in [
            ("output.constructor_file", &config.output.constructor_file),
            ("output.mapper_file", &config.output.mapper_file),
        ] {
            if name.is_empty() || name.contains('/') || name.contains('\\') {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be a plain file name, got {:?}",
                    key, name
                )));
            }
            // Outputs are kept out of the scan only through the suffix.
            if !name.ends_with(&config.scan.generated_suffix) {
                return Err(ConfigError::ValidationError(format!(
                    "{} {:?} must end with scan.generated_suffix {:?}",
                    key, name, config.scan.generated_suffix
                )));
            }
        }

        if config.output.constructor_file == config.output.mapper_file {
            return Err(ConfigError::ValidationError(
                "output.constructor_file and output.mapper_file must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &AnnogenConfig {
        &self.config
    }

    pub fn into_config(self) -> AnnogenConfig {
        self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn is_log_level(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}
