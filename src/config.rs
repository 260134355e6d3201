//! Heap configuration - TOML file with defaulted sections
//!
//! ```toml
//! [allocator]
//! strategy = "freeing-bump"
//! heap_base = 1024
//!
//! [memory]
//! initial_pages = 1
//! max_pages = 256
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! file = "heap.log"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::allocator::Strategy;
use crate::logging::{self, LogConfig, LogFormat, LogOutput};
use crate::memory::MAX_WASM_PAGES;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeapConfig {
    #[serde(default)]
    pub allocator: AllocatorConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    #[serde(default)]
    pub strategy: Strategy,

    /// End of the guest's static data.
    #[serde(default)]
    pub heap_base: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_initial_pages")]
    pub initial_pages: u32,

    #[serde(default)]
    pub max_pages: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_initial_pages() -> u32 {
    1
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            initial_pages: default_initial_pages(),
            max_pages: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl HeapConfig {
    /// Load and validate a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max_pages) = self.memory.max_pages {
            if max_pages > MAX_WASM_PAGES {
                return Err(ConfigError::Invalid(format!(
                    "max_pages {max_pages} exceeds the wasm32 limit of {MAX_WASM_PAGES}"
                )));
            }
            if self.memory.initial_pages > max_pages {
                return Err(ConfigError::Invalid(format!(
                    "initial_pages {} exceeds max_pages {max_pages}",
                    self.memory.initial_pages
                )));
            }
        } else if self.memory.initial_pages > MAX_WASM_PAGES {
            return Err(ConfigError::Invalid(format!(
                "initial_pages {} exceeds the wasm32 limit of {MAX_WASM_PAGES}",
                self.memory.initial_pages
            )));
        }

        if logging::parse_level(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(format!("unknown log level `{}`", self.logging.level)));
        }

        Ok(())
    }
}

impl LoggingConfig {
    /// Logging setup described by this section.
    pub fn to_log_config(&self) -> LogConfig {
        let output = match &self.file {
            Some(path) => LogOutput::File(path.clone()),
            None => LogOutput::Stderr,
        };
        LogConfig::default()
            .with_level(logging::parse_level(&self.level).unwrap_or(tracing::Level::INFO))
            .with_format(self.format)
            .with_output(output)
    }
}
