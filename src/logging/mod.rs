//! Logging infrastructure - structured tracing for the heap
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Configurable level, overridable through `RUST_LOG`
//! - Zero-cost when disabled
//! - Console or file output, human-readable or JSON

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::allocator::AllocError;

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Append to a single file through a background writer.
    File(PathBuf),
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span enter/close events
    pub span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // WASM_HEAP_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("WASM_HEAP_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(Level::INFO);
        }

        // WASM_HEAP_LOG_FORMAT: pretty, compact, json
        if let Ok(format) = std::env::var("WASM_HEAP_LOG_FORMAT") {
            config.format = format.parse().unwrap_or_default();
        }

        // WASM_HEAP_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("WASM_HEAP_LOG_FILE") {
            config.output = LogOutput::File(PathBuf::from(path));
        }

        config.span_events = std::env::var("WASM_HEAP_LOG_SPANS").is_ok();

        config
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }
}

/// Parse a level name, case-insensitive.
pub fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging with configuration read from the environment
pub fn init() -> Option<WorkerGuard> {
    init_with_config(LogConfig::from_env())
}

/// Initialize logging with a custom configuration
///
/// Only the first call installs a subscriber. The returned guard flushes the
/// background writer when dropped; keep it alive until the program exits.
pub fn init_with_config(config: LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;
    LOGGER_INITIALIZED.get_or_init(|| {
        guard = install(&config);
    });
    guard
}

fn install(config: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("wasm_heap={}", config.level.as_str().to_lowercase())));

    let file = match &config.output {
        LogOutput::File(path) => file_appender(path),
        _ => None,
    };
    let to_file = file.is_some();
    let file_unavailable = matches!(config.output, LogOutput::File(_)) && !to_file;

    let (writer, guard) = match (file, &config.output) {
        (Some(appender), _) => tracing_appender::non_blocking(appender),
        (None, LogOutput::Stdout) => tracing_appender::non_blocking(std::io::stdout()),
        (None, _) => tracing_appender::non_blocking(std::io::stderr()),
    };

    let span_events = if config.span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let ansi = !to_file;

    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_span_events(span_events)
            .pretty()
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_span_events(span_events)
            .compact()
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .json()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .ok()?;

    if file_unavailable {
        tracing::warn!(output = ?config.output, "log file unavailable, logging to stderr");
    }

    Some(guard)
}

/// Appender for a single, never-rotated log file at `path`.
///
/// `None` when `path` has no file name or its directory cannot be opened.
fn file_appender(path: &Path) -> Option<RollingFileAppender> {
    let directory = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path.file_name()?.to_string_lossy().into_owned();
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .ok()
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Heap-specific logging functions
// ============================================================================

/// Log a served allocation
#[inline]
pub fn log_allocation(ptr: u32, requested: u32, class_size: u32, reused: bool) {
    tracing::trace!(
        target: "wasm_heap::allocator",
        ptr,
        requested,
        class_size,
        reused,
        "allocated"
    );
}

/// Log a block returned to its free list
#[inline]
pub fn log_deallocation(ptr: u32, class_size: u32) {
    tracing::trace!(
        target: "wasm_heap::allocator",
        ptr,
        class_size,
        "deallocated"
    );
}

/// Log an allocation the arena could not satisfy
pub fn log_out_of_space(requested: u32, reason: &str) {
    tracing::warn!(
        target: "wasm_heap::allocator",
        requested,
        reason,
        "allocator out of space"
    );
}

/// Log the transition into the poisoned state
pub fn log_poisoned(error: &AllocError) {
    tracing::error!(
        target: "wasm_heap::allocator",
        %error,
        "heap metadata corrupted, allocator poisoned"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.output, LogOutput::Stderr);

        let config = LogConfig::default()
            .with_level(Level::TRACE)
            .with_format(LogFormat::Json)
            .with_output(LogOutput::Stdout);
        assert_eq!(config.level, Level::TRACE);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Stdout);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level("warn"), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_logging_functions() {
        // These should not panic without a subscriber
        log_allocation(8, 1, 8, false);
        log_deallocation(8, 8);
        log_out_of_space(1 << 20, "ceiling");
        log_poisoned(&AllocError::PoisonedAllocator);
    }

    #[test]
    fn test_file_appender_requires_file_name() {
        assert!(file_appender(Path::new("/")).is_none());
        assert!(file_appender(Path::new("logs/..")).is_none());

        let dir = tempfile::tempdir().expect("temp dir");
        assert!(file_appender(&dir.path().join("heap.log")).is_some());
    }

    #[test]
    fn test_init_idempotent() {
        let _guard = init_with_config(LogConfig::default().with_level(Level::ERROR));
        let second = init_with_config(LogConfig::default());
        assert!(second.is_none());
        assert!(is_initialized());
    }
}
