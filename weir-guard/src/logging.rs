//! Logging utilities and configuration for weir-guard.
//!
//! The engine logs through `tracing`. [`LogConfig`] controls how chatty a run
//! is: rendered SQL and per-result records are only emitted when asked for,
//! which replaces the old "verbose" switch of check runs.

use tracing::Level;

/// Logging configuration for a check run.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for weir-guard components
    pub base_level: Level,
    /// Whether to log every rendered SQL query before execution
    pub log_queries: bool,
    /// Whether to log every recorded check result
    pub log_results: bool,
    /// Maximum length for logged field values (to prevent huge logs)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_queries: false,
            log_results: false,
            max_field_length: 512,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging check definitions.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_queries: true,
            log_results: true,
            max_field_length: 4096,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_queries: false,
            log_results: false,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// True when `base_level` admits debug events.
    pub fn debug_enabled(&self) -> bool {
        self.base_level >= Level::DEBUG
    }
}

/// Macro for debug logging on hot paths.
///
/// Arguments are only evaluated when the run's `base_level` admits debug
/// events.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional query logging.
#[macro_export]
macro_rules! log_query {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_queries {
            tracing::info!($($arg)*);
        }
    };
}

/// Macro for conditional result logging.
#[macro_export]
macro_rules! log_result {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_results {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Utilities for installing a `tracing` subscriber.
pub mod setup {
    use tracing::Level;

    /// Configuration for the global logging setup.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for weir-guard components specifically
        pub engine_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                engine_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                engine_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                engine_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the log level for weir-guard components.
        pub fn with_engine_level(mut self, level: Level) -> Self {
            self.engine_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},weir_guard={}",
                    self.level.as_str().to_lowercase(),
                    self.engine_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Installs a global `tracing` subscriber.
    ///
    /// `RUST_LOG` wins over the configured filter when it is set.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use weir_guard::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}
