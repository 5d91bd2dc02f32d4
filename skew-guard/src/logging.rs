//! Logging configuration for skew checks.
//!
//! The engine emits `tracing` spans and events; nothing is printed unless
//! the host installs a subscriber. [`setup::init_logging`] installs one for
//! binaries. Chatty per-row events are gated behind [`LogConfig`] flags via
//! the [`log_comparison!`](crate::log_comparison) and
//! [`log_data_op!`](crate::log_data_op) macros so large runs stay cheap.

use tracing::Level;

/// Controls how much the engine logs during a run.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for skew-guard components
    pub base_level: Level,
    /// Whether to log per-feature comparison details
    pub log_comparison_details: bool,
    /// Whether to log record source operations
    pub log_data_operations: bool,
    /// Whether to log the verdict summary at info level
    pub log_verdict_summary: bool,
    /// Maximum length for logged values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_comparison_details: false,
            log_data_operations: true,
            log_verdict_summary: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Everything on, for debugging a parity failure.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_comparison_details: true,
            log_data_operations: true,
            log_verdict_summary: true,
            max_field_length: 1024,
        }
    }

    /// Warnings only.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_comparison_details: false,
            log_data_operations: false,
            log_verdict_summary: false,
            max_field_length: 128,
        }
    }

    /// Same as the default.
    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Debug logging that is skipped entirely when the configured level is
/// above debug.
#[macro_export]
macro_rules! perf_debug {
    ($config:expr, $($arg:tt)*) => {
        if $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Logs a comparison detail when `log_comparison_details` is set.
#[macro_export]
macro_rules! log_comparison {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_comparison_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Logs a record source operation when `log_data_operations` is set.
#[macro_export]
macro_rules! log_data_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_data_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a value for logging, respecting UTF-8 boundaries.
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

/// Subscriber installation for binaries and tests.
pub mod setup {
    use crate::prelude::*;
    use tracing::Level;

    /// Subscriber configuration.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Level for everything outside skew-guard
        pub level: Level,
        /// Level for skew-guard itself
        pub crate_level: Level,
        /// Emit JSON lines instead of human-readable text
        pub json_format: bool,
        /// Explicit filter directive, overriding the two levels
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON output, warnings and up.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::WARN,
                json_format: true,
                env_filter: None,
            }
        }

        /// Human-readable output at debug level.
        pub fn development() -> Self {
            Self {
                level: Level::INFO,
                crate_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the level for other crates.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the level for skew-guard.
        pub fn with_crate_level(mut self, level: Level) -> Self {
            self.crate_level = level;
            self
        }

        /// Switches JSON output on or off.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Uses an explicit filter directive.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// The filter directive this configuration installs.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},skew_guard={}",
                    self.level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs a global `tracing` subscriber writing to stderr.
    ///
    /// `RUST_LOG` takes precedence over the configured levels.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use skew_guard::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| SkewError::Configuration(format!("failed to install logger: {e}")))
    }
}
