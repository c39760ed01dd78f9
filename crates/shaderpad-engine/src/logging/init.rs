use std::sync::OnceLock;

use super::console::{LogConsole, LogLine};
use super::registry;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "view=debug,wgpu=warn").
///
/// `write_style` controls ANSI coloring behavior.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Number of lines retained by the in-memory console.
    pub console_capacity: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            console_capacity: 512,
        }
    }
}

impl LoggingConfig {
    /// Picks up a `--log <filter>` or `--log=<filter>` argument.
    ///
    /// Other arguments are ignored; when the flag is absent `RUST_LOG` (or the
    /// `info` default) applies at init time.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            if let Some(filter) = arg.strip_prefix("--log=") {
                config.env_filter = Some(filter.to_string());
            } else if arg == "--log" {
                if let Some(filter) = args.next() {
                    config.env_filter = Some(filter.as_ref().to_string());
                }
            }
        }
        config
    }
}

static CONSOLE: OnceLock<LogConsole> = OnceLock::new();

/// Initializes the global logger once and returns the shared console.
///
/// This function is idempotent; subsequent calls return the console created by
/// the first one and ignore their configuration.
/// Intended usage is early in `main`.
pub fn init_logging(config: LoggingConfig) -> LogConsole {
    CONSOLE
        .get_or_init(|| {
            let console = LogConsole::with_capacity(config.console_capacity);

            let mut builder = env_logger::Builder::new();
            if let Some(filter) = &config.env_filter {
                builder.parse_filters(filter);
            } else if let Ok(filter) = std::env::var("RUST_LOG") {
                builder.parse_filters(&filter);
            } else {
                builder.filter_level(log::LevelFilter::Info);
            }
            builder.write_style(config.write_style);
            builder.is_test(cfg!(test));

            let stderr = builder.build();
            let max_level = stderr.filter();
            let logger = ConsoleLogger {
                stderr,
                console: console.clone(),
            };

            // Another logger may already be installed (e.g. by a test harness);
            // the console then simply stays empty.
            if log::set_boxed_logger(Box::new(logger)).is_ok() {
                log::set_max_level(max_level);
            }

            log::debug!("logging initialized");
            console
        })
        .clone()
}

/// The console created by [`init_logging`], if logging has been initialized.
pub fn console() -> Option<LogConsole> {
    CONSOLE.get().cloned()
}

/// `log` backend that tees every accepted record into the console.
struct ConsoleLogger {
    stderr: env_logger::Logger,
    console: LogConsole,
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.stderr.enabled(metadata)
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.stderr.matches(record) {
            return;
        }

        registry::register(record.target());
        self.console.push(LogLine {
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        });
        self.stderr.log(record);
    }

    fn flush(&self) {
        self.stderr.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_flag_with_separate_value() {
        let config = LoggingConfig::from_args(["shaderpad", "--log", "view=debug"]);
        assert_eq!(config.env_filter.as_deref(), Some("view=debug"));
    }

    #[test]
    fn log_flag_with_equals() {
        let config = LoggingConfig::from_args(["shaderpad", "--log=warn"]);
        assert_eq!(config.env_filter.as_deref(), Some("warn"));
    }

    #[test]
    fn no_flag_keeps_defaults() {
        let config = LoggingConfig::from_args(["shaderpad", "--other"]);
        assert!(config.env_filter.is_none());
        assert_eq!(config.console_capacity, 512);
    }

    #[test]
    fn records_reach_the_console() {
        let console = init_logging(LoggingConfig {
            env_filter: Some("info".to_string()),
            ..Default::default()
        });
        log::error!(target: "console-test", "boom {}", 7);

        let lines = console.lines_for("console-test");
        assert!(lines.iter().any(|l| l.level == log::Level::Error && l.message == "boom 7"));
        assert!(registry::loggers().iter().any(|n| n == "console-test"));
    }
}
