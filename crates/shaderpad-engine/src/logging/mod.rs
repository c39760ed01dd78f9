//! Logging utilities.
//!
//! This module centralizes logger initialization and common diagnostics.
//! Records go through the standard `log` facade; `env_logger` writes them to
//! stderr and every record that passes the filter is also kept in a shared
//! in-memory [`LogConsole`].
//!
//! Named loggers are `log` targets. [`logger`] hands out a [`NamedLogger`] for
//! a target and records the name in a process-wide registry.

mod console;
mod init;
mod registry;

pub use console::{LogConsole, LogLine};
pub use init::{console, init_logging, LoggingConfig};
pub use registry::{logger, loggers, NamedLogger};
