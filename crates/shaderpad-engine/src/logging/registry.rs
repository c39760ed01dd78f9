use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use super::console::LogLine;

static NAMES: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());

/// Handle for a named logger (a `log` target).
///
/// All named loggers write to the same sinks; the name only scopes filtering
/// (`RUST_LOG=view=debug`) and console queries.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct NamedLogger {
    name: &'static str,
}

impl NamedLogger {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a record at `level` for this logger would be emitted.
    pub fn enabled(&self, level: log::Level) -> bool {
        log::log_enabled!(target: self.name, level)
    }

    /// Console lines recorded for this logger.
    ///
    /// Empty until [`init_logging`](super::init_logging) has run.
    pub fn lines(&self) -> Vec<LogLine> {
        super::console()
            .map(|c| c.lines_for(self.name))
            .unwrap_or_default()
    }
}

/// Returns the named logger for `name`, registering it on first use.
pub fn logger(name: &'static str) -> NamedLogger {
    register(name);
    NamedLogger { name }
}

/// Names of every logger registered so far, sorted.
///
/// A target is registered either explicitly through [`logger`] or the first
/// time a record for it reaches the console.
pub fn loggers() -> Vec<String> {
    NAMES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .cloned()
        .collect()
}

pub(super) fn register(name: &str) {
    let mut names = NAMES.lock().unwrap_or_else(PoisonError::into_inner);
    if !names.contains(name) {
        names.insert(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_yields_same_logger() {
        let a = logger("registry-test");
        let b = logger("registry-test");
        assert_eq!(a, b);
        assert_eq!(a.name(), "registry-test");
        assert_eq!(
            loggers().iter().filter(|n| n.as_str() == "registry-test").count(),
            1
        );
    }
}
