use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A single formatted record kept by the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: log::Level,
    pub target: String,
    pub message: String,
}

/// Bounded, shared in-memory log sink.
///
/// Cloning is cheap; all clones observe the same buffer. When full, the oldest
/// line is dropped.
#[derive(Debug, Clone)]
pub struct LogConsole {
    inner: Arc<Mutex<Buffer>>,
}

#[derive(Debug)]
struct Buffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

impl LogConsole {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(Buffer {
                lines: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
            })),
        }
    }

    pub fn push(&self, line: LogLine) {
        let mut buf = self.lock();
        if buf.lines.len() == buf.capacity {
            buf.lines.pop_front();
        }
        buf.lines.push_back(line);
    }

    /// Snapshot of all retained lines, oldest first.
    pub fn lines(&self) -> Vec<LogLine> {
        self.lock().lines.iter().cloned().collect()
    }

    /// Retained lines for one target, oldest first.
    pub fn lines_for(&self, target: &str) -> Vec<LogLine> {
        self.lock()
            .lines
            .iter()
            .filter(|l| l.target == target)
            .cloned()
            .collect()
    }

    /// Most recent `Error`-level line, if any.
    pub fn last_error(&self) -> Option<LogLine> {
        self.lock()
            .lines
            .iter()
            .rev()
            .find(|l| l.level == log::Level::Error)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().lines.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LogConsole {
    fn default() -> Self {
        Self::with_capacity(512)
    }
}
