use crate::level::Level;
use chrono::{DateTime, Utc};

/// Source location of the call that produced an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryCaller {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl EntryCaller {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        EntryCaller {
            file: file.into(),
            line,
            function: function.into(),
        }
    }

    /// `path/to/file.rs:42`
    pub fn full(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }

    /// Only the final directory and file name, e.g. `src/main.rs:42`.
    pub fn short(&self) -> String {
        let trimmed = trim_to_last_two(&self.file);
        format!("{}:{}", trimmed, self.line)
    }
}

fn trim_to_last_two(path: &str) -> &str {
    let is_sep = |c: char| c == '/' || c == '\\';
    let Some(last) = path.rfind(is_sep) else {
        return path;
    };
    match path[..last].rfind(is_sep) {
        Some(prev) => &path[prev + 1..],
        None => path,
    }
}

/// A single log event, minus its fields.
#[derive(Debug, Clone)]
pub struct Entry {
    pub level: Level,
    pub time: DateTime<Utc>,
    pub logger_name: String,
    pub message: String,
    pub caller: Option<EntryCaller>,
    pub stack: String,
}

impl Entry {
    /// Create an entry stamped with the current time.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Entry {
            level,
            time: Utc::now(),
            logger_name: String::new(),
            message: message.into(),
            caller: None,
            stack: String::new(),
        }
    }

    #[must_use]
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    #[must_use]
    pub fn with_logger_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = name.into();
        self
    }

    #[must_use]
    pub fn with_caller(mut self, caller: EntryCaller) -> Self {
        self.caller = Some(caller);
        self
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }
}
