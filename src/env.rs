//! Environment variable names used by this crate for convenient
//! configuration of cores and sinks from microservices.
//!
//! These are purely helpers; the core types remain decoupled from
//! environment access.

/// Project the records belong to.
pub const LOG_SINK_PROJECT_ENV: &str = "LOG_SINK_PROJECT";

/// Target log store inside the project.
pub const LOG_SINK_LOGSTORE_ENV: &str = "LOG_SINK_LOGSTORE";

/// Optional topic attached to every record.
pub const LOG_SINK_TOPIC_ENV: &str = "LOG_SINK_TOPIC";

/// Optional source (usually host or service name) attached to every record.
pub const LOG_SINK_SOURCE_ENV: &str = "LOG_SINK_SOURCE";

/// Minimum enabled level, e.g. `info` or `error`.
pub const LOG_SINK_LEVEL_ENV: &str = "LOG_SINK_LEVEL";

/// Base URL of the HTTP ingestion endpoint.
pub const LOG_SINK_ENDPOINT_ENV: &str = "LOG_SINK_ENDPOINT";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_when_unset() {
        assert_eq!(env_or("LOG_SINK_SURELY_UNSET_VARIABLE", "fallback"), "fallback");
    }
}
