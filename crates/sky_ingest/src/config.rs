use std::time::Duration;

use crate::error::RejectionSink;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8585;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IngestLimits {
    /// Records above this size are discarded and reported, never buffered.
    pub max_record_bytes: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_record_bytes: 1024 * 1024,
        }
    }
}

/// What to do with a record that carries no usable `timestamp` string.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum MissingTimestamp {
    /// Stamp the event at `1970-01-01T00:00:00Z`.
    #[default]
    UnixEpoch,
    Reject,
}

/// How line-mode ingestion reacts to read errors on its input.
///
/// Each error is logged, then the read is retried after `backoff` until
/// more than `max_retries` errors have happened back to back. A successful
/// read resets the count. End of stream is not an error and always ends
/// ingestion.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ReadErrorPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl ReadErrorPolicy {
    pub fn stop_on_error() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    pub(crate) fn allows_retry(&self, consecutive_errors: u32) -> bool {
        consecutive_errors <= self.max_retries
    }
}

impl Default for ReadErrorPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: Duration::from_millis(100),
        }
    }
}

pub struct IngestConfig {
    pub limits: IngestLimits,
    pub missing_timestamp: MissingTimestamp,
    pub read_errors: ReadErrorPolicy,
    pub rejection_sink: Option<Box<dyn RejectionSink>>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            limits: IngestLimits::default(),
            missing_timestamp: MissingTimestamp::UnixEpoch,
            read_errors: ReadErrorPolicy::default(),
            rejection_sink: None,
        }
    }
}

/// Where the Sky server lives.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Applies to each HTTP request. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl ConnectionConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_budget_counts_consecutive_errors() {
        let policy = ReadErrorPolicy {
            max_retries: 2,
            backoff: Duration::ZERO,
        };
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
        assert!(!ReadErrorPolicy::stop_on_error().allows_retry(1));
    }

    #[test]
    fn base_url_uses_host_and_port() {
        let conn = ConnectionConfig {
            host: "sky.internal".to_string(),
            port: 9000,
            request_timeout: None,
        };
        assert_eq!(conn.base_url(), "http://sky.internal:9000");
        assert_eq!(ConnectionConfig::default().base_url(), "http://localhost:8585");
    }
}
