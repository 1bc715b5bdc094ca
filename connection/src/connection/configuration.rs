//! Connection configuration types and constants.

use std::fmt;
use std::time::Duration;

/// Default number of extra connect attempts after the first one fails.
pub const DEFAULT_CONNECT_RETRIES: u32 = 1;
/// Default timeout for a single connect attempt.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout for a request to be answered.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration used to build a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionConfiguration {
    /// Extra connect attempts after the first failure.
    pub retries: u32,
    /// Timeout for each connect attempt.
    pub connection_timeout: Duration,
    /// Timeout for each request, from send until the matching response.
    pub request_timeout: Duration,
}

impl Default for ConnectionConfiguration {
    fn default() -> Self {
        Self {
            retries: DEFAULT_CONNECT_RETRIES,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ConnectionConfiguration {
    /// Set the number of extra connect attempts.
    ///
    /// A value of 0 means a single attempt.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the timeout for each connect attempt.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use peers_connection::ConnectionConfiguration;
    ///
    /// let config = ConnectionConfiguration::default()
    ///     .with_connection_timeout(Duration::from_secs(2));
    /// assert_eq!(config.connection_timeout, Duration::from_secs(2));
    /// ```
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the timeout for each request.
    ///
    /// A peer that doesn't answer within this window is treated as failed
    /// for that request only.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl fmt::Display for ConnectionConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectionConfiguration {{ retries: {}, connection_timeout: {:?}, request_timeout: {:?} }}",
            self.retries, self.connection_timeout, self.request_timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_configuration_defaults() {
        let config = ConnectionConfiguration::default();
        assert_eq!(config.retries, 1);
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(3));

        let custom = config
            .with_retries(0)
            .with_request_timeout(Duration::from_millis(500));
        assert_eq!(custom.retries, 0);
        assert_eq!(custom.request_timeout, Duration::from_millis(500));
    }
}
