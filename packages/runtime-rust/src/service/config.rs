use std::time::Duration;

/// Configuration for the in-process service protocol.
#[derive(Debug, Clone)]
pub struct LocalServiceConfig {
    /// Upper bound on one handler run in milliseconds. `None` waits forever.
    pub call_timeout_ms: Option<u64>,
}

impl LocalServiceConfig {
    /// The call timeout as a [`Duration`], if one is set.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for LocalServiceConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: Some(30_000),
        }
    }
}
