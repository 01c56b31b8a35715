use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FailureDetectorConfig {
    /// Delay between two probe rounds.
    pub period: Duration,
    /// Number of members asked to probe indirectly after a direct timeout.
    pub group_size: usize,
    /// Bound on each wait: once for the direct ack, once for the indirect round.
    pub timeout: Duration,
}

impl Default for FailureDetectorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(100),
            group_size: 4,
            timeout: Duration::from_millis(50),
        }
    }
}
