use std::time::Duration;

/// Configuration for the orphan sweeper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// How often to run a sweep
    pub interval: Duration,
    /// Bytes younger than this are never touched; covers ingests still in flight
    pub grace_period: Duration,
    /// Maximum number of stored objects inspected per sweep
    pub batch_size: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            grace_period: Duration::from_secs(3600),
            batch_size: 500,
        }
    }
}

impl SweepConfig {
    pub fn new(interval: Duration, grace_period: Duration, batch_size: usize) -> Self {
        Self {
            interval,
            grace_period,
            batch_size,
        }
    }
}
