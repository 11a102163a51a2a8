use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Backoff after an empty scan or a failed candidate
    pub poll_interval: Duration,
    /// Pause before the first scan so the host can finish starting
    pub startup_delay: Duration,
    /// Recorded on every persisted mini-map
    pub generator_identity: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            startup_delay: DEFAULT_STARTUP_DELAY,
            generator_identity: "docweaver".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_startup_delay(mut self, startup_delay: Duration) -> Self {
        self.startup_delay = startup_delay;
        self
    }

    pub fn with_generator_identity(mut self, identity: impl Into<String>) -> Self {
        self.generator_identity = identity.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.startup_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::new()
            .with_poll_interval(Duration::from_millis(50))
            .with_startup_delay(Duration::ZERO)
            .with_generator_identity("openai:gpt-4o");

        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.startup_delay, Duration::ZERO);
        assert_eq!(config.generator_identity, "openai:gpt-4o");
    }
}
