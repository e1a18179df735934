//! Subscription registry configuration

/// Subscription registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Frames that may wait in a subscriber's outbound queue
    ///
    /// Kept small on purpose: a subscriber that cannot keep up times out and
    /// is dropped instead of accumulating a backlog.
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { queue_capacity: 1 }
    }
}

impl RegistryConfig {
    /// Set the per-subscriber queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(RegistryConfig::default().queue_capacity, 1);
    }

    #[test]
    fn test_queue_capacity_never_zero() {
        assert_eq!(RegistryConfig::default().queue_capacity(0).queue_capacity, 1);
        assert_eq!(RegistryConfig::default().queue_capacity(4).queue_capacity, 4);
    }
}
