//! Dispatcher configuration

use crate::error::{CdcError, Result};
use std::time::Duration;

/// Configuration for the CDC dispatch core.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Paved (flattened per-column fields) vs nested (before/after maps)
    /// row representation
    pub paved_representation: bool,
    /// Split one UPDATE into UPDATE_BEFORE + UPDATE_AFTER rows
    pub split_update: bool,
    /// Per-turn drain quota per table; bounds how long one worker may
    /// monopolize its queue before yielding to other tables
    pub batch_depth: usize,
    /// Timeout for worker shutdown
    pub shutdown_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            paved_representation: true,
            split_update: true,
            batch_depth: 1000,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl DispatchConfig {
    /// Create a new builder.
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::new()
    }
}

/// Builder for [`DispatchConfig`].
pub struct DispatchConfigBuilder {
    config: DispatchConfig,
}

impl DispatchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DispatchConfig::default(),
        }
    }

    pub fn paved_representation(mut self, paved: bool) -> Self {
        self.config.paved_representation = paved;
        self
    }

    pub fn split_update(mut self, split: bool) -> Self {
        self.config.split_update = split;
        self
    }

    pub fn batch_depth(mut self, depth: usize) -> Self {
        self.config.batch_depth = depth;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<DispatchConfig> {
        if self.config.batch_depth < 1 {
            return Err(CdcError::config("batch_depth must be >= 1"));
        }
        Ok(self.config)
    }
}

impl Default for DispatchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert!(config.paved_representation);
        assert!(config.split_update);
        assert_eq!(config.batch_depth, 1000);
    }

    #[test]
    fn test_builder() {
        let config = DispatchConfig::builder()
            .paved_representation(false)
            .split_update(false)
            .batch_depth(10)
            .shutdown_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert!(!config.paved_representation);
        assert!(!config.split_update);
        assert_eq!(config.batch_depth, 10);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_batch_depth_rejected() {
        let err = DispatchConfig::builder().batch_depth(0).build().unwrap_err();
        assert!(matches!(err, CdcError::Config(_)));
    }
}
