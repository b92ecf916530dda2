//! Emitter configuration module.
//!
//! This module defines the inter-arrival distribution parameters for the
//! regular and group order emitters (§4.3 / §6).

use super::{ConfigResult, Validate};
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Emitter inter-arrival configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmitterConfig {
    /// Mean inter-arrival time, in seconds, for regular orders.
    pub regular_order_interval_mean: f64,

    /// Standard deviation of the regular order inter-arrival time.
    pub regular_order_interval_deviation: f64,

    /// Mean inter-arrival time, in seconds, for group orders.
    pub group_order_interval_mean: f64,

    /// Standard deviation of the group order inter-arrival time.
    pub group_order_interval_deviation: f64,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            regular_order_interval_mean: 2.0,
            regular_order_interval_deviation: 0.5,
            group_order_interval_mean: 5.0,
            group_order_interval_deviation: 1.0,
        }
    }
}

impl Validate for EmitterConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.regular_order_interval_mean <= 0.0 {
            return Err(ConfigError::ValidationError(
                "RegularOrderIntervalMean must be positive".to_string(),
            ));
        }
        if self.group_order_interval_mean <= 0.0 {
            return Err(ConfigError::ValidationError(
                "GroupOrderIntervalMean must be positive".to_string(),
            ));
        }
        if self.regular_order_interval_deviation < 0.0
            || self.group_order_interval_deviation < 0.0
        {
            return Err(ConfigError::ValidationError(
                "interval deviations must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
