//! Queue capacity configuration module.
//!
//! This module defines the fixed capacities of the bounded queues that
//! connect pipeline stages (§3 / §6).

use super::{ConfigResult, Validate};
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Queue capacity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueuesConfig {
    /// Capacity of the ingress order queue (emitters -> `BasePreparation`).
    pub order_queue_capacity: usize,

    /// Capacity of the tapioca pool (also its pre-seeded token buffer).
    pub tapioca_queue_capacity: usize,

    /// Capacity used by every other inter-stage queue (preparation,
    /// toppings, quality, and the implicit packaging hand-off).
    pub ready_queue_capacity: usize,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            order_queue_capacity: 35,
            tapioca_queue_capacity: 15,
            ready_queue_capacity: 12,
        }
    }
}

impl Validate for QueuesConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.order_queue_capacity < 5 {
            return Err(ConfigError::ValidationError(
                "OrderQueueCapacity must be at least 5".to_string(),
            ));
        }
        if self.tapioca_queue_capacity < 3 {
            return Err(ConfigError::ValidationError(
                "TapiocaQueueCapacity must be at least 3".to_string(),
            ));
        }
        if self.ready_queue_capacity < 3 {
            return Err(ConfigError::ValidationError(
                "ReadyQueueCapacity must be at least 3".to_string(),
            ));
        }
        Ok(())
    }
}
