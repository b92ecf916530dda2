//! Handler configuration module.
//!
//! This module defines per-stage service-time ranges and branching
//! probabilities for the five handler variants (§4.4 / §6).

use super::{ConfigResult, Validate};
use crate::error::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Aggregate configuration for every handler stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HandlersConfig {
    /// `BasePreparation` stage configuration.
    pub base_preparation: BasePreparationConfig,

    /// `TapiocaCooking` stage configuration.
    pub tapioca_cooking: TapiocaCookingConfig,

    /// `Toppings` stage configuration.
    pub toppings: ToppingsConfig,

    /// `QualityControl` stage configuration.
    pub quality_control: QualityControlConfig,

    /// `Packaging` stage configuration.
    pub packaging: PackagingConfig,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            base_preparation: BasePreparationConfig::default(),
            tapioca_cooking: TapiocaCookingConfig::default(),
            toppings: ToppingsConfig::default(),
            quality_control: QualityControlConfig::default(),
            packaging: PackagingConfig::default(),
        }
    }
}

impl Validate for HandlersConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.base_preparation.validate()?;
        self.tapioca_cooking.validate()?;
        self.toppings.validate()?;
        self.quality_control.validate()?;
        self.packaging.validate()?;
        Ok(())
    }
}

/// Validates that `min <= max` and both are positive.
fn validate_time_range(label: &str, min: f64, max: f64) -> ConfigResult<()> {
    if min <= 0.0 || max <= 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "{label} times must be positive"
        )));
    }
    if min > max {
        return Err(ConfigError::ValidationError(format!(
            "{label} min time must not exceed max time"
        )));
    }
    Ok(())
}

/// Validates that a probability lies in `[0, 1]`.
fn validate_probability(label: &str, value: f64) -> ConfigResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{label} must be in [0, 1]"
        )));
    }
    Ok(())
}

/// `BasePreparation` stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BasePreparationConfig {
    /// Minimum service time, in seconds.
    pub min_time: f64,
    /// Maximum service time, in seconds.
    pub max_time: f64,
    /// Probability the order advances to the next stage.
    pub success_rate: f64,
    /// Probability the order is reworked (re-enqueued into the input queue).
    pub recalibration_rate: f64,
}

impl Default for BasePreparationConfig {
    fn default() -> Self {
        Self {
            min_time: 0.5,
            max_time: 1.0,
            success_rate: 0.8,
            recalibration_rate: 0.15,
        }
    }
}

impl Validate for BasePreparationConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_time_range("BasePreparation", self.min_time, self.max_time)?;
        validate_probability("BasePreparationSuccessRate", self.success_rate)?;
        validate_probability("RecalibrationRate", self.recalibration_rate)?;
        if self.success_rate + self.recalibration_rate > 1.0 {
            return Err(ConfigError::ValidationError(
                "BasePreparation success_rate + recalibration_rate must not exceed 1.0"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// `TapiocaCooking` stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TapiocaCookingConfig {
    /// Minimum cooking-batch time, in seconds.
    pub min_time: f64,
    /// Maximum cooking-batch time, in seconds.
    pub max_time: f64,
    /// Probability a cooking batch succeeds and yields 3 tokens.
    pub success_rate: f64,
}

impl Default for TapiocaCookingConfig {
    fn default() -> Self {
        Self {
            min_time: 8.0,
            max_time: 12.0,
            success_rate: 0.9,
        }
    }
}

impl Validate for TapiocaCookingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_time_range("TapiocaCooking", self.min_time, self.max_time)?;
        validate_probability("TapiocaCookingSuccessRate", self.success_rate)?;
        Ok(())
    }
}

/// `Toppings` stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ToppingsConfig {
    /// Minimum service time, in seconds, before the complexity multiplier.
    pub min_time: f64,
    /// Maximum service time, in seconds, before the complexity multiplier.
    pub max_time: f64,
    /// Probability the order advances to the next stage.
    pub success_rate: f64,
    /// Probability the order is reworked (re-enqueued into the input queue).
    pub rework_rate: f64,
}

impl Default for ToppingsConfig {
    fn default() -> Self {
        Self {
            min_time: 0.3,
            max_time: 0.8,
            success_rate: 0.85,
            rework_rate: 0.1,
        }
    }
}

impl Validate for ToppingsConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_time_range("Toppings", self.min_time, self.max_time)?;
        validate_probability("ToppingsSuccessRate", self.success_rate)?;
        validate_probability("ToppingsReworkRate", self.rework_rate)?;
        if self.success_rate + self.rework_rate > 1.0 {
            return Err(ConfigError::ValidationError(
                "Toppings success_rate + rework_rate must not exceed 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// `QualityControl` stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QualityControlConfig {
    /// Minimum service time, in seconds.
    pub min_time: f64,
    /// Maximum service time, in seconds.
    pub max_time: f64,
    /// Probability the order advances to the next stage.
    pub success_rate: f64,
    /// Probability of a minor defect (15s rework penalty, re-enqueued).
    pub minor_defect_rate: f64,
}

impl Default for QualityControlConfig {
    fn default() -> Self {
        Self {
            min_time: 0.8,
            max_time: 1.2,
            success_rate: 0.75,
            minor_defect_rate: 0.2,
        }
    }
}

impl Validate for QualityControlConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_time_range("QualityControl", self.min_time, self.max_time)?;
        validate_probability("QualityControlSuccessRate", self.success_rate)?;
        validate_probability("MinorDefectRate", self.minor_defect_rate)?;
        if self.success_rate + self.minor_defect_rate > 1.0 {
            return Err(ConfigError::ValidationError(
                "QualityControl success_rate + minor_defect_rate must not exceed 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

/// `Packaging` stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackagingConfig {
    /// Minimum service time, in seconds, before any size multiplier.
    pub min_time: f64,
    /// Maximum service time, in seconds, before any size multiplier.
    pub max_time: f64,
    /// Whether to scale service time by the size-based packaging
    /// multiplier defined in §3. The original system computed this
    /// multiplier but never applied it (§9); it defaults to `false` to
    /// match that observed behavior, and can be flipped on deliberately.
    pub apply_size_multiplier: bool,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            min_time: 2.0,
            max_time: 8.0,
            apply_size_multiplier: false,
        }
    }
}

impl Validate for PackagingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_time_range("Packaging", self.min_time, self.max_time)
    }
}
