//! Relaxation settings.
//!
//! Controls how discrete logic is softened into differentiable arithmetic:
//! the steepness of comparison margins, the sharpness of quantifier
//! aggregation, and how many Monte-Carlo samples each quantifier draws per
//! closure call.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, BridgeResult};

/// How `forall` aggregates its sampled body values.
///
/// `exists` is not configurable: it always uses soft-max weighting so
/// gradients favor the sample closest to satisfying the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForAllAggregation {
    /// Arithmetic mean of the sampled body values.
    #[default]
    Mean,
    /// Soft-min weighted sum: gradients concentrate on the worst sample.
    SoftMin,
}

/// Tunable constants of the logic-to-arithmetic relaxation.
///
/// Truth values live in `[0, 1]` throughout: comparisons map their margin
/// into `[0, 1]`, and the connectives keep composites there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxationConfig {
    /// Sigmoid temperature for `lt`/`le`/`gt`/`ge`.
    /// Range: `(0, inf)`; lower is sharper (closer to a hard step).
    pub comparison_temperature: f32,

    /// Width of the gaussian kernel used for `eq`.
    /// Range: `(0, inf)`; lower tolerates smaller differences.
    pub equality_temperature: f32,

    /// Sharpness of soft-min/soft-max quantifier aggregation.
    /// Range: `(0, inf)`; lower approaches a hard min/max.
    pub quantifier_temperature: f32,

    /// Independent samples drawn per quantifier evaluation.
    ///
    /// The default of 1 keeps per-step cost low and lets the many calls of
    /// a training run approximate the expectation over the variable's
    /// domain; raise it for an in-call Monte-Carlo estimate.
    pub quantifier_samples: usize,

    /// Aggregation used for `forall`.
    pub forall_aggregation: ForAllAggregation,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            comparison_temperature: 0.1,
            equality_temperature: 0.1,
            quantifier_temperature: 0.1,
            quantifier_samples: 1,
            forall_aggregation: ForAllAggregation::Mean,
        }
    }
}

impl RelaxationConfig {
    /// Validate every field against its documented range.
    pub fn validate(&self) -> BridgeResult<()> {
        if !(self.comparison_temperature > 0.0 && self.comparison_temperature.is_finite()) {
            return Err(BridgeError::InvalidConfig {
                detail: format!(
                    "comparison_temperature must be a positive finite value, got {}",
                    self.comparison_temperature
                ),
            });
        }
        if !(self.equality_temperature > 0.0 && self.equality_temperature.is_finite()) {
            return Err(BridgeError::InvalidConfig {
                detail: format!(
                    "equality_temperature must be a positive finite value, got {}",
                    self.equality_temperature
                ),
            });
        }
        if !(self.quantifier_temperature > 0.0 && self.quantifier_temperature.is_finite()) {
            return Err(BridgeError::InvalidConfig {
                detail: format!(
                    "quantifier_temperature must be a positive finite value, got {}",
                    self.quantifier_temperature
                ),
            });
        }
        if self.quantifier_samples == 0 {
            return Err(BridgeError::InvalidConfig {
                detail: "quantifier_samples must be >= 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(RelaxationConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_temperature() {
        let config = RelaxationConfig {
            comparison_temperature: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BridgeError::InvalidConfig { .. })
        ));

        let config = RelaxationConfig {
            quantifier_temperature: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_samples() {
        let config = RelaxationConfig {
            quantifier_samples: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: RelaxationConfig =
            serde_json::from_str(r#"{"quantifier_samples": 8, "forall_aggregation": "soft_min"}"#)
                .unwrap();
        assert_eq!(config.quantifier_samples, 8);
        assert_eq!(config.forall_aggregation, ForAllAggregation::SoftMin);
        assert!((config.comparison_temperature - 0.1).abs() < 1e-6);
    }
}
