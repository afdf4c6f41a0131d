//! Fusion configuration.
//!
//! Both structs deserialize with defaults for missing fields, so a config
//! file only needs to name the values it changes:
//!
//! ```yaml
//! max_fused_arity: 4
//! cost_model:
//!   operation_count_ceiling: 128
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// Default maximum qubit count of a fused block.
pub const DEFAULT_MAX_FUSED_ARITY: usize = 3;
/// Default cap on the nonzero-entry estimate.
pub const DEFAULT_OPERATION_COUNT_CEILING: usize = 64;
/// Default magnitude below which an entry is ignored for cost purposes.
pub const DEFAULT_ZERO_SKIP_THRESHOLD: f64 = 1e-8;

/// Parameters forwarded to the cost model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostModelParams {
    /// Largest nonzero-entry count a fused gate may have.
    pub operation_count_ceiling: usize,
    /// Entries with a smaller magnitude count as zero when estimating cost.
    ///
    /// Never used to drop entries from a kernel.
    pub zero_skip_threshold: f64,
}

impl Default for CostModelParams {
    fn default() -> Self {
        Self {
            operation_count_ceiling: DEFAULT_OPERATION_COUNT_CEILING,
            zero_skip_threshold: DEFAULT_ZERO_SKIP_THRESHOLD,
        }
    }
}

/// Configuration of the fusion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FusionConfig {
    /// Maximum number of qubits a fused block may act on.
    pub max_fused_arity: usize,
    /// Cost model parameters.
    pub cost_model: CostModelParams,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            max_fused_arity: DEFAULT_MAX_FUSED_ARITY,
            cost_model: CostModelParams::default(),
        }
    }
}

impl FusionConfig {
    /// Set the maximum fused arity.
    #[must_use]
    pub fn with_max_fused_arity(mut self, arity: usize) -> Self {
        self.max_fused_arity = arity;
        self
    }

    /// Set the operation-count ceiling.
    #[must_use]
    pub fn with_operation_count_ceiling(mut self, ceiling: usize) -> Self {
        self.cost_model.operation_count_ceiling = ceiling;
        self
    }

    /// Set the zero-skip threshold.
    #[must_use]
    pub fn with_zero_skip_threshold(mut self, threshold: f64) -> Self {
        self.cost_model.zero_skip_threshold = threshold;
        self
    }

    /// Check every value against its valid range.
    pub fn validate(&self) -> CompileResult<()> {
        if self.max_fused_arity < 1 {
            return Err(CompileError::Config(
                "max_fused_arity must be at least 1".into(),
            ));
        }
        if self.cost_model.operation_count_ceiling < 1 {
            return Err(CompileError::Config(
                "operation_count_ceiling must be at least 1".into(),
            ));
        }
        let threshold = self.cost_model.zero_skip_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(CompileError::Config(format!(
                "zero_skip_threshold must be finite and non-negative, got {threshold}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FusionConfig::default();
        assert_eq!(config.max_fused_arity, 3);
        assert_eq!(config.cost_model.operation_count_ceiling, 64);
        assert!((config.cost_model.zero_skip_threshold - 1e-8).abs() < f64::EPSILON);
        config.validate().unwrap();
    }

    #[test]
    fn test_validation() {
        let bad = [
            FusionConfig::default().with_max_fused_arity(0),
            FusionConfig::default().with_operation_count_ceiling(0),
            FusionConfig::default().with_zero_skip_threshold(-1.0),
            FusionConfig::default().with_zero_skip_threshold(f64::NAN),
            FusionConfig::default().with_zero_skip_threshold(f64::INFINITY),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(CompileError::Config(_))),
                "{config:?} should be rejected"
            );
        }
        FusionConfig::default()
            .with_zero_skip_threshold(0.0)
            .validate()
            .unwrap();
    }

    #[test]
    fn test_partial_yaml() {
        let config: FusionConfig =
            serde_yaml_ng::from_str("max_fused_arity: 5\ncost_model:\n  operation_count_ceiling: 256\n")
                .unwrap();
        assert_eq!(config.max_fused_arity, 5);
        assert_eq!(config.cost_model.operation_count_ceiling, 256);
        assert_eq!(
            config.cost_model.zero_skip_threshold,
            DEFAULT_ZERO_SKIP_THRESHOLD
        );
    }

    #[test]
    fn test_json_roundtrip_and_unknown_field() {
        let config = FusionConfig::default().with_max_fused_arity(4);
        let json = serde_json::to_string(&config).unwrap();
        let back: FusionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);

        assert!(serde_json::from_str::<FusionConfig>(r#"{"max_arity": 2}"#).is_err());
    }
}
