//! Cost model for gate simulation.
//!
//! Applying a k-qubit gate to a statevector visits `2^(n-k)` amplitude groups.
//! Per group the kernel loads and stores `2^k` amplitudes and performs one
//! complex multiply-add per retained nonzero matrix entry, so the per-group
//! cost is what the model estimates.

use qfuse_ir::{Gate, GateMatrix};

use crate::config::CostModelParams;

/// Estimate of the cost of simulating a gate.
///
/// Implementations must be pure and non-decreasing in both `arity` and
/// `nonzero_count`; the fusion engine relies on that to prune candidates
/// before composing their matrices.
pub trait CostModel: Send + Sync {
    /// Estimated per-group cost of a gate of `arity` qubits with
    /// `nonzero_count` nonzero matrix entries.
    fn estimate(&self, arity: usize, nonzero_count: usize) -> f64;

    /// Largest nonzero count a fused gate may have.
    fn ceiling(&self) -> usize;

    /// Magnitude at or below which an entry is treated as zero.
    fn zero_skip_threshold(&self) -> f64;

    /// Whether replacing gates costing `before` by one costing `after` pays off.
    fn is_profitable(&self, before: f64, after: f64) -> bool {
        after <= before
    }

    /// Whether a gate with `nonzero_count` entries may be produced by fusion.
    fn admits(&self, nonzero_count: usize) -> bool {
        nonzero_count <= self.ceiling()
    }

    /// Nonzero entries of `matrix` under the zero-skip threshold.
    fn count_nonzero(&self, matrix: &GateMatrix) -> usize {
        matrix.count_nonzero(self.zero_skip_threshold())
    }

    /// Estimated cost of `gate`.
    fn gate_cost(&self, gate: &Gate) -> f64 {
        self.estimate(gate.num_qubits(), self.count_nonzero(gate.matrix()))
    }
}

/// Load/store plus multiply-add count model.
///
/// `estimate(k, nnz) = 2^k + min(nnz, ceiling)`.
#[derive(Debug, Clone, PartialEq)]
pub struct NaiveCostModel {
    params: CostModelParams,
}

impl NaiveCostModel {
    /// Create a model from its parameters.
    pub fn new(params: CostModelParams) -> Self {
        Self { params }
    }

    /// The model's parameters.
    pub fn params(&self) -> &CostModelParams {
        &self.params
    }
}

impl Default for NaiveCostModel {
    fn default() -> Self {
        Self::new(CostModelParams::default())
    }
}

impl CostModel for NaiveCostModel {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn estimate(&self, arity: usize, nonzero_count: usize) -> f64 {
        let memory = 2f64.powi(arity.min(i32::MAX as usize) as i32);
        let arithmetic = nonzero_count.min(self.params.operation_count_ceiling) as f64;
        memory + arithmetic
    }

    fn ceiling(&self) -> usize {
        self.params.operation_count_ceiling
    }

    fn zero_skip_threshold(&self) -> f64 {
        self.params.zero_skip_threshold
    }
}
