//! Runtime parameter preparation.
//!
//! Symbolic matrix entries are not baked into kernels. Each one becomes a
//! slot in a flat `f64` buffer that is filled from the parameter values
//! before the kernels run, so new angles never require recompilation.

use num_complex::Complex64;
use qfuse_ir::Polynomial;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::error::{CompileError, CompileResult};

/// One symbolic kernel entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSlot {
    /// Position of the owning kernel in the kernel list.
    pub kernel: usize,
    /// Matrix row.
    pub row: usize,
    /// Matrix column.
    pub col: usize,
    /// The entry's expression.
    pub expr: Polynomial,
}

/// Descriptor of the parameter-preparation step.
///
/// Slot `s` writes its real part to `buffer[2s]` and its imaginary part to
/// `buffer[2s + 1]`. Parameter values are passed in the order of
/// [`parameters`](Self::parameters), which is sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterPreparation {
    parameters: Vec<String>,
    slots: Vec<ParameterSlot>,
    positions: FxHashMap<String, usize>,
}

impl ParameterPreparation {
    /// Create a preparation over `parameters` (deduplicated and sorted).
    pub fn new(parameters: impl IntoIterator<Item = String>, slots: Vec<ParameterSlot>) -> Self {
        let mut parameters: Vec<String> = parameters.into_iter().collect();
        parameters.sort();
        parameters.dedup();
        let positions = parameters
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            parameters,
            slots,
            positions,
        }
    }

    /// Parameter names in value order.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// All slots in buffer order.
    pub fn slots(&self) -> &[ParameterSlot] {
        &self.slots
    }

    /// Number of slots.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Length of the prepared buffer.
    pub fn buffer_len(&self) -> usize {
        2 * self.slots.len()
    }

    /// Position of a named parameter in the value array.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Evaluate slot `slot` against `values`.
    ///
    /// Returns `None` if the slot does not exist or `values` is too short.
    pub fn evaluate_slot(&self, slot: usize, values: &[f64]) -> Option<Complex64> {
        let expr = &self.slots.get(slot)?.expr;
        expr.evaluate(&|name: &str| values.get(self.position(name)?).copied())
    }

    /// Fill `buffer` from `values`.
    pub fn prepare_into(&self, values: &[f64], buffer: &mut [f64]) -> CompileResult<()> {
        self.check_values(values)?;
        if buffer.len() < self.buffer_len() {
            return Err(CompileError::BufferSize {
                expected: self.buffer_len(),
                got: buffer.len(),
            });
        }
        for (slot, pair) in self.slots.iter().zip(buffer.chunks_exact_mut(2)) {
            let value = slot
                .expr
                .evaluate(&|name: &str| values.get(self.position(name)?).copied())
                .ok_or_else(|| {
                    let missing = slot
                        .expr
                        .symbols()
                        .into_iter()
                        .find(|s| self.position(s).is_none())
                        .unwrap_or_default();
                    CompileError::UnboundParameter(missing)
                })?;
            pair[0] = value.re;
            pair[1] = value.im;
        }
        Ok(())
    }

    /// Allocate and fill a buffer from `values`.
    pub fn prepare(&self, values: &[f64]) -> CompileResult<Vec<f64>> {
        let mut buffer = vec![0.0; self.buffer_len()];
        self.prepare_into(values, &mut buffer)?;
        Ok(buffer)
    }

    /// Order named values into the value array.
    pub fn bind(&self, named: &BTreeMap<String, f64>) -> CompileResult<Vec<f64>> {
        self.parameters
            .iter()
            .map(|name| {
                named
                    .get(name)
                    .copied()
                    .ok_or_else(|| CompileError::UnboundParameter(name.clone()))
            })
            .collect()
    }

    pub(crate) fn check_values(&self, values: &[f64]) -> CompileResult<()> {
        if values.len() != self.parameters.len() {
            return Err(CompileError::ParameterCount {
                expected: self.parameters.len(),
                got: values.len(),
            });
        }
        Ok(())
    }
}
