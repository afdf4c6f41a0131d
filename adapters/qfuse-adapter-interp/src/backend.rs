//! Interpreting codegen backend.

use num_complex::Complex64;
use qfuse_compile::{
    BackendError, CodegenBackend, KernelEntry, KernelFn, KernelSpec, ParameterPreparation,
    PrepareFn, full_mask, pdep,
};
use tracing::debug;

use crate::error::InterpError;

/// Backend that runs kernel specs without generating machine code.
///
/// Each kernel walks its amplitude groups by depositing the group number
/// into the non-target bits, gathers the `2^k` amplitudes, multiplies by the
/// matrix (skipping compile-time zeros) and scatters the result back.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpreterBackend;

impl InterpreterBackend {
    /// Create a new interpreter backend.
    pub fn new() -> Self {
        Self
    }
}

impl CodegenBackend for InterpreterBackend {
    fn name(&self) -> &str {
        "interpreter"
    }

    fn compile_kernel(&self, spec: &KernelSpec) -> Result<KernelFn, BackendError> {
        let dim = spec.dim();
        if spec.matrix.len() != dim * dim {
            return Err(InterpError::MatrixShape {
                kernel: spec.id,
                expected: dim * dim,
                len: spec.matrix.len(),
            }
            .into());
        }

        // Sparse rows: (column, entry) for every entry not known to be zero.
        let rows: Vec<Vec<(usize, KernelEntry)>> = spec
            .matrix
            .chunks_exact(dim)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, entry)| !entry.is_zero())
                    .map(|(col, entry)| (col, *entry))
                    .collect()
            })
            .collect();
        let offsets: Vec<usize> = spec
            .indexing
            .offsets()
            .iter()
            .map(|&offset| offset as usize)
            .collect();
        let arity = spec.arity() as u32;
        debug!(
            "Kernel {}: {} of {} entries retained",
            spec.id,
            rows.iter().map(Vec::len).sum::<usize>(),
            dim * dim
        );

        Ok(Box::new(
            move |amplitudes: &mut [Complex64], num_qubits: u32, qubit_mask: u64, params: &[f64]| {
                let free = !qubit_mask & full_mask(num_qubits);
                let mut input = vec![Complex64::new(0.0, 0.0); offsets.len()];
                for group in 0..(1u64 << (num_qubits - arity)) {
                    let base = pdep(group, free) as usize;
                    for (slot, offset) in input.iter_mut().zip(&offsets) {
                        *slot = amplitudes[base | offset];
                    }
                    for (row, offset) in rows.iter().zip(&offsets) {
                        amplitudes[base | offset] = row
                            .iter()
                            .map(|&(col, entry)| value(entry, params) * input[col])
                            .sum();
                    }
                }
            },
        ))
    }

    fn compile_preparation(
        &self,
        preparation: &ParameterPreparation,
    ) -> Result<PrepareFn, BackendError> {
        let preparation = preparation.clone();
        debug!(
            "Preparation: {} slots over {} parameters",
            preparation.num_slots(),
            preparation.parameters().len()
        );
        Ok(Box::new(move |values: &[f64], buffer: &mut [f64]| {
            for (slot, pair) in buffer
                .chunks_exact_mut(2)
                .take(preparation.num_slots())
                .enumerate()
            {
                // Missing values poison the slot instead of panicking.
                let value = preparation
                    .evaluate_slot(slot, values)
                    .unwrap_or(Complex64::new(f64::NAN, f64::NAN));
                pair[0] = value.re;
                pair[1] = value.im;
            }
        }))
    }
}

#[inline]
fn value(entry: KernelEntry, params: &[f64]) -> Complex64 {
    match entry {
        KernelEntry::Constant(c) => c,
        KernelEntry::Parameter { slot } => Complex64::new(params[2 * slot], params[2 * slot + 1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qfuse_compile::KernelSpecGenerator;
    use qfuse_ir::{Circuit, QubitId};

    fn kernels(circuit: &Circuit) -> qfuse_compile::GeneratedKernels {
        KernelSpecGenerator::for_graph(circuit.graph())
            .generate(circuit.graph())
            .unwrap()
    }

    #[test]
    fn test_x_kernel() {
        let mut circuit = Circuit::new("x", 2).unwrap();
        circuit.x(QubitId(1)).unwrap();
        let generated = kernels(&circuit);
        let spec = &generated.kernels[0];
        let kernel = InterpreterBackend::new().compile_kernel(spec).unwrap();

        let mut amplitudes = vec![Complex64::new(0.0, 0.0); 4];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        kernel(&mut amplitudes, 2, spec.indexing.qubit_mask(), &[]);
        assert_eq!(amplitudes[0b10], Complex64::new(1.0, 0.0));
        assert_eq!(amplitudes[0], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_parameter_kernel() {
        let mut circuit = Circuit::new("rz", 1).unwrap();
        circuit.rz("theta", QubitId(0)).unwrap();
        let generated = kernels(&circuit);
        let backend = InterpreterBackend::new();
        let spec = &generated.kernels[0];
        let kernel = backend.compile_kernel(spec).unwrap();
        let preparation = generated.preparation.unwrap();
        let prepare = backend.compile_preparation(&preparation).unwrap();

        let mut buffer = vec![0.0; preparation.buffer_len()];
        prepare(&[std::f64::consts::PI], &mut buffer);

        let h = std::f64::consts::FRAC_1_SQRT_2;
        let mut amplitudes = vec![Complex64::new(h, 0.0); 2];
        kernel(&mut amplitudes, 1, spec.indexing.qubit_mask(), &buffer);
        // Rz(pi) = diag(-i, i)
        assert!((amplitudes[0] - Complex64::new(0.0, -h)).norm() < 1e-12);
        assert!((amplitudes[1] - Complex64::new(0.0, h)).norm() < 1e-12);
    }

    #[test]
    fn test_preparation_with_missing_values_is_nan() {
        let mut circuit = Circuit::new("rx", 1).unwrap();
        circuit.rx("theta", QubitId(0)).unwrap();
        let preparation = kernels(&circuit).preparation.unwrap();
        let prepare = InterpreterBackend::new()
            .compile_preparation(&preparation)
            .unwrap();
        let mut buffer = vec![0.0; preparation.buffer_len()];
        prepare(&[], &mut buffer);
        assert!(buffer.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_rejects_malformed_spec() {
        let circuit = Circuit::bell().unwrap();
        let mut spec = kernels(&circuit).kernels[0].clone();
        spec.matrix.pop();
        let err = InterpreterBackend::new().compile_kernel(&spec).err().unwrap();
        assert!(err.to_string().contains("expected 4"));
    }
}
