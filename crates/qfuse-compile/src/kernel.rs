//! Kernel spec generation.
//!
//! Lowers every block of a fused circuit graph into a [`KernelSpec`]: the
//! block's matrix with symbolic entries replaced by parameter slots, plus the
//! indexing descriptor that tells a backend which amplitudes each kernel
//! invocation touches.

use num_complex::Complex64;
use qfuse_ir::{BlockId, CircuitGraph, MatrixEntry, QubitId};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::error::CompileResult;
use crate::indexing::IndexingDescriptor;
use crate::params::{ParameterPreparation, ParameterSlot};

/// A resolved kernel matrix entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelEntry {
    /// Value known at compile time.
    Constant(Complex64),
    /// Value read from the prepared parameter buffer.
    Parameter {
        /// Slot index into the buffer.
        slot: usize,
    },
}

impl KernelEntry {
    /// Whether the entry is a compile-time zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, KernelEntry::Constant(c) if *c == Complex64::new(0.0, 0.0))
    }
}

/// Everything a backend needs to emit one kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelSpec {
    /// Position in execution order.
    pub id: usize,
    /// Block the kernel was generated from.
    pub block: BlockId,
    /// Target qubits in matrix order.
    pub qubits: Vec<QubitId>,
    /// Row-major `2^k × 2^k` matrix.
    pub matrix: Vec<KernelEntry>,
    /// Amplitude-group indexing.
    pub indexing: IndexingDescriptor,
    /// Original gate ids fused into the kernel.
    pub origins: Vec<u32>,
}

impl KernelSpec {
    /// Number of target qubits.
    pub fn arity(&self) -> usize {
        self.qubits.len()
    }

    /// Matrix dimension, `2^k`.
    pub fn dim(&self) -> usize {
        self.indexing.group_size()
    }

    /// Entry at `(row, col)`.
    pub fn entry(&self, row: usize, col: usize) -> KernelEntry {
        self.matrix[row * self.dim() + col]
    }

    /// Whether any entry reads the parameter buffer.
    pub fn is_symbolic(&self) -> bool {
        self.matrix
            .iter()
            .any(|e| matches!(e, KernelEntry::Parameter { .. }))
    }
}

/// Output of [`KernelSpecGenerator::generate`].
#[derive(Debug, Clone)]
pub struct GeneratedKernels {
    /// Kernels in execution order.
    pub kernels: Vec<KernelSpec>,
    /// Present only when some kernel has a symbolic entry.
    pub preparation: Option<ParameterPreparation>,
}

/// Lowers fused blocks to kernel specs for a statevector of fixed width.
#[derive(Debug, Clone, Copy)]
pub struct KernelSpecGenerator {
    num_qubits: u32,
}

impl KernelSpecGenerator {
    /// Generator for an `num_qubits`-qubit statevector.
    pub fn new(num_qubits: u32) -> Self {
        Self { num_qubits }
    }

    /// Generator for a statevector as wide as `graph`'s register.
    pub fn for_graph(graph: &CircuitGraph) -> Self {
        Self::new(graph.num_qubits())
    }

    /// Statevector width.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Generate one kernel per block, in topological order.
    #[instrument(skip(self, graph), fields(num_qubits = self.num_qubits))]
    pub fn generate(&self, graph: &CircuitGraph) -> CompileResult<GeneratedKernels> {
        let mut kernels = Vec::with_capacity(graph.num_blocks());
        let mut slots = Vec::new();
        let mut parameters = BTreeSet::new();

        for (id, (block_id, block)) in graph.all_blocks().into_iter().enumerate() {
            let gate = block.gate();
            let indexing = IndexingDescriptor::new(gate.qubits(), self.num_qubits)?;
            let dim = gate.matrix().dim();

            let matrix = gate
                .matrix()
                .entries()
                .iter()
                .enumerate()
                .map(|(index, entry)| match entry {
                    MatrixEntry::Numeric(value) => KernelEntry::Constant(*value),
                    MatrixEntry::Symbolic(expr) => {
                        parameters.extend(expr.symbols());
                        slots.push(ParameterSlot {
                            kernel: id,
                            row: index / dim,
                            col: index % dim,
                            expr: expr.clone(),
                        });
                        KernelEntry::Parameter {
                            slot: slots.len() - 1,
                        }
                    }
                })
                .collect();

            debug!(
                "Kernel {} from block {} on {} qubits",
                id,
                block_id,
                gate.num_qubits()
            );
            kernels.push(KernelSpec {
                id,
                block: block_id,
                qubits: gate.qubits().to_vec(),
                matrix,
                indexing,
                origins: block.origins().to_vec(),
            });
        }

        let preparation = if slots.is_empty() {
            None
        } else {
            debug!(
                "Parameter preparation: {} slots over {} parameters",
                slots.len(),
                parameters.len()
            );
            Some(ParameterPreparation::new(parameters, slots))
        };

        Ok(GeneratedKernels {
            kernels,
            preparation,
        })
    }
}
