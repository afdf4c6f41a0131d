//! Error types for the IR crate.

use crate::graph::BlockId;
use crate::qubit::QubitId;
use thiserror::Error;

/// Widest qubit index space the IR can address.
///
/// Amplitude indices and qubit masks are `u64`; one bit is kept free so that
/// `1 << width` never overflows.
pub const MAX_INDEX_WIDTH: usize = 63;

/// Errors that can occur in IR operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Qubit is outside the declared register of the graph.
    #[error("Qubit {qubit} not found in circuit of {num_qubits} qubits{}", format_gate_context(.gate_name))]
    QubitNotFound {
        /// The qubit that was not found.
        qubit: QubitId,
        /// Declared register width.
        num_qubits: u32,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Duplicate qubit in a gate.
    #[error("Duplicate qubit {qubit} in gate{}", format_gate_context(.gate_name))]
    DuplicateQubit {
        /// The duplicate qubit.
        qubit: QubitId,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Qubit count does not match gate arity.
    #[error("Gate '{gate_name}' expects {expected} qubits, got {got}")]
    QubitCountMismatch {
        /// Name of the gate.
        gate_name: String,
        /// Expected number of qubits.
        expected: usize,
        /// Actual number of qubits provided.
        got: usize,
    },

    /// Matrix is not 2^k x 2^k for a k-qubit gate.
    #[error("Matrix with {len} entries does not fit a {num_qubits}-qubit gate (expected {expected})")]
    MatrixDimension {
        /// Number of qubits of the gate.
        num_qubits: usize,
        /// Expected entry count, (2^k)^2.
        expected: usize,
        /// Actual entry count.
        len: usize,
    },

    /// A qubit count exceeds the representable index width.
    #[error("{context}: {num_qubits} qubits exceed the index width of {MAX_INDEX_WIDTH} bits")]
    ArityOverflow {
        /// Offending qubit count.
        num_qubits: usize,
        /// Where the overflow was detected.
        context: &'static str,
    },

    /// Graph wiring was violated, e.g. `replace` on blocks that are not adjacent.
    #[error("Graph invariant violated: {0}")]
    GraphInvariant(String),

    /// Block id does not refer to a live block.
    #[error("Block {0} is not live in the circuit graph")]
    InvalidBlock(BlockId),

    /// Parameter expression cannot be used as a gate angle.
    #[error("Parameter expression '{0}' is not affine in its symbols")]
    NonAffineParameter(String),
}

/// Helper function to format optional gate context.
#[allow(clippy::ref_option)]
fn format_gate_context(gate_name: &Option<String>) -> String {
    match gate_name {
        Some(name) => format!(" (gate: {name})"),
        None => String::new(),
    }
}

/// Check that `num_qubits` fits the addressable index width.
pub fn check_index_width(num_qubits: usize, context: &'static str) -> IrResult<()> {
    if num_qubits > MAX_INDEX_WIDTH {
        return Err(IrError::ArityOverflow {
            num_qubits,
            context,
        });
    }
    Ok(())
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
