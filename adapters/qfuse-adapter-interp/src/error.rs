//! Interpreter errors.

use thiserror::Error;

/// Errors raised by the interpreter backend and statevector.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InterpError {
    /// Kernel matrix length is not the square of its group size.
    #[error("Kernel {kernel} has {len} matrix entries, expected {expected}")]
    MatrixShape {
        /// Kernel id.
        kernel: usize,
        /// Expected entry count.
        expected: usize,
        /// Actual entry count.
        len: usize,
    },

    /// Amplitude count is not a power of two.
    #[error("Statevector length {0} is not a power of two")]
    StatevectorLength(usize),

    /// A gate touches a qubit outside the statevector.
    #[error("Gate '{gate}' touches qubit {qubit} of a {num_qubits}-qubit statevector")]
    QubitOutOfRange {
        /// Gate name.
        gate: String,
        /// Offending qubit.
        qubit: u32,
        /// Statevector width.
        num_qubits: usize,
    },

    /// A symbolic gate was applied without a value for one of its symbols.
    #[error("Gate '{gate}' needs a value for one of {symbols:?}")]
    UnboundParameter {
        /// Gate name.
        gate: String,
        /// Symbols the gate references.
        symbols: Vec<String>,
    },
}

/// Result type for interpreter operations.
pub type InterpResult<T> = Result<T, InterpError>;
