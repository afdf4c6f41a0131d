//! Error types for the compilation crate.

use qfuse_ir::QubitId;
use thiserror::Error;

use crate::backend::BackendError;

/// Errors that can occur during compilation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] qfuse_ir::IrError),

    /// Fusion configuration is out of range.
    #[error("Invalid fusion configuration: {0}")]
    Config(String),

    /// A gate touches a qubit outside the statevector.
    #[error("Qubit {qubit} is outside a statevector of {num_qubits} qubits")]
    QubitOutOfRange {
        /// The offending qubit.
        qubit: QubitId,
        /// Statevector width.
        num_qubits: u32,
    },

    /// The codegen backend rejected a kernel or the parameter preparation.
    #[error("Codegen backend failed: {0}")]
    Backend(#[source] BackendError),

    /// Wrong number of runtime parameter values.
    #[error("Expected {expected} parameter values, got {got}")]
    ParameterCount {
        /// Number of parameters the circuit declares.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// A named parameter has no value.
    #[error("No value bound for parameter '{0}'")]
    UnboundParameter(String),

    /// Parameter buffer is shorter than the prepared slots need.
    #[error("Parameter buffer has {got} values, preparation needs {expected}")]
    BufferSize {
        /// Twice the number of slots.
        expected: usize,
        /// Length of the supplied buffer.
        got: usize,
    },

    /// Amplitude buffer does not match the circuit width.
    #[error("Statevector has {got} amplitudes, circuit needs {expected}")]
    StatevectorSize {
        /// `2^n` for the compiled circuit.
        expected: usize,
        /// Length of the supplied buffer.
        got: usize,
    },
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
