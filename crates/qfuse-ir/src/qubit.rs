//! Qubit identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a qubit within the circuit register.
///
/// The index doubles as the bit position of the qubit inside a statevector
/// amplitude index: amplitude `i` has qubit `q` in state `|1⟩` iff bit `q` of
/// `i` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QubitId(pub u32);

impl QubitId {
    /// Bit position of this qubit in an amplitude index.
    #[inline]
    pub fn bit(self) -> u32 {
        self.0
    }

    /// Single-bit mask selecting this qubit in an amplitude index.
    ///
    /// Callers must have checked the qubit against the index width.
    #[inline]
    pub fn mask(self) -> u64 {
        1u64 << self.0
    }
}

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<u32> for QubitId {
    fn from(id: u32) -> Self {
        QubitId(id)
    }
}

/// Combined bit mask of a set of qubits.
pub fn qubit_mask(qubits: &[QubitId]) -> u64 {
    qubits.iter().fold(0, |mask, q| mask | q.mask())
}
