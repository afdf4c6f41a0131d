//! Gate matrices with numeric or symbolic entries.
//!
//! Matrices are stored row-major as `2^k × 2^k` entries. Row and column
//! indices use the gate's qubit order little-endian: bit `i` of an index is
//! the state of the gate's `i`-th qubit.

use num_complex::Complex64;
use std::collections::BTreeSet;

use crate::error::{IrError, IrResult, check_index_width};
use crate::expr::Polynomial;
use crate::qubit::QubitId;

/// Value substituted for every free parameter when a symbolic entry's
/// magnitude has to be estimated.
///
/// Chosen away from rational multiples of π so that `sin`/`cos` of typical
/// gate angles do not vanish at it.
pub const REPRESENTATIVE_PARAMETER: f64 = 0.577_215_664_901_532_9;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// A single matrix entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixEntry {
    /// A concrete complex number.
    Numeric(Complex64),
    /// An expression over named runtime parameters.
    Symbolic(Polynomial),
}

impl MatrixEntry {
    /// The zero entry.
    pub fn zero() -> Self {
        MatrixEntry::Numeric(ZERO)
    }

    /// The unit entry.
    pub fn one() -> Self {
        MatrixEntry::Numeric(ONE)
    }

    /// Wrap a polynomial, collapsing it to a numeric entry if it has no symbols.
    pub fn from_polynomial(poly: Polynomial) -> Self {
        match poly.as_constant() {
            Some(value) => MatrixEntry::Numeric(value),
            None => MatrixEntry::Symbolic(poly),
        }
    }

    /// Whether the entry is exactly zero.
    ///
    /// Numeric entries must compare equal to zero; symbolic entries must have
    /// simplified away entirely. No tolerance is applied.
    pub fn is_zero(&self) -> bool {
        match self {
            MatrixEntry::Numeric(v) => *v == ZERO,
            MatrixEntry::Symbolic(p) => p.is_zero(),
        }
    }

    /// Whether the entry depends on runtime parameters.
    pub fn is_symbolic(&self) -> bool {
        matches!(self, MatrixEntry::Symbolic(_))
    }

    /// Product of two entries.
    #[must_use]
    pub fn mul(&self, rhs: &MatrixEntry) -> MatrixEntry {
        match (self, rhs) {
            (MatrixEntry::Numeric(a), MatrixEntry::Numeric(b)) => MatrixEntry::Numeric(a * b),
            (MatrixEntry::Numeric(a), MatrixEntry::Symbolic(p))
            | (MatrixEntry::Symbolic(p), MatrixEntry::Numeric(a)) => {
                MatrixEntry::from_polynomial(p.scale(*a))
            }
            (MatrixEntry::Symbolic(p), MatrixEntry::Symbolic(q)) => {
                MatrixEntry::from_polynomial(p.mul(q))
            }
        }
    }

    /// Sum of two entries.
    #[must_use]
    pub fn add(&self, rhs: &MatrixEntry) -> MatrixEntry {
        match (self, rhs) {
            (MatrixEntry::Numeric(a), MatrixEntry::Numeric(b)) => MatrixEntry::Numeric(a + b),
            (MatrixEntry::Numeric(a), MatrixEntry::Symbolic(p))
            | (MatrixEntry::Symbolic(p), MatrixEntry::Numeric(a)) => {
                MatrixEntry::from_polynomial(p.add(&Polynomial::constant(*a)))
            }
            (MatrixEntry::Symbolic(p), MatrixEntry::Symbolic(q)) => {
                MatrixEntry::from_polynomial(p.add(q))
            }
        }
    }

    /// Evaluate with symbol values supplied by `lookup`.
    pub fn evaluate<F>(&self, lookup: &F) -> Option<Complex64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            MatrixEntry::Numeric(v) => Some(*v),
            MatrixEntry::Symbolic(p) => p.evaluate(lookup),
        }
    }

    /// Magnitude used for cost estimation.
    ///
    /// Symbolic entries are evaluated with every parameter set to
    /// [`REPRESENTATIVE_PARAMETER`].
    pub fn magnitude_estimate(&self) -> f64 {
        match self {
            MatrixEntry::Numeric(v) => v.norm(),
            MatrixEntry::Symbolic(p) => p
                .evaluate(&|_| Some(REPRESENTATIVE_PARAMETER))
                .map_or(f64::INFINITY, |v| v.norm()),
        }
    }
}

impl From<Complex64> for MatrixEntry {
    fn from(value: Complex64) -> Self {
        MatrixEntry::Numeric(value)
    }
}

impl From<Polynomial> for MatrixEntry {
    fn from(poly: Polynomial) -> Self {
        MatrixEntry::from_polynomial(poly)
    }
}

/// A `2^k × 2^k` gate matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct GateMatrix {
    num_qubits: usize,
    entries: Vec<MatrixEntry>,
}

impl GateMatrix {
    /// Create a matrix for a `num_qubits`-qubit gate from row-major entries.
    pub fn new(num_qubits: usize, entries: Vec<MatrixEntry>) -> IrResult<Self> {
        let expected = entry_count(num_qubits)?;
        if entries.len() != expected {
            return Err(IrError::MatrixDimension {
                num_qubits,
                expected,
                len: entries.len(),
            });
        }
        Ok(Self {
            num_qubits,
            entries,
        })
    }

    /// Create a fully numeric matrix.
    pub fn numeric(num_qubits: usize, values: Vec<Complex64>) -> IrResult<Self> {
        Self::new(num_qubits, values.into_iter().map(MatrixEntry::Numeric).collect())
    }

    /// The identity on `num_qubits` qubits.
    pub fn identity(num_qubits: usize) -> IrResult<Self> {
        let mut entries = vec![MatrixEntry::zero(); entry_count(num_qubits)?];
        let dim = 1usize << num_qubits;
        for i in 0..dim {
            entries[i * dim + i] = MatrixEntry::one();
        }
        Ok(Self {
            num_qubits,
            entries,
        })
    }

    /// Number of qubits the matrix acts on.
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Edge length, `2^k`.
    #[inline]
    pub fn dim(&self) -> usize {
        1 << self.num_qubits
    }

    /// Entry at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &MatrixEntry {
        &self.entries[row * self.dim() + col]
    }

    /// All entries, row-major.
    pub fn entries(&self) -> &[MatrixEntry] {
        &self.entries
    }

    /// Whether any entry is symbolic.
    pub fn is_symbolic(&self) -> bool {
        self.entries.iter().any(MatrixEntry::is_symbolic)
    }

    /// Count entries whose estimated magnitude exceeds `threshold`.
    pub fn count_nonzero(&self, threshold: f64) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.is_zero() && e.magnitude_estimate() > threshold)
            .count()
    }

    /// Symbols referenced by any entry.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        for entry in &self.entries {
            if let MatrixEntry::Symbolic(p) = entry {
                set.extend(p.symbols());
            }
        }
        set
    }

    /// Evaluate every entry; `None` if a symbol is unbound.
    pub fn evaluate<F>(&self, lookup: &F) -> Option<Vec<Complex64>>
    where
        F: Fn(&str) -> Option<f64>,
    {
        self.entries.iter().map(|e| e.evaluate(lookup)).collect()
    }

    /// Matrix product `self × rhs`.
    ///
    /// Exactly-zero entries are skipped, which keeps products of sparse
    /// (permutation, diagonal, controlled) gates cheap.
    ///
    /// # Panics
    ///
    /// Panics if the two matrices have different dimensions.
    #[must_use]
    pub fn multiply(&self, rhs: &GateMatrix) -> GateMatrix {
        assert_eq!(
            self.num_qubits, rhs.num_qubits,
            "matrix product requires equal dimensions"
        );
        let dim = self.dim();
        let mut entries = vec![MatrixEntry::zero(); dim * dim];
        for row in 0..dim {
            for k in 0..dim {
                let lhs = self.get(row, k);
                if lhs.is_zero() {
                    continue;
                }
                for col in 0..dim {
                    let r = rhs.get(k, col);
                    if r.is_zero() {
                        continue;
                    }
                    let slot = &mut entries[row * dim + col];
                    *slot = slot.add(&lhs.mul(r));
                }
            }
        }
        GateMatrix {
            num_qubits: self.num_qubits,
            entries,
        }
    }

    /// Re-express a matrix acting on `own` qubits over the `target` qubit list.
    ///
    /// `target` must contain every qubit of `own`. Qubits of `target` missing
    /// from `own` get the identity, and the result follows `target`'s order.
    /// With `own` and `target` holding the same qubits this is a permutation.
    pub fn extend(&self, own: &[QubitId], target: &[QubitId]) -> IrResult<GateMatrix> {
        check_index_width(target.len(), "matrix extension")?;
        let mut positions = Vec::with_capacity(own.len());
        for q in own {
            let pos = target.iter().position(|t| t == q).ok_or_else(|| {
                IrError::GraphInvariant(format!(
                    "qubit {q} of the gate is missing from the extension target"
                ))
            })?;
            positions.push(pos);
        }
        let own_mask = positions.iter().fold(0usize, |m, p| m | (1 << p));

        let dim = 1usize << target.len();
        let gather = |index: usize| -> usize {
            positions
                .iter()
                .enumerate()
                .fold(0, |acc, (i, p)| acc | (((index >> p) & 1) << i))
        };

        let mut entries = Vec::with_capacity(entry_count(target.len())?);
        for row in 0..dim {
            for col in 0..dim {
                if (row & !own_mask) != (col & !own_mask) {
                    entries.push(MatrixEntry::zero());
                } else {
                    entries.push(self.get(gather(row), gather(col)).clone());
                }
            }
        }
        Ok(GateMatrix {
            num_qubits: target.len(),
            entries,
        })
    }
}

/// `(2^k)^2`, or `ArityOverflow` if that does not fit in memory indexing.
fn entry_count(num_qubits: usize) -> IrResult<usize> {
    check_index_width(num_qubits, "gate matrix")?;
    u32::try_from(2 * num_qubits)
        .ok()
        .and_then(|shift| 1usize.checked_shl(shift))
        .ok_or(IrError::ArityOverflow {
            num_qubits,
            context: "gate matrix",
        })
}
