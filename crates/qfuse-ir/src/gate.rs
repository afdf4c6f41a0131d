//! Quantum gate types.

use num_complex::Complex64;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4};

use crate::error::{IrError, IrResult, check_index_width};
use crate::expr::Polynomial;
use crate::matrix::{GateMatrix, MatrixEntry};
use crate::parameter::{Angle, ParameterExpression};
use crate::qubit::QubitId;

/// Standard gates with known semantics.
///
/// Controlled gates take their control qubit(s) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardGate {
    // Single-qubit Pauli gates
    /// Identity gate.
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,

    // Single-qubit Clifford gates
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// T gate (fourth root of Z).
    T,
    /// T-dagger gate.
    Tdg,
    /// sqrt(X) gate.
    SX,

    // Single-qubit rotation gates
    /// Rotation around X axis.
    Rx(ParameterExpression),
    /// Rotation around Y axis.
    Ry(ParameterExpression),
    /// Rotation around Z axis.
    Rz(ParameterExpression),
    /// Phase gate.
    P(ParameterExpression),
    /// Universal single-qubit gate U(θ, φ, λ).
    U(
        ParameterExpression,
        ParameterExpression,
        ParameterExpression,
    ),

    // Two-qubit gates
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Y gate.
    CY,
    /// Controlled-Z gate.
    CZ,
    /// Controlled-Hadamard gate.
    CH,
    /// SWAP gate.
    Swap,
    /// Controlled rotation around X.
    CRx(ParameterExpression),
    /// Controlled rotation around Y.
    CRy(ParameterExpression),
    /// Controlled rotation around Z.
    CRz(ParameterExpression),
    /// Controlled phase gate.
    CP(ParameterExpression),
    /// ZZ rotation gate.
    RZZ(ParameterExpression),

    // Three-qubit gates
    /// Toffoli gate (CCX).
    CCX,
    /// Fredkin gate (CSWAP).
    CSwap,
}

impl StandardGate {
    /// Get the name of this gate.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
            StandardGate::SX => "sx",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::P(_) => "p",
            StandardGate::U(_, _, _) => "u",
            StandardGate::CX => "cx",
            StandardGate::CY => "cy",
            StandardGate::CZ => "cz",
            StandardGate::CH => "ch",
            StandardGate::Swap => "swap",
            StandardGate::CRx(_) => "crx",
            StandardGate::CRy(_) => "cry",
            StandardGate::CRz(_) => "crz",
            StandardGate::CP(_) => "cp",
            StandardGate::RZZ(_) => "rzz",
            StandardGate::CCX => "ccx",
            StandardGate::CSwap => "cswap",
        }
    }

    /// Look up a gate by name, consuming its parameters.
    ///
    /// Returns `None` for unknown names or a wrong parameter count.
    pub fn from_name(name: &str, params: Vec<ParameterExpression>) -> Option<Self> {
        let mut params = params.into_iter();
        let gate = match name.to_ascii_lowercase().as_str() {
            "id" | "i" => StandardGate::I,
            "x" => StandardGate::X,
            "y" => StandardGate::Y,
            "z" => StandardGate::Z,
            "h" => StandardGate::H,
            "s" => StandardGate::S,
            "sdg" => StandardGate::Sdg,
            "t" => StandardGate::T,
            "tdg" => StandardGate::Tdg,
            "sx" => StandardGate::SX,
            "rx" => StandardGate::Rx(params.next()?),
            "ry" => StandardGate::Ry(params.next()?),
            "rz" => StandardGate::Rz(params.next()?),
            "p" | "phase" => StandardGate::P(params.next()?),
            "u" | "u3" => StandardGate::U(params.next()?, params.next()?, params.next()?),
            "cx" | "cnot" => StandardGate::CX,
            "cy" => StandardGate::CY,
            "cz" => StandardGate::CZ,
            "ch" => StandardGate::CH,
            "swap" => StandardGate::Swap,
            "crx" => StandardGate::CRx(params.next()?),
            "cry" => StandardGate::CRy(params.next()?),
            "crz" => StandardGate::CRz(params.next()?),
            "cp" | "cphase" => StandardGate::CP(params.next()?),
            "rzz" => StandardGate::RZZ(params.next()?),
            "ccx" | "toffoli" => StandardGate::CCX,
            "cswap" | "fredkin" => StandardGate::CSwap,
            _ => return None,
        };
        params.next().is_none().then_some(gate)
    }

    /// Get the number of qubits this gate operates on.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::I
            | StandardGate::X
            | StandardGate::Y
            | StandardGate::Z
            | StandardGate::H
            | StandardGate::S
            | StandardGate::Sdg
            | StandardGate::T
            | StandardGate::Tdg
            | StandardGate::SX
            | StandardGate::Rx(_)
            | StandardGate::Ry(_)
            | StandardGate::Rz(_)
            | StandardGate::P(_)
            | StandardGate::U(_, _, _) => 1,

            StandardGate::CX
            | StandardGate::CY
            | StandardGate::CZ
            | StandardGate::CH
            | StandardGate::Swap
            | StandardGate::CRx(_)
            | StandardGate::CRy(_)
            | StandardGate::CRz(_)
            | StandardGate::CP(_)
            | StandardGate::RZZ(_) => 2,

            StandardGate::CCX | StandardGate::CSwap => 3,
        }
    }

    /// Check if this gate has symbolic parameters.
    pub fn is_parameterized(&self) -> bool {
        self.parameters().iter().any(|p| p.is_symbolic())
    }

    /// Get parameters of this gate.
    pub fn parameters(&self) -> Vec<&ParameterExpression> {
        match self {
            StandardGate::Rx(p)
            | StandardGate::Ry(p)
            | StandardGate::Rz(p)
            | StandardGate::P(p)
            | StandardGate::CRx(p)
            | StandardGate::CRy(p)
            | StandardGate::CRz(p)
            | StandardGate::CP(p)
            | StandardGate::RZZ(p) => vec![p],

            StandardGate::U(a, b, c) => vec![a, b, c],

            _ => vec![],
        }
    }

    /// Matrix of the gate in little-endian qubit order.
    ///
    /// Constant parameters produce numeric entries. Symbolic parameters must
    /// be affine, otherwise `NonAffineParameter` is returned.
    pub fn matrix(&self) -> IrResult<GateMatrix> {
        let entries = match self {
            StandardGate::I => numeric([1.0, 0.0, 0.0, 1.0].map(re)),
            StandardGate::X => pauli_x().to_vec(),
            StandardGate::Y => pauli_y().to_vec(),
            StandardGate::Z => pauli_z().to_vec(),
            StandardGate::H => hadamard().to_vec(),
            StandardGate::S => diagonal(&[re(1.0), im(1.0)]),
            StandardGate::Sdg => diagonal(&[re(1.0), im(-1.0)]),
            StandardGate::T => diagonal(&[re(1.0), Complex64::from_polar(1.0, FRAC_PI_4)]),
            StandardGate::Tdg => diagonal(&[re(1.0), Complex64::from_polar(1.0, -FRAC_PI_4)]),
            StandardGate::SX => numeric([
                Complex64::new(0.5, 0.5),
                Complex64::new(0.5, -0.5),
                Complex64::new(0.5, -0.5),
                Complex64::new(0.5, 0.5),
            ]),
            StandardGate::Rx(p) => rx(&p.to_angle()?).to_vec(),
            StandardGate::Ry(p) => ry(&p.to_angle()?).to_vec(),
            StandardGate::Rz(p) => rz(&p.to_angle()?).to_vec(),
            StandardGate::P(p) => phase(&p.to_angle()?).to_vec(),
            StandardGate::U(theta, phi, lambda) => {
                u(&theta.to_angle()?, &phi.to_angle()?, &lambda.to_angle()?).to_vec()
            }
            StandardGate::CX => controlled(pauli_x()),
            StandardGate::CY => controlled(pauli_y()),
            StandardGate::CZ => controlled(pauli_z()),
            StandardGate::CH => controlled(hadamard()),
            StandardGate::Swap => return permutation(2, |i| swap_bits(i, 0, 1)),
            StandardGate::CRx(p) => controlled(rx(&p.to_angle()?)),
            StandardGate::CRy(p) => controlled(ry(&p.to_angle()?)),
            StandardGate::CRz(p) => controlled(rz(&p.to_angle()?)),
            StandardGate::CP(p) => controlled(phase(&p.to_angle()?)),
            StandardGate::RZZ(p) => {
                let half = p.to_angle()?.scale(0.5);
                let even = expi(&half.scale(-1.0));
                let odd = expi(&half);
                let mut entries = vec![MatrixEntry::zero(); 16];
                entries[0] = even.clone();
                entries[5] = odd.clone();
                entries[10] = odd;
                entries[15] = even;
                entries
            }
            StandardGate::CCX => {
                return permutation(3, |i| if (i & 0b011) == 0b011 { i ^ 0b100 } else { i });
            }
            StandardGate::CSwap => {
                return permutation(3, |i| if (i & 1) == 1 { swap_bits(i, 1, 2) } else { i });
            }
        };
        GateMatrix::new(self.num_qubits() as usize, entries)
    }
}

fn re(value: f64) -> Complex64 {
    Complex64::new(value, 0.0)
}

fn im(value: f64) -> Complex64 {
    Complex64::new(0.0, value)
}

fn numeric<const N: usize>(values: [Complex64; N]) -> Vec<MatrixEntry> {
    values.into_iter().map(MatrixEntry::Numeric).collect()
}

fn diagonal(values: &[Complex64]) -> Vec<MatrixEntry> {
    let dim = values.len();
    let mut entries = vec![MatrixEntry::zero(); dim * dim];
    for (i, v) in values.iter().enumerate() {
        entries[i * dim + i] = MatrixEntry::Numeric(*v);
    }
    entries
}

fn pauli_x() -> [MatrixEntry; 4] {
    [0.0, 1.0, 1.0, 0.0].map(|v| MatrixEntry::Numeric(re(v)))
}

fn pauli_y() -> [MatrixEntry; 4] {
    [0.0, -1.0, 1.0, 0.0].map(|v| MatrixEntry::Numeric(im(v)))
}

fn pauli_z() -> [MatrixEntry; 4] {
    [1.0, 0.0, 0.0, -1.0].map(|v| MatrixEntry::Numeric(re(v)))
}

fn hadamard() -> [MatrixEntry; 4] {
    [1.0, 1.0, 1.0, -1.0].map(|v| MatrixEntry::Numeric(re(v * FRAC_1_SQRT_2)))
}

fn cos(angle: &Angle, factor: Complex64) -> MatrixEntry {
    Polynomial::cos(angle.clone()).scale(factor).into()
}

fn sin(angle: &Angle, factor: Complex64) -> MatrixEntry {
    Polynomial::sin(angle.clone()).scale(factor).into()
}

fn expi(angle: &Angle) -> MatrixEntry {
    Polynomial::expi(angle.clone()).into()
}

fn rx(theta: &Angle) -> [MatrixEntry; 4] {
    let half = theta.scale(0.5);
    [
        cos(&half, re(1.0)),
        sin(&half, im(-1.0)),
        sin(&half, im(-1.0)),
        cos(&half, re(1.0)),
    ]
}

fn ry(theta: &Angle) -> [MatrixEntry; 4] {
    let half = theta.scale(0.5);
    [
        cos(&half, re(1.0)),
        sin(&half, re(-1.0)),
        sin(&half, re(1.0)),
        cos(&half, re(1.0)),
    ]
}

fn rz(theta: &Angle) -> [MatrixEntry; 4] {
    let half = theta.scale(0.5);
    [
        expi(&half.scale(-1.0)),
        MatrixEntry::zero(),
        MatrixEntry::zero(),
        expi(&half),
    ]
}

fn phase(lambda: &Angle) -> [MatrixEntry; 4] {
    [
        MatrixEntry::one(),
        MatrixEntry::zero(),
        MatrixEntry::zero(),
        expi(lambda),
    ]
}

fn u(theta: &Angle, phi: &Angle, lambda: &Angle) -> [MatrixEntry; 4] {
    let half = theta.scale(0.5);
    let c = Polynomial::cos(half.clone());
    let s = Polynomial::sin(half);
    [
        c.clone().into(),
        Polynomial::expi(lambda.clone())
            .mul(&s)
            .scale(re(-1.0))
            .into(),
        Polynomial::expi(phi.clone()).mul(&s).into(),
        Polynomial::expi(phi.add(lambda)).mul(&c).into(),
    ]
}

/// Two-qubit controlled version of a single-qubit matrix, control on bit 0.
fn controlled(target: [MatrixEntry; 4]) -> Vec<MatrixEntry> {
    let mut entries = vec![MatrixEntry::zero(); 16];
    entries[0] = MatrixEntry::one();
    entries[2 * 4 + 2] = MatrixEntry::one();
    let [u00, u01, u10, u11] = target;
    entries[4 + 1] = u00;
    entries[4 + 3] = u01;
    entries[3 * 4 + 1] = u10;
    entries[3 * 4 + 3] = u11;
    entries
}

fn swap_bits(index: usize, a: usize, b: usize) -> usize {
    if ((index >> a) & 1) == ((index >> b) & 1) {
        index
    } else {
        index ^ ((1 << a) | (1 << b))
    }
}

/// Permutation matrix mapping basis state `i` to `map(i)`.
fn permutation(num_qubits: usize, map: impl Fn(usize) -> usize) -> IrResult<GateMatrix> {
    let dim = 1usize << num_qubits;
    let mut entries = vec![MatrixEntry::zero(); dim * dim];
    for col in 0..dim {
        entries[map(col) * dim + col] = MatrixEntry::one();
    }
    GateMatrix::new(num_qubits, entries)
}

/// A unitary operation on an ordered list of distinct qubits.
///
/// Bit `i` of a matrix row or column index is the state of `qubits[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    name: String,
    qubits: Vec<QubitId>,
    matrix: GateMatrix,
}

impl Gate {
    /// Create a gate from an explicit matrix.
    pub fn new(
        name: impl Into<String>,
        qubits: impl IntoIterator<Item = QubitId>,
        matrix: GateMatrix,
    ) -> IrResult<Self> {
        let name = name.into();
        let qubits: Vec<QubitId> = qubits.into_iter().collect();
        check_index_width(qubits.len(), "gate")?;

        let mut seen = FxHashSet::default();
        for &qubit in &qubits {
            if !seen.insert(qubit) {
                return Err(IrError::DuplicateQubit {
                    qubit,
                    gate_name: Some(name),
                });
            }
        }

        if matrix.num_qubits() != qubits.len() {
            return Err(IrError::QubitCountMismatch {
                gate_name: name,
                expected: matrix.num_qubits(),
                got: qubits.len(),
            });
        }

        Ok(Self {
            name,
            qubits,
            matrix,
        })
    }

    /// Create a gate from the standard library.
    pub fn standard(
        gate: &StandardGate,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<Self> {
        let qubits: Vec<QubitId> = qubits.into_iter().collect();
        if qubits.len() != gate.num_qubits() as usize {
            return Err(IrError::QubitCountMismatch {
                gate_name: gate.name().to_string(),
                expected: gate.num_qubits() as usize,
                got: qubits.len(),
            });
        }
        Self::new(gate.name(), qubits, gate.matrix()?)
    }

    /// Get the name of this gate.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qubits in matrix order.
    pub fn qubits(&self) -> &[QubitId] {
        &self.qubits
    }

    /// Get the number of qubits.
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.qubits.len()
    }

    /// The gate matrix.
    pub fn matrix(&self) -> &GateMatrix {
        &self.matrix
    }

    /// Whether any matrix entry depends on runtime parameters.
    pub fn is_symbolic(&self) -> bool {
        self.matrix.is_symbolic()
    }

    /// Runtime parameter names referenced by the matrix.
    pub fn symbols(&self) -> BTreeSet<String> {
        self.matrix.symbols()
    }

    /// Whether the gate touches `qubit`.
    pub fn acts_on(&self, qubit: QubitId) -> bool {
        self.qubits.contains(&qubit)
    }
}

/// Compose `earlier` followed by `later` into a single gate.
///
/// When both act on the same qubit set the result keeps `earlier`'s qubit
/// order and its matrix is `M(later) × M(earlier)`. Otherwise the result acts
/// on the union of both sets in ascending order, and each matrix is first
/// extended by the identity on the qubits it does not touch.
pub fn compose(earlier: &Gate, later: &Gate) -> IrResult<Gate> {
    let same_set = earlier.qubits.len() == later.qubits.len()
        && later.qubits.iter().all(|q| earlier.acts_on(*q));

    let qubits = if same_set {
        earlier.qubits.clone()
    } else {
        let mut union: Vec<QubitId> = earlier
            .qubits
            .iter()
            .chain(&later.qubits)
            .copied()
            .collect();
        union.sort_unstable();
        union.dedup();
        union
    };
    check_index_width(qubits.len(), "gate fusion")?;

    let first = if qubits == earlier.qubits {
        earlier.matrix.clone()
    } else {
        earlier.matrix.extend(&earlier.qubits, &qubits)?
    };
    let second = if qubits == later.qubits {
        later.matrix.clone()
    } else {
        later.matrix.extend(&later.qubits, &qubits)?
    };

    Ok(Gate {
        name: "fused".into(),
        qubits,
        matrix: second.multiply(&first),
    })
}
