//! High-level circuit builder API.

use crate::error::IrResult;
use crate::gate::{Gate, StandardGate};
use crate::graph::{BlockId, CircuitGraph};
use crate::parameter::ParameterExpression;
use crate::qubit::QubitId;

/// A quantum circuit.
///
/// Thin builder over a [`CircuitGraph`]: every gate method adds one block in
/// program order. Validation errors from the graph are returned unchanged.
#[derive(Debug, Clone)]
pub struct Circuit {
    /// Name of the circuit.
    name: String,
    /// The underlying graph representation.
    graph: CircuitGraph,
}

impl Circuit {
    /// Create an empty circuit over `num_qubits` qubits.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> IrResult<Self> {
        Ok(Self {
            name: name.into(),
            graph: CircuitGraph::new(num_qubits)?,
        })
    }

    /// Apply a standard gate.
    pub fn apply(
        &mut self,
        gate: &StandardGate,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<BlockId> {
        self.graph.add_block(Gate::standard(gate, qubits)?)
    }

    /// Apply an arbitrary gate.
    pub fn gate(&mut self, gate: Gate) -> IrResult<&mut Self> {
        self.graph.add_block(gate)?;
        Ok(self)
    }

    fn single(&mut self, gate: StandardGate, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(&gate, [qubit])?;
        Ok(self)
    }

    fn pair(&mut self, gate: StandardGate, a: QubitId, b: QubitId) -> IrResult<&mut Self> {
        self.apply(&gate, [a, b])?;
        Ok(self)
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::H, qubit)
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::X, qubit)
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::Y, qubit)
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::Z, qubit)
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::S, qubit)
    }

    /// Apply S-dagger gate.
    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::Sdg, qubit)
    }

    /// Apply T gate.
    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::T, qubit)
    }

    /// Apply T-dagger gate.
    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::Tdg, qubit)
    }

    /// Apply sqrt(X) gate.
    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.single(StandardGate::SX, qubit)
    }

    /// Apply Rx rotation gate.
    pub fn rx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.single(StandardGate::Rx(theta.into()), qubit)
    }

    /// Apply Ry rotation gate.
    pub fn ry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.single(StandardGate::Ry(theta.into()), qubit)
    }

    /// Apply Rz rotation gate.
    pub fn rz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.single(StandardGate::Rz(theta.into()), qubit)
    }

    /// Apply phase gate.
    pub fn p(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.single(StandardGate::P(theta.into()), qubit)
    }

    /// Apply universal U gate.
    pub fn u(
        &mut self,
        theta: impl Into<ParameterExpression>,
        phi: impl Into<ParameterExpression>,
        lambda: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.single(
            StandardGate::U(theta.into(), phi.into(), lambda.into()),
            qubit,
        )
    }

    // =========================================================================
    // Two-qubit gates
    // =========================================================================

    /// Apply CNOT (CX) gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.pair(StandardGate::CX, control, target)
    }

    /// Apply CY gate.
    pub fn cy(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.pair(StandardGate::CY, control, target)
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.pair(StandardGate::CZ, control, target)
    }

    /// Apply controlled-Hadamard gate.
    pub fn ch(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.pair(StandardGate::CH, control, target)
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.pair(StandardGate::Swap, q1, q2)
    }

    /// Apply controlled Rx gate.
    pub fn crx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.pair(StandardGate::CRx(theta.into()), control, target)
    }

    /// Apply controlled Ry gate.
    pub fn cry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.pair(StandardGate::CRy(theta.into()), control, target)
    }

    /// Apply controlled Rz gate.
    pub fn crz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.pair(StandardGate::CRz(theta.into()), control, target)
    }

    /// Apply controlled phase gate.
    pub fn cp(
        &mut self,
        theta: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.pair(StandardGate::CP(theta.into()), control, target)
    }

    /// Apply ZZ rotation gate.
    pub fn rzz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        q1: QubitId,
        q2: QubitId,
    ) -> IrResult<&mut Self> {
        self.pair(StandardGate::RZZ(theta.into()), q1, q2)
    }

    // =========================================================================
    // Three-qubit gates
    // =========================================================================

    /// Apply Toffoli gate.
    pub fn ccx(&mut self, c1: QubitId, c2: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.apply(&StandardGate::CCX, [c1, c2, target])?;
        Ok(self)
    }

    /// Apply Fredkin gate.
    pub fn cswap(&mut self, control: QubitId, t1: QubitId, t2: QubitId) -> IrResult<&mut Self> {
        self.apply(&StandardGate::CSwap, [control, t1, t2])?;
        Ok(self)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.graph.num_qubits()
    }

    /// Get the number of gates.
    pub fn num_gates(&self) -> usize {
        self.graph.num_blocks()
    }

    /// Get a reference to the underlying graph.
    pub fn graph(&self) -> &CircuitGraph {
        &self.graph
    }

    /// Consume the circuit and return the graph.
    pub fn into_graph(self) -> CircuitGraph {
        self.graph
    }

    // =========================================================================
    // Pre-built circuits
    // =========================================================================

    /// Create a Bell state circuit.
    pub fn bell() -> IrResult<Self> {
        let mut circuit = Self::new("bell", 2)?;
        circuit.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?;
        Ok(circuit)
    }

    /// Create a GHZ state circuit.
    pub fn ghz(n: u32) -> IrResult<Self> {
        let mut circuit = Self::new("ghz", n)?;
        if n == 0 {
            return Ok(circuit);
        }

        circuit.h(QubitId(0))?;
        for i in 0..n - 1 {
            circuit.cx(QubitId(i), QubitId(i + 1))?;
        }
        Ok(circuit)
    }

    /// Create a QFT circuit.
    pub fn qft(n: u32) -> IrResult<Self> {
        use std::f64::consts::PI;

        let mut circuit = Self::new("qft", n)?;
        for i in 0..n {
            circuit.h(QubitId(i))?;
            for j in (i + 1)..n {
                let angle = PI / f64::from(1u32 << (j - i).min(31));
                circuit.cp(angle, QubitId(j), QubitId(i))?;
            }
        }
        for i in 0..n / 2 {
            circuit.swap(QubitId(i), QubitId(n - 1 - i))?;
        }
        Ok(circuit)
    }

    /// Create a layered variational ansatz with one symbol per rotation.
    ///
    /// Each layer applies `Ry(theta_{layer}_{q})` and `Rz(phi_{layer}_{q})` to
    /// every qubit followed by a CX ladder.
    pub fn variational(n: u32, layers: u32) -> IrResult<Self> {
        let mut circuit = Self::new("variational", n)?;
        for layer in 0..layers {
            for q in 0..n {
                circuit
                    .ry(
                        ParameterExpression::symbol(format!("theta_{layer}_{q}")),
                        QubitId(q),
                    )?
                    .rz(
                        ParameterExpression::symbol(format!("phi_{layer}_{q}")),
                        QubitId(q),
                    )?;
            }
            for q in 1..n {
                circuit.cx(QubitId(q - 1), QubitId(q))?;
            }
        }
        Ok(circuit)
    }
}
