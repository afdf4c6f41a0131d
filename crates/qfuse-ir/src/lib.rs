//! qfuse Circuit Intermediate Representation
//!
//! This crate provides the data structures the fusion compiler rewrites:
//! gates with numeric or symbolic matrices, and the circuit graph linking
//! gate blocks along per-qubit wires.
//!
//! # Core Components
//!
//! - **Qubits**: [`QubitId`], whose index is also the qubit's bit position in
//!   a statevector amplitude index
//! - **Parameters**: [`ParameterExpression`] for symbolic gate angles, lowered
//!   to affine [`Angle`]s
//! - **Matrices**: [`GateMatrix`] of [`MatrixEntry`] values, each numeric or a
//!   symbolic [`Polynomial`]
//! - **Gates**: [`Gate`] and the [`StandardGate`] library, composed with
//!   [`compose`]
//! - **Graph**: [`CircuitGraph`] of [`GateBlock`]s addressed by [`BlockId`]
//! - **Circuit**: [`Circuit`] high-level builder API
//!
//! # Example: Fusing Two Gates by Hand
//!
//! ```rust
//! use qfuse_ir::{Circuit, QubitId, compose};
//!
//! let mut circuit = Circuit::new("bell", 2).unwrap();
//! circuit.h(QubitId(0)).unwrap();
//! circuit.cx(QubitId(0), QubitId(1)).unwrap();
//!
//! let mut graph = circuit.into_graph();
//! let order = graph.block_order();
//! let (earlier, later) = graph.fusable(order[0], order[1], 2).unwrap();
//! let fused = compose(
//!     graph.block(earlier).unwrap().gate(),
//!     graph.block(later).unwrap().gate(),
//! )
//! .unwrap();
//! graph.replace(earlier, later, fused).unwrap();
//!
//! assert_eq!(graph.num_blocks(), 1);
//! graph.verify_integrity().unwrap();
//! ```
//!
//! # Index Convention
//!
//! Gate matrices are little-endian in the gate's qubit list: bit `i` of a row
//! or column index is the state of `qubits[i]`. Statevector amplitude indices
//! follow the same rule with qubit ids as bit positions.

pub mod circuit;
pub mod error;
pub mod expr;
pub mod gate;
pub mod graph;
pub mod matrix;
pub mod parameter;
pub mod qubit;

pub use circuit::Circuit;
pub use error::{IrError, IrResult, MAX_INDEX_WIDTH, check_index_width};
pub use expr::{Atom, Polynomial};
pub use gate::{Gate, StandardGate, compose};
pub use graph::{BlockId, CircuitGraph, GateBlock, NodeIndex, Wire};
pub use matrix::{GateMatrix, MatrixEntry, REPRESENTATIVE_PARAMETER};
pub use parameter::{Angle, ParameterExpression};
pub use qubit::{QubitId, qubit_mask};
