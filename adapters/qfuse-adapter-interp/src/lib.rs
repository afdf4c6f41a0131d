//! qfuse Reference Interpreter Backend
//!
//! This crate provides a [`CodegenBackend`](qfuse_compile::CodegenBackend)
//! that interprets kernel specs directly instead of emitting machine code,
//! plus a statevector with a gate-by-gate reference simulator. Together they
//! show that a fused circuit computes the same state as the unfused one.
//!
//! # Features
//!
//! - **Kernel interpretation**: group bases via bit deposit, sparse rows,
//!   parameter slots read from the prepared buffer
//! - **Reference simulation**: applies unfused gates straight from their
//!   matrices, independent of the kernel path
//! - **Measurement sampling**: bitstring counts with a caller-supplied RNG
//!
//! # Performance
//!
//! | Qubits | Memory | Simulation Speed |
//! |--------|--------|------------------|
//! | 10 | ~16 KB | Instant |
//! | 15 | ~512 KB | Fast |
//! | 20 | ~16 MB | Moderate |
//! | 25 | ~512 MB | Slow |
//!
//! # Example
//!
//! ```rust
//! use qfuse_adapter_interp::{InterpreterBackend, Statevector};
//! use qfuse_compile::{FusionConfig, Pipeline};
//! use qfuse_ir::Circuit;
//!
//! let pipeline = Pipeline::new(FusionConfig::default(), InterpreterBackend::new()).unwrap();
//! let compiled = pipeline.compile_circuit(Circuit::bell().unwrap()).unwrap();
//!
//! let mut state = Statevector::new(2);
//! compiled.run(state.amplitudes_mut(), &[]).unwrap();
//!
//! let probabilities = state.probabilities();
//! assert!((probabilities[0b00] - 0.5).abs() < 1e-12);
//! assert!((probabilities[0b11] - 0.5).abs() < 1e-12);
//! ```

mod backend;
mod error;
mod statevector;

pub use backend::InterpreterBackend;
pub use error::{InterpError, InterpResult};
pub use statevector::Statevector;
