//! Statevector storage and gate-by-gate reference simulation.

use num_complex::Complex64;
use qfuse_ir::{CircuitGraph, Gate};
use rand::Rng;
use std::collections::BTreeMap;

use crate::error::{InterpError, InterpResult};

const ZERO: Complex64 = Complex64::new(0.0, 0.0);

/// A statevector representing a quantum state.
///
/// Amplitude index bit `q` is the state of qubit `q`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let size = 1 << num_qubits;
        let mut amplitudes = vec![ZERO; size];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Wrap existing amplitudes. The length must be a power of two.
    pub fn from_amplitudes(amplitudes: Vec<Complex64>) -> InterpResult<Self> {
        if !amplitudes.len().is_power_of_two() {
            return Err(InterpError::StatevectorLength(amplitudes.len()));
        }
        let num_qubits = amplitudes.len().trailing_zeros() as usize;
        Ok(Self {
            amplitudes,
            num_qubits,
        })
    }

    /// A normalized state with random amplitudes.
    pub fn random<R: Rng>(num_qubits: usize, rng: &mut R) -> Self {
        let mut amplitudes: Vec<Complex64> = (0..1usize << num_qubits)
            .map(|_| Complex64::new(rng.r#gen::<f64>() - 0.5, rng.r#gen::<f64>() - 0.5))
            .collect();
        let norm = amplitudes.iter().map(Complex64::norm_sqr).sum::<f64>().sqrt();
        if norm > 0.0 {
            for amp in &mut amplitudes {
                *amp /= norm;
            }
        }
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// The amplitudes.
    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Mutable amplitudes, for running compiled kernels in place.
    pub fn amplitudes_mut(&mut self) -> &mut [Complex64] {
        &mut self.amplitudes
    }

    /// Squared norm of the state.
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(Complex64::norm_sqr).sum()
    }

    /// Largest absolute difference between corresponding amplitudes.
    pub fn max_abs_diff(&self, other: &Statevector) -> f64 {
        if self.amplitudes.len() != other.amplitudes.len() {
            return f64::INFINITY;
        }
        self.amplitudes
            .iter()
            .zip(&other.amplitudes)
            .map(|(a, b)| (a - b).norm())
            .fold(0.0, f64::max)
    }

    /// Apply `gate` directly from its matrix.
    ///
    /// Symbolic entries are evaluated with `lookup`.
    pub fn apply_gate<F>(&mut self, gate: &Gate, lookup: &F) -> InterpResult<()>
    where
        F: Fn(&str) -> Option<f64>,
    {
        if let Some(q) = gate.qubits().iter().find(|q| q.0 as usize >= self.num_qubits) {
            return Err(InterpError::QubitOutOfRange {
                gate: gate.name().to_string(),
                qubit: q.0,
                num_qubits: self.num_qubits,
            });
        }
        let matrix = gate
            .matrix()
            .evaluate(lookup)
            .ok_or_else(|| InterpError::UnboundParameter {
                gate: gate.name().to_string(),
                symbols: gate.symbols().into_iter().collect(),
            })?;

        let dim = 1usize << gate.num_qubits();
        let offsets: Vec<usize> = (0..dim)
            .map(|local| {
                gate.qubits()
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| local & (1usize << i) != 0)
                    .fold(0, |offset, (_, q)| offset | (1usize << q.0))
            })
            .collect();
        let mask = offsets[dim - 1];

        let mut input = vec![ZERO; dim];
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                for (slot, offset) in input.iter_mut().zip(&offsets) {
                    *slot = self.amplitudes[i | offset];
                }
                for (row, offset) in offsets.iter().enumerate() {
                    self.amplitudes[i | offset] = matrix[row * dim..(row + 1) * dim]
                        .iter()
                        .zip(&input)
                        .map(|(m, a)| m * a)
                        .sum();
                }
            }
        }
        Ok(())
    }

    /// Apply every block of `graph` in topological order.
    pub fn apply_graph<F>(&mut self, graph: &CircuitGraph, lookup: &F) -> InterpResult<()>
    where
        F: Fn(&str) -> Option<f64>,
    {
        for (_, block) in graph.all_blocks() {
            self.apply_gate(block.gate(), lookup)?;
        }
        Ok(())
    }

    /// Measurement probability of every basis state.
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(Complex64::norm_sqr).collect()
    }

    /// Sample a measurement outcome.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        let r: f64 = rng.r#gen::<f64>() * self.norm_sqr();

        let mut cumulative = 0.0;
        for (i, amp) in self.amplitudes.iter().enumerate() {
            cumulative += amp.norm_sqr();
            if r < cumulative {
                return i;
            }
        }

        // Rounding can leave `r` just above the last cumulative sum.
        self.amplitudes.len() - 1
    }

    /// Sample `shots` outcomes and count them by bitstring.
    pub fn sample_counts<R: Rng>(&self, shots: usize, rng: &mut R) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for _ in 0..shots {
            let outcome = self.sample(rng);
            *counts.entry(self.outcome_to_bitstring(outcome)).or_insert(0) += 1;
        }
        counts
    }

    /// Convert measurement outcome to bitstring, qubit 0 first.
    pub fn outcome_to_bitstring(&self, outcome: usize) -> String {
        format!("{:0width$b}", outcome, width = self.num_qubits)
            .chars()
            .rev()
            .collect()
    }
}
