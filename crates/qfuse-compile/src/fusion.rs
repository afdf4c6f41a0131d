//! Greedy gate fusion.
//!
//! The engine keeps every profitable fusable pair in a candidate set ordered
//! by fused cost, then by the creation sequence of the earlier and the later
//! block. It repeatedly merges the cheapest candidate, retires every
//! candidate that mentions a merged block, and scores the new block against
//! its wire neighbours, until no candidate is left.
//!
//! The result depends only on the graph and the configuration: the candidate
//! order is a total order over values that do not depend on hashing or
//! arena layout.

use qfuse_ir::{BlockId, CircuitGraph, Gate, compose};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::config::FusionConfig;
use crate::cost::{CostModel, NaiveCostModel};
use crate::error::CompileResult;

/// Summary of a fusion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionReport {
    /// Blocks before fusion.
    pub blocks_before: usize,
    /// Blocks after fusion.
    pub blocks_after: usize,
    /// Merges performed.
    pub merges: usize,
    /// Candidates dropped on re-validation.
    pub stale_candidates: usize,
    /// Sum of block costs before fusion.
    pub cost_before: f64,
    /// Sum of block costs after fusion.
    pub cost_after: f64,
}

/// Total order on `f64` costs.
#[derive(Debug, Clone, Copy)]
struct Cost(f64);

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CandidateKey {
    cost: Cost,
    earlier_seq: u64,
    later_seq: u64,
}

#[derive(Debug, Clone)]
struct Candidate {
    earlier: BlockId,
    later: BlockId,
    fused: Gate,
    before: f64,
}

/// Candidate set with a per-block index for retiring superseded pairs.
#[derive(Default)]
struct CandidateSet {
    queue: BTreeMap<CandidateKey, Candidate>,
    by_block: FxHashMap<BlockId, Vec<CandidateKey>>,
}

impl CandidateSet {
    fn insert(&mut self, key: CandidateKey, candidate: Candidate) {
        self.by_block.entry(candidate.earlier).or_default().push(key);
        self.by_block.entry(candidate.later).or_default().push(key);
        self.queue.insert(key, candidate);
    }

    fn pop(&mut self) -> Option<(CandidateKey, Candidate)> {
        let (key, candidate) = self.queue.pop_first()?;
        for id in [candidate.earlier, candidate.later] {
            self.unindex(id, key);
        }
        Some((key, candidate))
    }

    /// Drop every candidate that mentions `id`.
    fn retire(&mut self, id: BlockId) {
        let Some(keys) = self.by_block.remove(&id) else {
            return;
        };
        for key in keys {
            if let Some(candidate) = self.queue.remove(&key) {
                let other = if candidate.earlier == id {
                    candidate.later
                } else {
                    candidate.earlier
                };
                self.unindex(other, key);
            }
        }
    }

    fn unindex(&mut self, id: BlockId, key: CandidateKey) {
        if let Some(keys) = self.by_block.get_mut(&id) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.by_block.remove(&id);
            }
        }
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Greedy fusion engine.
pub struct FusionEngine {
    config: FusionConfig,
    model: Box<dyn CostModel>,
}

impl std::fmt::Debug for FusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FusionEngine {
    /// Create an engine using [`NaiveCostModel`].
    pub fn new(config: FusionConfig) -> CompileResult<Self> {
        let model = NaiveCostModel::new(config.cost_model.clone());
        Self::with_cost_model(config, Box::new(model))
    }

    /// Create an engine with a custom cost model.
    pub fn with_cost_model(config: FusionConfig, model: Box<dyn CostModel>) -> CompileResult<Self> {
        config.validate()?;
        Ok(Self { config, model })
    }

    /// The engine's configuration.
    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// The engine's cost model.
    pub fn cost_model(&self) -> &dyn CostModel {
        self.model.as_ref()
    }

    /// Fuse `graph` in place until no profitable merge remains.
    #[instrument(skip(self, graph), fields(max_fused_arity = self.config.max_fused_arity))]
    pub fn run(&self, graph: &mut CircuitGraph) -> CompileResult<FusionReport> {
        let blocks_before = graph.num_blocks();
        let cost_before = self.total_cost(graph);
        info!(
            "Running fusion on {} blocks over {} qubits",
            blocks_before,
            graph.num_qubits()
        );

        let mut candidates = CandidateSet::default();
        for id in graph.block_order() {
            for neighbor in graph.neighbors(id) {
                // Score each pair once, from its earlier block.
                if graph.adjacency(id, neighbor).map(|(earlier, _)| earlier) != Some(id) {
                    continue;
                }
                if let Some((key, candidate)) = self.score(graph, id, neighbor)? {
                    candidates.insert(key, candidate);
                }
            }
        }
        debug!("{} initial candidates", candidates.len());

        let mut merges = 0;
        let mut stale_candidates = 0;
        while merges < blocks_before {
            let Some((key, candidate)) = candidates.pop() else {
                break;
            };
            if !self.is_current(graph, &candidate) {
                stale_candidates += 1;
                continue;
            }

            let Candidate {
                earlier,
                later,
                fused,
                before,
            } = candidate;
            candidates.retire(earlier);
            candidates.retire(later);
            let merged = graph.replace(earlier, later, fused)?;
            merges += 1;
            debug!(
                "Merged {} and {} into {} (cost {:.1} -> {:.1})",
                earlier, later, merged, before, key.cost.0
            );

            for neighbor in graph.neighbors(merged) {
                if let Some((key, candidate)) = self.score(graph, merged, neighbor)? {
                    candidates.insert(key, candidate);
                }
            }
        }

        let report = FusionReport {
            blocks_before,
            blocks_after: graph.num_blocks(),
            merges,
            stale_candidates,
            cost_before,
            cost_after: self.total_cost(graph),
        };
        info!(
            "Fusion complete: {} -> {} blocks in {} merges",
            report.blocks_before, report.blocks_after, report.merges
        );
        Ok(report)
    }

    /// Score the pair `(a, b)`, returning a candidate if it is fusable,
    /// admitted by the cost model and profitable.
    fn score(
        &self,
        graph: &CircuitGraph,
        a: BlockId,
        b: BlockId,
    ) -> CompileResult<Option<(CandidateKey, Candidate)>> {
        let Some((earlier, later)) = graph.fusable(a, b, self.config.max_fused_arity) else {
            return Ok(None);
        };
        let (Some(first), Some(second), Some(arity)) = (
            graph.block(earlier),
            graph.block(later),
            graph.union_arity(earlier, later),
        ) else {
            return Ok(None);
        };

        let before = self.model.gate_cost(first.gate()) + self.model.gate_cost(second.gate());
        // Lower bound on the fused cost; skips composing hopeless pairs.
        if !self.model.is_profitable(before, self.model.estimate(arity, 0)) {
            return Ok(None);
        }

        let fused = compose(first.gate(), second.gate())?;
        let nonzero = self.model.count_nonzero(fused.matrix());
        if !self.model.admits(nonzero) {
            return Ok(None);
        }
        let after = self.model.estimate(arity, nonzero);
        if !self.model.is_profitable(before, after) {
            return Ok(None);
        }

        let key = CandidateKey {
            cost: Cost(after),
            earlier_seq: first.seq(),
            later_seq: second.seq(),
        };
        Ok(Some((
            key,
            Candidate {
                earlier,
                later,
                fused,
                before,
            },
        )))
    }

    /// Ids of superseded blocks no longer resolve, so a pair the graph still
    /// fuses in the same direction is current.
    fn is_current(&self, graph: &CircuitGraph, candidate: &Candidate) -> bool {
        graph.fusable(candidate.earlier, candidate.later, self.config.max_fused_arity)
            == Some((candidate.earlier, candidate.later))
    }

    fn total_cost(&self, graph: &CircuitGraph) -> f64 {
        graph
            .all_blocks()
            .iter()
            .map(|(_, block)| self.model.gate_cost(block.gate()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use qfuse_ir::{Circuit, GateMatrix, QubitId};

    fn engine(arity: usize) -> FusionEngine {
        FusionEngine::new(FusionConfig::default().with_max_fused_arity(arity)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = FusionEngine::new(FusionConfig::default().with_max_fused_arity(0));
        assert!(matches!(result, Err(CompileError::Config(_))));
    }

    #[test]
    fn test_empty_graph() {
        let mut graph = CircuitGraph::new(2).unwrap();
        let report = engine(3).run(&mut graph).unwrap();
        assert_eq!(report.blocks_before, 0);
        assert_eq!(report.blocks_after, 0);
        assert_eq!(report.merges, 0);
    }

    #[test]
    fn test_bell_fuses_to_one_block() {
        let mut graph = Circuit::bell().unwrap().into_graph();
        let report = engine(2).run(&mut graph).unwrap();
        assert_eq!(report.merges, 1);
        assert_eq!(graph.num_blocks(), 1);
        let (_, block) = graph.all_blocks()[0];
        assert_eq!(block.qubits(), &[QubitId(0), QubitId(1)]);
        assert_eq!(block.origins(), &[0, 1]);
        assert!(report.cost_after <= report.cost_before);
        graph.verify_integrity().unwrap();
    }

    #[test]
    fn test_double_hadamard_cancels() {
        let mut circuit = Circuit::new("hh", 1).unwrap();
        circuit.h(QubitId(0)).unwrap().h(QubitId(0)).unwrap();
        let mut graph = circuit.into_graph();
        engine(1).run(&mut graph).unwrap();
        assert_eq!(graph.num_blocks(), 1);
        let (_, block) = graph.all_blocks()[0];
        let matrix = block.gate().matrix();
        assert!(matrix.get(0, 1).is_zero());
        assert!(matrix.get(1, 0).is_zero());
    }

    #[test]
    fn test_arity_bound() {
        let mut graph = Circuit::qft(5).unwrap().into_graph();
        engine(2).run(&mut graph).unwrap();
        for (_, block) in graph.all_blocks() {
            assert!(block.qubits().len() <= 2);
        }
        graph.verify_integrity().unwrap();
    }

    #[test]
    fn test_arity_one_merges_only_single_qubit_runs() {
        let mut circuit = Circuit::new("runs", 2).unwrap();
        circuit
            .h(QubitId(0))
            .unwrap()
            .t(QubitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .x(QubitId(1))
            .unwrap();
        let mut graph = circuit.into_graph();
        let report = engine(1).run(&mut graph).unwrap();
        assert_eq!(report.merges, 1);
        assert_eq!(graph.num_blocks(), 3);
    }

    #[test]
    fn test_ceiling_rejects_dense_blocks() {
        let mut circuit = Circuit::new("dense", 2).unwrap();
        circuit.h(QubitId(0)).unwrap().h(QubitId(1)).unwrap();
        circuit.cz(QubitId(0), QubitId(1)).unwrap();
        let mut graph = circuit.into_graph();

        // H on both qubits followed by CZ is a dense 4x4 (16 entries).
        let config = FusionConfig::default().with_operation_count_ceiling(8);
        let report = FusionEngine::new(config).unwrap().run(&mut graph).unwrap();
        for (_, block) in graph.all_blocks() {
            assert!(block.gate().matrix().count_nonzero(1e-8) <= 8);
        }
        assert!(report.blocks_after >= 2);
    }

    #[test]
    fn test_unprofitable_pair_is_kept() {
        // Two CH gates (4 + 6 each) would fuse into a 3-qubit block with
        // 18 nonzeros (8 + 18).
        let mut circuit = Circuit::new("ch", 3).unwrap();
        circuit.ch(QubitId(0), QubitId(1)).unwrap();
        circuit.ch(QubitId(1), QubitId(2)).unwrap();
        let mut graph = circuit.into_graph();
        let report = engine(3).run(&mut graph).unwrap();
        assert_eq!(report.merges, 0);
        assert_eq!(report.cost_before, 20.0);
        assert_eq!(report.cost_after, 20.0);
    }

    #[test]
    fn test_disjoint_blocks_never_merge() {
        let mut graph = CircuitGraph::new(2).unwrap();
        let dense = |q: u32| {
            Gate::new(
                "dense",
                [QubitId(q)],
                GateMatrix::numeric(1, vec![num_complex::Complex64::new(0.5, 0.0); 4]).unwrap(),
            )
            .unwrap()
        };
        graph.add_block(dense(0)).unwrap();
        graph.add_block(dense(1)).unwrap();
        let report = engine(3).run(&mut graph).unwrap();
        assert_eq!(report.merges, 0);
        assert_eq!(graph.num_blocks(), 2);
    }

    fn merged_origins(graph: &CircuitGraph) -> Vec<Vec<u32>> {
        graph
            .all_blocks()
            .iter()
            .map(|(_, b)| b.origins().to_vec())
            .collect()
    }

    #[test]
    fn test_cheapest_pair_merges_first() {
        // CH(0,1) then X(1) fuses at cost 10, X(1) then CX(1,2) at cost 8.
        // Either merge leaves a 3-qubit union, so only the first one happens.
        let mut circuit = Circuit::new("cheapest", 3).unwrap();
        circuit.ch(QubitId(0), QubitId(1)).unwrap();
        circuit.x(QubitId(1)).unwrap();
        circuit.cx(QubitId(1), QubitId(2)).unwrap();
        let mut graph = circuit.into_graph();

        let report = engine(2).run(&mut graph).unwrap();
        assert_eq!(report.merges, 1);
        assert_eq!(merged_origins(&graph), vec![vec![0], vec![1, 2]]);
    }

    #[test]
    fn test_equal_cost_prefers_earlier_blocks() {
        // CX(0,1) then X(1) and X(1) then CX(1,2) both fuse at cost 8.
        let mut circuit = Circuit::new("tie", 3).unwrap();
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.x(QubitId(1)).unwrap();
        circuit.cx(QubitId(1), QubitId(2)).unwrap();
        let mut graph = circuit.into_graph();

        let report = engine(2).run(&mut graph).unwrap();
        assert_eq!(report.merges, 1);
        assert_eq!(merged_origins(&graph), vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_equal_cost_chain_merges_from_the_front() {
        // H H H on one wire: both pairs cancel at cost 4; the front pair
        // goes first and the result then absorbs the last H.
        let mut circuit = Circuit::new("hhh", 1).unwrap();
        circuit.h(QubitId(0)).unwrap().h(QubitId(0)).unwrap().h(QubitId(0)).unwrap();
        let mut graph = circuit.into_graph();

        let report = engine(1).run(&mut graph).unwrap();
        assert_eq!(report.merges, 2);
        assert_eq!(merged_origins(&graph), vec![vec![0, 1, 2]]);
        // H·H·H = H.
        let (_, block) = graph.all_blocks()[0];
        assert_eq!(block.gate().matrix().count_nonzero(1e-8), 4);
    }

    #[test]
    fn test_symbolic_fusion() {
        let mut circuit = Circuit::new("sym", 1).unwrap();
        circuit.rz("theta", QubitId(0)).unwrap();
        circuit.rz(-qfuse_ir::ParameterExpression::symbol("theta"), QubitId(0)).unwrap();
        let mut graph = circuit.into_graph();
        engine(1).run(&mut graph).unwrap();
        assert_eq!(graph.num_blocks(), 1);
        let (_, block) = graph.all_blocks()[0];
        // Rz(theta) followed by Rz(-theta) is the identity with no symbols left.
        assert!(!block.gate().is_symbolic());
    }

    #[test]
    fn test_idempotent() {
        let mut graph = Circuit::variational(4, 2).unwrap().into_graph();
        let engine = engine(3);
        engine.run(&mut graph).unwrap();
        let order: Vec<Vec<u32>> = graph
            .all_blocks()
            .iter()
            .map(|(_, b)| b.origins().to_vec())
            .collect();

        let second = engine.run(&mut graph).unwrap();
        assert_eq!(second.merges, 0);
        let again: Vec<Vec<u32>> = graph
            .all_blocks()
            .iter()
            .map(|(_, b)| b.origins().to_vec())
            .collect();
        assert_eq!(order, again);
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut graph = Circuit::qft(6).unwrap().into_graph();
            let report = engine(3).run(&mut graph).unwrap();
            let blocks: Vec<(Vec<u32>, Vec<QubitId>)> = graph
                .all_blocks()
                .iter()
                .map(|(_, b)| (b.origins().to_vec(), b.qubits().to_vec()))
                .collect();
            (report, blocks)
        };
        let (first_report, first_blocks) = run();
        let (second_report, second_blocks) = run();
        assert_eq!(first_report, second_report);
        assert_eq!(first_blocks, second_blocks);
    }
}
