//! Circuit graph: gate blocks linked per qubit wire.

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex as PetNodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use crate::error::{IrError, IrResult, check_index_width};
use crate::gate::Gate;
use crate::qubit::QubitId;

/// Node index type for the circuit graph.
pub type NodeIndex = PetNodeIndex<u32>;

/// Stable identifier of a block.
///
/// An id pairs the arena slot with the block's creation sequence number. The
/// arena reuses freed slots, so an id of a block superseded by a merge never
/// resolves again, even after its slot holds a newer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    node: NodeIndex,
    seq: u64,
}

impl BlockId {
    /// Raw arena index.
    #[inline]
    pub fn index(self) -> usize {
        self.node.index()
    }

    /// Creation sequence number of the block this id was issued for.
    #[inline]
    pub fn seq(self) -> u64 {
        self.seq
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.seq)
    }
}

/// A node of the circuit graph.
#[derive(Debug, Clone)]
pub struct GateBlock {
    gate: Gate,
    seq: u64,
    /// Position in a topological order of the live blocks.
    rank: u64,
    origins: Vec<u32>,
}

impl GateBlock {
    /// The gate held by this block.
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Creation sequence number, unique and increasing within a graph.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Ids of the original gates merged into this block, ascending.
    ///
    /// Original ids are assigned by [`CircuitGraph::add_block`] in call order.
    pub fn origins(&self) -> &[u32] {
        &self.origins
    }

    /// Qubits of the block's gate.
    pub fn qubits(&self) -> &[QubitId] {
        self.gate.qubits()
    }
}

/// An edge of the circuit graph: consecutive blocks on one qubit's wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Wire {
    /// The qubit whose wire this edge belongs to.
    pub qubit: QubitId,
}

/// Mutable DAG of gate blocks.
///
/// The graph has one wire per declared qubit. A wire is the chain of blocks
/// touching that qubit, linked by [`Wire`] edges from earlier to later block.
/// `heads` and `tails` hold the first and last block of every wire.
///
/// Blocks live in a [`StableDiGraph`], so removing a block never invalidates
/// the ids of other blocks. Every block also carries a rank, and ranks
/// increase along every edge; `replace` repairs the ranks it disturbs.
#[derive(Debug, Clone)]
pub struct CircuitGraph {
    graph: StableDiGraph<GateBlock, Wire, u32>,
    heads: Vec<Option<NodeIndex>>,
    tails: Vec<Option<NodeIndex>>,
    next_seq: u64,
    next_origin: u32,
}

impl CircuitGraph {
    /// Create an empty graph over `num_qubits` wires.
    pub fn new(num_qubits: u32) -> IrResult<Self> {
        check_index_width(num_qubits as usize, "circuit register")?;
        Ok(Self {
            graph: StableDiGraph::default(),
            heads: vec![None; num_qubits as usize],
            tails: vec![None; num_qubits as usize],
            next_seq: 0,
            next_origin: 0,
        })
    }

    /// Number of declared qubits.
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn num_qubits(&self) -> u32 {
        self.heads.len() as u32
    }

    /// Number of live blocks.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no blocks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Append a block holding `gate` at the tail of every wire it touches.
    pub fn add_block(&mut self, gate: Gate) -> IrResult<BlockId> {
        if gate.num_qubits() == 0 {
            return Err(IrError::GraphInvariant(format!(
                "gate '{}' acts on no qubits",
                gate.name()
            )));
        }
        for &qubit in gate.qubits() {
            if qubit.0 >= self.num_qubits() {
                return Err(IrError::QubitNotFound {
                    qubit,
                    num_qubits: self.num_qubits(),
                    gate_name: Some(gate.name().to_string()),
                });
            }
        }

        let origin = self.next_origin;
        self.next_origin += 1;
        let qubits = gate.qubits().to_vec();
        let node = self.insert(gate, vec![origin]);

        for qubit in qubits {
            let slot = qubit.0 as usize;
            match self.tails[slot] {
                Some(tail) => {
                    self.graph.add_edge(tail, node, Wire { qubit });
                }
                None => self.heads[slot] = Some(node),
            }
            self.tails[slot] = Some(node);
        }
        Ok(self.id(node))
    }

    fn insert(&mut self, gate: Gate, origins: Vec<u32>) -> NodeIndex {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.graph.add_node(GateBlock {
            gate,
            seq,
            rank: seq,
            origins,
        })
    }

    fn id(&self, node: NodeIndex) -> BlockId {
        BlockId {
            node,
            seq: self.graph[node].seq,
        }
    }

    /// Whether `id` refers to a live block.
    #[inline]
    pub fn contains(&self, id: BlockId) -> bool {
        self.block(id).is_some()
    }

    /// Get a live block.
    pub fn block(&self, id: BlockId) -> Option<&GateBlock> {
        self.graph
            .node_weight(id.node)
            .filter(|block| block.seq == id.seq)
    }

    fn live(&self, id: BlockId) -> IrResult<&GateBlock> {
        self.block(id).ok_or(IrError::InvalidBlock(id))
    }

    /// Predecessor of `id` on `qubit`'s wire.
    pub fn prev_on(&self, id: BlockId, qubit: QubitId) -> Option<BlockId> {
        self.block(id)?;
        self.graph
            .edges_directed(id.node, Direction::Incoming)
            .find(|e| e.weight().qubit == qubit)
            .map(|e| self.id(e.source()))
    }

    /// Successor of `id` on `qubit`'s wire.
    pub fn next_on(&self, id: BlockId, qubit: QubitId) -> Option<BlockId> {
        self.block(id)?;
        self.graph
            .edges_directed(id.node, Direction::Outgoing)
            .find(|e| e.weight().qubit == qubit)
            .map(|e| self.id(e.target()))
    }

    /// First block on `qubit`'s wire.
    pub fn head(&self, qubit: QubitId) -> Option<BlockId> {
        self.heads
            .get(qubit.0 as usize)
            .copied()
            .flatten()
            .map(|node| self.id(node))
    }

    /// Last block on `qubit`'s wire.
    pub fn tail(&self, qubit: QubitId) -> Option<BlockId> {
        self.tails
            .get(qubit.0 as usize)
            .copied()
            .flatten()
            .map(|node| self.id(node))
    }

    /// Blocks on `qubit`'s wire, head to tail.
    pub fn wire(&self, qubit: QubitId) -> Vec<BlockId> {
        let mut blocks = Vec::new();
        let mut current = self.head(qubit);
        while let Some(id) = current {
            blocks.push(id);
            current = self.next_on(id, qubit);
        }
        blocks
    }

    /// Distinct wire neighbours of `id`, in the block's qubit order.
    pub fn neighbors(&self, id: BlockId) -> Vec<BlockId> {
        let Some(block) = self.block(id) else {
            return Vec::new();
        };
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        for &qubit in block.qubits() {
            for n in [self.prev_on(id, qubit), self.next_on(id, qubit)]
                .into_iter()
                .flatten()
            {
                if seen.insert(n) {
                    out.push(n);
                }
            }
        }
        out
    }

    /// Order `a` and `b` as `(earlier, later)` if they are wire-adjacent.
    ///
    /// Wire-adjacent means they share at least one qubit and on every shared
    /// qubit the earlier block immediately precedes the later one.
    pub fn adjacency(&self, a: BlockId, b: BlockId) -> Option<(BlockId, BlockId)> {
        if a == b {
            return None;
        }
        let (block_a, block_b) = (self.block(a)?, self.block(b)?);
        let mut order = None;
        for &qubit in block_a.qubits() {
            if !block_b.gate().acts_on(qubit) {
                continue;
            }
            let pair = if self.next_on(a, qubit) == Some(b) {
                (a, b)
            } else if self.next_on(b, qubit) == Some(a) {
                (b, a)
            } else {
                return None;
            };
            match order {
                None => order = Some(pair),
                Some(existing) if existing != pair => return None,
                Some(_) => {}
            }
        }
        order
    }

    /// Whether `later` depends on `earlier` through some third block.
    ///
    /// The search only visits blocks ranked between the two, so its cost is
    /// bounded by the distance between them rather than by the graph size.
    pub fn has_indirect_path(&self, earlier: BlockId, later: BlockId) -> bool {
        let (Some(_), Some(target)) = (self.block(earlier), self.block(later)) else {
            return false;
        };
        let bound = target.rank;
        let mut visited = FxHashSet::default();
        let mut stack: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(earlier.node, Direction::Outgoing)
            .filter(|n| *n != later.node)
            .collect();
        while let Some(node) = stack.pop() {
            if node == later.node {
                return true;
            }
            // Nothing ranked after `later` can reach it.
            if self.graph[node].rank > bound || !visited.insert(node) {
                continue;
            }
            stack.extend(self.graph.neighbors_directed(node, Direction::Outgoing));
        }
        false
    }

    /// Number of distinct qubits touched by `a` or `b`.
    pub fn union_arity(&self, a: BlockId, b: BlockId) -> Option<usize> {
        let (block_a, block_b) = (self.block(a)?, self.block(b)?);
        let extra = block_b
            .qubits()
            .iter()
            .filter(|q| !block_a.gate().acts_on(**q))
            .count();
        Some(block_a.qubits().len() + extra)
    }

    /// Order `a` and `b` as `(earlier, later)` if they are fusable neighbours.
    ///
    /// Fusable neighbours are wire-adjacent, span at most `max_arity` qubits
    /// together, and have no dependency path through a third block.
    pub fn fusable(&self, a: BlockId, b: BlockId, max_arity: usize) -> Option<(BlockId, BlockId)> {
        let (earlier, later) = self.adjacency(a, b)?;
        if self.union_arity(a, b)? > max_arity || self.has_indirect_path(earlier, later) {
            return None;
        }
        Some((earlier, later))
    }

    /// Replace fusable neighbours `a` and `b` with one block holding `fused`.
    ///
    /// `fused` must act on exactly the union of both blocks' qubits. Every
    /// wire keeps the relative order of its remaining blocks.
    pub fn replace(&mut self, a: BlockId, b: BlockId, fused: Gate) -> IrResult<BlockId> {
        self.live(a)?;
        self.live(b)?;
        let (earlier, later) = self.adjacency(a, b).ok_or_else(|| {
            IrError::GraphInvariant(format!("blocks {a} and {b} are not wire-adjacent"))
        })?;
        if self.has_indirect_path(earlier, later) {
            return Err(IrError::GraphInvariant(format!(
                "blocks {earlier} and {later} are linked through another block"
            )));
        }

        let first = self.live(earlier)?;
        let second = self.live(later)?;
        let mut union: Vec<QubitId> = first.qubits().to_vec();
        union.extend(second.qubits().iter().filter(|q| !first.gate().acts_on(**q)));
        if fused.num_qubits() != union.len() || !union.iter().all(|q| fused.acts_on(*q)) {
            return Err(IrError::GraphInvariant(format!(
                "fused gate qubits {:?} differ from the union {:?} of {earlier} and {later}",
                fused.qubits(),
                union
            )));
        }
        let mut origins: Vec<u32> = first.origins.iter().chain(&second.origins).copied().collect();
        origins.sort_unstable();

        // Splice points per wire, taken before any edge is removed.
        let splices: Vec<(QubitId, Option<NodeIndex>, Option<NodeIndex>)> = union
            .iter()
            .map(|&qubit| {
                let before = if first.gate().acts_on(qubit) { earlier } else { later };
                let after = if second.gate().acts_on(qubit) { later } else { earlier };
                (
                    qubit,
                    self.prev_on(before, qubit).map(|id| id.node),
                    self.next_on(after, qubit).map(|id| id.node),
                )
            })
            .collect();

        let rank = first.rank;
        self.graph.remove_node(earlier.node);
        self.graph.remove_node(later.node);
        let node = self.insert(fused, origins);
        self.graph[node].rank = rank;

        for (qubit, pred, succ) in splices {
            let slot = qubit.0 as usize;
            match pred {
                Some(p) => {
                    self.graph.add_edge(p, node, Wire { qubit });
                }
                None => self.heads[slot] = Some(node),
            }
            match succ {
                Some(s) => {
                    self.graph.add_edge(node, s, Wire { qubit });
                }
                None => self.tails[slot] = Some(node),
            }
        }
        self.restore_order(node);
        Ok(self.id(node))
    }

    /// Re-rank blocks after `node` took over the rank of the earlier half of
    /// a merge.
    ///
    /// Predecessors inherited from the later half may now rank above `node`.
    /// Those predecessors and their ancestors above `node`'s rank move down,
    /// `node` and its descendants below the highest such predecessor move
    /// up, and both sets share the ranks they held before.
    fn restore_order(&mut self, node: NodeIndex) {
        let lower = self.graph[node].rank;
        let late: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .filter(|p| self.graph[*p].rank > lower)
            .collect();
        let Some(upper) = late.iter().map(|p| self.graph[*p].rank).max() else {
            return;
        };

        let mut forward = self.region(&[node], Direction::Outgoing, |rank| rank < upper);
        let mut backward = self.region(&late, Direction::Incoming, |rank| rank > lower);
        forward.sort_by_key(|n| self.graph[*n].rank);
        backward.sort_by_key(|n| self.graph[*n].rank);

        let mut pool: Vec<u64> = backward
            .iter()
            .chain(&forward)
            .map(|n| self.graph[*n].rank)
            .collect();
        pool.sort_unstable();
        for (n, rank) in backward.into_iter().chain(forward).zip(pool) {
            self.graph[n].rank = rank;
        }
    }

    /// Blocks reachable from `seeds` along `direction` through blocks whose
    /// rank satisfies `keep`.
    fn region(
        &self,
        seeds: &[NodeIndex],
        direction: Direction,
        keep: impl Fn(u64) -> bool,
    ) -> Vec<NodeIndex> {
        let mut seen = FxHashSet::default();
        let mut stack = seeds.to_vec();
        let mut out = Vec::new();
        while let Some(node) = stack.pop() {
            if !keep(self.graph[node].rank) || !seen.insert(node) {
                continue;
            }
            out.push(node);
            stack.extend(self.graph.neighbors_directed(node, direction));
        }
        out
    }

    /// All live blocks in deterministic topological order.
    ///
    /// Blocks whose wire predecessors have all been emitted are ready; among
    /// ready blocks the lowest creation sequence goes first. The returned
    /// references borrow the graph, so it cannot change while they are held.
    pub fn all_blocks(&self) -> Vec<(BlockId, &GateBlock)> {
        let mut in_degree: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut ready = BinaryHeap::new();
        for node in self.graph.node_indices() {
            let degree = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .count();
            if degree == 0 {
                ready.push(Reverse((self.graph[node].seq, node)));
            } else {
                in_degree.insert(node, degree);
            }
        }

        let mut order = Vec::with_capacity(self.num_blocks());
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push((self.id(node), &self.graph[node]));
            for succ in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((self.graph[succ].seq, succ)));
                    }
                }
            }
        }
        order
    }

    /// Ids of [`Self::all_blocks`], detached from the graph.
    pub fn block_order(&self) -> Vec<BlockId> {
        self.all_blocks().into_iter().map(|(id, _)| id).collect()
    }

    /// Verify the structural integrity of the graph.
    ///
    /// Checks that:
    /// - The graph is acyclic
    /// - Block ranks increase along every edge
    /// - Every edge links two blocks that both touch the edge's qubit
    /// - Each wire is a single chain from its head to its tail
    /// - Every block appears exactly once on the wire of each of its qubits
    pub fn verify_integrity(&self) -> IrResult<()> {
        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(IrError::GraphInvariant("graph contains a cycle".into()));
        }

        for edge in self.graph.edge_indices() {
            let ordered = self
                .graph
                .edge_endpoints(edge)
                .is_some_and(|(source, target)| self.graph[source].rank < self.graph[target].rank);
            if !ordered {
                return Err(IrError::GraphInvariant(format!(
                    "edge on {} runs against the block ranks",
                    self.graph[edge].qubit
                )));
            }
            let qubit = self.graph[edge].qubit;
            let touches = |n: NodeIndex| self.graph[n].gate.acts_on(qubit);
            let linked = self
                .graph
                .edge_endpoints(edge)
                .is_some_and(|(source, target)| touches(source) && touches(target));
            if !linked {
                return Err(IrError::GraphInvariant(format!(
                    "edge on {qubit} links a block that does not touch it"
                )));
            }
        }

        let mut visits = 0usize;
        for slot in 0..self.heads.len() {
            #[allow(clippy::cast_possible_truncation)]
            let qubit = QubitId(slot as u32);
            let mut current = self.head(qubit);
            let mut last = None;
            let mut steps = 0usize;
            while let Some(id) = current {
                let block = self.live(id)?;
                if !block.gate().acts_on(qubit) {
                    return Err(IrError::GraphInvariant(format!(
                        "block {id} is on the wire of {qubit} without touching it"
                    )));
                }
                if self.prev_on(id, qubit).map(|p| p.node) != last {
                    return Err(IrError::GraphInvariant(format!(
                        "wire of {qubit} is broken before block {id}"
                    )));
                }
                steps += 1;
                if steps > self.num_blocks() {
                    return Err(IrError::GraphInvariant(format!(
                        "wire of {qubit} does not terminate"
                    )));
                }
                last = Some(id.node);
                current = self.next_on(id, qubit);
            }
            if last != self.tails[slot] {
                return Err(IrError::GraphInvariant(format!(
                    "wire of {qubit} does not end at its tail"
                )));
            }
            visits += steps;
        }

        let expected: usize = self
            .graph
            .node_indices()
            .map(|n| self.graph[n].gate.num_qubits())
            .sum();
        if visits != expected {
            return Err(IrError::GraphInvariant(format!(
                "wires visit {visits} block slots, blocks hold {expected}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{StandardGate, compose};

    fn gate(g: StandardGate, qubits: &[u32]) -> Gate {
        Gate::standard(&g, qubits.iter().copied().map(QubitId)).unwrap()
    }

    fn fuse(graph: &mut CircuitGraph, a: BlockId, b: BlockId) -> IrResult<BlockId> {
        let (earlier, later) = graph.adjacency(a, b).unwrap();
        let fused = compose(
            graph.block(earlier).unwrap().gate(),
            graph.block(later).unwrap().gate(),
        )?;
        graph.replace(a, b, fused)
    }

    #[test]
    fn test_empty_graph() {
        let graph = CircuitGraph::new(3).unwrap();
        assert_eq!(graph.num_qubits(), 3);
        assert!(graph.is_empty());
        assert!(graph.all_blocks().is_empty());
        graph.verify_integrity().unwrap();
    }

    #[test]
    fn test_register_too_wide() {
        assert!(matches!(
            CircuitGraph::new(64),
            Err(IrError::ArityOverflow { .. })
        ));
    }

    #[test]
    fn test_add_block_links_wires() {
        let mut graph = CircuitGraph::new(2).unwrap();
        let h = graph.add_block(gate(StandardGate::H, &[0])).unwrap();
        let cx = graph.add_block(gate(StandardGate::CX, &[0, 1])).unwrap();

        assert_eq!(graph.head(QubitId(0)), Some(h));
        assert_eq!(graph.head(QubitId(1)), Some(cx));
        assert_eq!(graph.next_on(h, QubitId(0)), Some(cx));
        assert_eq!(graph.prev_on(cx, QubitId(0)), Some(h));
        assert_eq!(graph.prev_on(cx, QubitId(1)), None);
        assert_eq!(graph.wire(QubitId(0)), vec![h, cx]);
        assert_eq!(graph.block(cx).unwrap().origins(), &[1]);
        graph.verify_integrity().unwrap();
    }

    #[test]
    fn test_qubit_not_found_with_context() {
        let mut graph = CircuitGraph::new(1).unwrap();
        let err = graph.add_block(gate(StandardGate::CX, &[0, 5])).unwrap_err();
        match err {
            IrError::QubitNotFound {
                qubit, gate_name, ..
            } => {
                assert_eq!(qubit, QubitId(5));
                assert_eq!(gate_name, Some("cx".to_string()));
            }
            other => panic!("Expected QubitNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_adjacency_direction() {
        let mut graph = CircuitGraph::new(2).unwrap();
        let a = graph.add_block(gate(StandardGate::H, &[0])).unwrap();
        let b = graph.add_block(gate(StandardGate::CX, &[0, 1])).unwrap();
        let c = graph.add_block(gate(StandardGate::X, &[1])).unwrap();

        assert_eq!(graph.adjacency(b, a), Some((a, b)));
        assert_eq!(graph.adjacency(c, b), Some((b, c)));
        // No shared qubit.
        assert_eq!(graph.adjacency(a, c), None);
        assert_eq!(graph.adjacency(a, a), None);
    }

    #[test]
    fn test_interposed_block_is_not_adjacent() {
        let mut graph = CircuitGraph::new(2).unwrap();
        let a = graph.add_block(gate(StandardGate::CX, &[0, 1])).unwrap();
        let _mid = graph.add_block(gate(StandardGate::X, &[1])).unwrap();
        let b = graph.add_block(gate(StandardGate::CX, &[0, 1])).unwrap();

        // Adjacent on q0 but not on q1.
        assert_eq!(graph.adjacency(a, b), None);
        let err = graph
            .replace(a, b, gate(StandardGate::CZ, &[0, 1]))
            .unwrap_err();
        assert!(matches!(err, IrError::GraphInvariant(_)));
    }

    #[test]
    fn test_indirect_path_blocks_fusion() {
        // a and b are adjacent on q0, but m links them through q1 and q2.
        let mut graph = CircuitGraph::new(3).unwrap();
        let a = graph.add_block(gate(StandardGate::CX, &[0, 1])).unwrap();
        let m = graph.add_block(gate(StandardGate::CX, &[1, 2])).unwrap();
        let b = graph.add_block(gate(StandardGate::CX, &[0, 2])).unwrap();

        assert_eq!(graph.adjacency(a, b), Some((a, b)));
        assert!(graph.has_indirect_path(a, b));
        assert_eq!(graph.fusable(a, b, 3), None);
        assert_eq!(graph.fusable(a, m, 3), Some((a, m)));
        assert!(matches!(
            graph.replace(a, b, gate(StandardGate::CCX, &[0, 1, 2])),
            Err(IrError::GraphInvariant(_))
        ));
    }

    #[test]
    fn test_fusable_arity_bound() {
        let mut graph = CircuitGraph::new(3).unwrap();
        let a = graph.add_block(gate(StandardGate::CX, &[0, 1])).unwrap();
        let b = graph.add_block(gate(StandardGate::CX, &[1, 2])).unwrap();
        assert_eq!(graph.union_arity(a, b), Some(3));
        assert_eq!(graph.fusable(a, b, 2), None);
        assert_eq!(graph.fusable(a, b, 3), Some((a, b)));
    }

    #[test]
    fn test_replace_splices_wires() {
        let mut graph = CircuitGraph::new(3).unwrap();
        let h0 = graph.add_block(gate(StandardGate::H, &[0])).unwrap();
        let cx01 = graph.add_block(gate(StandardGate::CX, &[0, 1])).unwrap();
        let x1 = graph.add_block(gate(StandardGate::X, &[1])).unwrap();
        let cx12 = graph.add_block(gate(StandardGate::CX, &[1, 2])).unwrap();
        let z0 = graph.add_block(gate(StandardGate::Z, &[0])).unwrap();

        let fused = fuse(&mut graph, x1, cx01).unwrap();
        assert!(!graph.contains(cx01));
        assert!(!graph.contains(x1));
        assert_eq!(graph.num_blocks(), 4);

        assert_eq!(graph.wire(QubitId(0)), vec![h0, fused, z0]);
        assert_eq!(graph.wire(QubitId(1)), vec![fused, cx12]);
        assert_eq!(graph.head(QubitId(1)), Some(fused));
        assert_eq!(graph.block(fused).unwrap().origins(), &[1, 2]);
        graph.verify_integrity().unwrap();

        // Superseded ids are rejected.
        assert!(matches!(
            graph.replace(cx01, h0, gate(StandardGate::H, &[0])),
            Err(IrError::InvalidBlock(id)) if id == cx01
        ));
    }

    #[test]
    fn test_superseded_ids_stay_dead() {
        let mut graph = CircuitGraph::new(1).unwrap();
        let h = graph.add_block(gate(StandardGate::H, &[0])).unwrap();
        let x = graph.add_block(gate(StandardGate::X, &[0])).unwrap();
        let z = graph.add_block(gate(StandardGate::Z, &[0])).unwrap();

        let merged = fuse(&mut graph, h, x).unwrap();
        assert_ne!(merged, h);
        assert_ne!(merged, x);
        assert!(!graph.contains(h));
        assert!(!graph.contains(x));
        assert!(graph.block(x).is_none());
        assert_eq!(graph.next_on(x, QubitId(0)), None);
        assert_eq!(graph.neighbors(x), Vec::new());
        assert_eq!(graph.adjacency(x, z), None);

        let err = graph
            .replace(x, z, gate(StandardGate::Y, &[0]))
            .unwrap_err();
        assert!(matches!(err, IrError::InvalidBlock(id) if id == x));
        assert_eq!(graph.wire(QubitId(0)), vec![merged, z]);
        graph.verify_integrity().unwrap();
    }

    #[test]
    fn test_merge_reorders_ranks() {
        // Fusing s and b pulls the later predecessor x of b in front of the
        // fused block, which now precedes l. The path e -> x -> (s b) -> l
        // must still be found after the merge.
        let mut graph = CircuitGraph::new(4).unwrap();
        let s = graph.add_block(gate(StandardGate::CX, &[1, 2])).unwrap();
        let e = graph.add_block(gate(StandardGate::CX, &[0, 3])).unwrap();
        let l = graph.add_block(gate(StandardGate::CX, &[1, 3])).unwrap();
        let x = graph.add_block(gate(StandardGate::H, &[0])).unwrap();
        let b = graph.add_block(gate(StandardGate::CX, &[0, 2])).unwrap();

        assert!(!graph.has_indirect_path(e, l));
        assert_eq!(graph.fusable(s, b, 3), Some((s, b)));
        let sb = fuse(&mut graph, s, b).unwrap();
        graph.verify_integrity().unwrap();

        assert_eq!(graph.adjacency(e, l), Some((e, l)));
        assert!(graph.has_indirect_path(e, l));
        assert_eq!(graph.fusable(e, l, 4), None);
        assert_eq!(graph.block_order(), vec![e, x, sb, l]);
    }

    #[test]
    fn test_replace_updates_tail() {
        let mut graph = CircuitGraph::new(2).unwrap();
        let a = graph.add_block(gate(StandardGate::H, &[0])).unwrap();
        let b = graph.add_block(gate(StandardGate::X, &[1])).unwrap();
        let c = graph.add_block(gate(StandardGate::CZ, &[0, 1])).unwrap();

        let ac = fuse(&mut graph, a, c).unwrap();
        assert_eq!(graph.tail(QubitId(0)), Some(ac));
        assert_eq!(graph.tail(QubitId(1)), Some(ac));
        assert_eq!(graph.wire(QubitId(1)), vec![b, ac]);
        graph.verify_integrity().unwrap();
    }

    #[test]
    fn test_replace_rejects_wrong_qubits() {
        let mut graph = CircuitGraph::new(2).unwrap();
        let a = graph.add_block(gate(StandardGate::H, &[0])).unwrap();
        let b = graph.add_block(gate(StandardGate::X, &[0])).unwrap();
        let err = graph
            .replace(a, b, gate(StandardGate::CX, &[0, 1]))
            .unwrap_err();
        assert!(matches!(err, IrError::GraphInvariant(_)));
        assert_eq!(graph.num_blocks(), 2);
    }

    #[test]
    fn test_all_blocks_order() {
        let mut graph = CircuitGraph::new(2).unwrap();
        let a = graph.add_block(gate(StandardGate::H, &[1])).unwrap();
        let b = graph.add_block(gate(StandardGate::H, &[0])).unwrap();
        let c = graph.add_block(gate(StandardGate::CX, &[0, 1])).unwrap();
        let d = graph.add_block(gate(StandardGate::X, &[0])).unwrap();
        assert_eq!(graph.block_order(), vec![a, b, c, d]);

        // The fused block is newer than `d` but must still precede it.
        let bc = fuse(&mut graph, b, c).unwrap();
        assert_eq!(graph.block_order(), vec![a, bc, d]);
    }
}
