//! Property-based tests for circuit graph rewriting.
//!
//! Random circuits are rewritten by arbitrary sequences of legal merges; the
//! graph must stay well formed and keep every wire in program order.

use proptest::prelude::*;
use qfuse_ir::{BlockId, Circuit, CircuitGraph, QubitId, compose};

/// Gate operations that can be applied to a circuit.
#[derive(Debug, Clone)]
enum GateOp {
    H(u32),
    X(u32),
    Rz(u32),
    CX(u32, u32),
    CZ(u32, u32),
    CCX(u32, u32, u32),
}

impl GateOp {
    fn qubits(&self) -> Vec<u32> {
        match self {
            GateOp::H(q) | GateOp::X(q) | GateOp::Rz(q) => vec![*q],
            GateOp::CX(a, b) | GateOp::CZ(a, b) => vec![*a, *b],
            GateOp::CCX(a, b, c) => vec![*a, *b, *c],
        }
    }

    fn apply(&self, circuit: &mut Circuit) {
        let result = match *self {
            GateOp::H(q) => circuit.h(QubitId(q)).map(|_| ()),
            GateOp::X(q) => circuit.x(QubitId(q)).map(|_| ()),
            GateOp::Rz(q) => circuit.rz("theta", QubitId(q)).map(|_| ()),
            GateOp::CX(a, b) => circuit.cx(QubitId(a), QubitId(b)).map(|_| ()),
            GateOp::CZ(a, b) => circuit.cz(QubitId(a), QubitId(b)).map(|_| ()),
            GateOp::CCX(a, b, c) => circuit
                .ccx(QubitId(a), QubitId(b), QubitId(c))
                .map(|_| ()),
        };
        result.unwrap();
    }
}

/// Generate a gate on distinct qubits of a `num_qubits`-qubit register.
fn arb_gate_op(num_qubits: u32) -> impl Strategy<Value = GateOp> {
    let n = num_qubits;
    prop_oneof![
        (0..n).prop_map(GateOp::H),
        (0..n).prop_map(GateOp::X),
        (0..n).prop_map(GateOp::Rz),
        (0..n, 1..n).prop_map(move |(a, d)| GateOp::CX(a, (a + d) % n)),
        (0..n, 1..n).prop_map(move |(a, d)| GateOp::CZ(a, (a + d) % n)),
        (0..n, 1..n, 1..n)
            .prop_filter("distinct qubits", move |(_, d1, d2)| d1 != d2)
            .prop_map(move |(a, d1, d2)| GateOp::CCX(a, (a + d1) % n, (a + d2) % n)),
    ]
}

/// Generate a circuit of 3-5 qubits with its gate list.
fn arb_circuit() -> impl Strategy<Value = (u32, Vec<GateOp>)> {
    (3_u32..=5).prop_flat_map(|n| (Just(n), prop::collection::vec(arb_gate_op(n), 1..=24)))
}

fn build(num_qubits: u32, ops: &[GateOp]) -> CircuitGraph {
    let mut circuit = Circuit::new("prop", num_qubits).unwrap();
    for op in ops {
        op.apply(&mut circuit);
    }
    circuit.into_graph()
}

/// Original gate ids touching `qubit`, read along the wire.
fn wire_origins(graph: &CircuitGraph, qubit: QubitId, ops: &[GateOp]) -> Vec<u32> {
    graph
        .wire(qubit)
        .into_iter()
        .flat_map(|id| graph.block(id).unwrap().origins().to_vec())
        .filter(|origin| ops[*origin as usize].qubits().contains(&qubit.0))
        .collect()
}

/// Merge the `pick`-th fusable pair, if any.
fn merge_one(graph: &mut CircuitGraph, pick: usize, max_arity: usize) -> bool {
    let order = graph.block_order();
    let mut pairs: Vec<(BlockId, BlockId)> = Vec::new();
    for &id in &order {
        for n in graph.neighbors(id) {
            if let Some(pair) = graph.fusable(id, n, max_arity) {
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
    }
    if pairs.is_empty() {
        return false;
    }
    let (earlier, later) = pairs[pick % pairs.len()];
    let fused = compose(
        graph.block(earlier).unwrap().gate(),
        graph.block(later).unwrap().gate(),
    )
    .unwrap();
    graph.replace(earlier, later, fused).unwrap();
    true
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any sequence of legal merges keeps the graph well formed and every
    /// wire in program order.
    #[test]
    fn merges_preserve_wire_order(
        (n, ops) in arb_circuit(),
        picks in prop::collection::vec(0_usize..64, 0..16),
    ) {
        let mut graph = build(n, &ops);
        let before: Vec<Vec<u32>> = (0..n)
            .map(|q| wire_origins(&graph, QubitId(q), &ops))
            .collect();

        for pick in picks {
            if !merge_one(&mut graph, pick, 4) {
                break;
            }
            graph.verify_integrity().unwrap();
        }

        for q in 0..n {
            prop_assert_eq!(&wire_origins(&graph, QubitId(q), &ops), &before[q as usize]);
        }
        for (_, block) in graph.all_blocks() {
            prop_assert!(block.qubits().len() <= 4);
        }
    }

    /// `all_blocks` lists every live block once, after all its wire predecessors.
    #[test]
    fn all_blocks_is_topological(
        (n, ops) in arb_circuit(),
        picks in prop::collection::vec(0_usize..64, 0..8),
    ) {
        let mut graph = build(n, &ops);
        for pick in picks {
            merge_one(&mut graph, pick, 3);
        }

        let order = graph.block_order();
        prop_assert_eq!(order.len(), graph.num_blocks());
        let position = |id: BlockId| order.iter().position(|o| *o == id).unwrap();
        for &id in &order {
            for &q in graph.block(id).unwrap().qubits() {
                if let Some(prev) = graph.prev_on(id, q) {
                    prop_assert!(position(prev) < position(id));
                }
            }
        }
    }

    /// Every original gate id survives in exactly one block.
    #[test]
    fn origins_are_partitioned(
        (n, ops) in arb_circuit(),
        picks in prop::collection::vec(0_usize..64, 0..16),
    ) {
        let mut graph = build(n, &ops);
        for pick in picks {
            merge_one(&mut graph, pick, 3);
        }
        let mut all: Vec<u32> = graph
            .all_blocks()
            .iter()
            .flat_map(|(_, b)| b.origins().to_vec())
            .collect();
        all.sort_unstable();
        let expected: Vec<u32> = (0..ops.len() as u32).collect();
        prop_assert_eq!(all, expected);
    }
}
