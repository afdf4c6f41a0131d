//! Fused kernels must compute the same state as the unfused circuit.

use proptest::prelude::*;
use qfuse_adapter_interp::{InterpreterBackend, Statevector};
use qfuse_compile::{FusionConfig, Pipeline};
use qfuse_ir::{Circuit, CircuitGraph, ParameterExpression, QubitId};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
enum GateOp {
    H(u32),
    S(u32),
    Ry(u32, usize),
    Rz(u32, usize),
    U(u32, usize),
    CX(u32, u32),
    CP(u32, u32, usize),
    RZZ(u32, u32, usize),
    Swap(u32, u32),
    CCX(u32, u32, u32),
}

/// Symbols shared by all generated circuits; affine combinations exercise
/// angle algebra across fused gates.
fn angle(index: usize) -> ParameterExpression {
    let a = ParameterExpression::symbol("alpha");
    let b = ParameterExpression::symbol("beta");
    match index % 5 {
        0 => a,
        1 => b,
        2 => -a,
        3 => a + b * ParameterExpression::constant(0.5),
        _ => ParameterExpression::constant(0.3),
    }
}

impl GateOp {
    fn apply(&self, circuit: &mut Circuit) {
        let q = QubitId;
        let result = match *self {
            GateOp::H(a) => circuit.h(q(a)).map(|_| ()),
            GateOp::S(a) => circuit.s(q(a)).map(|_| ()),
            GateOp::Ry(a, p) => circuit.ry(angle(p), q(a)).map(|_| ()),
            GateOp::Rz(a, p) => circuit.rz(angle(p), q(a)).map(|_| ()),
            GateOp::U(a, p) => circuit
                .u(angle(p), angle(p + 1), angle(p + 2), q(a))
                .map(|_| ()),
            GateOp::CX(a, b) => circuit.cx(q(a), q(b)).map(|_| ()),
            GateOp::CP(a, b, p) => circuit.cp(angle(p), q(a), q(b)).map(|_| ()),
            GateOp::RZZ(a, b, p) => circuit.rzz(angle(p), q(a), q(b)).map(|_| ()),
            GateOp::Swap(a, b) => circuit.swap(q(a), q(b)).map(|_| ()),
            GateOp::CCX(a, b, c) => circuit.ccx(q(a), q(b), q(c)).map(|_| ()),
        };
        result.unwrap();
    }
}

fn arb_gate_op(n: u32) -> impl Strategy<Value = GateOp> {
    prop_oneof![
        (0..n).prop_map(GateOp::H),
        (0..n).prop_map(GateOp::S),
        (0..n, 0_usize..5).prop_map(|(a, p)| GateOp::Ry(a, p)),
        (0..n, 0_usize..5).prop_map(|(a, p)| GateOp::Rz(a, p)),
        (0..n, 0_usize..5).prop_map(|(a, p)| GateOp::U(a, p)),
        (0..n, 1..n).prop_map(move |(a, d)| GateOp::CX(a, (a + d) % n)),
        (0..n, 1..n, 0_usize..5).prop_map(move |(a, d, p)| GateOp::CP(a, (a + d) % n, p)),
        (0..n, 1..n, 0_usize..5).prop_map(move |(a, d, p)| GateOp::RZZ(a, (a + d) % n, p)),
        (0..n, 1..n).prop_map(move |(a, d)| GateOp::Swap(a, (a + d) % n)),
        (0..n, 1..n, 1..n)
            .prop_filter("distinct qubits", |(_, d1, d2)| d1 != d2)
            .prop_map(move |(a, d1, d2)| GateOp::CCX(a, (a + d1) % n, (a + d2) % n)),
    ]
}

fn arb_circuit() -> impl Strategy<Value = (u32, Vec<GateOp>)> {
    (3_u32..=5).prop_flat_map(|n| (Just(n), prop::collection::vec(arb_gate_op(n), 1..=20)))
}

fn build(n: u32, ops: &[GateOp]) -> CircuitGraph {
    let mut circuit = Circuit::new("equivalence", n).unwrap();
    for op in ops {
        op.apply(&mut circuit);
    }
    circuit.into_graph()
}

/// Run `graph` gate by gate and through the compiled pipeline from the same
/// random state, returning both results.
fn both_ways(
    graph: &CircuitGraph,
    config: FusionConfig,
    values: &BTreeMap<String, f64>,
    seed: u64,
) -> (Statevector, Statevector) {
    let initial = Statevector::random(graph.num_qubits() as usize, &mut StdRng::seed_from_u64(seed));

    let mut reference = initial.clone();
    reference
        .apply_graph(graph, &|name: &str| values.get(name).copied())
        .unwrap();

    let pipeline = Pipeline::new(config, InterpreterBackend::new()).unwrap();
    let mut fused_graph = graph.clone();
    let compiled = pipeline.compile(&mut fused_graph).unwrap();
    let mut fused = initial;
    compiled.run_named(fused.amplitudes_mut(), values).unwrap();

    (reference, fused)
}

fn values(alpha: f64, beta: f64) -> BTreeMap<String, f64> {
    BTreeMap::from([("alpha".to_string(), alpha), ("beta".to_string(), beta)])
}

#[test]
fn qft_matches_reference() {
    for n in 2..=6 {
        let graph = Circuit::qft(n).unwrap().into_graph();
        for arity in 1..=4 {
            let config = FusionConfig::default().with_max_fused_arity(arity);
            let (reference, fused) = both_ways(&graph, config, &BTreeMap::new(), u64::from(n));
            assert!(
                reference.max_abs_diff(&fused) < TOLERANCE,
                "qft({n}) with arity {arity} diverged"
            );
        }
    }
}

#[test]
fn variational_matches_reference() {
    let graph = Circuit::variational(4, 3).unwrap().into_graph();
    let mut named = BTreeMap::new();
    for layer in 0..3 {
        for q in 0..4 {
            named.insert(format!("theta_{layer}_{q}"), 0.1 * f64::from(layer * 4 + q));
            named.insert(format!("phi_{layer}_{q}"), -0.2 * f64::from(q + 1));
        }
    }
    let (reference, fused) = both_ways(&graph, FusionConfig::default(), &named, 11);
    assert!(reference.max_abs_diff(&fused) < TOLERANCE);
}

#[test]
fn parameters_can_change_without_recompiling() {
    let mut circuit = Circuit::new("rebind", 2).unwrap();
    circuit.ry("alpha", QubitId(0)).unwrap();
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.rz("beta", QubitId(1)).unwrap();
    let graph = circuit.into_graph();

    let pipeline = Pipeline::new(FusionConfig::default(), InterpreterBackend::new()).unwrap();
    let compiled = pipeline.compile(&mut graph.clone()).unwrap();
    assert_eq!(compiled.parameters(), &["alpha".to_string(), "beta".to_string()]);

    for (alpha, beta) in [(0.0, 0.0), (0.7, -1.3), (3.0, 2.5)] {
        let mut fused = Statevector::new(2);
        compiled.run(fused.amplitudes_mut(), &[alpha, beta]).unwrap();

        let mut reference = Statevector::new(2);
        let named = values(alpha, beta);
        reference
            .apply_graph(&graph, &|name: &str| named.get(name).copied())
            .unwrap();
        assert!(reference.max_abs_diff(&fused) < TOLERANCE);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn fused_matches_unfused(
        (n, ops) in arb_circuit(),
        arity in 1_usize..=4,
        alpha in -3.0_f64..3.0,
        beta in -3.0_f64..3.0,
        seed in any::<u64>(),
    ) {
        let graph = build(n, &ops);
        let config = FusionConfig::default().with_max_fused_arity(arity);
        let (reference, fused) = both_ways(&graph, config, &values(alpha, beta), seed);
        prop_assert!(
            reference.max_abs_diff(&fused) < TOLERANCE,
            "max diff {}",
            reference.max_abs_diff(&fused)
        );
    }

    #[test]
    fn fusion_preserves_norm(
        (n, ops) in arb_circuit(),
        alpha in -3.0_f64..3.0,
        seed in any::<u64>(),
    ) {
        let graph = build(n, &ops);
        let (_, fused) = both_ways(&graph, FusionConfig::default(), &values(alpha, 0.5), seed);
        prop_assert!((fused.norm_sqr() - 1.0).abs() < 1e-9);
    }
}
