//! Run command implementation.

use anyhow::{Context, Result};
use console::style;
use std::time::Instant;
use tracing::{debug, info};

use qfuse_adapter_interp::{InterpreterBackend, Statevector};
use qfuse_compile::Pipeline;

use super::common::{load_circuit, parse_bindings, resolve_config};
use super::compile::{phase_timings, print_phase};
use crate::FusionArgs;

/// Largest difference tolerated by `--verify`.
const VERIFY_TOLERANCE: f64 = 1e-9;

/// Execute the run command.
pub fn execute(
    input: &str,
    fusion: &FusionArgs,
    params: &[String],
    shots: usize,
    verify: bool,
) -> Result<()> {
    println!(
        "{} Running {} ({} shots)",
        style("→").cyan().bold(),
        style(input).green(),
        shots
    );

    let config = resolve_config(fusion)?;
    let bindings = parse_bindings(params)?;
    debug!(?config, "Resolved fusion configuration");
    debug!("Parameter bindings: {:?}", bindings);

    let start = Instant::now();
    let circuit = load_circuit(input)?;
    let parsing = start.elapsed();
    let num_qubits = circuit.num_qubits() as usize;
    println!(
        "  Loaded: {} qubits, {} gates",
        num_qubits,
        circuit.num_gates()
    );

    // Keep the unfused graph around for verification.
    let reference_graph = verify.then(|| circuit.graph().clone());

    let pipeline = Pipeline::new(config, InterpreterBackend::new())?;
    let compiled = pipeline.compile_circuit(circuit)?;
    println!(
        "  After fusion there are {} blocks",
        style(compiled.report().blocks_after).yellow().bold()
    );

    let mut state = Statevector::new(num_qubits);
    let start = Instant::now();
    compiled
        .run_named(state.amplitudes_mut(), &bindings)
        .context("Failed to run compiled kernels")?;
    let simulation = start.elapsed();
    info!(
        "Ran {} kernels in {:.3} ms",
        compiled.kernels().len(),
        simulation.as_secs_f64() * 1000.0
    );

    println!("  Timings:");
    for (phase, elapsed) in phase_timings(parsing, &compiled) {
        print_phase(phase, elapsed);
    }
    print_phase("simulation", simulation);

    if let Some(graph) = reference_graph {
        let mut reference = Statevector::new(num_qubits);
        reference
            .apply_graph(&graph, &|name: &str| bindings.get(name).copied())
            .context("Failed to simulate the unfused circuit")?;
        let diff = reference.max_abs_diff(&state);
        debug!("Largest amplitude difference against the unfused run: {:e}", diff);
        if diff > VERIFY_TOLERANCE {
            anyhow::bail!("Fused state differs from the unfused state by {diff:e}");
        }
        println!(
            "{} Fused and unfused states agree (max difference {:e})",
            style("✓").green().bold(),
            diff
        );
    }

    let counts = state.sample_counts(shots, &mut rand::thread_rng());
    println!("{} Results:", style("✓").green().bold());
    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (bitstring, count) in sorted.iter().take(16) {
        #[allow(clippy::cast_precision_loss)]
        let fraction = *count as f64 / shots.max(1) as f64;
        println!(
            "  {}  {:>6}  ({:5.1}%)",
            style(bitstring).cyan(),
            count,
            fraction * 100.0
        );
    }
    if sorted.len() > 16 {
        println!("  ... {} more outcomes", sorted.len() - 16);
    }

    Ok(())
}
