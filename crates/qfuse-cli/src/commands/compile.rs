//! Compile command implementation.

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;
use std::fs;
use std::time::{Duration, Instant};
use tracing::debug;

use qfuse_adapter_interp::InterpreterBackend;
use qfuse_compile::{CompiledCircuit, FusionConfig, FusionReport, Pipeline};

use super::common::{load_circuit, resolve_config};
use crate::FusionArgs;

#[derive(Serialize)]
struct KernelSummary {
    id: usize,
    qubits: Vec<u32>,
    origins: Vec<u32>,
    symbolic: bool,
}

#[derive(Serialize)]
struct CompileReport<'a> {
    circuit: &'a str,
    num_qubits: u32,
    config: &'a FusionConfig,
    fusion: &'a FusionReport,
    parameters: &'a [String],
    kernels: Vec<KernelSummary>,
    timings_ms: Vec<(&'static str, f64)>,
}

/// Print one phase timing line.
pub fn print_phase(name: &str, elapsed: Duration) {
    println!(
        "  {:<18} {:>10.3} ms",
        name,
        elapsed.as_secs_f64() * 1000.0
    );
}

/// Phase timings in report order, parsing first.
pub fn phase_timings(parsing: Duration, compiled: &CompiledCircuit) -> [(&'static str, Duration); 4] {
    let timings = compiled.timings();
    [
        ("parsing", parsing),
        ("fusion", timings.fusion),
        ("kernel generation", timings.generation),
        ("backend", timings.backend),
    ]
}

/// Execute the compile command.
pub fn execute(input: &str, fusion: &FusionArgs, output: Option<&str>) -> Result<()> {
    println!(
        "{} Compiling {}",
        style("→").cyan().bold(),
        style(input).green()
    );

    let config = resolve_config(fusion)?;

    let start = Instant::now();
    let circuit = load_circuit(input)?;
    let parsing = start.elapsed();
    let name = circuit.name().to_string();
    println!(
        "  Loaded: {} qubits, {} gates",
        circuit.num_qubits(),
        circuit.num_gates()
    );
    println!(
        "  Fusion: max arity {}, ceiling {}, zero-skip {:e}",
        config.max_fused_arity,
        config.cost_model.operation_count_ceiling,
        config.cost_model.zero_skip_threshold
    );

    debug!(?config, "Resolved fusion configuration");

    let num_qubits = circuit.num_qubits();
    let pipeline = Pipeline::new(config.clone(), InterpreterBackend::new())?;
    let compiled = pipeline.compile_circuit(circuit)?;
    let report = compiled.report();

    println!("{} Compilation complete", style("✓").green().bold());
    println!(
        "  After fusion there are {} blocks (from {}, {} merges)",
        style(report.blocks_after).yellow().bold(),
        report.blocks_before,
        report.merges
    );
    println!(
        "  Estimated cost: {:.1} -> {:.1}",
        report.cost_before, report.cost_after
    );
    if !compiled.parameters().is_empty() {
        println!("  Parameters: {}", compiled.parameters().join(", "));
    }

    let timings = phase_timings(parsing, &compiled);
    println!("  Timings:");
    for (phase, elapsed) in timings {
        print_phase(phase, elapsed);
    }

    if let Some(path) = output {
        let summary = CompileReport {
            circuit: &name,
            num_qubits,
            config: &config,
            fusion: report,
            parameters: compiled.parameters(),
            kernels: compiled
                .kernels()
                .iter()
                .map(|k| KernelSummary {
                    id: k.spec.id,
                    qubits: k.spec.qubits.iter().map(|q| q.0).collect(),
                    origins: k.spec.origins.clone(),
                    symbolic: k.spec.is_symbolic(),
                })
                .collect(),
            timings_ms: timings
                .iter()
                .map(|(phase, elapsed)| (*phase, elapsed.as_secs_f64() * 1000.0))
                .collect(),
        };
        debug!("Writing report for {} kernels to {}", summary.kernels.len(), path);
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(path, json).with_context(|| format!("Failed to write file: {path}"))?;
        println!("  Output: {}", style(path).green());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_compile_sample_with_debug_logging() {
        let input = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../circuits/qft3.json");
        let args = FusionArgs {
            config: None,
            max_fused_arity: Some(2),
            operation_count_ceiling: None,
            zero_skip_threshold: None,
        };
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            execute(&input.to_string_lossy(), &args, None)
        })
        .unwrap();
    }
}
