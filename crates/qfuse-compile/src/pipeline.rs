//! End-to-end compilation pipeline.

use num_complex::Complex64;
use qfuse_ir::{Circuit, CircuitGraph};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

use crate::backend::{CodegenBackend, KernelFn, PrepareFn};
use crate::config::FusionConfig;
use crate::error::{CompileError, CompileResult};
use crate::fusion::{FusionEngine, FusionReport};
use crate::kernel::{GeneratedKernels, KernelSpec, KernelSpecGenerator};
use crate::params::ParameterPreparation;

/// Wall-clock time of each pipeline phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseTimings {
    /// Fusion engine.
    pub fusion: Duration,
    /// Kernel spec generation.
    pub generation: Duration,
    /// Backend compilation.
    pub backend: Duration,
}

/// A kernel spec with its compiled callable.
pub struct CompiledKernel {
    /// The kernel description this function was lowered from.
    pub spec: KernelSpec,
    func: KernelFn,
}

impl std::fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

struct CompiledPreparation {
    preparation: ParameterPreparation,
    func: PrepareFn,
}

/// Result of compiling a circuit: ready-to-run kernels.
pub struct CompiledCircuit {
    num_qubits: u32,
    kernels: Vec<CompiledKernel>,
    preparation: Option<CompiledPreparation>,
    report: FusionReport,
    timings: PhaseTimings,
}

impl std::fmt::Debug for CompiledCircuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledCircuit")
            .field("num_qubits", &self.num_qubits)
            .field("kernels", &self.kernels.len())
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl CompiledCircuit {
    /// Statevector width.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Kernels in execution order.
    pub fn kernels(&self) -> &[CompiledKernel] {
        &self.kernels
    }

    /// Parameter preparation, if any kernel is symbolic.
    pub fn preparation(&self) -> Option<&ParameterPreparation> {
        self.preparation.as_ref().map(|p| &p.preparation)
    }

    /// Parameter names in value order.
    pub fn parameters(&self) -> &[String] {
        self.preparation()
            .map(ParameterPreparation::parameters)
            .unwrap_or_default()
    }

    /// Fusion summary.
    pub fn report(&self) -> &FusionReport {
        &self.report
    }

    /// Time spent in each phase.
    pub fn timings(&self) -> &PhaseTimings {
        &self.timings
    }

    /// Apply every kernel to `amplitudes`, in order.
    ///
    /// `parameter_values` follow [`parameters`](Self::parameters).
    pub fn run(&self, amplitudes: &mut [Complex64], parameter_values: &[f64]) -> CompileResult<()> {
        let expected = 1usize << self.num_qubits;
        if amplitudes.len() != expected {
            return Err(CompileError::StatevectorSize {
                expected,
                got: amplitudes.len(),
            });
        }

        let buffer = match &self.preparation {
            Some(prep) => {
                prep.preparation.check_values(parameter_values)?;
                let mut buffer = vec![0.0; prep.preparation.buffer_len()];
                (prep.func)(parameter_values, &mut buffer);
                buffer
            }
            None if !parameter_values.is_empty() => {
                return Err(CompileError::ParameterCount {
                    expected: 0,
                    got: parameter_values.len(),
                });
            }
            None => Vec::new(),
        };

        for kernel in &self.kernels {
            (kernel.func)(
                amplitudes,
                self.num_qubits,
                kernel.spec.indexing.qubit_mask(),
                &buffer,
            );
        }
        Ok(())
    }

    /// Like [`run`](Self::run), with parameter values looked up by name.
    pub fn run_named(
        &self,
        amplitudes: &mut [Complex64],
        values: &BTreeMap<String, f64>,
    ) -> CompileResult<()> {
        let ordered = match self.preparation() {
            Some(prep) => prep.bind(values)?,
            None => Vec::new(),
        };
        self.run(amplitudes, &ordered)
    }
}

/// Fusion, kernel generation and backend compilation in one place.
pub struct Pipeline<B: CodegenBackend> {
    engine: FusionEngine,
    backend: B,
}

impl<B: CodegenBackend> Pipeline<B> {
    /// Create a pipeline. Fails if `config` is out of range.
    pub fn new(config: FusionConfig, backend: B) -> CompileResult<Self> {
        Ok(Self {
            engine: FusionEngine::new(config)?,
            backend,
        })
    }

    /// Create a pipeline around an existing engine.
    pub fn with_engine(engine: FusionEngine, backend: B) -> Self {
        Self { engine, backend }
    }

    /// The fusion engine.
    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fuse `graph` in place.
    pub fn fuse(&self, graph: &mut CircuitGraph) -> CompileResult<FusionReport> {
        self.engine.run(graph)
    }

    /// Generate kernel specs for an already fused graph.
    pub fn generate(&self, graph: &CircuitGraph) -> CompileResult<GeneratedKernels> {
        KernelSpecGenerator::for_graph(graph).generate(graph)
    }

    /// Compile kernel specs with the backend.
    pub fn lower(
        &self,
        num_qubits: u32,
        generated: GeneratedKernels,
        report: FusionReport,
    ) -> CompileResult<CompiledCircuit> {
        let GeneratedKernels {
            kernels,
            preparation,
        } = generated;

        let kernels = kernels
            .into_iter()
            .map(|spec| {
                let func = self
                    .backend
                    .compile_kernel(&spec)
                    .map_err(CompileError::Backend)?;
                Ok(CompiledKernel { spec, func })
            })
            .collect::<CompileResult<Vec<_>>>()?;

        let preparation = preparation
            .map(|preparation| {
                let func = self
                    .backend
                    .compile_preparation(&preparation)
                    .map_err(CompileError::Backend)?;
                Ok::<_, CompileError>(CompiledPreparation { preparation, func })
            })
            .transpose()?;

        Ok(CompiledCircuit {
            num_qubits,
            kernels,
            preparation,
            report,
            timings: PhaseTimings::default(),
        })
    }

    /// Fuse `graph` in place, then generate and compile its kernels.
    #[instrument(skip(self, graph), fields(backend = self.backend.name()))]
    pub fn compile(&self, graph: &mut CircuitGraph) -> CompileResult<CompiledCircuit> {
        info!("Compiling {} blocks", graph.num_blocks());

        let start = Instant::now();
        let report = self.fuse(graph)?;
        let fusion = start.elapsed();
        debug!("Fusion took {:?}", fusion);

        let start = Instant::now();
        let generated = self.generate(graph)?;
        let generation = start.elapsed();
        debug!(
            "Generated {} kernels in {:?}",
            generated.kernels.len(),
            generation
        );

        let start = Instant::now();
        let mut compiled = self.lower(graph.num_qubits(), generated, report)?;
        let backend = start.elapsed();
        debug!("Backend took {:?}", backend);

        compiled.timings = PhaseTimings {
            fusion,
            generation,
            backend,
        };
        info!(
            "Compiled {} kernels ({} parameters)",
            compiled.kernels.len(),
            compiled.parameters().len()
        );
        Ok(compiled)
    }

    /// Compile a circuit, consuming it.
    pub fn compile_circuit(&self, circuit: Circuit) -> CompileResult<CompiledCircuit> {
        let mut graph = circuit.into_graph();
        self.compile(&mut graph)
    }
}
