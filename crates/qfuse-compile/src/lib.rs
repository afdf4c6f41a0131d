//! qfuse Gate Fusion and Kernel Generation
//!
//! This crate turns a circuit graph into a list of kernel specs ready for a
//! code generator. Adjacent gates are fused into larger gates whenever the
//! cost model says one bigger kernel is cheaper than two smaller ones.
//!
//! # Overview
//!
//! Compilation runs in three phases:
//! 1. **Fusion**: greedily merge fusable neighbours in place ([`FusionEngine`])
//! 2. **Kernel generation**: lower each block to a [`KernelSpec`] with its
//!    [`IndexingDescriptor`], collecting symbolic entries into a
//!    [`ParameterPreparation`] ([`KernelSpecGenerator`])
//! 3. **Lowering**: hand the specs to a [`CodegenBackend`] and collect the
//!    callables into a [`CompiledCircuit`] ([`Pipeline`])
//!
//! # Architecture
//!
//! ```text
//! CircuitGraph (unfused)
//!       │
//!       ▼
//! ┌──────────────┐
//! │ FusionEngine │ ◄── FusionConfig + CostModel
//! └──────────────┘
//!       │
//!       ▼
//! ┌────────────────────┐
//! │ KernelSpecGenerator│ ──► ParameterPreparation (if symbolic)
//! └────────────────────┘
//!       │
//!       ▼
//! ┌────────────────┐
//! │ CodegenBackend │
//! └────────────────┘
//!       │
//!       ▼
//! CompiledCircuit (kernels in block order)
//! ```
//!
//! # Example
//!
//! ```rust
//! use qfuse_compile::{FusionConfig, FusionEngine, KernelSpecGenerator};
//! use qfuse_ir::Circuit;
//!
//! let mut graph = Circuit::ghz(4).unwrap().into_graph();
//!
//! let engine = FusionEngine::new(FusionConfig::default()).unwrap();
//! let report = engine.run(&mut graph).unwrap();
//! assert!(report.blocks_after < report.blocks_before);
//!
//! let generated = KernelSpecGenerator::for_graph(&graph).generate(&graph).unwrap();
//! assert_eq!(generated.kernels.len(), report.blocks_after);
//! assert!(generated.preparation.is_none());
//! ```
//!
//! # Configuration
//!
//! | Field | Default | Range |
//! |-------|---------|-------|
//! | `max_fused_arity` | 3 | ≥ 1 |
//! | `cost_model.operation_count_ceiling` | 64 | ≥ 1 |
//! | `cost_model.zero_skip_threshold` | 1e-8 | finite, ≥ 0 |

pub mod backend;
pub mod config;
pub mod cost;
pub mod error;
pub mod fusion;
pub mod indexing;
pub mod kernel;
pub mod params;
pub mod pipeline;

pub use backend::{BackendError, CodegenBackend, KernelFn, PrepareFn};
pub use config::{CostModelParams, FusionConfig};
pub use cost::{CostModel, NaiveCostModel};
pub use error::{CompileError, CompileResult};
pub use fusion::{FusionEngine, FusionReport};
pub use indexing::{IndexingDescriptor, full_mask, pdep};
pub use kernel::{GeneratedKernels, KernelEntry, KernelSpec, KernelSpecGenerator};
pub use params::{ParameterPreparation, ParameterSlot};
pub use pipeline::{CompiledCircuit, CompiledKernel, PhaseTimings, Pipeline};
