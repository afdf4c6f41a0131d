//! Codegen backend contract.
//!
//! A backend turns [`KernelSpec`]s into executable kernels. Native code
//! generation and JIT compilation live behind this trait; the compiler core
//! never depends on a particular backend.

use num_complex::Complex64;

use crate::kernel::KernelSpec;
use crate::params::ParameterPreparation;

/// Opaque error raised by a backend.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Compiled kernel.
///
/// Arguments: the amplitudes, the statevector width, the kernel's target
/// qubit mask and the prepared parameter buffer.
pub type KernelFn = Box<dyn Fn(&mut [Complex64], u32, u64, &[f64]) + Send + Sync>;

/// Compiled parameter preparation.
///
/// Arguments: parameter values in preparation order and the buffer to fill.
pub type PrepareFn = Box<dyn Fn(&[f64], &mut [f64]) + Send + Sync>;

/// A code generator for kernels.
pub trait CodegenBackend {
    /// Backend name for logs and reports.
    fn name(&self) -> &str;

    /// Compile one kernel.
    fn compile_kernel(&self, spec: &KernelSpec) -> Result<KernelFn, BackendError>;

    /// Compile the parameter-preparation step.
    fn compile_preparation(
        &self,
        preparation: &ParameterPreparation,
    ) -> Result<PrepareFn, BackendError>;
}
