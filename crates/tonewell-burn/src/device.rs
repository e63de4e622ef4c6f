//! Backend aliases, device placement, and run initialization.
//!
//! A run pins every tensor to one device chosen once by [`initialize_run`].
//! Models and batches created later take that device from the returned
//! [`RunContext`]; mixing devices is rejected at the forward pass.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::tensor::backend::Backend;

/// CPU backend used for inference and validation.
pub type CpuBackend = NdArray<f32>;
/// CPU backend with gradient tracking, used for training.
pub type CpuAutodiffBackend = Autodiff<CpuBackend>;

#[cfg(feature = "gpu")]
pub type GpuBackend = burn::backend::Wgpu;
#[cfg(feature = "gpu")]
pub type GpuAutodiffBackend = Autodiff<GpuBackend>;

/// Where a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePlacement {
    /// CPU via NdArray backend (always available).
    #[default]
    Cpu,
    /// GPU via Wgpu backend (requires the `gpu` feature).
    Gpu,
}

impl DevicePlacement {
    /// Placement for the current build: GPU when compiled in, CPU otherwise.
    pub fn preferred() -> Self {
        if cfg!(feature = "gpu") {
            DevicePlacement::Gpu
        } else {
            DevicePlacement::Cpu
        }
    }
}

/// Device and seed of one training or inference run.
#[derive(Debug, Clone)]
pub struct RunContext<B: Backend> {
    pub device: B::Device,
    pub seed: u64,
}

/// Seed the backend RNG and pin the device for the rest of the run.
///
/// Call once before constructing any model so that parameter initialization
/// is reproducible for a given seed.
pub fn initialize_run<B: Backend>(seed: u64, device: B::Device) -> RunContext<B> {
    B::seed(&device, seed);
    tracing::debug!(seed, device = ?device, "Initialized run");
    RunContext { device, seed }
}

/// Default CPU device.
pub fn cpu_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

#[cfg(feature = "gpu")]
pub fn gpu_device() -> burn::backend::wgpu::WgpuDevice {
    burn::backend::wgpu::WgpuDevice::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;

    #[test]
    fn test_context_keeps_device() {
        let ctx = initialize_run::<CpuBackend>(7, cpu_device());
        assert_eq!(ctx.seed, 7);
        let t = Tensor::<CpuBackend, 1>::zeros([4], &ctx.device);
        assert_eq!(t.device(), ctx.device);
    }

    #[test]
    fn test_default_placement() {
        #[cfg(not(feature = "gpu"))]
        assert_eq!(DevicePlacement::preferred(), DevicePlacement::Cpu);
        assert_eq!(DevicePlacement::default(), DevicePlacement::Cpu);
    }
}
