//! Backend capability queries and CPU fallback execution.
//!
//! Not every device implements every kernel. Operators ask the backend of their
//! input tensor whether a [`Capability`] is available and, through an
//! [`ExecutionContext`], transparently run on the CPU when it is not: the input is
//! copied into CPU memory, the kernel runs there and the result is copied back into
//! the allocator of the input tensor.

use crate::{
    allocator::{CpuAllocator, TensorAllocator},
    device::Device,
    tensor::{Tensor, TensorError},
};

/// A kernel family a backend may or may not implement natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Element-wise maps and comparisons.
    Elementwise,
    /// Max pooling that also returns the flat index of every window maximum.
    MaxPoolWithIndices,
    /// Bilinear sampling of an image at arbitrary coordinates.
    BilinearSampling,
}

/// Backend trait describing what a device can execute.
///
/// Implementations must be `Send + Sync` to allow usage across threads.
pub trait Backend: Send + Sync {
    /// Returns the device type for this backend.
    fn device(&self) -> Device;

    /// Returns true if the kernel family runs natively on this backend.
    fn supports(&self, capability: Capability) -> bool;
}

/// CPU backend implementation. It supports every capability.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    fn device(&self) -> Device {
        Device::Cpu
    }

    fn supports(&self, _capability: Capability) -> bool {
        true
    }
}

/// Capability table of the built-in devices.
impl Backend for Device {
    fn device(&self) -> Device {
        *self
    }

    fn supports(&self, capability: Capability) -> bool {
        match self {
            Device::Cpu | Device::Cuda { .. } => true,
            Device::Metal { .. } => capability != Capability::MaxPoolWithIndices,
            Device::Vulkan { .. } => capability == Capability::Elementwise,
        }
    }
}

/// The device an operator actually runs on once capabilities are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    requested: Device,
    target: Device,
}

impl ExecutionContext {
    /// Resolves where a kernel needing `capability` runs for data living on `backend`.
    pub fn resolve<B: Backend + ?Sized>(backend: &B, capability: Capability) -> Self {
        let requested = backend.device();
        let target = if backend.supports(capability) {
            requested
        } else {
            log::debug!(
                "{:?} is not supported on {}, falling back to cpu",
                capability,
                requested
            );
            Device::Cpu
        };
        Self { requested, target }
    }

    /// The device holding the operator inputs.
    pub fn requested(&self) -> Device {
        self.requested
    }

    /// The device executing the kernel.
    pub fn target(&self) -> Device {
        self.target
    }

    /// Returns true when the kernel runs away from the input device.
    pub fn is_fallback(&self) -> bool {
        self.requested != self.target
    }

    /// Runs `kernel` over the contiguous data of `input`.
    ///
    /// The kernel receives the input elements and shape and returns the output
    /// elements and shape. The output tensor is always owned by the allocator of
    /// `input`; on fallback the data takes a round trip through CPU memory.
    ///
    /// # Errors
    ///
    /// Propagates kernel errors and fails if the output data does not match the
    /// returned shape.
    pub fn run<T, U, const N: usize, const M: usize, A, F>(
        &self,
        input: &Tensor<T, N, A>,
        kernel: F,
    ) -> Result<Tensor<U, M, A>, TensorError>
    where
        T: Clone,
        U: Clone,
        A: TensorAllocator,
        F: FnOnce(&[T], [usize; N]) -> Result<(Vec<U>, [usize; M]), TensorError>,
    {
        if self.is_fallback() {
            let host = input.to_allocator(CpuAllocator)?;
            let (data, shape) = kernel(host.as_slice(), host.shape)?;
            let output = Tensor::from_shape_vec(shape, data, CpuAllocator)?;
            output.to_allocator(input.allocator().clone())
        } else {
            let (data, shape) = kernel(input.as_slice(), input.shape)?;
            Tensor::from_shape_vec(shape, data, input.allocator().clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::TensorAllocatorError;
    use std::alloc::Layout;

    #[derive(Clone)]
    struct MetalLikeAllocator;

    impl TensorAllocator for MetalLikeAllocator {
        fn alloc(&self, layout: Layout) -> Result<*mut u8, TensorAllocatorError> {
            CpuAllocator.alloc(layout)
        }

        fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            CpuAllocator.dealloc(ptr, layout)
        }

        fn device(&self) -> Device {
            Device::metal(0)
        }
    }

    #[test]
    fn test_cpu_backend_supports_all() {
        let backend = CpuBackend;
        assert_eq!(backend.device(), Device::Cpu);
        assert!(backend.supports(Capability::MaxPoolWithIndices));
        assert!(backend.supports(Capability::BilinearSampling));
    }

    #[test]
    fn test_device_capability_table() {
        assert!(Device::cuda(0).supports(Capability::MaxPoolWithIndices));
        assert!(!Device::metal(0).supports(Capability::MaxPoolWithIndices));
        assert!(Device::metal(0).supports(Capability::BilinearSampling));
        assert!(!Device::vulkan(0).supports(Capability::BilinearSampling));
    }

    #[test]
    fn test_resolve_native() {
        let ctx = ExecutionContext::resolve(&Device::cuda(1), Capability::MaxPoolWithIndices);
        assert!(!ctx.is_fallback());
        assert_eq!(ctx.target(), Device::cuda(1));
    }

    #[test]
    fn test_resolve_fallback() {
        let ctx = ExecutionContext::resolve(&Device::metal(0), Capability::MaxPoolWithIndices);
        assert!(ctx.is_fallback());
        assert_eq!(ctx.requested(), Device::metal(0));
        assert_eq!(ctx.target(), Device::Cpu);
    }

    #[test]
    fn test_backend_trait_object() {
        let backends: Vec<Box<dyn Backend>> = vec![Box::new(CpuBackend), Box::new(Device::vulkan(0))];
        let native = backends
            .iter()
            .filter(|b| b.supports(Capability::MaxPoolWithIndices))
            .count();
        assert_eq!(native, 1);
    }

    #[test]
    fn test_run_fallback_returns_to_input_allocator() -> Result<(), TensorError> {
        let input = Tensor::<i32, 2, _>::from_shape_vec([2, 2], vec![1, 2, 3, 4], MetalLikeAllocator)?;
        let ctx = ExecutionContext::resolve(&input.device(), Capability::MaxPoolWithIndices);
        assert!(ctx.is_fallback());

        let output = ctx.run(&input, |data, shape| {
            Ok((data.iter().map(|&x| x * 10).collect::<Vec<_>>(), [shape[0] * shape[1]]))
        })?;

        assert_eq!(output.shape, [4]);
        assert_eq!(output.as_slice(), &[10, 20, 30, 40]);
        assert_eq!(output.device(), Device::metal(0));
        Ok(())
    }

    #[test]
    fn test_run_native_shape_error() {
        let input = Tensor::<u8, 1, _>::from_shape_vec([3], vec![1, 2, 3], CpuAllocator).unwrap();
        let ctx = ExecutionContext::resolve(&CpuBackend, Capability::Elementwise);
        let res = ctx.run(&input, |data, _| Ok((data.to_vec(), [2, 2])));
        assert_eq!(res.err(), Some(TensorError::invalid_shape(4, 3)));
    }
}
