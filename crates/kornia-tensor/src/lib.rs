#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Overview
//!
//! `kornia-tensor` provides owned, contiguous multi-dimensional arrays whose memory
//! is obtained through a [`TensorAllocator`]. Every allocator reports the [`Device`]
//! its memory belongs to, and the [`backend`] module tells operators which kernels a
//! device runs natively and how to fall back to the CPU otherwise.
//!
//! # Quick Start
//!
//! ```rust
//! use kornia_tensor::{Tensor, CpuAllocator};
//!
//! let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let tensor = Tensor::<f32, 2, _>::from_shape_vec([2, 3], data, CpuAllocator).unwrap();
//!
//! assert_eq!(tensor.get([0, 0]), Some(&1.0));
//! assert_eq!(tensor.get([1, 2]), Some(&6.0));
//!
//! let reshaped = tensor.reshape([3, 2]).unwrap();
//! assert_eq!(reshaped.shape, [3, 2]);
//! ```

/// Allocator module containing memory management utilities.
pub mod allocator;

/// backend module containing capability queries and fallback execution.
pub mod backend;

/// Device module containing device abstraction.
pub mod device;

/// Storage module containing low-level memory buffer implementations.
pub mod storage;

/// Tensor module containing the main tensor implementation and error types.
pub mod tensor;

pub use crate::allocator::{CpuAllocator, TensorAllocator, TensorAllocatorError};
pub use crate::backend::{Backend, Capability, CpuBackend, ExecutionContext};
pub use crate::device::Device;
pub use crate::tensor::{Tensor, TensorError};

/// Type alias for a 1-dimensional tensor.
pub type Tensor1<T, A> = Tensor<T, 1, A>;

/// Type alias for a 2-dimensional tensor.
pub type Tensor2<T, A> = Tensor<T, 2, A>;

/// Type alias for a 3-dimensional tensor.
pub type Tensor3<T, A> = Tensor<T, 3, A>;

/// Type alias for a 4-dimensional tensor.
pub type Tensor4<T, A> = Tensor<T, 4, A>;

/// Type alias for a 2-dimensional tensor with CPU allocator.
pub type CpuTensor2<T> = Tensor2<T, CpuAllocator>;
