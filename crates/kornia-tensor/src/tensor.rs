use thiserror::Error;

use super::{
    allocator::{TensorAllocator, TensorAllocatorError},
    device::Device,
    storage::TensorStorage,
};

/// An error type for tensor operations.
#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
    /// Tensor shape does not match the provided data.
    #[error("Shape mismatch: expected {expected} elements for shape, but got {actual} elements in data")]
    InvalidShape {
        /// Expected number of elements based on shape
        expected: usize,
        /// Actual number of elements in the data
        actual: usize,
    },

    /// Index exceeds tensor bounds.
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index that was attempted
        index: usize,
        /// The size of the dimension being indexed
        size: usize,
    },

    /// Underlying storage operation failed.
    #[error("Storage error: {0}")]
    StorageError(#[from] TensorAllocatorError),

    /// Tensor dimensions incompatible for the requested operation.
    #[error("Dimension mismatch: {message}. Expected shape: {expected}, got: {actual}")]
    DimensionMismatch {
        /// Human-readable description of the mismatch
        message: String,
        /// Expected shape description
        expected: String,
        /// Actual shape description
        actual: String,
    },
}

impl TensorError {
    /// Creates an InvalidShape error.
    pub fn invalid_shape(expected: usize, actual: usize) -> Self {
        Self::InvalidShape { expected, actual }
    }

    /// Creates a DimensionMismatch error with formatted shapes.
    pub fn dimension_mismatch(
        message: impl Into<String>,
        expected: &[usize],
        actual: &[usize],
    ) -> Self {
        Self::DimensionMismatch {
            message: message.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }
}

/// Computes the strides for a row-major (C-contiguous) tensor layout.
///
/// # Examples
///
/// ```rust
/// use kornia_tensor::tensor::get_strides_from_shape;
///
/// let strides = get_strides_from_shape([2, 3, 4]);
/// assert_eq!(strides, [12, 4, 1]);
/// ```
pub fn get_strides_from_shape<const N: usize>(shape: [usize; N]) -> [usize; N] {
    let mut strides: [usize; N] = [0; N];
    let mut stride = 1;
    for i in (0..shape.len()).rev() {
        strides[i] = stride;
        stride *= shape[i];
    }
    strides
}

/// A multi-dimensional array (tensor) with owned, contiguous data.
///
/// # Type Parameters
///
/// * `T` - The element type stored in the tensor
/// * `N` - The number of dimensions
/// * `A` - The allocator owning the memory
///
/// # Examples
///
/// ```rust
/// use kornia_tensor::{Tensor2, CpuAllocator};
///
/// let t = Tensor2::<u8, _>::from_shape_vec([2, 2], vec![1, 2, 3, 4], CpuAllocator).unwrap();
/// assert_eq!(t.shape, [2, 2]);
/// assert_eq!(t.get([1, 0]), Some(&3));
/// ```
pub struct Tensor<T, const N: usize, A: TensorAllocator> {
    /// The storage of the tensor.
    pub storage: TensorStorage<T, A>,
    /// The shape of the tensor.
    pub shape: [usize; N],
    /// The strides of the tensor data in memory.
    pub strides: [usize; N],
}

impl<T, const N: usize, A: TensorAllocator> Tensor<T, N, A> {
    /// Get the data of the tensor as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.storage.as_slice()
    }

    /// Get the data of the tensor as a mutable slice.
    ///
    /// Data shared with clones of the tensor is copied before it is handed out.
    #[inline]
    pub fn as_slice_mut(&mut self) -> Result<&mut [T], TensorError>
    where
        T: Clone,
    {
        Ok(self.storage.as_mut_slice()?)
    }

    /// Consumes the tensor and returns the underlying vector.
    #[inline]
    pub fn into_vec(self) -> Vec<T>
    where
        T: Clone,
    {
        self.storage.into_vec()
    }

    /// Returns the device where the tensor is allocated.
    #[inline]
    pub fn device(&self) -> Device {
        self.storage.device()
    }

    /// Returns the allocator owning the tensor memory.
    #[inline]
    pub fn allocator(&self) -> &A {
        self.storage.alloc()
    }

    /// Creates a new `Tensor` with the given shape and data.
    ///
    /// # Errors
    ///
    /// If the number of elements in the data does not match the shape of the tensor, an error is returned.
    ///
    /// # Example
    ///
    /// ```
    /// use kornia_tensor::{Tensor, CpuAllocator};
    ///
    /// let data: Vec<u8> = vec![1, 2, 3, 4];
    /// let t = Tensor::<u8, 2, _>::from_shape_vec([2, 2], data, CpuAllocator).unwrap();
    /// assert_eq!(t.shape, [2, 2]);
    /// ```
    pub fn from_shape_vec(shape: [usize; N], data: Vec<T>, alloc: A) -> Result<Self, TensorError> {
        let numel = shape.iter().product::<usize>();
        if numel != data.len() {
            return Err(TensorError::invalid_shape(numel, data.len()));
        }
        let storage = TensorStorage::from_vec(data, alloc)?;
        let strides = get_strides_from_shape(shape);
        Ok(Self {
            storage,
            shape,
            strides,
        })
    }

    /// Creates a new `Tensor` with the given shape and a default value.
    ///
    /// # Example
    ///
    /// ```
    /// use kornia_tensor::{Tensor, CpuAllocator};
    ///
    /// let t = Tensor::<u8, 3, _>::from_shape_val([2, 1, 3], 2, CpuAllocator).unwrap();
    /// assert_eq!(t.as_slice(), vec![2, 2, 2, 2, 2, 2]);
    /// ```
    pub fn from_shape_val(shape: [usize; N], value: T, alloc: A) -> Result<Self, TensorError>
    where
        T: Clone,
    {
        let numel = shape.iter().product::<usize>();
        let storage = TensorStorage::from_val(numel, value, alloc)?;
        let strides = get_strides_from_shape(shape);
        Ok(Self {
            storage,
            shape,
            strides,
        })
    }

    /// Creates a new `Tensor` by evaluating `f` at every index in row-major order.
    ///
    /// # Example
    ///
    /// ```
    /// use kornia_tensor::{Tensor, CpuAllocator};
    ///
    /// let t = Tensor::<usize, 2, _>::from_shape_fn([2, 3], CpuAllocator, |[i, j]| i * 3 + j).unwrap();
    /// assert_eq!(t.as_slice(), &[0, 1, 2, 3, 4, 5]);
    /// ```
    pub fn from_shape_fn<F>(shape: [usize; N], alloc: A, f: F) -> Result<Self, TensorError>
    where
        F: Fn([usize; N]) -> T,
    {
        let numel = shape.iter().product::<usize>();
        let strides = get_strides_from_shape(shape);
        let data = (0..numel)
            .map(|offset| {
                let mut index = [0; N];
                let mut rem = offset;
                for (dim, stride) in strides.iter().enumerate() {
                    index[dim] = rem / stride;
                    rem %= stride;
                }
                f(index)
            })
            .collect();
        Self::from_shape_vec(shape, data, alloc)
    }

    /// Creates a tensor filled with `T::default()`.
    pub fn zeros(shape: [usize; N], alloc: A) -> Result<Self, TensorError>
    where
        T: Clone + Default,
    {
        Self::from_shape_val(shape, T::default(), alloc)
    }

    /// Returns the number of elements in the tensor.
    #[inline]
    pub fn numel(&self) -> usize {
        self.storage.len()
    }

    /// Returns the memory offset of the element at `index`, if in bounds.
    pub fn get_iter_offset(&self, index: [usize; N]) -> Option<usize> {
        let mut offset = 0;
        for ((&idx, &dim_size), &stride) in index.iter().zip(self.shape.iter()).zip(self.strides.iter())
        {
            if idx >= dim_size {
                return None;
            }
            offset += idx * stride;
        }
        Some(offset)
    }

    /// Returns a reference to the element at `index`, or `None` when out of bounds.
    pub fn get(&self, index: [usize; N]) -> Option<&T> {
        self.get_iter_offset(index)
            .and_then(|offset| self.as_slice().get(offset))
    }

    /// Reinterprets the tensor with a new shape holding the same number of elements.
    ///
    /// The storage is moved, no data is copied.
    ///
    /// # Example
    ///
    /// ```
    /// use kornia_tensor::{Tensor, CpuAllocator};
    ///
    /// let t = Tensor::<u8, 1, _>::from_shape_vec([4], vec![1, 2, 3, 4], CpuAllocator).unwrap();
    /// let t2 = t.reshape([2, 2]).unwrap();
    /// assert_eq!(t2.shape, [2, 2]);
    /// assert_eq!(t2.strides, [2, 1]);
    /// ```
    pub fn reshape<const M: usize>(self, shape: [usize; M]) -> Result<Tensor<T, M, A>, TensorError> {
        let numel = shape.iter().product::<usize>();
        if numel != self.numel() {
            return Err(TensorError::dimension_mismatch(
                "reshape must preserve the number of elements",
                &self.shape,
                &shape,
            ));
        }
        Ok(Tensor {
            storage: self.storage,
            shape,
            strides: get_strides_from_shape(shape),
        })
    }

    /// Applies `f` element-wise and returns a tensor owned by the same allocator.
    pub fn map<U, F>(&self, f: F) -> Result<Tensor<U, N, A>, TensorError>
    where
        F: Fn(&T) -> U,
    {
        let data = self.as_slice().iter().map(f).collect();
        Tensor::from_shape_vec(self.shape, data, self.allocator().clone())
    }

    /// Copies the tensor into memory owned by `alloc`.
    ///
    /// This is how tensors move between devices.
    pub fn to_allocator<B: TensorAllocator>(&self, alloc: B) -> Result<Tensor<T, N, B>, TensorError>
    where
        T: Clone,
    {
        Ok(Tensor {
            storage: self.storage.to_allocator(alloc)?,
            shape: self.shape,
            strides: self.strides,
        })
    }
}

impl<T, const N: usize, A: TensorAllocator> Clone for Tensor<T, N, A> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            shape: self.shape,
            strides: self.strides,
        }
    }
}

impl<T: std::fmt::Debug, const N: usize, A: TensorAllocator> std::fmt::Debug for Tensor<T, N, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("device", &self.device())
            .field("data", &self.as_slice())
            .finish()
    }
}
