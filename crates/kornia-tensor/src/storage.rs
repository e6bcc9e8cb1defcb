use std::{alloc::Layout, ptr::NonNull, sync::Arc};

use crate::{
    allocator::{TensorAllocator, TensorAllocatorError},
    device::Device,
};

/// The buffer shared by every clone of a storage.
///
/// The first `len` slots hold initialized elements. They are dropped and the
/// memory goes back to `alloc` when the last handle goes away.
struct StorageImpl<T, A: TensorAllocator> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
    alloc: A,
}

// SAFETY: the buffer is only mutated through a unique handle.
unsafe impl<T: Send, A: TensorAllocator> Send for StorageImpl<T, A> {}
unsafe impl<T: Sync, A: TensorAllocator> Sync for StorageImpl<T, A> {}

impl<T, A: TensorAllocator> StorageImpl<T, A> {
    /// Allocates room for `capacity` elements, none of them initialized yet.
    fn allocate(capacity: usize, alloc: A) -> Result<Self, TensorAllocatorError> {
        let layout = Layout::array::<T>(capacity).map_err(TensorAllocatorError::LayoutError)?;
        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            let raw = alloc.alloc(layout)?;
            NonNull::new(raw.cast::<T>()).ok_or(TensorAllocatorError::NullPointer)?
        };
        Ok(Self {
            ptr,
            len: 0,
            layout,
            alloc,
        })
    }

    /// Allocates a buffer and fills it with the items of `iter`, up to its capacity.
    fn from_iter(
        capacity: usize,
        alloc: A,
        iter: impl IntoIterator<Item = T>,
    ) -> Result<Self, TensorAllocatorError> {
        let mut this = Self::allocate(capacity, alloc)?;
        for val in iter.into_iter().take(capacity) {
            unsafe { this.ptr.as_ptr().add(this.len).write(val) };
            this.len += 1;
        }
        Ok(this)
    }

    #[inline]
    fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T, A: TensorAllocator> Drop for StorageImpl<T, A> {
    fn drop(&mut self) {
        unsafe {
            std::ptr::drop_in_place(std::ptr::slice_from_raw_parts_mut(
                self.ptr.as_ptr(),
                self.len,
            ));
        }
        if self.layout.size() != 0 {
            self.alloc.dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout);
        }
    }
}

/// A contiguous block of memory for a tensor.
///
/// The memory is obtained from the allocator `A`. Clones share the buffer through
/// an [`Arc`] and never allocate; writing through a shared storage first copies
/// the elements into a buffer of its own.
pub struct TensorStorage<T, A: TensorAllocator> {
    inner: Arc<StorageImpl<T, A>>,
}

impl<T, A: TensorAllocator> TensorStorage<T, A> {
    /// Creates a new tensor storage from a vector with the given allocator.
    ///
    /// The elements are moved into memory obtained from `alloc`.
    ///
    /// # Arguments
    ///
    /// * `vec` - The vector to move into the tensor storage.
    /// * `alloc` - The allocator used to allocate the tensor storage.
    pub fn from_vec(vec: Vec<T>, alloc: A) -> Result<Self, TensorAllocatorError> {
        let inner = StorageImpl::from_iter(vec.len(), alloc, vec)?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Creates a new tensor storage filled with copies of `val`.
    pub fn from_val(len: usize, val: T, alloc: A) -> Result<Self, TensorAllocatorError>
    where
        T: Clone,
    {
        let inner = StorageImpl::from_iter(len, alloc, std::iter::repeat(val))?;
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Returns the number of elements in the tensor storage.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Returns true if the storage holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Returns the allocator used to allocate the tensor storage.
    #[inline]
    pub fn alloc(&self) -> &A {
        &self.inner.alloc
    }

    /// Returns the device the storage memory belongs to.
    #[inline]
    pub fn device(&self) -> Device {
        self.inner.alloc.device()
    }

    /// Returns true if other storages share this buffer.
    #[inline]
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.inner) > 1
    }

    /// Returns a pointer to the first element of the tensor storage.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.inner.ptr.as_ptr()
    }

    /// Returns the storage data as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.inner.as_slice()
    }

    /// Returns the storage data as a mutable slice.
    ///
    /// A buffer shared with other storages is copied first, so writes never show
    /// through the clones.
    ///
    /// # Errors
    ///
    /// Fails if the copy of a shared buffer cannot be allocated.
    pub fn as_mut_slice(&mut self) -> Result<&mut [T], TensorAllocatorError>
    where
        T: Clone,
    {
        if self.is_shared() {
            let src = self.inner.as_slice();
            let copy =
                StorageImpl::from_iter(src.len(), self.inner.alloc.clone(), src.iter().cloned())?;
            self.inner = Arc::new(copy);
        }
        // SAFETY: the buffer is not shared and `&mut self` keeps it that way
        let inner = &*self.inner;
        Ok(unsafe { std::slice::from_raw_parts_mut(inner.ptr.as_ptr(), inner.len) })
    }

    /// Copies the elements into a new storage owned by `alloc`.
    pub fn to_allocator<B: TensorAllocator>(
        &self,
        alloc: B,
    ) -> Result<TensorStorage<T, B>, TensorAllocatorError>
    where
        T: Clone,
    {
        let src = self.as_slice();
        let inner = StorageImpl::from_iter(src.len(), alloc, src.iter().cloned())?;
        Ok(TensorStorage {
            inner: Arc::new(inner),
        })
    }

    /// Consumes the storage and returns the elements as a vector.
    ///
    /// The elements are moved out when this is the last handle to the buffer and
    /// cloned otherwise.
    pub fn into_vec(self) -> Vec<T>
    where
        T: Clone,
    {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                let mut vec = Vec::with_capacity(inner.len);
                unsafe {
                    std::ptr::copy_nonoverlapping(inner.ptr.as_ptr(), vec.as_mut_ptr(), inner.len);
                    vec.set_len(inner.len);
                }
                // the elements moved to the vector, only the buffer is released
                inner.len = 0;
                vec
            }
            Err(shared) => shared.as_slice().to_vec(),
        }
    }
}

impl<T, A: TensorAllocator> Clone for TensorStorage<T, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, A: TensorAllocator> std::fmt::Debug for TensorStorage<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorStorage")
            .field("ptr", &self.inner.ptr)
            .field("len", &self.inner.len)
            .field("device", &self.device())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::CpuAllocator;

    #[test]
    fn test_tensor_storage_from_vec() -> Result<(), TensorAllocatorError> {
        let storage = TensorStorage::from_vec(vec![0, 1, 2, 3, 4, 5], CpuAllocator)?;
        assert_eq!(storage.len(), 6);
        assert_eq!(storage.as_slice(), &[0, 1, 2, 3, 4, 5]);
        Ok(())
    }

    #[test]
    fn test_tensor_storage_from_val() -> Result<(), TensorAllocatorError> {
        let storage = TensorStorage::from_val(1024, 42u8, CpuAllocator)?;
        assert_eq!(storage.len(), 1024);
        assert!(storage.as_slice().iter().all(|&v| v == 42));
        Ok(())
    }

    #[test]
    fn test_tensor_storage_empty() -> Result<(), TensorAllocatorError> {
        let storage = TensorStorage::<f32, _>::from_vec(vec![], CpuAllocator)?;
        assert!(storage.is_empty());
        assert_eq!(storage.into_vec(), Vec::<f32>::new());
        Ok(())
    }

    #[test]
    fn test_tensor_storage_owned_elements() -> Result<(), TensorAllocatorError> {
        let data = vec![String::from("a"), String::from("bc")];
        let storage = TensorStorage::from_vec(data, CpuAllocator)?;
        let copy = storage.clone();
        assert_eq!(copy.as_slice(), storage.as_slice());
        assert_eq!(storage.into_vec(), vec!["a".to_string(), "bc".to_string()]);
        assert_eq!(copy.into_vec(), vec!["a".to_string(), "bc".to_string()]);
        Ok(())
    }

    #[test]
    fn test_tensor_storage_clone_shares_buffer() -> Result<(), TensorAllocatorError> {
        let storage = TensorStorage::from_vec(vec![1u8, 2, 3], CpuAllocator)?;
        let copy = storage.clone();
        assert!(storage.is_shared());
        assert_eq!(copy.as_ptr(), storage.as_ptr());
        drop(copy);
        assert!(!storage.is_shared());
        Ok(())
    }

    #[test]
    fn test_tensor_storage_write_detaches_clone() -> Result<(), TensorAllocatorError> {
        let mut storage = TensorStorage::from_vec(vec![1.0f32, 2.0], CpuAllocator)?;
        let copy = storage.clone();
        storage.as_mut_slice()?[1] = 5.0;
        assert_eq!(storage.as_slice(), &[1.0, 5.0]);
        assert_eq!(copy.as_slice(), &[1.0, 2.0]);
        assert!(!storage.is_shared());
        Ok(())
    }

    #[test]
    fn test_tensor_storage_mut() -> Result<(), TensorAllocatorError> {
        let mut storage = TensorStorage::from_vec(vec![1.0f32, 2.0], CpuAllocator)?;
        let ptr = storage.as_ptr();
        storage.as_mut_slice()?[1] = 5.0;
        assert_eq!(storage.as_slice(), &[1.0, 5.0]);
        // unique storages are written in place
        assert_eq!(storage.as_ptr(), ptr);
        Ok(())
    }
}
