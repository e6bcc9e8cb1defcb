use rayon::prelude::*;
use thiserror::Error;

use kornia_tensor::{Capability, ExecutionContext, Tensor3, TensorAllocator, TensorError};

/// Errors raised by the pooling operators.
#[derive(Error, Debug, PartialEq)]
pub enum PoolingError {
    /// The kernel size must be at least one.
    #[error("kernel_size must be > 0, got {0}")]
    InvalidKernelSize(usize),

    /// The stride must be at least one.
    #[error("stride must be > 0, got {0}")]
    InvalidStride(usize),

    /// The padding must be at most half of the kernel size.
    #[error("padding {padding} must be at most half of kernel_size {kernel_size}")]
    InvalidPadding {
        /// The requested padding.
        padding: usize,
        /// The requested kernel size.
        kernel_size: usize,
    },

    /// The padded input is smaller than the kernel.
    #[error("padded input {height}x{width} is smaller than kernel_size {kernel_size}")]
    WindowLargerThanInput {
        /// Padded input height.
        height: usize,
        /// Padded input width.
        width: usize,
        /// The requested kernel size.
        kernel_size: usize,
    },

    /// Error from the underlying tensor.
    #[error(transparent)]
    TensorError(#[from] TensorError),
}

/// Output spatial size of a square pooling window.
fn pooled_size(size: usize, kernel_size: usize, stride: usize, padding: usize) -> usize {
    (size - (kernel_size - 2 * padding)) / stride + 1
}

#[inline]
fn is_nan<T: PartialOrd>(v: &T) -> bool {
    v.partial_cmp(v).is_none()
}

/// Finds the maximum of one window of a single plane.
///
/// The window is scanned in row-major order and only replaced by a strictly larger
/// value, so the first maximum wins on ties. NaN always replaces a number.
#[inline]
fn window_max<T: Copy + PartialOrd>(
    plane: &[T],
    [rows, cols]: [usize; 2],
    [top, left]: [usize; 2],
    kernel_size: usize,
    padding: usize,
) -> (T, usize) {
    // `top` and `left` are in padded coordinates
    let y0 = top.saturating_sub(padding);
    let x0 = left.saturating_sub(padding);
    let y1 = top.saturating_add(kernel_size).saturating_sub(padding).min(rows);
    let x1 = left.saturating_add(kernel_size).saturating_sub(padding).min(cols);

    let mut best_idx = y0 * cols + x0;
    let mut best = plane[best_idx];
    for y in y0..y1 {
        let row = &plane[y * cols..(y + 1) * cols];
        for (x, &val) in row.iter().enumerate().take(x1).skip(x0) {
            if val > best || (is_nan(&val) && !is_nan(&best)) {
                best = val;
                best_idx = y * cols + x;
            }
        }
    }
    (best, best_idx)
}

/// Host kernel for max pooling with indices over a `(B, H, W)` buffer.
///
/// The caller guarantees valid parameters and non-empty planes. Indices are flat
/// offsets `y * W + x` inside each plane, padding never wins.
pub(crate) fn max_pool2d_with_indices_kernel<T>(
    data: &[T],
    [batch, rows, cols]: [usize; 3],
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> (Vec<T>, Vec<usize>, [usize; 3])
where
    T: Copy + PartialOrd + Send + Sync,
{
    let out_rows = pooled_size(rows, kernel_size, stride, padding);
    let out_cols = pooled_size(cols, kernel_size, stride, padding);
    let plane_len = rows * cols;
    let out_plane_len = out_rows * out_cols;

    let pooled: Vec<(T, usize)> = (0..batch * out_plane_len)
        .into_par_iter()
        .map(|out_idx| {
            let b = out_idx / out_plane_len;
            let oy = (out_idx % out_plane_len) / out_cols;
            let ox = out_idx % out_cols;
            let plane = &data[b * plane_len..(b + 1) * plane_len];
            window_max(
                plane,
                [rows, cols],
                [oy * stride, ox * stride],
                kernel_size,
                padding,
            )
        })
        .collect();

    let (values, indices) = pooled.into_iter().unzip();
    (values, indices, [batch, out_rows, out_cols])
}

/// Validates square max pooling parameters for a `(H, W)` plane.
fn check_pool_params(
    [rows, cols]: [usize; 2],
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> Result<(), PoolingError> {
    if kernel_size == 0 {
        return Err(PoolingError::InvalidKernelSize(kernel_size));
    }
    if stride == 0 {
        return Err(PoolingError::InvalidStride(stride));
    }
    if padding > kernel_size / 2 {
        return Err(PoolingError::InvalidPadding {
            padding,
            kernel_size,
        });
    }
    // padding <= kernel_size / 2, so the uncovered span cannot underflow
    let span = kernel_size - 2 * padding;
    if rows < span || cols < span {
        return Err(PoolingError::WindowLargerThanInput {
            height: rows.saturating_add(2 * padding),
            width: cols.saturating_add(2 * padding),
            kernel_size,
        });
    }
    Ok(())
}

/// Square 2D max pooling over a batch of planes, returning the window maxima and
/// their locations.
///
/// # Arguments
///
/// * `src` - The input tensor with shape (B, H, W).
/// * `kernel_size` - The side of the square pooling window.
/// * `stride` - The step between two windows.
/// * `padding` - The implicit padding on every border, at most `kernel_size / 2`.
///   Padded cells never win a window.
///
/// # Returns
///
/// The pooled values and, for every output cell, the flat index `y * W + x` of the
/// maximum inside its input plane. The first maximum in row-major scan order wins on
/// ties. Both tensors share the allocator of `src`.
///
/// Devices without [`Capability::MaxPoolWithIndices`] run the kernel on the CPU.
///
/// # Example
///
/// ```
/// use kornia_tensor::{CpuAllocator, Tensor3};
/// use kornia_imgproc::pooling::max_pool2d_with_indices;
///
/// let src = Tensor3::from_shape_vec([1, 2, 2], vec![1.0f32, 4.0, 3.0, 2.0], CpuAllocator).unwrap();
/// let (values, indices) = max_pool2d_with_indices(&src, 2, 2, 0).unwrap();
///
/// assert_eq!(values.as_slice(), &[4.0]);
/// assert_eq!(indices.as_slice(), &[1]);
/// ```
pub fn max_pool2d_with_indices<T, A>(
    src: &Tensor3<T, A>,
    kernel_size: usize,
    stride: usize,
    padding: usize,
) -> Result<(Tensor3<T, A>, Tensor3<usize, A>), PoolingError>
where
    T: Copy + PartialOrd + Send + Sync,
    A: TensorAllocator,
{
    let [batch, rows, cols] = src.shape;
    check_pool_params([rows, cols], kernel_size, stride, padding)?;

    if src.numel() == 0 {
        let shape = [
            batch,
            pooled_size(rows, kernel_size, stride, padding),
            pooled_size(cols, kernel_size, stride, padding),
        ];
        let values = Tensor3::from_shape_vec(shape, vec![], src.allocator().clone())?;
        let indices = Tensor3::from_shape_vec(shape, vec![], src.allocator().clone())?;
        return Ok((values, indices));
    }

    let ctx = ExecutionContext::resolve(&src.device(), Capability::MaxPoolWithIndices);

    let mut pooled_indices = None;
    let values = ctx.run(src, |data, shape| {
        let (values, indices, out_shape) =
            max_pool2d_with_indices_kernel(data, shape, kernel_size, stride, padding);
        pooled_indices = Some((indices, out_shape));
        Ok((values, out_shape))
    })?;

    let (indices, out_shape) = pooled_indices.unwrap_or((vec![], values.shape));
    let indices = Tensor3::from_shape_vec(out_shape, indices, src.allocator().clone())?;

    Ok((values, indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kornia_tensor::CpuAllocator;

    #[test]
    fn test_max_pool_2x2_stride_2() -> Result<(), PoolingError> {
        #[rustfmt::skip]
        let src = Tensor3::from_shape_vec(
            [1, 4, 4],
            vec![
                1.0f32, 2.0, 5.0, 0.0,
                3.0, 4.0, 1.0, 1.0,
                0.0, 0.0, 2.0, 2.0,
                9.0, 0.0, 2.0, 3.0,
            ],
            CpuAllocator,
        )?;

        let (values, indices) = max_pool2d_with_indices(&src, 2, 2, 0)?;
        assert_eq!(values.shape, [1, 2, 2]);
        assert_eq!(values.as_slice(), &[4.0, 5.0, 9.0, 3.0]);
        assert_eq!(indices.as_slice(), &[5, 2, 12, 15]);
        Ok(())
    }

    #[test]
    fn test_max_pool_padding_keeps_size() -> Result<(), PoolingError> {
        let src = Tensor3::from_shape_vec([2, 2, 3], (0..12).collect::<Vec<i32>>(), CpuAllocator)?;
        let (values, indices) = max_pool2d_with_indices(&src, 3, 1, 1)?;
        assert_eq!(values.shape, [2, 2, 3]);
        assert_eq!(values.as_slice(), &[4, 5, 5, 4, 5, 5, 10, 11, 11, 10, 11, 11]);
        // indices are local to each plane
        assert_eq!(indices.as_slice(), &[4, 5, 5, 4, 5, 5, 4, 5, 5, 4, 5, 5]);
        Ok(())
    }

    #[test]
    fn test_max_pool_ties_keep_first() -> Result<(), PoolingError> {
        let src = Tensor3::from_shape_vec([1, 2, 2], vec![7u8; 4], CpuAllocator)?;
        let (_, indices) = max_pool2d_with_indices(&src, 2, 1, 0)?;
        assert_eq!(indices.as_slice(), &[0]);
        Ok(())
    }

    #[test]
    fn test_max_pool_nan_wins() -> Result<(), PoolingError> {
        let src =
            Tensor3::from_shape_vec([1, 1, 3], vec![1.0f32, f32::NAN, 3.0], CpuAllocator)?;
        let (values, indices) = max_pool2d_with_indices(&src, 3, 1, 1)?;
        assert!(values.as_slice().iter().all(|v| v.is_nan()));
        assert_eq!(indices.as_slice(), &[1, 1, 1]);
        Ok(())
    }

    #[test]
    fn test_max_pool_invalid_params() {
        let src = Tensor3::from_shape_vec([1, 2, 2], vec![0.0f32; 4], CpuAllocator).unwrap();
        assert_eq!(
            max_pool2d_with_indices(&src, 0, 1, 0).err(),
            Some(PoolingError::InvalidKernelSize(0))
        );
        assert_eq!(
            max_pool2d_with_indices(&src, 3, 0, 1).err(),
            Some(PoolingError::InvalidStride(0))
        );
        assert_eq!(
            max_pool2d_with_indices(&src, 3, 1, 2).err(),
            Some(PoolingError::InvalidPadding {
                padding: 2,
                kernel_size: 3
            })
        );
        assert!(matches!(
            max_pool2d_with_indices(&src, 5, 1, 0),
            Err(PoolingError::WindowLargerThanInput { .. })
        ));
        assert!(matches!(
            max_pool2d_with_indices(&src, usize::MAX, 1, 0),
            Err(PoolingError::WindowLargerThanInput { .. })
        ));
    }

    #[test]
    fn test_max_pool_empty_batch() -> Result<(), PoolingError> {
        let src = Tensor3::<f32, _>::from_shape_vec([0, 3, 3], vec![], CpuAllocator)?;
        let (values, indices) = max_pool2d_with_indices(&src, 3, 1, 1)?;
        assert_eq!(values.shape, [0, 3, 3]);
        assert_eq!(indices.numel(), 0);
        Ok(())
    }
}
