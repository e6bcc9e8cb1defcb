use rayon::prelude::*;

use kornia_image::{allocator::ImageAllocator, Image};
use kornia_tensor::{CpuAllocator, Tensor2, TensorError};

/// Apply a function to each pixel for grid sampling in parallel.
///
/// The maps hold, for every destination pixel, the location to sample from.
///
/// # Errors
///
/// Fails if `dst` shares its data and the copy cannot be allocated.
pub fn par_iter_rows_resample<const C: usize, A: ImageAllocator>(
    dst: &mut Image<f32, C, A>,
    map_x: &Tensor2<f32, CpuAllocator>,
    map_y: &Tensor2<f32, CpuAllocator>,
    f: impl Fn(&f32, &f32, &mut [f32]) + Send + Sync,
) -> Result<(), TensorError> {
    let cols = dst.cols();
    let dst_slice = dst.as_slice_mut()?;
    let map_x_slice = map_x.as_slice();
    let map_y_slice = map_y.as_slice();

    dst_slice
        .par_chunks_exact_mut(C * cols)
        .zip(map_x_slice.par_chunks_exact(cols))
        .zip(map_y_slice.par_chunks_exact(cols))
        .for_each(|((dst_chunk, map_x_chunk), map_y_chunk)| {
            dst_chunk
                .chunks_exact_mut(C)
                .zip(map_x_chunk.iter().zip(map_y_chunk.iter()))
                .for_each(|(dst_pixel, (x, y))| {
                    f(x, y, dst_pixel);
                });
        });

    Ok(())
}

/// Map every row of an image in parallel and reduce the partial results.
///
/// `f` receives the row index and the row data and returns the partial result of
/// that row; partial results are merged with `reduce`.
pub fn par_reduce_rows<const C: usize, A: ImageAllocator, R: Send>(
    src: &Image<f32, C, A>,
    identity: impl Fn() -> R + Send + Sync,
    f: impl Fn(usize, &[f32]) -> R + Send + Sync,
    reduce: impl Fn(R, R) -> R + Send + Sync,
) -> R {
    let row_len = C * src.cols();
    if row_len == 0 {
        return identity();
    }

    src.as_slice()
        .par_chunks_exact(row_len)
        .enumerate()
        .map(|(y, row)| f(y, row))
        .reduce(identity, reduce)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kornia_image::ImageError;

    #[test]
    fn test_par_iter_rows_resample() -> Result<(), ImageError> {
        let mut dst = Image::<f32, 2, _>::from_size_val([2, 2].into(), 0.0, CpuAllocator)?;
        let map_x = Tensor2::from_shape_vec([2, 2], vec![0.0, 1.0, 0.0, 1.0], CpuAllocator)?;
        let map_y = Tensor2::from_shape_vec([2, 2], vec![0.0, 0.0, 1.0, 1.0], CpuAllocator)?;

        par_iter_rows_resample(&mut dst, &map_x, &map_y, |&x, &y, pixel| {
            pixel[0] = x;
            pixel[1] = y;
        })?;

        assert_eq!(dst.as_slice(), &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_par_iter_rows_resample_leaves_clone() -> Result<(), ImageError> {
        let mut dst = Image::<f32, 1, _>::from_size_val([2, 1].into(), 0.0, CpuAllocator)?;
        let before = dst.clone();
        let map = Tensor2::from_shape_vec([1, 2], vec![3.0, 4.0], CpuAllocator)?;

        par_iter_rows_resample(&mut dst, &map, &map, |&x, _, pixel| pixel[0] = x)?;

        assert_eq!(dst.as_slice(), &[3.0, 4.0]);
        assert_eq!(before.as_slice(), &[0.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_par_reduce_rows() -> Result<(), ImageError> {
        let image = Image::<f32, 1, _>::new(
            [2, 3].into(),
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            CpuAllocator,
        )?;

        let (rows, total) = par_reduce_rows(
            &image,
            || (0, 0.0),
            |y, row| (1, y as f32 * row.iter().sum::<f32>()),
            |l, r| (l.0 + r.0, l.1 + r.1),
        );

        assert_eq!(rows, 3);
        // 0 * 1 + 1 * 5 + 2 * 9
        assert_eq!(total, 23.0);
        Ok(())
    }
}
