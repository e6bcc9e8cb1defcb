use kornia_tensor::{CpuAllocator, Tensor2, TensorError};

/// Create a pair of coordinate maps by evaluating a function on every grid cell.
///
/// # Arguments
///
/// * `cols` - The number of columns indicating the width of the grid.
/// * `rows` - The number of rows indicating the height of the grid.
/// * `f` - Maps the `(x, y)` cell to the pair of values stored in the two maps.
///
/// # Returns
///
/// A tuple of 2D tensors of shape (rows, cols).
pub fn meshgrid_from_fn(
    cols: usize,
    rows: usize,
    f: impl Fn(usize, usize) -> Result<(f32, f32), TensorError>,
) -> Result<(Tensor2<f32, CpuAllocator>, Tensor2<f32, CpuAllocator>), TensorError> {
    let mut map_x = Vec::with_capacity(rows * cols);
    let mut map_y = Vec::with_capacity(rows * cols);

    for y in 0..rows {
        for x in 0..cols {
            let (u, v) = f(x, y)?;
            map_x.push(u);
            map_y.push(v);
        }
    }

    let map_x = Tensor2::from_shape_vec([rows, cols], map_x, CpuAllocator)?;
    let map_y = Tensor2::from_shape_vec([rows, cols], map_y, CpuAllocator)?;

    Ok((map_x, map_y))
}

/// Map a pixel index to `[-1, 1]`, with the first and last pixel centers on the bounds.
#[inline]
pub fn normalize_coordinate(index: f32, size: usize) -> f32 {
    if size > 1 {
        2.0 * index / (size - 1) as f32 - 1.0
    } else {
        0.0
    }
}

/// Map a normalized coordinate in `[-1, 1]` back to pixels.
#[inline]
pub fn denormalize_coordinate(coord: f32, size: usize) -> f32 {
    (coord + 1.0) * size.saturating_sub(1) as f32 / 2.0
}

/// Create a meshgrid of normalized coordinates.
///
/// The corner pixels map to `-1` and `1` on both axes.
///
/// # Arguments
///
/// * `rows` - The number of rows indicating the height of the grid.
/// * `cols` - The number of columns indicating the width of the grid.
///
/// # Returns
///
/// The x and y maps with shape (rows, cols).
pub fn normalized_meshgrid(
    rows: usize,
    cols: usize,
) -> Result<(Tensor2<f32, CpuAllocator>, Tensor2<f32, CpuAllocator>), TensorError> {
    meshgrid_from_fn(cols, rows, |x, y| {
        Ok((
            normalize_coordinate(x as f32, cols),
            normalize_coordinate(y as f32, rows),
        ))
    })
}
