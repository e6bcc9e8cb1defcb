use kornia_image::{allocator::ImageAllocator, Image, ImageError, ImageSize};
use kornia_tensor::{CpuAllocator, Tensor2};

use crate::{
    interpolation::{
        bilinear_sample_zeros,
        grid::{denormalize_coordinate, normalized_meshgrid},
    },
    parallel,
};

/// Homogeneous coordinates smaller than this are not divided.
const HOMOGENEOUS_EPS: f32 = 1e-8;

/// A destination point mapped through a homography, in normalized coordinates.
struct ProjectedPoint {
    x: f32,
    y: f32,
    // numerators and the inverse of the homogeneous coordinate, kept for the gradient
    a: f32,
    b: f32,
    scale: f32,
    divided: bool,
}

#[inline]
fn project(h: &[f32; 9], px: f32, py: f32) -> ProjectedPoint {
    let a = h[0] * px + h[1] * py + h[2];
    let b = h[3] * px + h[4] * py + h[5];
    let w = h[6] * px + h[7] * py + h[8];

    let divided = w.abs() > HOMOGENEOUS_EPS;
    let scale = if divided { 1.0 / w } else { 1.0 };

    ProjectedPoint {
        x: a * scale,
        y: b * scale,
        a,
        b,
        scale,
        divided,
    }
}

/// Warps images with a homography acting on normalized coordinates.
///
/// The warper owns the grid of the destination image, with both axes normalized to
/// `[-1, 1]` and the corner pixels on the bounds. Every destination point `p` is
/// sampled in the source at `H * p`, so the homography maps destination to source
/// coordinates. Samples use bilinear interpolation and pixels outside the source
/// read as zero.
///
/// Besides warping, [`HomographyWarper::l1_loss_and_grad`] returns the photometric
/// L1 error of the warp and its gradient with respect to the homography, which is
/// what fitting a homography by gradient descent needs.
///
/// # Example
///
/// ```
/// use kornia_image::{Image, allocator::CpuAllocator};
/// use kornia_imgproc::warp::HomographyWarper;
///
/// let src = Image::<f32, 1, _>::new([3, 3].into(), (0..9).map(|v| v as f32).collect(), CpuAllocator).unwrap();
/// let mut dst = Image::<f32, 1, _>::from_size_val([3, 3].into(), 0.0, CpuAllocator).unwrap();
///
/// let warper = HomographyWarper::new(3, 3).unwrap();
/// let identity = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
/// warper.warp(&src, &identity, &mut dst).unwrap();
///
/// assert_eq!(dst.as_slice(), src.as_slice());
/// ```
#[derive(Debug, Clone)]
pub struct HomographyWarper {
    size: ImageSize,
    grid_x: Tensor2<f32, CpuAllocator>,
    grid_y: Tensor2<f32, CpuAllocator>,
}

impl HomographyWarper {
    /// Create a warper producing images of `height` x `width` pixels.
    pub fn new(height: usize, width: usize) -> Result<Self, ImageError> {
        let (grid_x, grid_y) = normalized_meshgrid(height, width)?;
        Ok(Self {
            size: ImageSize { width, height },
            grid_x,
            grid_y,
        })
    }

    /// The size of the warped images.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    fn check_size(&self, size: ImageSize) -> Result<(), ImageError> {
        if size != self.size {
            return Err(ImageError::InvalidImageSize(
                size.height,
                size.width,
                self.size.height,
                self.size.width,
            ));
        }
        Ok(())
    }

    /// Warp `src` into `dst` with `homography`.
    ///
    /// # Arguments
    ///
    /// * `src` - The source image, of any size.
    /// * `homography` - Row-major 3x3 matrix mapping normalized dst points to src.
    /// * `dst` - The output image, with the size of the warper.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidImageSize`] if `dst` does not match the warper.
    pub fn warp<const C: usize, A1: ImageAllocator, A2: ImageAllocator>(
        &self,
        src: &Image<f32, C, A1>,
        homography: &[f32; 9],
        dst: &mut Image<f32, C, A2>,
    ) -> Result<(), ImageError> {
        self.check_size(dst.size())?;

        let (src_rows, src_cols) = (src.rows(), src.cols());
        parallel::par_iter_rows_resample(dst, &self.grid_x, &self.grid_y, |&px, &py, dst_pixel| {
            let p = project(homography, px, py);
            let u = denormalize_coordinate(p.x, src_cols);
            let v = denormalize_coordinate(p.y, src_rows);
            dst_pixel.copy_from_slice(&bilinear_sample_zeros(src, u, v).value);
        })?;

        Ok(())
    }

    /// Photometric L1 error of a warp and its gradient with respect to the homography.
    ///
    /// The loss is the mean absolute difference between `src` warped with
    /// `homography` and `target`. The gradient of `|x|` at zero is taken as zero.
    ///
    /// # Arguments
    ///
    /// * `src` - The source image, of any size.
    /// * `target` - The image the warp should match, with the size of the warper.
    /// * `homography` - Row-major 3x3 matrix mapping normalized dst points to src.
    ///
    /// # Returns
    ///
    /// The loss and its derivative with respect to each of the nine entries.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidImageSize`] if `target` does not match the warper.
    pub fn l1_loss_and_grad<const C: usize, A1: ImageAllocator, A2: ImageAllocator>(
        &self,
        src: &Image<f32, C, A1>,
        target: &Image<f32, C, A2>,
        homography: &[f32; 9],
    ) -> Result<(f32, [f32; 9]), ImageError> {
        self.check_size(target.size())?;

        let numel = target.numel();
        if numel == 0 {
            return Ok((0.0, [0.0; 9]));
        }

        let (src_rows, src_cols) = (src.rows(), src.cols());
        let du_dx = src_cols.saturating_sub(1) as f32 / 2.0;
        let dv_dy = src_rows.saturating_sub(1) as f32 / 2.0;

        let grid_x = self.grid_x.as_slice();
        let grid_y = self.grid_y.as_slice();
        let cols = self.size.width;

        let (loss, grad) = parallel::par_reduce_rows(
            target,
            || (0.0f32, [0.0f32; 9]),
            |y, target_row| {
                let mut loss = 0.0;
                let mut grad = [0.0f32; 9];

                for (x, expected) in target_row.chunks_exact(C).enumerate() {
                    let (px, py) = (grid_x[y * cols + x], grid_y[y * cols + x]);
                    let p = project(homography, px, py);
                    let sample = bilinear_sample_zeros(
                        src,
                        denormalize_coordinate(p.x, src_cols),
                        denormalize_coordinate(p.y, src_rows),
                    );

                    // dL/du and dL/dv summed over the channels
                    let (mut gu, mut gv) = (0.0, 0.0);
                    for c in 0..C {
                        let diff = sample.value[c] - expected[c];
                        loss += diff.abs();
                        let sign = if diff > 0.0 {
                            1.0
                        } else if diff < 0.0 {
                            -1.0
                        } else {
                            0.0
                        };
                        gu += sign * sample.du[c];
                        gv += sign * sample.dv[c];
                    }

                    if gu == 0.0 && gv == 0.0 {
                        continue;
                    }

                    let gx = gu * du_dx * p.scale;
                    let gy = gv * dv_dy * p.scale;

                    grad[0] += gx * px;
                    grad[1] += gx * py;
                    grad[2] += gx;
                    grad[3] += gy * px;
                    grad[4] += gy * py;
                    grad[5] += gy;

                    if p.divided {
                        let gw = -(gx * p.a + gy * p.b) * p.scale;
                        grad[6] += gw * px;
                        grad[7] += gw * py;
                        grad[8] += gw;
                    }
                }

                (loss, grad)
            },
            |(l1, g1), (l2, g2)| (l1 + l2, std::array::from_fn(|i| g1[i] + g2[i])),
        );

        let norm = 1.0 / numel as f32;
        Ok((loss * norm, grad.map(|g| g * norm)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kornia_image::allocator::CpuAllocator;

    const IDENTITY: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

    fn ramp(width: usize, height: usize) -> Result<Image<f32, 1, CpuAllocator>, ImageError> {
        Image::new(
            [width, height].into(),
            (0..width * height).map(|i| (i % width) as f32).collect(),
            CpuAllocator,
        )
    }

    #[test]
    fn test_project_guards_small_w() {
        let h = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let p = project(&h, 0.5, -0.25);
        assert!(!p.divided);
        assert_eq!((p.x, p.y), (0.5, -0.25));

        let h = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0];
        let p = project(&h, 0.5, -0.25);
        assert_eq!((p.x, p.y), (0.25, -0.125));
    }

    #[test]
    fn test_warp_identity() -> Result<(), ImageError> {
        let src = ramp(5, 4)?;
        let mut dst = Image::<f32, 1, _>::from_size_val([5, 4].into(), -1.0, CpuAllocator)?;
        let warper = HomographyWarper::new(4, 5)?;
        warper.warp(&src, &IDENTITY, &mut dst)?;
        for (a, b) in dst.as_slice().iter().zip(src.as_slice()) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_warp_mirror() -> Result<(), ImageError> {
        let src = ramp(3, 1)?;
        let mut dst = Image::<f32, 1, _>::from_size_val([3, 1].into(), 0.0, CpuAllocator)?;
        let warper = HomographyWarper::new(1, 3)?;
        let mirror = [-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        warper.warp(&src, &mirror, &mut dst)?;
        assert_eq!(dst.as_slice(), &[2.0, 1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_warp_size_mismatch() -> Result<(), ImageError> {
        let src = ramp(3, 3)?;
        let mut dst = Image::<f32, 1, _>::from_size_val([2, 3].into(), 0.0, CpuAllocator)?;
        let warper = HomographyWarper::new(3, 3)?;
        assert_eq!(
            warper.warp(&src, &IDENTITY, &mut dst),
            Err(ImageError::InvalidImageSize(3, 2, 3, 3))
        );
        assert_eq!(warper.size(), ImageSize { width: 3, height: 3 });
        Ok(())
    }

    #[test]
    fn test_loss_and_grad_at_optimum() -> Result<(), ImageError> {
        let src = ramp(5, 5)?;
        let warper = HomographyWarper::new(5, 5)?;
        let (loss, grad) = warper.l1_loss_and_grad(&src, &src, &IDENTITY)?;
        assert_relative_eq!(loss, 0.0, epsilon = 1e-6);
        assert!(grad.iter().all(|g| g.abs() < 1e-6));
        Ok(())
    }

    #[test]
    fn test_grad_of_shrinking_warp() -> Result<(), ImageError> {
        // samples stay inside the ramp, so every pixel pulls h[2] the same way
        let src = ramp(9, 3)?;
        let target = Image::<f32, 1, _>::from_size_val([9, 3].into(), 0.0, CpuAllocator)?;
        let warper = HomographyWarper::new(3, 9)?;
        let shrink = [0.5, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 1.0];

        let (loss, grad) = warper.l1_loss_and_grad(&src, &target, &shrink)?;
        assert_relative_eq!(loss, 4.0, epsilon = 1e-5);
        assert_relative_eq!(grad[2], 4.0, epsilon = 1e-5);
        assert_relative_eq!(grad[5], 0.0, epsilon = 1e-5);
        Ok(())
    }
}
