use kornia_image::{allocator::ImageAllocator, Image};

/// A bilinear sample together with its derivatives along the sampling coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearSample<const C: usize> {
    /// The interpolated value of every channel.
    pub value: [f32; C],
    /// Derivative of every channel with respect to the x coordinate.
    pub du: [f32; C],
    /// Derivative of every channel with respect to the y coordinate.
    pub dv: [f32; C],
}

impl<const C: usize> BilinearSample<C> {
    const ZERO: Self = Self {
        value: [0.0; C],
        du: [0.0; C],
        dv: [0.0; C],
    };
}

/// Bilinear sampling with zero padding.
///
/// Neighbours outside the image contribute zero, so a sample fades out over the
/// last pixel of the border. Non finite coordinates sample zero.
///
/// # Arguments
///
/// * `image` - The input image container.
/// * `u` - The x coordinate in pixels.
/// * `v` - The y coordinate in pixels.
///
/// # Returns
///
/// The sampled pixel and its derivatives with respect to `u` and `v`.
pub fn bilinear_sample_zeros<const C: usize, A: ImageAllocator>(
    image: &Image<f32, C, A>,
    u: f32,
    v: f32,
) -> BilinearSample<C> {
    let (rows, cols) = (image.rows(), image.cols());

    // also rejects NaN
    if !(u > -1.0 && v > -1.0 && u < cols as f32 && v < rows as f32) {
        return BilinearSample::ZERO;
    }

    let u0 = u.floor();
    let v0 = v.floor();
    let fu = u - u0;
    let fv = v - v0;
    let (x0, y0) = (u0 as isize, v0 as isize);

    let data = image.as_slice();
    let pixel = |x: isize, y: isize, c: usize| {
        if x < 0 || y < 0 || x >= cols as isize || y >= rows as isize {
            0.0
        } else {
            data[(y as usize * cols + x as usize) * C + c]
        }
    };

    let mut sample = BilinearSample::ZERO;
    for c in 0..C {
        let p00 = pixel(x0, y0, c);
        let p01 = pixel(x0 + 1, y0, c);
        let p10 = pixel(x0, y0 + 1, c);
        let p11 = pixel(x0 + 1, y0 + 1, c);

        sample.value[c] = p00 * (1.0 - fu) * (1.0 - fv)
            + p01 * fu * (1.0 - fv)
            + p10 * (1.0 - fu) * fv
            + p11 * fu * fv;
        sample.du[c] = (1.0 - fv) * (p01 - p00) + fv * (p11 - p10);
        sample.dv[c] = (1.0 - fu) * (p10 - p00) + fu * (p11 - p01);
    }

    sample
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kornia_image::{allocator::CpuAllocator, ImageError};

    fn ramp() -> Result<Image<f32, 1, CpuAllocator>, ImageError> {
        // value = x + 10 * y
        Image::new(
            [3, 2].into(),
            vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
            CpuAllocator,
        )
    }

    #[test]
    fn test_sample_zeros_derivatives() -> Result<(), ImageError> {
        let image = ramp()?;
        let sample = bilinear_sample_zeros(&image, 0.25, 0.5);
        assert_relative_eq!(sample.value[0], 5.25);
        assert_relative_eq!(sample.du[0], 1.0);
        assert_relative_eq!(sample.dv[0], 10.0);
        Ok(())
    }

    #[test]
    fn test_sample_zeros_border_fades() -> Result<(), ImageError> {
        let image = ramp()?;
        // half a pixel past the right border
        let sample = bilinear_sample_zeros(&image, 2.5, 0.0);
        assert_relative_eq!(sample.value[0], 1.0);
        assert_relative_eq!(sample.du[0], -2.0);

        let outside = bilinear_sample_zeros(&image, -1.0, 0.0);
        assert_eq!(outside, BilinearSample::ZERO);
        let nan = bilinear_sample_zeros(&image, f32::NAN, 0.0);
        assert_eq!(nan, BilinearSample::ZERO);
        Ok(())
    }
}
