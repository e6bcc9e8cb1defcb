use kornia_image::{allocator::ImageAllocator, Image, ImageError};

/// Compute the L1 loss between two images.
///
/// The L1 loss is defined as:
///
/// $ L1(a, b) = \frac{1}{N} \sum_{i=1}^{N} |a_i - b_i| $
///
/// where `a` and `b` are the two images and `N` is the number of elements.
///
/// # Arguments
///
/// * `image1` - The first input image with shape (H, W, C).
/// * `image2` - The second input image with shape (H, W, C).
///
/// # Returns
///
/// The L1 loss between the two images, zero for empty images.
///
/// # Errors
///
/// Returns [`ImageError::InvalidImageSize`] if the two images have different sizes.
///
/// # Example
///
/// ```
/// use kornia_image::{Image, ImageSize, allocator::CpuAllocator};
/// use kornia_imgproc::metrics::l1_loss;
///
/// let size = ImageSize { width: 2, height: 3 };
/// let image1 = Image::<f32, 1, _>::new(size, vec![0f32, 1f32, 2f32, 3f32, 4f32, 5f32], CpuAllocator).unwrap();
/// let image2 = Image::<f32, 1, _>::new(size, vec![5f32, 4f32, 3f32, 2f32, 1f32, 0f32], CpuAllocator).unwrap();
///
/// let l1_loss = l1_loss(&image1, &image2).unwrap();
/// assert_eq!(l1_loss, 3.0);
/// ```
pub fn l1_loss<const C: usize, A1: ImageAllocator, A2: ImageAllocator>(
    image1: &Image<f32, C, A1>,
    image2: &Image<f32, C, A2>,
) -> Result<f32, ImageError> {
    if image1.size() != image2.size() {
        return Err(ImageError::InvalidImageSize(
            image1.height(),
            image1.width(),
            image2.height(),
            image2.width(),
        ));
    }

    if image1.numel() == 0 {
        return Ok(0.0);
    }

    let l1 = image1
        .as_slice()
        .iter()
        .zip(image2.as_slice().iter())
        .fold(0f32, |acc, (&a, &b)| acc + (a - b).abs());

    Ok(l1 / (image1.numel() as f32))
}
