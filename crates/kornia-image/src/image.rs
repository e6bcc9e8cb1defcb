use std::ops;

use kornia_tensor::{CpuAllocator, Tensor3};

use crate::{allocator::ImageAllocator, error::ImageError};

/// Image size in pixels
///
/// # Examples
///
/// ```
/// use kornia_image::ImageSize;
///
/// let image_size = ImageSize {
///   width: 10,
///   height: 20,
/// };
///
/// assert_eq!(image_size.width, 10);
/// assert_eq!(image_size.height, 20);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

impl From<ImageSize> for [u32; 2] {
    fn from(size: ImageSize) -> Self {
        [size.width as u32, size.height as u32]
    }
}

/// Represents an image with pixel data.
///
/// The image is a 3D tensor with shape (H, W, C).
pub struct Image<T, const CHANNELS: usize, A: ImageAllocator = CpuAllocator>(pub Tensor3<T, A>);

impl<T: Clone, const CHANNELS: usize, A: ImageAllocator> Clone for Image<T, CHANNELS, A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: std::fmt::Debug, const CHANNELS: usize, A: ImageAllocator> std::fmt::Debug
    for Image<T, CHANNELS, A>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Image").field(&self.0).finish()
    }
}

/// helper to deference the inner tensor
impl<T, const CHANNELS: usize, A: ImageAllocator> ops::Deref for Image<T, CHANNELS, A> {
    type Target = Tensor3<T, A>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// helper to deference the inner tensor
impl<T, const CHANNELS: usize, A: ImageAllocator> ops::DerefMut for Image<T, CHANNELS, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T, const CHANNELS: usize, A: ImageAllocator> Image<T, CHANNELS, A> {
    /// Create a new image from pixel data.
    ///
    /// # Errors
    ///
    /// If the length of the pixel data does not match the image size, an error is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use kornia_image::{Image, ImageSize, allocator::CpuAllocator};
    ///
    /// let image = Image::<u8, 3, _>::new(
    ///     ImageSize {
    ///         width: 10,
    ///         height: 20,
    ///     },
    ///     vec![0u8; 10 * 20 * 3],
    ///     CpuAllocator,
    /// ).unwrap();
    ///
    /// assert_eq!(image.size().width, 10);
    /// assert_eq!(image.size().height, 20);
    /// assert_eq!(image.num_channels(), 3);
    /// ```
    pub fn new(size: ImageSize, data: Vec<T>, alloc: A) -> Result<Self, ImageError> {
        if data.len() != size.width * size.height * CHANNELS {
            return Err(ImageError::InvalidChannelShape(
                data.len(),
                size.width * size.height * CHANNELS,
            ));
        }

        Ok(Self(Tensor3::from_shape_vec(
            [size.height, size.width, CHANNELS],
            data,
            alloc,
        )?))
    }

    /// Create a new image with the given size and default pixel data.
    ///
    /// # Examples
    ///
    /// ```
    /// use kornia_image::{Image, ImageSize, allocator::CpuAllocator};
    ///
    /// let image = Image::<u8, 3, _>::from_size_val([10, 20].into(), 0u8, CpuAllocator).unwrap();
    ///
    /// assert_eq!(image.size().width, 10);
    /// assert_eq!(image.size().height, 20);
    /// ```
    pub fn from_size_val(size: ImageSize, val: T, alloc: A) -> Result<Self, ImageError>
    where
        T: Clone,
    {
        Ok(Self(Tensor3::from_shape_val(
            [size.height, size.width, CHANNELS],
            val,
            alloc,
        )?))
    }

    /// Create a new image copying the pixel data from a slice.
    pub fn from_size_slice(size: ImageSize, data: &[T], alloc: A) -> Result<Self, ImageError>
    where
        T: Clone,
    {
        Self::new(size, data.to_vec(), alloc)
    }

    /// Get the size of the image in pixels.
    pub fn size(&self) -> ImageSize {
        ImageSize {
            width: self.shape[1],
            height: self.shape[0],
        }
    }

    /// Get the number of columns of the image.
    pub fn cols(&self) -> usize {
        self.width()
    }

    /// Get the number of rows of the image.
    pub fn rows(&self) -> usize {
        self.height()
    }

    /// Get the width of the image in pixels.
    pub fn width(&self) -> usize {
        self.shape[1]
    }

    /// Get the height of the image in pixels.
    pub fn height(&self) -> usize {
        self.shape[0]
    }

    /// Get the number of channels in the image.
    pub fn num_channels(&self) -> usize {
        CHANNELS
    }

    /// Get the pixel value at the given coordinates.
    ///
    /// # Errors
    ///
    /// Fails if the coordinates or the channel are out of bounds.
    pub fn get_pixel(&self, x: usize, y: usize, ch: usize) -> Result<&T, ImageError> {
        if x >= self.width() || y >= self.height() {
            return Err(ImageError::PixelIndexOutOfBounds(
                x,
                y,
                self.width(),
                self.height(),
            ));
        }

        if ch >= CHANNELS {
            return Err(ImageError::ChannelIndexOutOfBounds(ch, CHANNELS));
        }

        self.get([y, x, ch]).ok_or(ImageError::PixelIndexOutOfBounds(
            x,
            y,
            self.width(),
            self.height(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::allocator::CpuAllocator;
    use crate::image::{Image, ImageError, ImageSize};

    #[test]
    fn image_size() {
        let image_size = ImageSize {
            width: 10,
            height: 20,
        };
        assert_eq!(image_size.width, 10);
        assert_eq!(image_size.height, 20);
        assert_eq!(
            format!("{}", image_size),
            "ImageSize { width: 10, height: 20 }"
        );
    }

    #[test]
    fn image_smoke() -> Result<(), ImageError> {
        let image = Image::<u8, 3, _>::new(
            ImageSize {
                width: 10,
                height: 20,
            },
            vec![0u8; 10 * 20 * 3],
            CpuAllocator,
        )?;
        assert_eq!(image.size().width, 10);
        assert_eq!(image.size().height, 20);
        assert_eq!(image.num_channels(), 3);
        Ok(())
    }

    #[test]
    fn image_invalid_data() {
        let res = Image::<f32, 2, _>::new([2, 2].into(), vec![0.0; 7], CpuAllocator);
        assert_eq!(res.err(), Some(ImageError::InvalidChannelShape(7, 8)));
    }

    #[test]
    fn image_get_pixel() -> Result<(), ImageError> {
        let image = Image::<u8, 2, _>::new(
            ImageSize {
                width: 2,
                height: 1,
            },
            vec![1, 2, 3, 4],
            CpuAllocator,
        )?;
        assert_eq!(image.get_pixel(0, 0, 0)?, &1);
        assert_eq!(image.get_pixel(1, 0, 1)?, &4);
        assert_eq!(
            image.get_pixel(2, 0, 0),
            Err(ImageError::PixelIndexOutOfBounds(2, 0, 2, 1))
        );
        assert_eq!(
            image.get_pixel(0, 0, 2),
            Err(ImageError::ChannelIndexOutOfBounds(2, 2))
        );
        Ok(())
    }
}
