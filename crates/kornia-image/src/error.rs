/// An error type for the image module.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ImageError {
    /// Error when the channel and shape are not valid.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when the image size is not valid.
    #[error("Invalid image size ({0}, {1}) mismatch ({2}, {3})")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when the pixel index is out of bounds.
    #[error("Pixel index ({0}, {1}) out of bounds ({2}, {3})")]
    PixelIndexOutOfBounds(usize, usize, usize, usize),

    /// Error when the channel index is out of bounds.
    #[error("Channel index {0} is out of bounds {1}")]
    ChannelIndexOutOfBounds(usize, usize),

    /// Error when a 3x3 transform cannot be inverted.
    #[error("Cannot compute the determinant of the transform, it is singular")]
    CannotComputeDeterminant,

    /// Error from the underlying tensor.
    #[error(transparent)]
    TensorError(#[from] kornia_tensor::TensorError),
}
