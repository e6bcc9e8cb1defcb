//! Pixel interpolation for image warping.
//!
//! Warps sample with [`bilinear_sample_zeros`], which treats pixels outside the
//! image as zero and also returns the spatial derivatives of the sample.

mod bilinear;

/// Grid generation and coordinate mapping utilities.
///
/// Functions for generating coordinate meshgrids used in image warping
/// and transformation operations.
pub mod grid;

pub use bilinear::{bilinear_sample_zeros, BilinearSample};
