//! Geometric image transformations with homographies.
//!
//! [`HomographyWarper`] warps with a matrix acting on normalized coordinates and
//! differentiates the photometric L1 error of the warp with respect to it.
//!
//! # Examples
//!
//! Evaluating how well a homography aligns two images:
//!
//! ```
//! use kornia_image::{Image, allocator::CpuAllocator};
//! use kornia_imgproc::warp::HomographyWarper;
//!
//! let src = Image::<f32, 3, _>::from_size_val([8, 8].into(), 0.5, CpuAllocator).unwrap();
//! let dst = Image::<f32, 3, _>::from_size_val([8, 8].into(), 0.5, CpuAllocator).unwrap();
//!
//! let warper = HomographyWarper::new(8, 8).unwrap();
//! let identity = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
//! let (loss, grad) = warper.l1_loss_and_grad(&src, &dst, &identity).unwrap();
//!
//! assert_eq!(loss, 0.0);
//! assert!(grad.iter().all(|g| g.is_finite()));
//! ```

mod homography;

pub use homography::HomographyWarper;
