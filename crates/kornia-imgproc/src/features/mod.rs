//! Feature detection post-processing.
//!
//! Dense detectors such as DISK predict a per-pixel score heatmap. This module turns
//! those heatmaps into sparse keypoints:
//!
//! - [`nms`] keeps the cells that are the maximum of their centered window.
//! - [`heatmap_to_keypoints`] collects the surviving cells of every image in the
//!   batch and optionally keeps the `n` best of them.
//!
//! # Examples
//!
//! ```
//! use kornia_tensor::{CpuAllocator, Tensor4};
//! use kornia_imgproc::features::heatmap_to_keypoints;
//!
//! let mut scores = vec![0.0f32; 25];
//! scores[2 * 5 + 2] = 1.0;
//! let heatmap = Tensor4::from_shape_vec([1, 1, 5, 5], scores, CpuAllocator).unwrap();
//!
//! let keypoints = heatmap_to_keypoints(&heatmap, Some(1), 3, Some(0.0)).unwrap();
//! assert_eq!(keypoints[0].xys, vec![[2, 2]]);
//! ```

mod disk;
pub use disk::*;

mod error;
pub use error::FeatureError;
