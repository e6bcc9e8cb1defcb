#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// keypoint extraction from detection heatmaps.
pub mod features;

/// utilities for interpolation.
pub mod interpolation;

/// image similarity metrics module.
pub mod metrics;

/// module containing parallization utilities.
pub mod parallel;

/// max pooling operators.
pub mod pooling;

/// image geometric transformations module.
pub mod warp;
