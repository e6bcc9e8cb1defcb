//! Image similarity metrics.
//!
//! - **L1 Loss**: Mean absolute difference (Manhattan distance), the photometric
//!   error minimized when fitting a homography.

mod l1;

pub use l1::l1_loss;
