use kornia_tensor::TensorError;

/// Errors raised while extracting keypoints from score heatmaps.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FeatureError {
    /// The suppression window needs a center cell.
    #[error("window_size has to be odd, got {0}")]
    EvenWindowSize(usize),

    /// The heatmap is not laid out as (B, 1, H, W).
    #[error("Invalid heatmap shape {0:?}, expected (B, 1, H, W)")]
    InvalidHeatmapShape([usize; 4]),

    /// Coordinates and scores of a keypoint set differ in length.
    #[error("Keypoints have {0} coordinates but {1} scores")]
    KeypointsLengthMismatch(usize, usize),

    /// Error from the underlying tensor.
    #[error(transparent)]
    TensorError(#[from] TensorError),
}
