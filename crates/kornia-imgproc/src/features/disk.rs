use std::cmp::Ordering;

use num_traits::Float;
use rayon::prelude::*;

use kornia_tensor::{Capability, ExecutionContext, Tensor, Tensor3, Tensor4, TensorAllocator};

use super::FeatureError;
use crate::pooling::max_pool2d_with_indices_kernel;

/// Keypoints detected in a single image.
///
/// Coordinates are `[x, y]` pixel positions paired 1:1 with the detection score of
/// the heatmap at that position. Entries keep the row-major order in which the
/// suppression pass found them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keypoints {
    /// The `[x, y]` pixel coordinates.
    pub xys: Vec<[usize; 2]>,
    /// The detection log-probability of every keypoint.
    pub detection_logp: Vec<f32>,
}

impl Keypoints {
    /// Create a keypoint set from coordinates and scores of the same length.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::KeypointsLengthMismatch`] if the lengths differ.
    pub fn new(xys: Vec<[usize; 2]>, detection_logp: Vec<f32>) -> Result<Self, FeatureError> {
        if xys.len() != detection_logp.len() {
            return Err(FeatureError::KeypointsLengthMismatch(
                xys.len(),
                detection_logp.len(),
            ));
        }
        Ok(Self {
            xys,
            detection_logp,
        })
    }

    /// Number of keypoints.
    pub fn len(&self) -> usize {
        self.xys.len()
    }

    /// Returns true if there are no keypoints.
    pub fn is_empty(&self) -> bool {
        self.xys.is_empty()
    }

    /// Iterate over `([x, y], score)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = ([usize; 2], f32)> + '_ {
        self.xys
            .iter()
            .copied()
            .zip(self.detection_logp.iter().copied())
    }

    /// Keep the `n` highest scoring keypoints.
    ///
    /// The `n`-th largest score is found by selection, without sorting. Keypoints
    /// scoring above it are kept, then keypoints tied with it fill the remaining
    /// slots, both in their current order. The result has exactly `n` entries, or
    /// all of them when there are fewer.
    pub fn top_n(self, n: usize) -> Self {
        if self.len() <= n {
            return self;
        }
        if n == 0 {
            return Self::default();
        }

        let mut scores = self.detection_logp.clone();
        let threshold = *scores
            .select_nth_unstable_by(n - 1, |a, b| b.total_cmp(a))
            .1;

        let mut keep = self
            .detection_logp
            .iter()
            .map(|s| s.total_cmp(&threshold) == Ordering::Greater)
            .collect::<Vec<_>>();

        let mut kept = keep.iter().filter(|&&k| k).count();
        for (k, s) in keep.iter_mut().zip(self.detection_logp.iter()) {
            if kept == n {
                break;
            }
            if s.total_cmp(&threshold) == Ordering::Equal {
                *k = true;
                kept += 1;
            }
        }

        let (xys, detection_logp) = self
            .iter()
            .zip(keep)
            .filter_map(|(kp, k)| k.then_some(kp))
            .unzip();

        Self {
            xys,
            detection_logp,
        }
    }
}

/// Parameters of [`heatmap_to_keypoints_with_config`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskConfig {
    /// Maximum number of keypoints per image, `None` keeps every local maximum.
    pub n: Option<usize>,
    /// Side of the suppression window, must be odd.
    pub window_size: usize,
    /// Keypoints must score strictly above this value, `None` disables the check.
    pub score_threshold: Option<f32>,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            n: None,
            window_size: 5,
            score_threshold: Some(0.0),
        }
    }
}

fn nms_kernel<T: Float + Send + Sync>(
    data: &[T],
    shape: [usize; 3],
    window_size: usize,
    cutoff: Option<T>,
) -> Vec<bool> {
    let [_, rows, cols] = shape;
    let plane_len = rows * cols;
    // from any cell this window already spans the whole plane, larger ones add only padding
    let window_size = window_size.min(rows.max(cols).saturating_mul(2).saturating_add(1));
    let (_, indices, _) =
        max_pool2d_with_indices_kernel(data, shape, window_size, 1, window_size / 2);

    data.par_iter()
        .zip(indices.par_iter())
        .enumerate()
        .map(|(i, (&score, &idx))| {
            idx == i % plane_len && cutoff.map_or(true, |cutoff| score > cutoff)
        })
        .collect()
}

/// Suppression over any contiguous tensor laid out as `planes` of (H, W).
fn nms_planes<T, const N: usize, A>(
    signal: &Tensor<T, N, A>,
    planes: [usize; 3],
    window_size: usize,
    cutoff: Option<T>,
) -> Result<Tensor3<bool, A>, FeatureError>
where
    T: Float + Send + Sync,
    A: TensorAllocator,
{
    if window_size % 2 != 1 {
        return Err(FeatureError::EvenWindowSize(window_size));
    }

    if signal.numel() == 0 {
        return Ok(Tensor3::from_shape_vec(
            planes,
            vec![],
            signal.allocator().clone(),
        )?);
    }

    let ctx = ExecutionContext::resolve(&signal.device(), Capability::MaxPoolWithIndices);
    let mask = ctx.run(signal, |data, _| {
        Ok((nms_kernel(data, planes, window_size, cutoff), planes))
    })?;

    Ok(mask)
}

/// Windowed non-maximum suppression over a batch of score maps.
///
/// A cell survives if it holds the maximum of the `window_size` x `window_size`
/// window centered on it. On a plateau the first cell of the window in row-major
/// order wins, and NaN counts as the maximum. With a `cutoff` the score must also
/// be strictly greater than it.
///
/// Devices that cannot pool with indices run the suppression on the CPU and the
/// mask is moved back into the allocator of `signal`.
///
/// # Arguments
///
/// * `signal` - The score maps with shape (B, H, W).
/// * `window_size` - The side of the suppression window. Must be odd.
/// * `cutoff` - Optional minimum score, exclusive.
///
/// # Returns
///
/// A boolean mask with the shape of `signal`.
///
/// # Errors
///
/// Returns [`FeatureError::EvenWindowSize`] if `window_size` is even.
///
/// # Example
///
/// ```
/// use kornia_tensor::{CpuAllocator, Tensor3};
/// use kornia_imgproc::features::nms;
///
/// let signal = Tensor3::from_shape_vec([1, 1, 4], vec![0.0f32, 2.0, 1.0, 3.0], CpuAllocator).unwrap();
/// let mask = nms(&signal, 3, None).unwrap();
///
/// assert_eq!(mask.as_slice(), &[false, true, false, true]);
/// ```
pub fn nms<T, A>(
    signal: &Tensor3<T, A>,
    window_size: usize,
    cutoff: Option<T>,
) -> Result<Tensor3<bool, A>, FeatureError>
where
    T: Float + Send + Sync,
    A: TensorAllocator,
{
    nms_planes(signal, signal.shape, window_size, cutoff)
}

/// Convert detection heatmaps into keypoints.
///
/// Runs [`nms`] on every heatmap and collects the surviving cells in row-major
/// order. With `n` only the `n` best keypoints of each image are kept, see
/// [`Keypoints::top_n`].
///
/// # Arguments
///
/// * `heatmap` - The detection scores with shape (B, 1, H, W).
/// * `n` - Optional maximum number of keypoints per image.
/// * `window_size` - The side of the suppression window. Must be odd.
/// * `score_threshold` - Optional minimum score, exclusive.
///
/// # Returns
///
/// One [`Keypoints`] per image of the batch.
///
/// # Errors
///
/// Fails if `window_size` is even or the heatmap has more than one channel.
pub fn heatmap_to_keypoints<A: TensorAllocator>(
    heatmap: &Tensor4<f32, A>,
    n: Option<usize>,
    window_size: usize,
    score_threshold: Option<f32>,
) -> Result<Vec<Keypoints>, FeatureError> {
    let [batch, channels, rows, cols] = heatmap.shape;
    if channels != 1 {
        return Err(FeatureError::InvalidHeatmapShape(heatmap.shape));
    }

    let mask = nms_planes(heatmap, [batch, rows, cols], window_size, score_threshold)?;

    let plane_len = rows * cols;
    let scores = heatmap.as_slice();
    let mask = mask.as_slice();

    let keypoints = (0..batch)
        .into_par_iter()
        .map(|b| {
            let plane = b * plane_len..(b + 1) * plane_len;
            let (xys, detection_logp): (Vec<_>, Vec<_>) = mask[plane.clone()]
                .iter()
                .zip(&scores[plane])
                .enumerate()
                .filter(|(_, (keep, _))| **keep)
                .map(|(i, (_, &score))| ([i % cols, i / cols], score))
                .unzip();

            let keypoints = Keypoints {
                xys,
                detection_logp,
            };
            log::debug!("image {}: {} local maxima", b, keypoints.len());

            match n {
                Some(n) => keypoints.top_n(n),
                None => keypoints,
            }
        })
        .collect();

    Ok(keypoints)
}

/// Convert detection heatmaps into keypoints with the parameters of a [`DiskConfig`].
pub fn heatmap_to_keypoints_with_config<A: TensorAllocator>(
    heatmap: &Tensor4<f32, A>,
    config: &DiskConfig,
) -> Result<Vec<Keypoints>, FeatureError> {
    heatmap_to_keypoints(
        heatmap,
        config.n,
        config.window_size,
        config.score_threshold,
    )
}
