use argh::FromArgs;
use std::path::PathBuf;

use kornia_imgproc::features::{heatmap_to_keypoints_with_config, DiskConfig};
use kornia_tensor::{CpuAllocator, Tensor4};

/// Extract DISK style keypoints from a grayscale image used as a score heatmap.
#[derive(FromArgs)]
struct Args {
    /// path to the image used as the heatmap
    #[argh(option)]
    image_path: PathBuf,

    /// side of the non-maximum suppression window, must be odd
    #[argh(option, default = "5")]
    window_size: usize,

    /// minimum score of a keypoint, intensities are scaled to [0, 1]
    #[argh(option, default = "0.0")]
    score_threshold: f32,

    /// maximum number of keypoints to keep
    #[argh(option)]
    num_keypoints: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    // read the image as a single channel heatmap
    let img = image::open(&args.image_path)?.to_luma8();
    let (width, height) = (img.width() as usize, img.height() as usize);
    let scores = img
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    let heatmap = Tensor4::from_shape_vec([1, 1, height, width], scores, CpuAllocator)?;
    log::debug!("loaded {}x{} heatmap", width, height);

    let config = DiskConfig {
        n: args.num_keypoints,
        window_size: args.window_size,
        score_threshold: Some(args.score_threshold),
    };

    let keypoints = heatmap_to_keypoints_with_config(&heatmap, &config)?;

    for kps in keypoints.iter() {
        println!("Found {} keypoints", kps.len());
        for ([x, y], score) in kps.iter() {
            println!("{x} {y} {score:.4}");
        }
    }

    Ok(())
}
