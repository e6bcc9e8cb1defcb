use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;

use kornia_image::{allocator::CpuAllocator, Image};
use kornia_imgproc::warp::HomographyWarper;

fn random_image(width: usize, height: usize) -> Image<f32, 3, CpuAllocator> {
    let mut rng = rand::rng();
    let data = (0..width * height * 3).map(|_| rng.random::<f32>()).collect();
    Image::new([width, height].into(), data, CpuAllocator).unwrap()
}

fn bench_homography_warper(c: &mut Criterion) {
    let mut group = c.benchmark_group("HomographyWarper");

    for (width, height) in [(120, 120), (256, 224), (512, 448)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{}x{}", width, height);

        let src = random_image(*width, *height);
        let dst = random_image(*width, *height);
        let warper = HomographyWarper::new(*height, *width).unwrap();
        let h = [1.0, 0.05, 0.01, -0.05, 1.0, 0.02, 0.01, 0.0, 1.0];

        group.bench_with_input(
            BenchmarkId::new("warp", &parameter_string),
            &(&src, &dst),
            |b, i| {
                let (src, mut out) = (i.0, i.1.clone());
                b.iter(|| warper.warp(black_box(src), black_box(&h), black_box(&mut out)))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("l1_loss_and_grad", &parameter_string),
            &(&src, &dst),
            |b, i| {
                let (src, dst) = (i.0, i.1);
                b.iter(|| warper.l1_loss_and_grad(black_box(src), black_box(dst), black_box(&h)))
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_homography_warper);
criterion_main!(benches);
