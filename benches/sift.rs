use divan::{black_box, Bencher};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sift_match::{Config, Engine, GaussMode, ProcessingMode, SiftMode};

fn main() {
    divan::main();
}

fn texture(width: u32, height: u32) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(42);
    let noise = GrayImage::from_fn(width, height, |_, _| Luma([rng.gen::<u8>()]));
    imageproc::filter::gaussian_blur_f32(&noise, 2.5)
}

#[divan::bench(args = [SiftMode::PopSift, SiftMode::OpenCV])]
fn extract(bencher: Bencher, sift_mode: SiftMode) {
    let img = texture(320, 240);
    let config = Config {
        sift_mode,
        ..Config::default()
    };

    bencher.bench_local(|| black_box(sift_match::extract(&img, &config).unwrap()));
}

#[divan::bench(args = [GaussMode::VLFeat, GaussMode::Relative, GaussMode::Fixed9])]
fn extract_gauss_mode(bencher: Bencher, gauss_mode: GaussMode) {
    let img = texture(320, 240);
    let config = Config {
        gauss_mode,
        ..Config::default()
    };

    bencher.bench_local(|| black_box(sift_match::extract(&img, &config).unwrap()));
}

#[divan::bench(sample_count = 20)]
fn engine_pair(bencher: Bencher) {
    let left = texture(320, 240);
    let right = texture(240, 320);
    let engine = Engine::new(
        Config {
            workers: Some(2),
            ..Config::default()
        },
        ProcessingMode::MatchingMode,
    )
    .unwrap();

    bencher.bench_local(|| {
        let l = engine.enqueue(left.clone()).unwrap();
        let r = engine.enqueue(right.clone()).unwrap();
        let mut l = l.features().unwrap();
        let r = r.features().unwrap();
        black_box(l.match_with(&r, 0.8).unwrap().len())
    });
}
