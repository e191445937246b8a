#[path = "../src/test_utils.rs"]
mod test_utils;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stereoslide::{
    denoise, ConvertConfig, MountDetector, NoiseMethod, NoiseStrength, RawScan, SlideConverter,
};
use test_utils::{noise_rgb, SlideScene};

fn bench_mount_detection(c: &mut Criterion) {
    let detector = MountDetector::default();
    let small = RawScan::new(SlideScene::small().with_rotation(2.0).render());
    let full = RawScan::new(SlideScene::full_size().render());

    c.bench_function("mount_detect_1200x600", |b| {
        b.iter(|| {
            let det = detector.detect(black_box(&small));
            black_box(det.candidates.len())
        })
    });

    c.bench_function("mount_detect_3000x1500", |b| {
        b.iter(|| {
            let det = detector.detect(black_box(&full));
            black_box(det.candidates.len())
        })
    });
}

fn bench_convert(c: &mut Criterion) {
    let scan = RawScan::new(SlideScene::full_size().render());
    let mut config = ConvertConfig::default();
    config.align.canonical_size = [1024, 1024];
    let converter = SlideConverter::with_config(config);

    c.bench_function("convert_3000x1500_to_2048x1024", |b| {
        b.iter(|| {
            let conv = converter.convert(black_box(&scan));
            black_box(conv.is_ok())
        })
    });
}

fn bench_denoise(c: &mut Criterion) {
    let img = noise_rgb(256, 256, 3);
    for (name, method) in [
        ("denoise_bilateral_256", NoiseMethod::Bilateral),
        ("denoise_nlm_256", NoiseMethod::Nlm),
        ("denoise_gaussian_256", NoiseMethod::Gaussian),
    ] {
        c.bench_function(name, |b| {
            b.iter(|| black_box(denoise(black_box(&img), method, NoiseStrength::Medium)))
        });
    }
}

criterion_group!(hotpaths, bench_mount_detection, bench_convert, bench_denoise);
criterion_main!(hotpaths);
