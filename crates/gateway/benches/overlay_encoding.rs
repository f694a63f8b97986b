use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use gateway::overlay::{encode_jpeg, render_overlay};
use growth::{DetectionProcessor, RawDetection};
use image::{DynamicImage, RgbImage};

/// Gradient test image (more realistic than solid color for JPEG)
fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            ((x * 255) / width) as u8,
            ((y * 255) / height) as u8,
            (((x + y) * 127) / (width + height)) as u8,
        ])
    }))
}

fn raw_detections(width: u32, height: u32, count: usize) -> Vec<RawDetection> {
    let labels = ["primordia", "Fase Muda", "matang"];
    (0..count)
        .map(|i| {
            let x = (i as i32 * 37) % (width as i32 - 80);
            let y = (i as i32 * 53) % (height as i32 - 80);
            RawDetection::new(labels[i % labels.len()], 0.8, (x, y, x + 64, y + 72))
        })
        .collect()
}

fn benchmark_overlay(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlay");
    let processor = DetectionProcessor::default();

    let sizes = [(640, 480, "VGA"), (1280, 720, "HD"), (1920, 1080, "Full HD")];

    for (width, height, label) in sizes {
        let image = gradient_image(width, height);
        let frame = processor.process(&raw_detections(width, height, 20));

        group.throughput(Throughput::Elements((width * height) as u64));

        group.bench_with_input(BenchmarkId::new("render", label), &image, |b, image| {
            b.iter(|| render_overlay(black_box(image), black_box(&frame), processor.catalog()));
        });

        let annotated = render_overlay(&image, &frame, processor.catalog());
        group.bench_with_input(BenchmarkId::new("jpeg", label), &annotated, |b, annotated| {
            b.iter(|| encode_jpeg(black_box(annotated)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_overlay);
criterion_main!(benches);
