use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};
use inference::processing::{
    post::PostProcessor,
    pre::{LetterboxTransform, PreProcessor},
};
use ndarray::{Array, IxDyn};

const NUM_CLASSES: usize = 3;

/// Mock YOLOv5 output: `num_rows` low-confidence rows with `num_detections`
/// strong, spread-out boxes at the front.
fn create_mock_yolo_output(num_rows: usize, num_detections: usize) -> ndarray::ArrayD<f32> {
    let width = 5 + NUM_CLASSES;
    let mut data = vec![0.01f32; num_rows * width];

    for i in 0..num_detections.min(num_rows) {
        let row = &mut data[i * width..(i + 1) * width];
        let cx = 20.0 + (i % 20) as f32 * 30.0;
        let cy = 20.0 + (i / 20) as f32 * 30.0;
        row[..5].copy_from_slice(&[cx, cy, 24.0, 24.0, 0.9]);
        row[5 + i % NUM_CLASSES] = 0.95;
    }

    Array::from_shape_vec(IxDyn(&[1, num_rows, width]), data).unwrap()
}

fn benchmark_preprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("preprocessing");
    let preprocessor = PreProcessor::new((640, 640));

    // Phone photos and webcam frames
    let resolutions = [(640, 480), (1280, 720), (4032, 3024)];

    for (width, height) in resolutions.iter() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(*width, *height, Rgb([128, 128, 128])));

        group.bench_with_input(
            BenchmarkId::new("letterbox", format!("{}x{}", width, height)),
            &image,
            |b, image| b.iter(|| preprocessor.preprocess(black_box(image)).unwrap()),
        );
    }

    group.finish();
}

fn benchmark_postprocessing(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocessing");
    let post_processor = PostProcessor::new(
        0.40,
        0.45,
        100,
        vec!["Primordia".into(), "Muda".into(), "Matang".into()],
    );
    let transform = LetterboxTransform {
        orig_width: 1280,
        orig_height: 720,
        scale: 0.5,
        offset_x: 0.0,
        offset_y: 140.0,
    };

    let detection_counts = [0, 5, 20, 100];

    for num_detections in detection_counts.iter() {
        // 25200 rows: a 640x640 YOLOv5 export
        let predictions = create_mock_yolo_output(25_200, *num_detections);

        group.bench_with_input(
            BenchmarkId::new("parse_detections", num_detections),
            &predictions,
            |b, predictions| {
                b.iter(|| {
                    post_processor
                        .parse_detections(black_box(&predictions.view()), black_box(&transform))
                        .unwrap()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_preprocessing, benchmark_postprocessing);
criterion_main!(benches);
