use alpr::{
    BoundingBox, Detection, annotate, decode, decode_payload,
    processing::DetectorPreProcessor,
};
use bus::ImageMessage;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

/// Create test pixel data with a gradient pattern (more realistic than solid color)
fn gradient_pixels(width: u32, height: u32) -> Vec<u8> {
    let size = (width * height * 3) as usize;
    let mut data = Vec::with_capacity(size);
    for y in 0..height {
        for x in 0..width {
            data.push(((x * 255) / width) as u8);
            data.push(((y * 255) / height) as u8);
            data.push((((x + y) * 127) / (width + height)) as u8);
        }
    }
    data
}

fn yuyv_pixels(width: u32, height: u32) -> Vec<u8> {
    (0..width * height * 2).map(|i| (i % 251) as u8).collect()
}

const SIZES: [(u32, u32, &str); 3] = [
    (640, 480, "VGA"),
    (1280, 720, "HD"),
    (1920, 1080, "Full HD"),
];

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for (width, height, label) in SIZES {
        group.throughput(Throughput::Elements((width * height) as u64));

        let bgr = ImageMessage::packed(width, height, "bgr8", gradient_pixels(width, height));
        group.bench_with_input(BenchmarkId::new("bgr8", label), &bgr, |b, msg| {
            b.iter(|| decode(0, black_box(msg)));
        });

        let yuyv = ImageMessage::packed(width, height, "yuv422_yuy2", yuyv_pixels(width, height));
        group.bench_with_input(BenchmarkId::new("yuyv", label), &yuyv, |b, msg| {
            b.iter(|| decode(0, black_box(msg)));
        });

        let payload = bgr.to_vec().expect("serialize message");
        group.bench_with_input(BenchmarkId::new("bgr8_wire", label), &payload, |b, payload| {
            b.iter(|| decode_payload(0, black_box(payload)));
        });
    }

    group.finish();
}

fn benchmark_annotate_and_letterbox(c: &mut Criterion) {
    let mut group = c.benchmark_group("annotate");

    for (width, height, label) in SIZES {
        let msg = ImageMessage::packed(width, height, "rgb8", gradient_pixels(width, height));
        let frame = decode(0, &msg).expect("decode frame");
        let detections = vec![
            Detection::new("ABC123", Some(0.91), BoundingBox::new(100.0, 200.0, 260.0, 250.0)),
            Detection::new("XYZ789", Some(0.72), BoundingBox::new(300.0, 220.0, 420.0, 260.0)),
        ];

        group.throughput(Throughput::Elements((width * height) as u64));

        group.bench_with_input(BenchmarkId::new("two_plates", label), &frame, |b, frame| {
            b.iter(|| annotate(black_box(frame), black_box(&detections)));
        });

        let mut pre = DetectorPreProcessor::new(384);
        group.bench_with_input(BenchmarkId::new("letterbox_384", label), &frame, |b, frame| {
            b.iter(|| pre.preprocess(black_box(&frame.image)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_decode, benchmark_annotate_and_letterbox);
criterion_main!(benches);
