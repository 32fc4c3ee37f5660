use criterion::{black_box, criterion_group, criterion_main, Criterion};
use frame_codec::{decode_frame, encode_samples, MAX_SAMPLES_PER_FRAME};
use ring_buffer::Sample;

fn full_frame() -> Vec<Sample> {
    (0..MAX_SAMPLES_PER_FRAME)
        .map(|i| Sample::new((i * 13 % 4096) as u16, i as u32 * 5))
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let samples = full_frame();
    c.bench_function("encode_255_samples", |b| {
        b.iter(|| encode_samples(black_box(&samples), false))
    });
}

fn bench_decode(c: &mut Criterion) {
    let frame = encode_samples(&full_frame(), true);
    c.bench_function("decode_255_samples", |b| {
        b.iter(|| decode_frame(black_box(&frame)))
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
