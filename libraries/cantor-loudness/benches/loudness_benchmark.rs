//! Performance benchmarks for loudness measurement
//!
//! Run with: cargo bench -p cantor-loudness --bench loudness_benchmark

use cantor_loudness::{calculate_sample_peak, sample_peak_scalar, KWeightingFilter, Session};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::f32::consts::PI;

/// Generate a test signal (1kHz sine wave)
fn generate_test_signal(sample_rate: u32, duration_secs: f32, channels: usize) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * duration_secs) as usize;
    let mut samples = Vec::with_capacity(num_samples * channels);

    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let value = 0.5 * (2.0 * PI * 1000.0 * t).sin();
        for _ in 0..channels {
            samples.push(value);
        }
    }

    samples
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("k_weighting");
    let frames = 48000;

    for channels in [1_usize, 2, 6] {
        let input = generate_test_signal(48000, 1.0, channels);
        let mut outputs = vec![vec![0.0; frames]; channels];
        group.throughput(Throughput::Elements(frames as u64));

        group.bench_with_input(BenchmarkId::new("48k", channels), &input, |b, input| {
            let mut filter = KWeightingFilter::new(48000, channels);
            b.iter(|| {
                filter.process(black_box(input), frames, &mut outputs, 0);
                black_box(&outputs);
            });
        });
    }

    group.finish();
}

fn bench_peak(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_peak");
    let input = generate_test_signal(48000, 1.0, 2);
    group.throughput(Throughput::Elements(input.len() as u64));

    group.bench_function("vector", |b| b.iter(|| calculate_sample_peak(black_box(&input))));
    group.bench_function("scalar", |b| b.iter(|| sample_peak_scalar(black_box(&input))));

    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");
    let input = generate_test_signal(44100, 10.0, 2);
    group.throughput(Throughput::Elements((input.len() / 2) as u64));

    for chunk_frames in [1024_usize, 44100] {
        group.bench_with_input(
            BenchmarkId::new("10s stereo", chunk_frames),
            &input,
            |b, input| {
                b.iter(|| {
                    let mut session = Session::new(44100, 2, None);
                    for chunk in input.chunks(chunk_frames * 2) {
                        session.add_frames(chunk).unwrap();
                    }
                    black_box(session.integrated_loudness().unwrap())
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_filter, bench_peak, bench_session);
criterion_main!(benches);
