//! Performance benchmarks for the analysis pipeline

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cadenza_dsp::features::beat::{track_beats, DEFAULT_TEMPO_PENALTY};
use cadenza_dsp::features::key::detect_key;
use cadenza_dsp::features::onset::compute_onset_strength;
use cadenza_dsp::features::tempo::estimate_tempo;
use cadenza_dsp::{analyze, AnalysisConfig, AudioBuffer};

/// 30 seconds of a 120 BPM click train at 44.1 kHz
fn click_train_audio() -> AudioBuffer {
    let mut samples = vec![0.0f32; 44100 * 30];
    let mut pos = 0;
    while pos < samples.len() {
        samples[pos] = 1.0;
        pos += 22050;
    }
    AudioBuffer::new(samples, 44100, 1)
}

/// Synthetic onset envelope with impulses every 43 frames
fn impulse_envelope(len: usize) -> Vec<f32> {
    let mut envelope = vec![-0.2f32; len];
    let mut i = 0;
    while i < len {
        envelope[i] = 3.0;
        i += 43;
    }
    envelope
}

fn onset_benchmarks(c: &mut Criterion) {
    let audio = click_train_audio();

    c.bench_function("onset_strength_30s", |b| {
        b.iter(|| {
            let _ = compute_onset_strength(black_box(&audio), 2048, 512, 40);
        });
    });
}

fn tempo_benchmarks(c: &mut Criterion) {
    let envelope = impulse_envelope(2583);

    c.bench_function("estimate_tempo_30s_envelope", |b| {
        b.iter(|| {
            let _ = estimate_tempo(black_box(&envelope), 44100, 512, 50.0, 220.0);
        });
    });
}

fn beat_tracking_benchmarks(c: &mut Criterion) {
    let envelope = impulse_envelope(2583);

    c.bench_function("track_beats_30s_envelope", |b| {
        b.iter(|| {
            let _ = track_beats(black_box(&envelope), 43, 512, DEFAULT_TEMPO_PENALTY);
        });
    });
}

fn key_benchmarks(c: &mut Criterion) {
    // A sustained triad exercises the chromagram more realistically than a
    // click train.
    let mut samples = vec![0.0f32; 44100 * 30];
    for (i, sample) in samples.iter_mut().enumerate() {
        let t = i as f64 / 44100.0;
        *sample = (0.3 * (2.0 * std::f64::consts::PI * 220.0 * t).sin()
            + 0.3 * (2.0 * std::f64::consts::PI * 261.63 * t).sin()
            + 0.3 * (2.0 * std::f64::consts::PI * 329.63 * t).sin()) as f32;
    }
    let audio = AudioBuffer::new(samples, 44100, 1);

    c.bench_function("detect_key_30s", |b| {
        b.iter(|| {
            let _ = detect_key(black_box(&audio));
        });
    });
}

fn full_analysis_benchmark(c: &mut Criterion) {
    let audio = click_train_audio();
    let config = AnalysisConfig::default();

    c.bench_function("analyze_30s", |b| {
        b.iter(|| {
            let _ = analyze(black_box(&audio), black_box(&config));
        });
    });
}

criterion_group!(
    benches,
    onset_benchmarks,
    tempo_benchmarks,
    beat_tracking_benchmarks,
    key_benchmarks,
    full_analysis_benchmark
);
criterion_main!(benches);
