//! Benchmarks for the tick-rate envelope.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use polyvoice::dsp::envelope::{Envelope, EnvelopeShape};

use crate::VOICE_COUNTS;

/// Step `count` envelopes once each, like one tick over the voice array.
fn step_all(envelopes: &mut [Envelope]) -> f32 {
    envelopes.iter_mut().map(|env| env.update()).sum()
}

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");
    let shape = EnvelopeShape::new(8, 32, 0.6).with_note_off(24, 96);

    for &count in VOICE_COUNTS {
        // Attack and decay
        let mut rising: Vec<Envelope> = (0..count)
            .map(|_| {
                let mut env = Envelope::default();
                env.init(shape);
                env
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("attack", count), &count, |b, _| {
            b.iter(|| {
                for env in rising.iter_mut() {
                    if env.is_finished() {
                        env.init(shape);
                    }
                }
                black_box(step_all(black_box(&mut rising)))
            })
        });

        // Holding steady
        let mut held: Vec<Envelope> = (0..count)
            .map(|_| {
                let mut env = Envelope::default();
                env.init(EnvelopeShape::new(0, 0, 0.8));
                env.update();
                env
            })
            .collect();
        group.bench_with_input(BenchmarkId::new("sustain", count), &count, |b, _| {
            b.iter(|| black_box(step_all(black_box(&mut held))))
        });

        // Forced release, re-armed whenever it runs out
        let mut fading: Vec<Envelope> = (0..count).map(|_| Envelope::default()).collect();
        group.bench_with_input(BenchmarkId::new("release", count), &count, |b, _| {
            b.iter(|| {
                for env in fading.iter_mut() {
                    if env.is_finished() {
                        env.init(EnvelopeShape::new(0, 0, 1.0));
                        env.update();
                        env.force_release(0.01);
                    }
                }
                black_box(step_all(black_box(&mut fading)))
            })
        });
    }

    group.finish();
}
