//! Benchmarks for channel gain computation in every sound mode.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use polyvoice::{
    dsp::pan::{spatialize, PanInput, PanTables, SoundMode, StereoFlags, VoiceRole},
    MixSettings,
};

pub fn bench_pan(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/pan");
    let tables = PanTables::new();

    // A spread of pans and roles, like a busy voice array
    let inputs: Vec<PanInput> = (0..64u8)
        .map(|i| PanInput {
            pan: i * 2,
            velocity: 0.8,
            stereo: StereoFlags::from_bits(i),
            role: match i % 3 {
                0 => VoiceRole::Music,
                1 => VoiceRole::SoundEffect,
                _ => VoiceRole::VoiceChat,
            },
            headset_effects: i % 2 == 0,
        })
        .collect();

    for mode in SoundMode::ALL {
        let mix = MixSettings {
            sound_mode: mode,
            ..MixSettings::default()
        };
        group.bench_with_input(BenchmarkId::new("spatialize", mode.label()), &mode, |b, _| {
            b.iter(|| {
                for input in &inputs {
                    black_box(spatialize(&tables, black_box(input), &mix));
                }
            })
        });
    }

    group.finish();
}
