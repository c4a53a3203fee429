//! Benchmarks for one engine tick over a fully bound voice array.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use polyvoice::{
    dsp::{pan::SoundMode, wave::SYNTHETIC_WAVE_BASE},
    io::MemoryBank,
    sequencing::SequenceCapacity,
    AudioEngine, EngineConfig, NoteOn, Settings,
};

use crate::VOICE_COUNTS;

/// An engine with every voice playing a synthetic note.
pub fn busy_engine(voices: usize) -> AudioEngine<MemoryBank> {
    let mut engine = AudioEngine::new(
        EngineConfig {
            voices,
            sequences: SequenceCapacity {
                players: 1,
                channels: 4,
                layers: voices * 2,
            },
            ..EngineConfig::default()
        },
        MemoryBank::new(),
    );

    let seq = engine.sequences_mut();
    let player = seq.add_player().expect("player slot");
    let channels: Vec<_> = (0..4u8)
        .map(|i| {
            let id = seq.add_channel(player).expect("channel slot");
            let channel = seq.channel_mut(id).expect("live channel");
            channel.instrument = SYNTHETIC_WAVE_BASE + i;
            channel.note_priority = 3 + i;
            id
        })
        .collect();

    for i in 0..voices {
        let channel = channels[i % channels.len()];
        let layer = engine.sequences_mut().add_layer(channel).expect("layer slot");
        engine.note_on(
            layer,
            NoteOn {
                semitone: 30 + (i % 24) as u8,
                velocity: 0.8,
                pan: (i * 13 % 128) as u8,
            },
        );
    }
    engine
}

pub fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/tick");

    for &voices in VOICE_COUNTS {
        for mode in [SoundMode::Stereo, SoundMode::Surround] {
            let settings = Settings {
                sound_mode: mode,
                ..Settings::default()
            };
            let mut engine = busy_engine(voices);
            // Past the attack so the steady state is measured
            for _ in 0..8 {
                engine.tick(&settings);
            }

            group.bench_with_input(BenchmarkId::new(mode.label(), voices), &voices, |b, _| {
                b.iter(|| {
                    engine.tick(black_box(&settings));
                    black_box(engine.outputs().count())
                })
            });
        }
    }

    group.finish();
}
