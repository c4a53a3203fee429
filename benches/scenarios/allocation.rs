//! Benchmarks for note-on when every voice is already taken.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use polyvoice::{dsp::wave::SYNTHETIC_WAVE_BASE, NoteOn, Settings};

use super::tick::busy_engine;
use crate::VOICE_COUNTS;

pub fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/allocation");
    let settings = Settings::default();
    let note = NoteOn {
        semitone: 45,
        velocity: 1.0,
        pan: 64,
    };

    for &voices in VOICE_COUNTS {
        let mut engine = busy_engine(voices);
        engine.tick(&settings);

        // A high priority channel that always wins a steal
        let seq = engine.sequences_mut();
        let player = seq.live_layers().next().and_then(|l| {
            let channel = seq.layer(l)?.channel?;
            seq.channel(channel)?.player
        });
        let player = player.expect("busy engine has a player");
        let channel = seq.add_channel(player).expect("channel slot");
        let entry = seq.channel_mut(channel).expect("live channel");
        entry.instrument = SYNTHETIC_WAVE_BASE;
        entry.note_priority = 100;
        let layer = seq.add_layer(channel).expect("layer slot");

        group.bench_with_input(BenchmarkId::new("steal", voices), &voices, |b, _| {
            b.iter(|| {
                black_box(engine.note_on(black_box(layer), note));
                engine.tick(&settings);
            })
        });

        // A fresh layer on the lowest priority channel finds nothing to take
        let mut starved = busy_engine(voices);
        starved.tick(&settings);
        let seq = starved.sequences_mut();
        let first = seq.live_layers().next().expect("busy engine has layers");
        let channel = seq.layer(first).and_then(|l| l.channel).expect("attached layer");
        let low = seq.add_layer(channel).expect("layer slot");
        group.bench_with_input(BenchmarkId::new("dropped", voices), &voices, |b, _| {
            b.iter(|| {
                black_box(starved.note_on(black_box(low), note));
            })
        });
    }

    group.finish();
}
