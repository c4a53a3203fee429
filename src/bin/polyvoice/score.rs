//! Score - a looping demo arrangement that feeds the engine note events
//!
//! Each part owns a channel and a handful of layers. Notes rotate through a
//! part's layers so chords and overlapping notes compete for voices.

use color_eyre::eyre::{eyre, Result as EyreResult};
use std::time::Duration;

use polyvoice::{
    dsp::{modulate::VibratoParams, wave::SYNTHETIC_WAVE_BASE},
    engine::AllocPolicy,
    io::MemoryBank,
    sequencing::{LayerId, PlayerId},
    synth::EngineCommand,
    AudioEngine,
};

/// Steps in one loop of the score.
pub const LOOP_STEPS: u32 = 32;

#[derive(Clone, Copy, Debug)]
struct Note {
    step: u32,
    semitone: u8,
    length: u32,
    velocity: f32,
    pan: u8,
}

const fn note(step: u32, semitone: u8, length: u32) -> Note {
    Note {
        step,
        semitone,
        length,
        velocity: 0.8,
        pan: 64,
    }
}

/// How a part's channel is configured.
struct PartSetup {
    name: &'static str,
    priority: u8,
    instrument: u8,
    drums: bool,
    policy: u8,
    /// Voices reserved in the channel's own pool.
    reserved: usize,
    layers: usize,
    notes: &'static [Note],
}

const DRUMS: &[Note] = &[
    note(0, 0, 2),
    note(4, 1, 1),
    note(8, 0, 2),
    note(12, 1, 1),
    note(16, 0, 2),
    note(20, 1, 1),
    note(24, 0, 2),
    note(26, 0, 2),
    note(28, 1, 1),
];

const LEAD: &[Note] = &[
    note(0, 51, 3),
    note(4, 54, 2),
    note(6, 56, 2),
    note(8, 58, 6),
    note(16, 56, 3),
    note(20, 54, 2),
    note(22, 51, 2),
    note(24, 49, 6),
];

const BASS: &[Note] = &[
    note(0, 27, 6),
    note(8, 27, 4),
    note(12, 30, 4),
    note(16, 25, 6),
    note(24, 25, 4),
    note(28, 30, 4),
];

const PAD: &[Note] = &[
    note(0, 39, 15),
    note(0, 42, 15),
    note(0, 46, 15),
    note(16, 37, 15),
    note(16, 41, 15),
    note(16, 44, 15),
];

const PARTS: &[PartSetup] = &[
    PartSetup {
        name: "drums",
        priority: 10,
        instrument: 0,
        drums: true,
        policy: AllocPolicy::GLOBAL_ONLY,
        reserved: 0,
        layers: 2,
        notes: DRUMS,
    },
    PartSetup {
        name: "lead",
        priority: 8,
        instrument: SYNTHETIC_WAVE_BASE + 1,
        drums: false,
        policy: AllocPolicy::REUSE_LAST,
        reserved: 1,
        layers: 2,
        notes: LEAD,
    },
    PartSetup {
        name: "bass",
        priority: 6,
        instrument: SYNTHETIC_WAVE_BASE + 2,
        drums: false,
        policy: 0,
        reserved: 0,
        layers: 1,
        notes: BASS,
    },
    PartSetup {
        name: "pad",
        priority: 3,
        instrument: SYNTHETIC_WAVE_BASE,
        drums: false,
        policy: 0,
        reserved: 0,
        layers: 3,
        notes: PAD,
    },
];

struct Part {
    name: &'static str,
    layers: Vec<LayerId>,
    notes: &'static [Note],
    next_layer: usize,
}

/// A note that is sounding and when it ends.
#[derive(Clone, Copy, Debug)]
struct Held {
    layer: LayerId,
    until: u32,
}

pub struct Score {
    pub player: PlayerId,
    parts: Vec<Part>,
    held: Vec<Held>,
    pub step_duration: Duration,
}

impl Score {
    /// Register the demo parts with `engine` and return the score that plays them.
    pub fn demo(engine: &mut AudioEngine<MemoryBank>) -> EyreResult<Self> {
        let player = engine
            .sequences_mut()
            .add_player()
            .ok_or_else(|| eyre!("no free player slot"))?;

        let mut parts = Vec::with_capacity(PARTS.len());
        for setup in PARTS {
            let seq = engine.sequences_mut();
            let channel = seq
                .add_channel(player)
                .ok_or_else(|| eyre!("no free channel slot for {}", setup.name))?;
            let entry = seq
                .channel_mut(channel)
                .ok_or_else(|| eyre!("channel for {} vanished", setup.name))?;
            entry.note_priority = setup.priority;
            entry.instrument = setup.instrument;
            entry.drums = setup.drums;
            entry.alloc_policy = AllocPolicy(setup.policy);
            entry.headset_effects = true;
            if setup.name == "pad" {
                entry.vibrato = VibratoParams {
                    rate: 0.05,
                    depth: 0.004,
                    delay_ticks: 40,
                };
            }
            let pool = entry.pool();

            let mut layers = Vec::with_capacity(setup.layers);
            for _ in 0..setup.layers {
                let layer = seq
                    .add_layer(channel)
                    .ok_or_else(|| eyre!("no free layer slot for {}", setup.name))?;
                layers.push(layer);
            }

            if setup.reserved > 0 {
                engine.reset_pool(pool, setup.reserved);
            }
            parts.push(Part {
                name: setup.name,
                layers,
                notes: setup.notes,
                next_layer: 0,
            });
        }

        Ok(Self {
            player,
            parts,
            held: Vec::with_capacity(16),
            step_duration: Duration::from_millis(125),
        })
    }

    pub fn part_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parts.iter().map(|p| p.name)
    }

    /// Emit the note-offs and note-ons that fall on `step`.
    pub fn advance(&mut self, step: u32, send: &mut impl FnMut(EngineCommand)) {
        self.held.retain(|held| {
            if held.until <= step {
                send(EngineCommand::NoteOff { layer: held.layer });
                false
            } else {
                true
            }
        });

        let local = step % LOOP_STEPS;
        for part in &mut self.parts {
            for note in part.notes.iter().filter(|n| n.step == local) {
                let layer = part.layers[part.next_layer % part.layers.len()];
                part.next_layer += 1;

                // Retriggering a layer ends its previous note
                self.held.retain(|held| held.layer != layer);
                send(EngineCommand::NoteOn {
                    layer,
                    semitone: note.semitone,
                    velocity: note.velocity,
                    pan: note.pan,
                });
                self.held.push(Held {
                    layer,
                    until: step + note.length,
                });
            }
        }
    }

    /// Forget every sounding note, e.g. after an all-notes-off.
    pub fn clear(&mut self) {
        self.held.clear();
    }
}
