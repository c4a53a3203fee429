//! Shared state types for UI communication
//!
//! Everything crossing the ring buffers is `Copy` so the engine thread never
//! allocates to publish it.

use polyvoice::{
    dsp::pan::SoundMode,
    engine::{PoolId, VoiceState},
    io::SoundBank,
    AudioEngine, Settings,
};

/// Most voices the monitor displays.
pub const MAX_VOICES: usize = 32;

/// Settings changes sent from the UI thread to the engine thread
#[derive(Clone, Copy, Debug)]
pub enum Control {
    SoundMode(SoundMode),
    MasterVolume(f32),
}

/// One voice as the UI sees it
#[derive(Clone, Copy, Debug, Default)]
pub struct VoiceRow {
    /// List the voice sits in; `None` only for slots past the voice count
    pub state: Option<VoiceState>,
    pub pool: u16,
    pub priority: u8,
    pub layer: Option<u16>,
    pub pending: Option<u16>,
    pub envelope: &'static str,
    pub level: f32,
    pub left: u16,
    pub right: u16,
}

/// What the engine looked like after one tick
#[derive(Clone, Copy, Debug)]
pub struct Snapshot {
    pub ticks: u64,
    pub sound_mode: SoundMode,
    pub master_volume: f32,
    pub voices: [VoiceRow; MAX_VOICES],
    pub num_voices: u8,
    /// Global list lengths, indexed like [`VoiceState::ALL`]
    pub global_lists: [usize; 4],
}

impl Snapshot {
    pub fn capture<B: SoundBank>(engine: &AudioEngine<B>, settings: &Settings) -> Self {
        let pool = engine.pool();
        let mut voices = [VoiceRow::default(); MAX_VOICES];
        let mut num_voices = 0;

        for ((id, voice), row) in pool.voices().zip(voices.iter_mut()) {
            let output = voice.output();
            *row = VoiceRow {
                state: pool.state(id),
                pool: pool.home(id).0,
                priority: voice.priority(),
                layer: voice.parent().map(|l| l.0),
                pending: voice.pending().map(|l| l.0),
                envelope: voice.envelope().state().label(),
                level: voice.envelope().level(),
                left: output.gains.left,
                right: output.gains.right,
            };
            num_voices += 1;
        }

        let mut global_lists = [0; 4];
        for (count, state) in global_lists.iter_mut().zip(VoiceState::ALL) {
            *count = pool.len(PoolId::GLOBAL, state);
        }

        Self {
            ticks: engine.ticks(),
            sound_mode: settings.sound_mode,
            master_volume: settings.master_volume,
            voices,
            num_voices,
            global_lists,
        }
    }

    pub fn rows(&self) -> &[VoiceRow] {
        &self.voices[..usize::from(self.num_voices)]
    }
}
