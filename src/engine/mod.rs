//! The voice engine: a fixed voice arena, the allocator that hands voices to
//! layers, and the tick scheduler that turns bound voices into mixer
//! parameters.
//!
//! Everything here runs on the audio thread. After [`AudioEngine::new`] no
//! call allocates or blocks. Requests from other threads arrive through
//! [`AudioEngine::drain_commands`].

pub mod allocator;
pub mod pool;
pub mod scheduler;

pub use allocator::{AllocPolicy, ReleaseKind};
pub use pool::{PoolId, VoicePool, VoiceState};

use self::allocator::ReleaseOutcome;
use crate::{
    config::{MixSettings, SettingsSource},
    dsp::{
        envelope::EnvelopeShape,
        pan::PanTables,
        wave::{remap_sample_position, select_synthetic_wave, WaveTables, SYNTHETIC_WAVE_BASE},
    },
    error::AssetError,
    io::{semitone_ratio, SoundBank, TunedSample},
    sequencing::{ChannelId, LayerId, NoteStatus, PlayerId, SequenceCapacity, Sequences},
    synth::{
        message::{EngineCommand, MessageReceiver},
        voice::{Voice, VoiceId, VoiceOutput},
    },
};
use tracing::{debug, info, trace};

/// Sample rate the synthetic wave tables and sample tunings assume.
pub const NATIVE_FREQUENCY: u32 = 32_000;

/// Constants derived from the output buffer layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferParams {
    pub output_frequency: u32,
    /// Envelope ticks per audio update.
    pub ticks_per_update: u16,
    /// Fast-release velocity used for forced takeovers.
    pub ticks_per_update_inv: f32,
    /// Multiplied by a decay index to get the note-off fade velocity.
    pub ticks_per_update_inv_scaled: f32,
    /// Native-to-output frequency ratio folded into every voice's pitch.
    pub resample_rate: f32,
}

impl BufferParams {
    pub fn new(output_frequency: u32, ticks_per_update: u16) -> Self {
        let ticks_per_update = ticks_per_update.max(1);
        let ticks_per_update_inv = 1.0 / f32::from(ticks_per_update);
        Self {
            output_frequency,
            ticks_per_update,
            ticks_per_update_inv,
            ticks_per_update_inv_scaled: ticks_per_update_inv / 256.0,
            resample_rate: NATIVE_FREQUENCY as f32 / output_frequency.max(1) as f32,
        }
    }
}

impl Default for BufferParams {
    fn default() -> Self {
        Self::new(NATIVE_FREQUENCY, 4)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub voices: usize,
    pub sequences: SequenceCapacity,
    pub buffer: BufferParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voices: 24,
            sequences: SequenceCapacity::default(),
            buffer: BufferParams::default(),
        }
    }
}

/// Parameters of a note-on request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteOn {
    pub semitone: u8,
    /// 0.0 to 1.0.
    pub velocity: f32,
    pub pan: u8,
}

/// What happened to a note-on request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteOnOutcome {
    /// Bound to a voice. It may still be fading out its previous note.
    Playing(VoiceId),
    /// Every candidate voice outranks this note.
    Dropped,
    /// The instrument could not be resolved; the layer is marked failed.
    AssetNotReady(AssetError),
    /// The layer is not attached to a live channel and player.
    Detached,
}

/// Borrowed view the allocator and scheduler work through.
pub(crate) struct VoiceContext<'a> {
    pub(crate) pool: &'a mut VoicePool,
    pub(crate) seq: &'a mut Sequences,
    pub(crate) params: &'a BufferParams,
}

struct Resolved {
    sample: Option<TunedSample>,
    freq_ratio: f32,
    pan: Option<u8>,
    envelope: Option<EnvelopeShape>,
}

pub struct AudioEngine<B: SoundBank> {
    pool: VoicePool,
    seq: Sequences,
    bank: B,
    params: BufferParams,
    pan_tables: PanTables,
    wave_tables: WaveTables,
    ticks: u64,
}

impl<B: SoundBank> AudioEngine<B> {
    /// Build every voice, pool and table up front.
    pub fn new(config: EngineConfig, bank: B) -> Self {
        let pool = VoicePool::new(config.voices, config.sequences.pool_count());
        info!(
            voices = config.voices,
            pools = pool.pool_count(),
            output_frequency = config.buffer.output_frequency,
            "voice engine initialized"
        );
        Self {
            pool,
            seq: Sequences::new(config.sequences),
            bank,
            params: config.buffer,
            pan_tables: PanTables::new(),
            wave_tables: WaveTables::new(),
            ticks: 0,
        }
    }

    fn context(&mut self) -> VoiceContext<'_> {
        VoiceContext {
            pool: &mut self.pool,
            seq: &mut self.seq,
            params: &self.params,
        }
    }

    pub fn sequences(&self) -> &Sequences {
        &self.seq
    }

    pub fn sequences_mut(&mut self) -> &mut Sequences {
        &mut self.seq
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    pub fn voice(&self, id: VoiceId) -> Option<&Voice> {
        (id.index() < self.pool.capacity()).then(|| self.pool.voice(id))
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    pub fn params(&self) -> &BufferParams {
        &self.params
    }

    pub fn wave_tables(&self) -> &WaveTables {
        &self.wave_tables
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Resolve the instrument, load the layer and find it a voice.
    pub fn note_on(&mut self, layer: LayerId, note: NoteOn) -> NoteOnOutcome {
        let resolved = {
            let Some((entry, channel, _)) = self.seq.attachment(layer) else {
                return NoteOnOutcome::Detached;
            };
            let instrument = entry.effective_instrument(channel);
            self.resolve(channel.font, instrument, channel.drums, note.semitone)
        };

        let resolved = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                if let Some(entry) = self.seq.layer_mut(layer) {
                    entry.status = NoteStatus::Failed;
                }
                debug!(layer = layer.0, %err, transient = err.is_transient(), "note skipped");
                return NoteOnOutcome::AssetNotReady(err);
            }
        };

        // A layer plays one note at a time
        let mut ctx = self.context();
        if let Some(previous) = ctx.seq.layer(layer).and_then(|l| l.voice) {
            let voice = ctx.pool.voice(previous);
            if voice.parent == Some(layer) || voice.wanted == Some(layer) {
                ctx.release_layer(layer, ReleaseKind::NoteOff);
            }
        }

        if let Some(entry) = ctx.seq.layer_mut(layer) {
            entry.semitone = note.semitone;
            entry.freq_ratio = resolved.freq_ratio;
            entry.velocity = note.velocity.clamp(0.0, 1.0);
            entry.pan = resolved.pan.unwrap_or(note.pan) & 0x7F;
            entry.tuned_sample = resolved.sample;
            if resolved.envelope.is_some() {
                entry.envelope = resolved.envelope;
            }
            entry.enabled = true;
            entry.status = NoteStatus::Playing;
            entry.portamento.restart();
        }

        match ctx.allocate(layer) {
            Some(voice) => NoteOnOutcome::Playing(voice),
            None => NoteOnOutcome::Dropped,
        }
    }

    fn resolve(&self, font: u8, instrument: u8, drums: bool, semitone: u8) -> Result<Resolved, AssetError> {
        if drums {
            let drum = self.bank.drum(font, semitone)?;
            return Ok(Resolved {
                sample: Some(drum.tuned_sample),
                freq_ratio: drum.tuned_sample.tuning,
                pan: Some(drum.pan),
                envelope: Some(drum.envelope),
            });
        }
        if instrument >= SYNTHETIC_WAVE_BASE {
            return Ok(Resolved {
                sample: None,
                freq_ratio: semitone_ratio(semitone),
                pan: None,
                envelope: None,
            });
        }
        let entry = self.bank.instrument(font, instrument)?;
        let sample = *entry.tuned_sample(semitone);
        Ok(Resolved {
            sample: Some(sample),
            freq_ratio: sample.pitch_ratio(semitone),
            pan: None,
            envelope: Some(entry.envelope),
        })
    }

    /// Natural end of the layer's note.
    pub fn note_off(&mut self, layer: LayerId) {
        self.context().release_layer(layer, ReleaseKind::NoteOff);
    }

    /// Release whatever layer owns `voice`. Returns false if it was unbound.
    ///
    /// A note-off moves the voice to decaying, a takeover to releasing.
    pub fn release_voice(&mut self, voice: VoiceId, kind: ReleaseKind) -> bool {
        let Some(layer) = self.voice(voice).and_then(|v| v.parent) else {
            return false;
        };
        let mut ctx = self.context();
        match ctx.release_layer(layer, kind) {
            ReleaseOutcome::Released(id) => {
                if kind == ReleaseKind::Takeover {
                    ctx.pool.relink(id, VoiceState::Releasing, false);
                }
                true
            }
            ReleaseOutcome::Discarded(_) => true,
            ReleaseOutcome::Unbound => false,
        }
    }

    /// Change a layer's pitch mid-note, moving synthetic voices between bands.
    pub fn retune_layer(&mut self, layer: LayerId, freq_ratio: f32) {
        let Some(entry) = self.seq.layer_mut(layer) else {
            return;
        };
        entry.freq_ratio = freq_ratio;
        let portamento = entry.portamento.band_extent();

        let Some(id) = entry.voice else {
            return;
        };
        let voice = self.pool.voice_mut(id);
        if voice.parent != Some(layer) || voice.wave_id < SYNTHETIC_WAVE_BASE {
            return;
        }

        let wave = select_synthetic_wave(voice.wave_id, freq_ratio, portamento);
        let from = voice.harmonic_index;
        voice.sample_position = remap_sample_position(voice.sample_position, from, wave.wave.harmonic_index);
        voice.harmonic_index = wave.wave.harmonic_index;
        voice.output.wave = Some(wave.wave);
        entry.freq_ratio *= wave.freq_scale;
        trace!(voice = id.0, from, to = wave.wave.harmonic_index, "harmonic band changed");
    }

    /// Mixer feedback: where the renderer is inside the voice's sample data.
    pub fn report_sample_position(&mut self, voice: VoiceId, position: u32) {
        if voice.index() < self.pool.capacity() {
            self.pool.voice_mut(voice).sample_position = position;
        }
    }

    /// The mixer asked for a voice to stop right away.
    pub fn mark_finished(&mut self, voice: VoiceId) {
        if voice.index() < self.pool.capacity() {
            self.pool.voice_mut(voice).finished = true;
        }
    }

    pub fn set_muted(&mut self, player: PlayerId, muted: bool) {
        if let Some(entry) = self.seq.player_mut(player) {
            entry.muted = muted;
            debug!(player = player.0, muted, "player mute changed");
        }
    }

    /// Resize a pool. Returns how many voices it received.
    pub fn reset_pool(&mut self, pool: PoolId, count: usize) -> usize {
        let moved = self.pool.fill_pool(pool, count);
        debug!(pool = pool.0, requested = count, moved, "pool reset");
        moved
    }

    /// Note-off for every live layer.
    pub fn all_notes_off(&mut self) {
        let mut ctx = self.context();
        for index in 0..ctx.seq.capacity().layers {
            let layer = LayerId(index as u16);
            if ctx.seq.layer(layer).is_some() {
                ctx.release_layer(layer, ReleaseKind::NoteOff);
            }
        }
    }

    /// Free a layer and force-release its voice.
    pub fn free_layer(&mut self, layer: LayerId) {
        let mut ctx = self.context();
        if let ReleaseOutcome::Released(id) = ctx.release_layer(layer, ReleaseKind::Takeover) {
            ctx.pool.relink(id, VoiceState::Decaying, true);
        }
        ctx.seq.free_layer(layer);
    }

    /// Tear a channel down: release its voices, return its pool, free it.
    pub fn disable_channel(&mut self, channel: ChannelId) {
        let Some(pool) = self.seq.channel(channel).map(|c| c.pool()) else {
            return;
        };
        for index in 0..self.seq.capacity().layers {
            let layer = LayerId(index as u16);
            if self.seq.layer(layer).is_some_and(|l| l.channel == Some(channel)) {
                self.free_layer(layer);
            }
        }
        self.pool.clear_pool(pool);
        self.seq.free_channel(channel);
        debug!(channel = channel.0, "channel disabled");
    }

    /// Tear a player down along with all of its channels.
    pub fn stop_player(&mut self, player: PlayerId) {
        let Some(pool) = self.seq.player(player).map(|p| p.pool()) else {
            return;
        };
        for index in 0..self.seq.capacity().channels {
            let channel = ChannelId(index as u16);
            if self.seq.channel(channel).is_some_and(|c| c.player == Some(player)) {
                self.disable_channel(channel);
            }
        }
        self.pool.clear_pool(pool);
        self.seq.detach_player(player);
        debug!(player = player.0, "player stopped");
    }

    /// Apply every queued command.
    pub fn drain_commands(&mut self, rx: &mut impl MessageReceiver) {
        while let Some(command) = rx.pop() {
            self.apply(command);
        }
    }

    pub fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::NoteOn {
                layer,
                semitone,
                velocity,
                pan,
            } => {
                self.note_on(
                    layer,
                    NoteOn {
                        semitone,
                        velocity,
                        pan,
                    },
                );
            }
            EngineCommand::NoteOff { layer } => self.note_off(layer),
            EngineCommand::SetMuted { player, muted } => self.set_muted(player, muted),
            EngineCommand::ResetPool { pool, count } => {
                self.reset_pool(pool, usize::from(count));
            }
            EngineCommand::DisableChannel { channel } => self.disable_channel(channel),
            EngineCommand::AllNotesOff => self.all_notes_off(),
        }
    }

    /// One audio update: reconcile, advance and render every voice.
    pub fn tick(&mut self, settings: &dyn SettingsSource) {
        let mix = MixSettings::read(settings);
        let mut ctx = VoiceContext {
            pool: &mut self.pool,
            seq: &mut self.seq,
            params: &self.params,
        };
        ctx.process_voices(&self.pan_tables, &mix);
        self.ticks += 1;

        debug_assert_eq!(self.pool.check_membership(), Ok(()), "voice pool corrupted");
    }

    /// Output records of every voice the mixer should render this update.
    pub fn outputs(&self) -> impl Iterator<Item = (VoiceId, &VoiceOutput)> {
        self.pool
            .voices()
            .filter(|(_, voice)| voice.output.enabled)
            .map(|(id, voice)| (id, &voice.output))
    }

    /// Silence everything and return every voice to the global free list.
    pub fn shutdown(&mut self) {
        self.pool.reset();
        for index in 0..self.seq.capacity().layers {
            if let Some(entry) = self.seq.layer_mut(LayerId(index as u16)) {
                entry.voice = None;
                entry.status = NoteStatus::Idle;
            }
        }
        info!(ticks = self.ticks, "voice engine shut down");
    }
}
