//! Voice allocation, stealing and layer release.

/*
Allocation
==========

A layer asks for a voice with its channel's priority P and allocation policy.
The policy picks an ordered list of (source, scope) attempts; the first one
that yields a voice wins.

  source   disabled   Take an idle voice and bind it now.
           decaying   Take the oldest voice fading after note-off. It gets a
                      fast release and the layer waits in `wanted` until the
                      fade is done.
           active     Steal the lowest-priority voice strictly below P from
                      the releasing or active list. Among equal priorities
                      the earliest allocated is taken.

  scope    channel    The channel's own pool.
           sequence   The pool of the channel's player.
           global     Pool 0.

  policy bit  0x01  Reuse the voice this layer released last, if nobody
                    else claimed it.
              0x02  Channel pool only.
              0x04  Channel then sequence pool, per source.
              0x08  Global pool only.
              else  Channel, sequence, global for each source in turn.

Disabled always comes first inside a scope, so a free voice is never passed
over in favour of stealing one.

A layer waiting in `wanted` already points at its voice, so a note-off or a
second note-on before the handover withdraws the claim. A later claim on the
same voice displaces the earlier one, and the displaced layer goes idle.

Release
=======

Releasing a layer detaches its voice: the voice remembers the layer as
`previous`, freezes the layer's attributes and fades out, either with the
instrument's decay (note-off) or at the fixed fast rate (takeover).
*/

use super::{
    pool::{PoolId, VoiceState},
    VoiceContext,
};
use crate::{
    dsp::{
        envelope::EnvelopeShape,
        wave::{select_synthetic_wave, SYNTHETIC_WAVE_BASE},
    },
    sequencing::{LayerId, NoteStatus},
    synth::voice::{NoteAttributes, ReleasePhase, VoiceId, VoiceOutput},
};
use tracing::{debug, trace};

/// Channel allocation policy bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocPolicy(pub u8);

impl AllocPolicy {
    pub const REUSE_LAST: u8 = 0x01;
    pub const CHANNEL_ONLY: u8 = 0x02;
    pub const CHANNEL_THEN_SEQUENCE: u8 = 0x04;
    pub const GLOBAL_ONLY: u8 = 0x08;

    pub fn reuses_last(self) -> bool {
        self.0 & Self::REUSE_LAST != 0
    }

    /// Ordered attempts for this policy.
    pub fn strategies(self) -> &'static [Strategy] {
        if self.0 & Self::CHANNEL_ONLY != 0 {
            &CHANNEL_ONLY
        } else if self.0 & Self::CHANNEL_THEN_SEQUENCE != 0 {
            &CHANNEL_THEN_SEQUENCE
        } else if self.0 & Self::GLOBAL_ONLY != 0 {
            &GLOBAL_ONLY
        } else {
            &EXHAUSTIVE
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Disabled,
    Decaying,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Channel,
    Sequence,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy {
    pub source: Source,
    pub scope: Scope,
}

const fn step(source: Source, scope: Scope) -> Strategy {
    Strategy { source, scope }
}

const CHANNEL_ONLY: [Strategy; 3] = [
    step(Source::Disabled, Scope::Channel),
    step(Source::Decaying, Scope::Channel),
    step(Source::Active, Scope::Channel),
];

const CHANNEL_THEN_SEQUENCE: [Strategy; 6] = [
    step(Source::Disabled, Scope::Channel),
    step(Source::Disabled, Scope::Sequence),
    step(Source::Decaying, Scope::Channel),
    step(Source::Decaying, Scope::Sequence),
    step(Source::Active, Scope::Channel),
    step(Source::Active, Scope::Sequence),
];

const GLOBAL_ONLY: [Strategy; 3] = [
    step(Source::Disabled, Scope::Global),
    step(Source::Decaying, Scope::Global),
    step(Source::Active, Scope::Global),
];

const EXHAUSTIVE: [Strategy; 9] = [
    step(Source::Disabled, Scope::Channel),
    step(Source::Disabled, Scope::Sequence),
    step(Source::Disabled, Scope::Global),
    step(Source::Decaying, Scope::Channel),
    step(Source::Decaying, Scope::Sequence),
    step(Source::Decaying, Scope::Global),
    step(Source::Active, Scope::Channel),
    step(Source::Active, Scope::Sequence),
    step(Source::Active, Scope::Global),
];

/// How a layer lets go of its voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    /// Natural end of note: instrument decay, then the voice moves to decaying.
    NoteOff,
    /// Fast fade so another layer can take the voice.
    Takeover,
}

/// What `release_layer` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    /// The layer did not own a voice.
    Unbound,
    /// The voice is now fading on its own.
    Released(VoiceId),
    /// The voice never sounded and went straight back to disabled.
    Discarded(VoiceId),
}

impl VoiceContext<'_> {
    /// Find a voice for `layer`, or `None` when every candidate outranks it.
    pub(crate) fn allocate(&mut self, layer: LayerId) -> Option<VoiceId> {
        let (policy, priority, channel_pool, player_pool, reuse) = {
            let entry = self.seq.layer(layer)?;
            let channel = self.seq.channel(entry.channel?)?;
            let player_pool = channel
                .player
                .and_then(|p| self.seq.player(p))
                .map(|p| p.pool());
            (
                channel.alloc_policy,
                channel.note_priority,
                channel.pool(),
                player_pool,
                entry.voice,
            )
        };

        if policy.reuses_last() {
            if let Some(id) = reuse {
                let voice = self.pool.voice(id);
                if voice.previous == Some(layer) && voice.wanted.is_none() {
                    self.take_ownership(id, layer, priority);
                    self.pool.relink(id, VoiceState::Releasing, false);
                    trace!(voice = id.0, layer = layer.0, "reusing released voice");
                    return Some(id);
                }
            }
        }

        for strategy in policy.strategies() {
            let pool = match strategy.scope {
                Scope::Channel => channel_pool,
                Scope::Sequence => match player_pool {
                    Some(pool) => pool,
                    None => continue,
                },
                Scope::Global => PoolId::GLOBAL,
            };

            let found = match strategy.source {
                Source::Disabled => self.alloc_from_disabled(pool, layer),
                Source::Decaying => self.alloc_from_decaying(pool, layer, priority),
                Source::Active => self.alloc_from_active(pool, layer, priority),
            };
            if let Some(id) = found {
                trace!(
                    voice = id.0,
                    layer = layer.0,
                    pool = pool.0,
                    source = ?strategy.source,
                    "voice allocated"
                );
                return Some(id);
            }
        }

        if let Some(entry) = self.seq.layer_mut(layer) {
            entry.status = NoteStatus::Idle;
        }
        trace!(layer = layer.0, priority, "no voice available, note dropped");
        None
    }

    fn alloc_from_disabled(&mut self, pool: PoolId, layer: LayerId) -> Option<VoiceId> {
        let id = self.pool.pop_back(pool, VoiceState::Disabled)?;
        if !self.init_for_layer(id, layer) {
            self.pool.push_back(pool, VoiceState::Disabled, id);
            return None;
        }
        self.pool.push_back(pool, VoiceState::Active, id);
        Some(id)
    }

    fn alloc_from_decaying(&mut self, pool: PoolId, layer: LayerId, priority: u8) -> Option<VoiceId> {
        let id = self.pool.pop_back(pool, VoiceState::Decaying)?;
        self.take_ownership(id, layer, priority);
        self.pool.push_back(pool, VoiceState::Releasing, id);
        Some(id)
    }

    fn alloc_from_active(&mut self, pool: PoolId, layer: LayerId, priority: u8) -> Option<VoiceId> {
        let releasing = self.lowest_below(pool, VoiceState::Releasing, priority);
        let active = self.lowest_below(pool, VoiceState::Active, priority);

        let victim = match (active, releasing) {
            (Some(a), Some(r)) if a.1 < r.1 => a.0,
            (Some(a), None) => a.0,
            (_, Some(r)) => {
                // Already fading: just queue behind it
                self.claim(r.0, layer, priority);
                return Some(r.0);
            }
            (None, None) => return None,
        };

        self.pool.remove(victim);
        let parent = self.pool.voice(victim).parent;
        let owner = parent.filter(|p| {
            self.seq
                .layer_slot(*p)
                .is_some_and(|l| l.voice == Some(victim))
        });

        let unheard = match owner {
            Some(owner) => matches!(
                self.release_layer(owner, ReleaseKind::Takeover),
                ReleaseOutcome::Discarded(_)
            ),
            None => self.detach_stale(victim),
        };
        if unheard {
            // Nothing was audible yet, so bind right away
            self.pool.remove(victim);
            if self.init_for_layer(victim, layer) {
                self.pool.push_back(pool, VoiceState::Active, victim);
                return Some(victim);
            }
            self.pool.push_back(pool, VoiceState::Disabled, victim);
            return None;
        }

        self.claim(victim, layer, priority);
        self.pool.push_back(pool, VoiceState::Releasing, victim);
        debug!(voice = victim.0, layer = layer.0, priority, "voice stolen");
        Some(victim)
    }

    /// Lowest priority strictly below `limit`; the earliest wins ties.
    fn lowest_below(&self, pool: PoolId, state: VoiceState, limit: u8) -> Option<(VoiceId, u8)> {
        let mut best: Option<(VoiceId, u8)> = None;
        for id in self.pool.iter(pool, state) {
            let priority = self.pool.voice(id).priority;
            if best.map_or(true, |(_, p)| priority < p) {
                best = Some((id, priority));
            }
        }
        best.filter(|(_, p)| *p < limit)
    }

    /// Drop a parent whose layer slot moved on to another voice.
    ///
    /// Returns true when the voice never sounded and can be rebound at once.
    fn detach_stale(&mut self, id: VoiceId) -> bool {
        let fade = self.params.ticks_per_update_inv;
        let voice = self.pool.voice_mut(id);
        voice.parent = None;
        voice.previous = None;
        if !voice.envelope.has_started() {
            voice.disable();
            return true;
        }
        voice.envelope.force_release(fade);
        voice.release = ReleasePhase::Takeover;
        trace!(voice = id.0, "stale owner dropped before steal");
        false
    }

    fn take_ownership(&mut self, id: VoiceId, layer: LayerId, priority: u8) {
        let fade = self.params.ticks_per_update_inv;
        self.claim(id, layer, priority);
        self.pool.voice_mut(id).envelope.force_release(fade);
    }

    /// Queue `layer` behind the fade of `id`, displacing any earlier claim.
    fn claim(&mut self, id: VoiceId, layer: LayerId, priority: u8) {
        let voice = self.pool.voice_mut(id);
        let displaced = voice.wanted.replace(layer).filter(|l| *l != layer);
        voice.priority = priority.max(1);

        if let Some(displaced) = displaced {
            if let Some(entry) = self.seq.layer_slot_mut(displaced) {
                if entry.voice == Some(id) {
                    entry.voice = None;
                    if entry.status == NoteStatus::Playing {
                        entry.status = NoteStatus::Idle;
                    }
                }
            }
            trace!(voice = id.0, layer = displaced.0, "pending claim displaced");
        }
        if let Some(entry) = self.seq.layer_mut(layer) {
            entry.voice = Some(id);
        }
    }

    /// Bind `id` to `layer` and arm its envelope. Fails if the layer lost its channel.
    pub(crate) fn init_for_layer(&mut self, id: VoiceId, layer: LayerId) -> bool {
        let Some((entry, channel, _)) = self.seq.attachment(layer) else {
            return false;
        };

        let shape = entry.effective_envelope(channel);
        let wave_id = entry.effective_instrument(channel);
        let freq_ratio = entry.freq_ratio;
        let portamento = entry.portamento;
        let sample = entry.tuned_sample.map(|t| t.sample);
        let synthetic = (wave_id >= SYNTHETIC_WAVE_BASE)
            .then(|| select_synthetic_wave(wave_id, freq_ratio, portamento.band_extent()));

        let voice = self.pool.voice_mut(id);
        voice.previous = None;
        voice.parent = Some(layer);
        voice.priority = channel.note_priority.max(1);
        voice.release = ReleasePhase::None;
        voice.finished = false;
        voice.envelope.init(shape);
        voice.vibrato.init(channel.vibrato);
        voice.portamento = portamento;
        voice.portamento.restart();
        voice.font = channel.font;
        voice.headset_effects = channel.headset_effects;
        voice.role = channel.role;
        voice.sample_position = 0;
        voice.output = VoiceOutput {
            sample,
            reverb_index: channel.reverb_index & 3,
            book_offset: channel.book_offset % 8,
            ..VoiceOutput::default()
        };

        match synthetic {
            Some(wave) => {
                voice.wave_id = wave.wave_id;
                voice.harmonic_index = wave.wave.harmonic_index;
                voice.output.wave = Some(wave.wave);
                voice.output.sample = None;
            }
            None => {
                voice.wave_id = wave_id;
                voice.harmonic_index = 0;
            }
        }

        if let Some(entry) = self.seq.layer_mut(layer) {
            if let Some(wave) = synthetic {
                entry.freq_ratio *= wave.freq_scale;
            }
            entry.voice = Some(id);
            entry.status = NoteStatus::Playing;
        }
        true
    }

    /// Detach `layer` from its voice and start the fade.
    pub(crate) fn release_layer(&mut self, layer: LayerId, kind: ReleaseKind) -> ReleaseOutcome {
        let fast_fade = self.params.ticks_per_update_inv;
        let scaled = self.params.ticks_per_update_inv_scaled;

        let Some(entry) = self.seq.layer_slot(layer) else {
            return ReleaseOutcome::Unbound;
        };
        let Some(id) = entry.voice else {
            if let Some(entry) = self.seq.layer_slot_mut(layer) {
                if entry.status == NoteStatus::Playing {
                    entry.status = NoteStatus::Idle;
                }
            }
            return ReleaseOutcome::Unbound;
        };

        let channel = entry.channel.and_then(|c| self.seq.channel(c));
        let silenced = channel
            .and_then(|c| c.player.and_then(|p| self.seq.player(p)).map(|p| (c, p)))
            .is_some_and(|(c, p)| p.muted && c.mute_behavior.silences());
        let channel_shape = channel.map_or_else(EnvelopeShape::default, |c| c.envelope);
        let decay_index = match entry.envelope {
            Some(shape) if shape.decay_index != 0 => shape.decay_index,
            _ => channel_shape.decay_index,
        };
        let snapshot = NoteAttributes {
            freq_ratio: entry.freq_ratio,
            velocity: entry.velocity,
            pan: entry.pan,
            stereo: entry.stereo,
            reverb_volume: channel.map_or(0, |c| c.reverb_volume),
            reverb_index: channel.map_or(0, |c| c.reverb_index),
        };

        if let Some(entry) = self.seq.layer_slot_mut(layer) {
            if entry.status == NoteStatus::Playing {
                entry.status = NoteStatus::Idle;
            }
        }

        let voice = self.pool.voice_mut(id);
        if voice.wanted == Some(layer) {
            // Withdraw a claim that has not been handed over yet
            voice.wanted = None;
            if voice.parent.is_none() {
                voice.priority = 1;
            }
            if let Some(entry) = self.seq.layer_slot_mut(layer) {
                entry.voice = None;
            }
            trace!(voice = id.0, layer = layer.0, "pending claim withdrawn");
            return ReleaseOutcome::Unbound;
        }

        if voice.parent != Some(layer) {
            // A voice this layer gave up earlier: hurry its fade if nobody took it
            if voice.parent.is_none()
                && voice.wanted.is_none()
                && voice.previous == Some(layer)
                && kind == ReleaseKind::Takeover
            {
                voice.envelope.force_release(fast_fade);
            }
            return ReleaseOutcome::Unbound;
        }

        if !voice.envelope.has_started() {
            voice.disable();
            self.pool.relink(id, VoiceState::Disabled, false);
            if let Some(entry) = self.seq.layer_slot_mut(layer) {
                entry.voice = None;
            }
            trace!(voice = id.0, layer = layer.0, "unheard voice discarded");
            return ReleaseOutcome::Discarded(id);
        }

        voice.attributes = snapshot;
        if silenced {
            voice.finished = true;
        }
        voice.priority = 1;
        voice.previous = voice.parent.take();

        match kind {
            ReleaseKind::Takeover => {
                voice.envelope.force_release(fast_fade);
                voice.release = ReleasePhase::Takeover;
            }
            ReleaseKind::NoteOff => {
                let fade = f32::from(decay_index.max(1)) * scaled;
                let sustain = f32::from(channel_shape.sustain) * voice.envelope.level() / 256.0;
                voice.envelope.note_off(fade, sustain);
                voice.release = ReleasePhase::NoteOff;
                self.pool.relink(id, VoiceState::Decaying, true);
            }
        }
        ReleaseOutcome::Released(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_decode_to_tables() {
        assert_eq!(AllocPolicy(0).strategies().len(), 9);
        assert_eq!(AllocPolicy(AllocPolicy::REUSE_LAST).strategies().len(), 9);
        assert_eq!(AllocPolicy(AllocPolicy::CHANNEL_ONLY).strategies(), &CHANNEL_ONLY);
        assert_eq!(
            AllocPolicy(AllocPolicy::CHANNEL_THEN_SEQUENCE).strategies(),
            &CHANNEL_THEN_SEQUENCE
        );
        assert_eq!(AllocPolicy(AllocPolicy::GLOBAL_ONLY).strategies(), &GLOBAL_ONLY);
        // Lower bits win when several are set
        assert_eq!(AllocPolicy(0x0A).strategies(), &CHANNEL_ONLY);
    }

    #[test]
    fn every_table_tries_disabled_before_stealing() {
        for bits in [0u8, 2, 4, 8] {
            let steps = AllocPolicy(bits).strategies();
            for scope in [Scope::Channel, Scope::Sequence, Scope::Global] {
                let disabled = steps
                    .iter()
                    .position(|s| s.scope == scope && s.source == Source::Disabled);
                let other = steps
                    .iter()
                    .position(|s| s.scope == scope && s.source != Source::Disabled);
                if let (Some(d), Some(o)) = (disabled, other) {
                    assert!(d < o, "policy {bits:#x} scope {scope:?}");
                }
            }
        }
    }
}
