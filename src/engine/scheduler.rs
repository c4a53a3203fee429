//! The per-tick walk over every voice.

/*
Tick Scheduler
==============

Once per audio update every voice goes through three steps, in voice index
order:

  reconcile   Make the voice's ownership agree with the sequence side. A voice
              whose layer no longer points back at it is force-released. A
              voice whose channel or player has been torn down is released
              and sent to decaying. A voice whose player is muted with the
              stop-notes behavior is force-released.

  settle      A released voice whose envelope has ended either moves on to
              the layer waiting in `wanted` or returns to disabled. The same
              check runs again right after the envelope update, so a voice is
              disabled on the tick its amplitude reaches zero.

  render      Advance envelope, vibrato and portamento, then write the
              voice's output record: resampling rate and channel gains.

Released voices render from the attributes frozen at release. Bound voices
read their layer live, and a muted player with the silence behavior renders
them at zero pitch and volume without unbinding them.
*/

use super::{
    allocator::{ReleaseKind, ReleaseOutcome},
    pool::VoiceState,
    VoiceContext,
};
use crate::{
    config::MixSettings,
    dsp::{
        modulate::resample_rate,
        pan::{spatialize, PanInput, PanTables},
    },
    synth::voice::{NoteAttributes, ReleasePhase, VoiceId},
};
use tracing::trace;

/// Whether a voice goes on to the next step this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Continue,
    Skip,
}

impl VoiceContext<'_> {
    /// Run one tick over the whole voice array.
    pub(crate) fn process_voices(&mut self, tables: &PanTables, mix: &MixSettings) {
        for index in 0..self.pool.capacity() {
            let id = VoiceId(index as u16);
            if self.reconcile(id) == Step::Skip {
                continue;
            }
            if self.pool.voice(id).priority == 0 {
                continue;
            }
            if self.settle(id) == Step::Skip {
                continue;
            }
            self.render(id, tables, mix);
        }
    }

    fn reconcile(&mut self, id: VoiceId) -> Step {
        let voice = self.pool.voice(id);
        let (parent, release, priority) = (voice.parent, voice.release, voice.priority);

        let Some(layer) = parent else {
            // Unbound and not fading: nothing to do until something claims it
            return if release == ReleasePhase::None && priority > 0 {
                Step::Skip
            } else {
                Step::Continue
            };
        };

        let points_back = self
            .seq
            .layer_slot(layer)
            .is_some_and(|l| l.voice == Some(id));
        if !points_back && release == ReleasePhase::None {
            let fade = self.params.ticks_per_update_inv;
            let voice = self.pool.voice_mut(id);
            voice.envelope.force_release(fade);
            voice.priority = 1;
            voice.release = ReleasePhase::Takeover;
            voice.parent = None;
            trace!(voice = id.0, layer = layer.0, "dangling voice released");
            return Step::Continue;
        }

        let Some((entry, channel, player)) = self.seq.attachment(layer) else {
            // Channel or player went away underneath the layer
            if let ReleaseOutcome::Released(_) = self.release_layer(layer, ReleaseKind::Takeover) {
                self.pool.relink(id, VoiceState::Decaying, true);
            }
            trace!(voice = id.0, layer = layer.0, "orphaned voice released");
            return Step::Skip;
        };

        if entry.enabled && !(player.muted && channel.mute_behavior.stops_notes()) {
            return Step::Continue;
        }

        match self.release_layer(layer, ReleaseKind::Takeover) {
            ReleaseOutcome::Released(_) => {
                self.pool.relink(id, VoiceState::Decaying, true);
                Step::Continue
            }
            ReleaseOutcome::Discarded(_) => Step::Skip,
            ReleaseOutcome::Unbound => Step::Continue,
        }
    }

    /// Retire or hand over a voice whose fade has finished.
    fn settle(&mut self, id: VoiceId) -> Step {
        let voice = self.pool.voice(id);
        let released = voice.release != ReleasePhase::None || voice.finished;
        if !voice.envelope.is_finished() && !voice.finished {
            return Step::Continue;
        }

        let wanted = if released { voice.wanted } else { None };
        let voice = self.pool.voice_mut(id);
        voice.wanted = None;
        voice.disable();

        if let Some(layer) = wanted {
            // A reused slot starts with no voice, so it never inherits a claim
            let claimed = self.seq.layer(layer).is_some_and(|l| l.voice == Some(id));
            if claimed && self.init_for_layer(id, layer) {
                self.pool.relink(id, VoiceState::Active, false);
                trace!(voice = id.0, layer = layer.0, "voice handed over");
                return Step::Continue;
            }
            trace!(voice = id.0, layer = layer.0, "pending owner gone, voice retired");
        }

        self.pool.relink(id, VoiceState::Disabled, false);
        Step::Skip
    }

    fn render(&mut self, id: VoiceId, tables: &PanTables, mix: &MixSettings) {
        let live = self.live_attributes(id);
        let resample_scale = self.params.resample_rate;

        let voice = self.pool.voice_mut(id);
        let scale = voice.envelope.update();
        let vibrato = voice.vibrato.update();
        let glide = voice.portamento.update();

        let (attributes, book_offset) = match (voice.release, live) {
            (ReleasePhase::None, Some((attributes, book_offset))) => {
                voice.attributes = attributes;
                (attributes, book_offset)
            }
            _ => (voice.attributes, voice.output.book_offset),
        };

        let freq_ratio = attributes.freq_ratio * vibrato * glide * resample_scale;
        let velocity = attributes.velocity * scale * mix.category_volume(voice.role);
        let input = PanInput {
            pan: attributes.pan,
            velocity,
            stereo: attributes.stereo,
            role: voice.role,
            headset_effects: voice.headset_effects,
        };

        let output = &mut voice.output;
        output.enabled = true;
        output.resample = resample_rate(freq_ratio);
        output.gains = spatialize(tables, &input, mix);
        output.reverb_volume = attributes.reverb_volume;
        output.reverb_index = attributes.reverb_index & 3;
        output.book_offset = book_offset;

        if voice.envelope.is_finished() {
            self.settle(id);
        }
    }

    /// What a bound voice's layer currently asks for.
    fn live_attributes(&self, id: VoiceId) -> Option<(NoteAttributes, u8)> {
        let layer = self.pool.voice(id).parent?;
        let (entry, channel, player) = self.seq.attachment(layer)?;

        let mut attributes = NoteAttributes {
            freq_ratio: entry.freq_ratio,
            velocity: entry.velocity,
            pan: entry.pan,
            stereo: entry.stereo,
            reverb_volume: channel.reverb_volume,
            reverb_index: channel.reverb_index,
        };
        if player.muted && channel.mute_behavior.silences() {
            attributes.freq_ratio = 0.0;
            attributes.velocity = 0.0;
        }
        Some((attributes, channel.book_offset % 8))
    }
}
