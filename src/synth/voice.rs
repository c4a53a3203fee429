use crate::{
    dsp::{
        envelope::Envelope,
        modulate::{Portamento, ResampleRate, Vibrato},
        pan::{ChannelGains, StereoFlags, VoiceRole},
        wave::WaveRef,
    },
    io::SampleId,
    sequencing::LayerId,
};

/// Index of a voice in the engine's fixed voice array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u16);

impl VoiceId {
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// How far a voice is through being released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePhase {
    /// Bound and playing, or idle.
    #[default]
    None,
    /// Natural note-off: fading with the instrument's decay.
    NoteOff,
    /// Forced: fading at the fixed fast velocity.
    Takeover,
}

/// Attributes sampled from the owning layer. Frozen once the voice is released.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NoteAttributes {
    pub freq_ratio: f32,
    pub velocity: f32,
    pub pan: u8,
    pub stereo: StereoFlags,
    pub reverb_volume: u8,
    pub reverb_index: u8,
}

/// Per-voice record consumed by the mixer. Rewritten every tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VoiceOutput {
    pub enabled: bool,
    pub resample: ResampleRate,
    pub gains: ChannelGains,
    pub reverb_volume: u8,
    pub reverb_index: u8,
    /// Sampled instrument data, if any.
    pub sample: Option<SampleId>,
    /// Synthetic wave band, if the voice plays a generated table.
    pub wave: Option<WaveRef>,
    pub book_offset: u8,
}

/// One physical voice.
///
/// Which list the voice sits in (disabled/decaying/releasing/active) is owned
/// by the pool, not stored here.
#[derive(Debug, Clone, Default)]
pub struct Voice {
    pub(crate) parent: Option<LayerId>,
    pub(crate) wanted: Option<LayerId>,
    pub(crate) previous: Option<LayerId>,
    pub(crate) priority: u8,
    pub(crate) release: ReleasePhase,
    /// The mixer or a mute asked for this voice to stop right away.
    pub(crate) finished: bool,
    pub(crate) envelope: Envelope,
    pub(crate) vibrato: Vibrato,
    pub(crate) portamento: Portamento,
    pub(crate) attributes: NoteAttributes,
    pub(crate) wave_id: u8,
    pub(crate) harmonic_index: u8,
    pub(crate) sample_position: u32,
    pub(crate) font: u8,
    pub(crate) headset_effects: bool,
    pub(crate) role: VoiceRole,
    pub(crate) output: VoiceOutput,
}

impl Voice {
    /// Return to the idle state. List membership is handled by the caller.
    pub(crate) fn disable(&mut self) {
        self.priority = 0;
        self.release = ReleasePhase::None;
        self.parent = None;
        self.previous = None;
        self.finished = false;
        self.envelope.disable();
        self.vibrato.stop();
        self.output = VoiceOutput::default();
    }

    /// Layer currently driving this voice.
    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    /// Layer waiting to take the voice over once the current fade ends.
    pub fn pending(&self) -> Option<LayerId> {
        self.wanted
    }

    /// Last layer that released this voice.
    pub fn previous(&self) -> Option<LayerId> {
        self.previous
    }

    /// Zero means unbound.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn release_phase(&self) -> ReleasePhase {
        self.release
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn attributes(&self) -> &NoteAttributes {
        &self.attributes
    }

    pub fn output(&self) -> &VoiceOutput {
        &self.output
    }

    pub fn wave_id(&self) -> u8 {
        self.wave_id
    }

    pub fn harmonic_index(&self) -> u8 {
        self.harmonic_index
    }

    pub fn sample_position(&self) -> u32 {
        self.sample_position
    }

    pub fn font(&self) -> u8 {
        self.font
    }

    /// True when nothing owns the voice and it has no fade in flight.
    pub fn is_idle(&self) -> bool {
        self.priority == 0 && self.parent.is_none() && self.wanted.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::envelope::{EnvelopeShape, EnvelopeState};

    #[test]
    fn disable_clears_ownership_and_output() {
        let mut voice = Voice {
            parent: Some(LayerId(3)),
            previous: Some(LayerId(1)),
            priority: 7,
            release: ReleasePhase::NoteOff,
            finished: true,
            ..Voice::default()
        };
        voice.envelope.init(EnvelopeShape::default());
        voice.output.enabled = true;

        voice.disable();

        assert!(voice.is_idle());
        assert_eq!(voice.previous(), None);
        assert_eq!(voice.release_phase(), ReleasePhase::None);
        assert_eq!(voice.envelope().state(), EnvelopeState::Disabled);
        assert!(!voice.output().enabled);
    }

    #[test]
    fn disable_keeps_pending_owner() {
        let mut voice = Voice {
            wanted: Some(LayerId(2)),
            ..Voice::default()
        };
        voice.disable();
        assert_eq!(voice.pending(), Some(LayerId(2)));
    }
}
