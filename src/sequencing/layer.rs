use super::channel::{Channel, ChannelId};
use crate::{
    dsp::{
        envelope::EnvelopeShape,
        modulate::Portamento,
        pan::StereoFlags,
        wave::INHERIT_INSTRUMENT,
    },
    io::TunedSample,
    synth::voice::VoiceId,
};

/// Index of a note layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u16);

impl LayerId {
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteStatus {
    #[default]
    Idle,
    Playing,
    /// The instrument could not be resolved; the layer skips this note.
    Failed,
}

/// A logical note source inside a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub(crate) alive: bool,
    pub enabled: bool,
    pub channel: Option<ChannelId>,
    /// Last voice handed to this layer. May be stale once the voice moves on.
    pub voice: Option<VoiceId>,
    pub semitone: u8,
    pub freq_ratio: f32,
    pub velocity: f32,
    pub pan: u8,
    pub stereo: StereoFlags,
    /// Instrument or synthetic wave id; `INHERIT_INSTRUMENT` uses the channel's.
    pub instrument: u8,
    /// Overrides the channel envelope when its decay index is non-zero.
    pub envelope: Option<EnvelopeShape>,
    pub portamento: Portamento,
    pub tuned_sample: Option<TunedSample>,
    pub status: NoteStatus,
}

impl Layer {
    pub(crate) fn vacant() -> Self {
        Self {
            alive: false,
            enabled: false,
            channel: None,
            voice: None,
            semitone: 39,
            freq_ratio: 1.0,
            velocity: 1.0,
            pan: 64,
            stereo: StereoFlags::default(),
            instrument: INHERIT_INSTRUMENT,
            envelope: None,
            portamento: Portamento::default(),
            tuned_sample: None,
            status: NoteStatus::Idle,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// The envelope a voice bound to this layer plays.
    pub fn effective_envelope(&self, channel: &Channel) -> EnvelopeShape {
        match self.envelope {
            Some(shape) if shape.decay_index != 0 => shape,
            _ => channel.envelope,
        }
    }

    /// The instrument id after resolving inheritance.
    pub fn effective_instrument(&self, channel: &Channel) -> u8 {
        if self.instrument == INHERIT_INSTRUMENT {
            channel.instrument
        } else {
            self.instrument
        }
    }
}
