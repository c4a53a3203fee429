use super::player::PlayerId;
use crate::{
    dsp::{envelope::EnvelopeShape, modulate::VibratoParams, pan::VoiceRole},
    engine::{allocator::AllocPolicy, pool::PoolId},
};

/// Index of a sequence channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u16);

impl ChannelId {
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// What a channel does while its player is muted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteBehavior(pub u8);

impl MuteBehavior {
    /// Force-release sounding notes.
    pub const STOP_NOTES: u8 = 0x40;
    /// Keep notes bound but render them at zero pitch and volume.
    pub const SILENCE: u8 = 0x08;

    pub fn stops_notes(self) -> bool {
        self.0 & Self::STOP_NOTES != 0
    }

    pub fn silences(self) -> bool {
        self.0 & Self::SILENCE != 0
    }
}

impl Default for MuteBehavior {
    fn default() -> Self {
        MuteBehavior(Self::STOP_NOTES | Self::SILENCE)
    }
}

/// A sequence channel: instrument, priority and allocation settings shared by its layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub(crate) alive: bool,
    pub enabled: bool,
    pub player: Option<PlayerId>,
    /// Priority new notes get. Higher steals lower.
    pub note_priority: u8,
    pub alloc_policy: AllocPolicy,
    pub mute_behavior: MuteBehavior,
    pub role: VoiceRole,
    pub envelope: EnvelopeShape,
    pub vibrato: VibratoParams,
    pub font: u8,
    /// Instrument (or synthetic wave id) layers inherit.
    pub instrument: u8,
    /// Notes resolve through the font's drum table by semitone.
    pub drums: bool,
    pub headset_effects: bool,
    pub reverb_volume: u8,
    pub reverb_index: u8,
    pub book_offset: u8,
    pub(crate) pool: PoolId,
}

impl Channel {
    pub(crate) fn vacant(pool: PoolId) -> Self {
        Self {
            alive: false,
            enabled: false,
            player: None,
            note_priority: 3,
            alloc_policy: AllocPolicy::default(),
            mute_behavior: MuteBehavior::default(),
            role: VoiceRole::Music,
            envelope: EnvelopeShape::default(),
            vibrato: VibratoParams::default(),
            font: 0,
            instrument: 0,
            drums: false,
            headset_effects: false,
            reverb_volume: 0,
            reverb_index: 0,
            book_offset: 0,
            pool,
        }
    }

    pub fn pool(&self) -> PoolId {
        self.pool
    }
}
