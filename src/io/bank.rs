//! Sample/instrument lookup interface.
//!
//! The engine never loads assets. It asks a [`SoundBank`] for an instrument or
//! drum and treats any [`AssetError`] as "not available this tick": the note is
//! marked failed and the layer may retry later. [`MemoryBank`] is a simple
//! in-memory bank with per-font load status for hosts and tests.

use crate::dsp::envelope::EnvelopeShape;
use crate::error::AssetError;

/// Semitone at which a tuned sample plays at its recorded pitch.
pub const ROOT_SEMITONE: u8 = 39;

/// Opaque handle to sample data owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SampleId(pub u32);

/// A sample plus the ratio that puts it in tune at the root semitone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunedSample {
    pub sample: SampleId,
    pub tuning: f32,
}

impl TunedSample {
    pub fn new(sample: SampleId, tuning: f32) -> Self {
        Self { sample, tuning }
    }

    /// Playback ratio for `semitone`, equal temperament around the root.
    pub fn pitch_ratio(&self, semitone: u8) -> f32 {
        self.tuning * semitone_ratio(semitone)
    }
}

/// Equal-tempered ratio of `semitone` relative to [`ROOT_SEMITONE`].
pub fn semitone_ratio(semitone: u8) -> f32 {
    let offset = f32::from(semitone) - f32::from(ROOT_SEMITONE);
    2.0_f32.powf(offset / 12.0)
}

/// A melodic instrument: three samples covering low, normal and high ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub normal_range_lo: u8,
    pub normal_range_hi: u8,
    pub low: TunedSample,
    pub normal: TunedSample,
    pub high: TunedSample,
    pub envelope: EnvelopeShape,
}

impl Instrument {
    /// One sample for the whole keyboard.
    pub fn single(sample: TunedSample, envelope: EnvelopeShape) -> Self {
        Self {
            normal_range_lo: 0,
            normal_range_hi: 127,
            low: sample,
            normal: sample,
            high: sample,
            envelope,
        }
    }

    pub fn tuned_sample(&self, semitone: u8) -> &TunedSample {
        if semitone < self.normal_range_lo {
            &self.low
        } else if semitone <= self.normal_range_hi {
            &self.normal
        } else {
            &self.high
        }
    }
}

/// A percussion entry: fixed sample, pan and envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Drum {
    pub tuned_sample: TunedSample,
    pub pan: u8,
    pub envelope: EnvelopeShape,
}

/// Lookup interface the engine consumes.
pub trait SoundBank {
    fn instrument(&self, font: u8, instrument: u8) -> Result<&Instrument, AssetError>;
    fn drum(&self, font: u8, drum: u8) -> Result<&Drum, AssetError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
}

/// One sound font inside a [`MemoryBank`].
#[derive(Debug, Clone, Default)]
pub struct Font {
    pub status: LoadStatus,
    pub instruments: Vec<Option<Instrument>>,
    pub drums: Vec<Option<Drum>>,
}

impl Font {
    pub fn loaded(instruments: Vec<Option<Instrument>>, drums: Vec<Option<Drum>>) -> Self {
        Self {
            status: LoadStatus::Loaded,
            instruments,
            drums,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBank {
    fonts: Vec<Font>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a font and return its id.
    pub fn add_font(&mut self, font: Font) -> u8 {
        self.fonts.push(font);
        (self.fonts.len() - 1) as u8
    }

    pub fn set_status(&mut self, font: u8, status: LoadStatus) {
        if let Some(entry) = self.fonts.get_mut(usize::from(font)) {
            entry.status = status;
        }
    }

    fn font(&self, font: u8) -> Result<&Font, AssetError> {
        let entry = self
            .fonts
            .get(usize::from(font))
            .ok_or(AssetError::BankMissing { font })?;
        if entry.status != LoadStatus::Loaded {
            return Err(AssetError::NotLoaded { font });
        }
        Ok(entry)
    }
}

impl SoundBank for MemoryBank {
    fn instrument(&self, font: u8, instrument: u8) -> Result<&Instrument, AssetError> {
        self.font(font)?
            .instruments
            .get(usize::from(instrument))
            .ok_or(AssetError::InstrumentOutOfRange { font, instrument })?
            .as_ref()
            .ok_or(AssetError::Empty {
                font,
                index: instrument,
            })
    }

    fn drum(&self, font: u8, drum: u8) -> Result<&Drum, AssetError> {
        self.font(font)?
            .drums
            .get(usize::from(drum))
            .ok_or(AssetError::DrumOutOfRange { font, drum })?
            .as_ref()
            .ok_or(AssetError::Empty { font, index: drum })
    }
}
