//! Synthetic waveform tables and harmonic band selection.

/*
Synthetic Waveforms
===================

Instruments with an id of 128 or above are not sampled: they loop a short
procedurally generated table instead. A single 64-sample cycle would alias
badly when played fast, so each shape is stored in four harmonic bands:

    band   samples per period   cycles in the 64-sample window
    0      64                   1
    1      32                   2
    2      16                   4
    3      8                    8

Higher bands pack more cycles into the same window, so the resampler can play
them at a lower rate. The selector picks a band from the requested frequency
ratio and hands back a correction factor that keeps the pitch in tune:

    ratio < 1.0   band 0   × 1.0465
    ratio < 2.0   band 1   × 0.52325
    ratio < 4.0   band 2   × 0.26263
    otherwise     band 3   × 0.13081

(Each step halves, since the band doubles its cycles.)

Switching bands while a note is sounding would jump the playback cursor to a
different point in the cycle and click. `remap_sample_position` scales the
cursor by the ratio of the periods so the phase is preserved.
*/

use std::f32::consts::PI;

/// First wave id that selects a synthetic table.
pub const SYNTHETIC_WAVE_BASE: u8 = 128;
/// Layer instrument value meaning "use the channel's instrument".
pub const INHERIT_INSTRUMENT: u8 = 0xFF;

pub const HARMONIC_BANDS: usize = 4;
pub const WAVE_SHAPES: usize = 5;
pub const BAND_LEN: usize = 64;
pub const SAMPLES_PER_WAVE_PERIOD: [u32; HARMONIC_BANDS] = [64, 32, 16, 8];

const BAND_CORRECTION: [f32; HARMONIC_BANDS] = [1.0465, 0.52325, 0.26263, 0.13081];

/// Base shapes available as synthetic waves, in wave-id order from 128.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveShape {
    Sawtooth,
    Triangle,
    Sine,
    Square,
    Pulse,
}

impl WaveShape {
    pub const ALL: [WaveShape; WAVE_SHAPES] = [
        WaveShape::Sawtooth,
        WaveShape::Triangle,
        WaveShape::Sine,
        WaveShape::Square,
        WaveShape::Pulse,
    ];

    /// One cycle, phase in [0, 1).
    fn sample(self, phase: f32) -> f32 {
        match self {
            WaveShape::Sawtooth => 2.0 * phase - 1.0,
            WaveShape::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            WaveShape::Sine => (phase * 2.0 * PI).sin(),
            WaveShape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            WaveShape::Pulse => {
                if phase < 0.25 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Reference to one band of one synthetic table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveRef {
    pub table: u8,
    pub harmonic_index: u8,
}

impl WaveRef {
    /// Offset of the band inside its table.
    pub fn offset(&self) -> usize {
        usize::from(self.harmonic_index) * BAND_LEN
    }
}

/// Result of choosing a band for a frequency ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticWave {
    pub wave_id: u8,
    pub wave: WaveRef,
    /// Multiply the layer's frequency ratio by this to stay in tune.
    pub freq_scale: f32,
}

/// All synthetic tables, generated at startup.
#[derive(Debug, Clone)]
pub struct WaveTables {
    tables: [[i16; BAND_LEN * HARMONIC_BANDS]; WAVE_SHAPES],
}

impl WaveTables {
    pub fn new() -> Self {
        let mut tables = [[0; BAND_LEN * HARMONIC_BANDS]; WAVE_SHAPES];

        for (shape, table) in WaveShape::ALL.iter().zip(tables.iter_mut()) {
            for (band, period) in SAMPLES_PER_WAVE_PERIOD.iter().enumerate() {
                let period = *period as usize;
                for i in 0..BAND_LEN {
                    let phase = (i % period) as f32 / period as f32;
                    table[band * BAND_LEN + i] = (shape.sample(phase) * 32767.0) as i16;
                }
            }
        }

        Self { tables }
    }

    /// The 64 samples of one band. Out-of-range tables clamp to the last shape.
    pub fn band(&self, wave: WaveRef) -> &[i16] {
        let table = usize::from(wave.table).min(self.tables.len() - 1);
        let offset = wave.offset().min(BAND_LEN * (HARMONIC_BANDS - 1));
        &self.tables[table][offset..offset + BAND_LEN]
    }
}

impl Default for WaveTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the harmonic band for `freq_ratio`.
///
/// `portamento_extent` widens the ratio while a glide is active so the band
/// covers the whole slide.
pub fn select_synthetic_wave(
    wave_id: u8,
    freq_ratio: f32,
    portamento_extent: Option<f32>,
) -> SyntheticWave {
    let wave_id = wave_id.max(SYNTHETIC_WAVE_BASE);

    let mut ratio = freq_ratio;
    if let Some(extent) = portamento_extent.filter(|extent| *extent > 0.0) {
        ratio *= extent + 1.0;
    }

    let harmonic_index = if ratio < 1.0 {
        0
    } else if ratio < 2.0 {
        1
    } else if ratio < 4.0 {
        2
    } else {
        3
    };

    let table = (wave_id - SYNTHETIC_WAVE_BASE).min(WAVE_SHAPES as u8 - 1);

    SyntheticWave {
        wave_id,
        wave: WaveRef {
            table,
            harmonic_index,
        },
        freq_scale: BAND_CORRECTION[usize::from(harmonic_index)],
    }
}

/// Keep the cycle phase when a sounding voice moves between bands.
pub fn remap_sample_position(position: u32, from_band: u8, to_band: u8) -> u32 {
    let from = SAMPLES_PER_WAVE_PERIOD[usize::from(from_band).min(HARMONIC_BANDS - 1)];
    let to = SAMPLES_PER_WAVE_PERIOD[usize::from(to_band).min(HARMONIC_BANDS - 1)];
    position * to / from
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_follow_octave_ranges() {
        let band = |ratio| select_synthetic_wave(128, ratio, None).wave.harmonic_index;
        assert_eq!(band(0.5), 0);
        assert_eq!(band(0.999), 0);
        assert_eq!(band(1.0), 1);
        assert_eq!(band(3.99), 2);
        assert_eq!(band(4.0), 3);
        assert_eq!(band(100.0), 3);
    }

    #[test]
    fn correction_halves_per_band() {
        let wave = select_synthetic_wave(130, 2.5, None);
        assert_eq!(wave.wave.table, 2);
        assert_eq!(wave.freq_scale, 0.26263);
    }

    #[test]
    fn portamento_widens_selection() {
        let plain = select_synthetic_wave(128, 0.8, None);
        let gliding = select_synthetic_wave(128, 0.8, Some(1.0));
        assert_eq!(plain.wave.harmonic_index, 0);
        assert_eq!(gliding.wave.harmonic_index, 1);
    }

    #[test]
    fn low_wave_ids_clamp_to_first_table() {
        let wave = select_synthetic_wave(3, 0.5, None);
        assert_eq!(wave.wave_id, 128);
        assert_eq!(wave.wave.table, 0);
    }

    #[test]
    fn remap_preserves_phase() {
        // Halfway through a 64-sample period is halfway through an 8-sample one
        assert_eq!(remap_sample_position(32, 0, 3), 4);
        assert_eq!(remap_sample_position(4, 3, 0), 32);
        assert_eq!(remap_sample_position(10, 1, 1), 10);
    }

    #[test]
    fn higher_bands_repeat_the_cycle() {
        let tables = WaveTables::new();
        let band = tables.band(WaveRef {
            table: 0,
            harmonic_index: 3,
        });
        assert_eq!(band.len(), BAND_LEN);
        assert_eq!(band[0], band[8]);
        assert_eq!(band[3], band[59]);
    }
}
