//! Pitch modifiers applied every tick: vibrato, portamento and the
//! fixed-point resampling rate the mixer consumes.

/*
Frequency Modifiers
===================

A voice's playback speed is a frequency *ratio* (1.0 plays the sample at its
recorded pitch). Modifiers multiply into it, they never add:

    ratio = layer_ratio × vibrato × portamento × output_resample_rate

Vocabulary
----------

  vibrato     A control-rate sine wobble around 1.0. `depth` is the peak
              deviation as a ratio (0.02 ≈ a third of a semitone), `rate` is
              the fraction of a cycle advanced per tick, and `delay_ticks`
              lets the note settle before the wobble starts.

  portamento  A glide into the note. It starts `extent` away from the target
              (1 + extent) and walks `cur` from 0 to 1 at `speed` per tick.

  two-part    The mixer's resampler handles ratios below 2.0 directly. For
              faster playback it processes the sample in two halves, so the
              stored rate is halved and a flag tells the mixer.
*/

use std::f32::consts::PI;

/// Upper bound the mixer's resampler accepts (just under 2.0 in Q15).
pub const MAX_RESAMPLE_RATIO: f32 = 1.99998;
const TWO_PART_LIMIT: f32 = 3.99996;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VibratoParams {
    pub rate: f32,
    pub depth: f32,
    pub delay_ticks: u16,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Vibrato {
    params: VibratoParams,
    phase: f32,
    delay: u16,
    active: bool,
}

impl Vibrato {
    /// Restart the vibrato for a freshly bound note.
    pub fn init(&mut self, params: VibratoParams) {
        self.params = params;
        self.phase = 0.0;
        self.delay = params.delay_ticks;
        self.active = params.depth != 0.0 && params.rate > 0.0;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    /// Advance one tick and return the frequency multiplier.
    pub fn update(&mut self) -> f32 {
        if !self.active {
            return 1.0;
        }
        if self.delay > 0 {
            self.delay -= 1;
            return 1.0;
        }
        self.phase = (self.phase + self.params.rate).fract();
        1.0 + self.params.depth * (self.phase * 2.0 * PI).sin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Portamento {
    /// Zero disables the glide.
    pub mode: u8,
    pub extent: f32,
    pub speed: f32,
    cur: f32,
}

impl Portamento {
    pub fn new(mode: u8, extent: f32, speed: f32) -> Self {
        Self {
            mode,
            extent,
            speed,
            cur: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.mode != 0
    }

    /// Extent the synthetic band selector should account for, if gliding.
    pub fn band_extent(&self) -> Option<f32> {
        self.is_active().then_some(self.extent)
    }

    pub fn restart(&mut self) {
        self.cur = 0.0;
    }

    /// Advance one tick and return the frequency multiplier.
    pub fn update(&mut self) -> f32 {
        if !self.is_active() {
            return 1.0;
        }
        self.cur = (self.cur + self.speed).min(1.0);
        1.0 + self.extent * (1.0 - self.cur)
    }
}

/// Q15 resampling rate plus the two-part flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResampleRate {
    pub fixed: i32,
    pub has_two_parts: bool,
}

/// Convert a frequency ratio into the mixer's fixed-point rate.
pub fn resample_rate(ratio: f32) -> ResampleRate {
    let (rate, has_two_parts) = if ratio < 2.0 {
        (ratio.min(MAX_RESAMPLE_RATIO), false)
    } else if ratio > TWO_PART_LIMIT {
        (MAX_RESAMPLE_RATIO, true)
    } else {
        (ratio * 0.5, true)
    };

    ResampleRate {
        fixed: (rate * 32768.0) as i32,
        has_two_parts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vibrato_waits_for_delay_then_wobbles() {
        let mut vibrato = Vibrato::default();
        vibrato.init(VibratoParams {
            rate: 0.25,
            depth: 0.1,
            delay_ticks: 2,
        });
        assert_eq!(vibrato.update(), 1.0);
        assert_eq!(vibrato.update(), 1.0);
        assert!((vibrato.update() - 1.1).abs() < 1e-5, "quarter cycle peaks");
        assert!((vibrato.update() - 1.0).abs() < 1e-5);
        assert!((vibrato.update() - 0.9).abs() < 1e-5);
    }

    #[test]
    fn inactive_modifiers_are_neutral() {
        let mut vibrato = Vibrato::default();
        let mut portamento = Portamento::default();
        assert_eq!(vibrato.update(), 1.0);
        assert_eq!(portamento.update(), 1.0);
        assert_eq!(portamento.band_extent(), None);
    }

    #[test]
    fn portamento_glides_into_target() {
        let mut glide = Portamento::new(1, 1.0, 0.5);
        assert!((glide.update() - 1.5).abs() < 1e-6);
        assert!((glide.update() - 1.0).abs() < 1e-6);
        assert!((glide.update() - 1.0).abs() < 1e-6, "stays on target");
    }

    #[test]
    fn resample_rate_switches_to_two_parts() {
        assert_eq!(
            resample_rate(1.0),
            ResampleRate {
                fixed: 32768,
                has_two_parts: false
            }
        );
        assert_eq!(resample_rate(1.999999).fixed, (MAX_RESAMPLE_RATIO * 32768.0) as i32);

        let fast = resample_rate(3.0);
        assert!(fast.has_two_parts);
        assert_eq!(fast.fixed, (1.5 * 32768.0) as i32);

        let too_fast = resample_rate(9.0);
        assert!(too_fast.has_two_parts);
        assert_eq!(too_fast.fixed, (MAX_RESAMPLE_RATIO * 32768.0) as i32);
    }
}
