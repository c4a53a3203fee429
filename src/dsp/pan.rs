//! Per-voice channel gains: stereo, headset, mono and 5.1 surround routing.

/*
Spatializer
===========

Each tick every live voice turns (pan, velocity, stereo flags, role) into the
six gains the mixer applies: front left/right, rear left/right, center and LFE.

Vocabulary
----------

  pan         0..127. 0 is hard left, 64 is center, 127 is hard right.

  pan law     A lookup table of 128 gains. The left gain is `table[pan]` and
              the right gain is `table[127 - pan]`, so the law is symmetric by
              construction: left(p) == right(127 - p).

  strong pan  Two bits the mixer uses to hard-route a voice to one side. They
              are computed from the pan position (outer quarter of the range)
              and combined with explicit bits from the score according to a
              two-bit policy: 0 take explicit, 1 keep computed, 2 OR, 3 XOR.

  Haas delay  Headset mode simulates interaural delay: the ear further from
              the source hears the sound a few samples later. The delay pair
              comes from a 64-entry table indexed by `pan / 2`.

  role        Surround routing depends on what the voice is: dialogue goes to
              the center speaker, sound effects are placed by angle, music is
              spread front and rear.


Surround Placement
------------------

Sound effects map pan onto a full circle, `angle = pan / 128 * 2π`, and each
speaker gets `max(0, cos(angle - speaker_angle))`. Speaker angles come from
settings in degrees and are offset by -90° so that 0° is straight ahead.
Overlapping or unordered angles are accepted; gains simply clamp at zero.


Fixed-Point Output
------------------

The mixer consumes 12-bit gains:

    gain_fx = trunc(velocity * gain * 4095.999) * master_volume

with velocity clamped to [0, 1] first. LFE carries velocity alone. In
surround the voice also carries the subwoofer crossover from settings, clamped
to 10..1000 Hz, so the mixer knows which part of it belongs on the LFE feed.
*/

use std::f32::consts::PI;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::MixSettings;

pub const PAN_STEPS: usize = 128;
pub const HAAS_STEPS: usize = 64;
/// Widest interaural delay in samples.
pub const HAAS_MAX_DELAY: u16 = 32;
pub const MONO_GAIN: f32 = 0.707;
pub const GAIN_SCALE: f32 = 4095.999;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoundMode {
    #[default]
    Stereo,
    Headset,
    Surround,
    Mono,
}

impl SoundMode {
    pub const ALL: [SoundMode; 4] = [
        SoundMode::Stereo,
        SoundMode::Headset,
        SoundMode::Surround,
        SoundMode::Mono,
    ];

    pub fn index(self) -> i32 {
        match self {
            SoundMode::Stereo => 0,
            SoundMode::Headset => 1,
            SoundMode::Surround => 2,
            SoundMode::Mono => 3,
        }
    }

    /// Unknown indices fall back to stereo.
    pub fn from_index(index: i32) -> Self {
        match index {
            1 => SoundMode::Headset,
            2 => SoundMode::Surround,
            3 => SoundMode::Mono,
            _ => SoundMode::Stereo,
        }
    }

    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % 4)
    }

    /// Number of output channels the mixer renders in this mode.
    pub fn output_channels(self) -> usize {
        match self {
            SoundMode::Surround => 6,
            _ => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SoundMode::Stereo => "stereo",
            SoundMode::Headset => "headset",
            SoundMode::Surround => "surround",
            SoundMode::Mono => "mono",
        }
    }
}

impl FromStr for SoundMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundMode::ALL
            .into_iter()
            .find(|mode| mode.label().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// What kind of sound a voice carries; drives surround routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceRole {
    #[default]
    Music,
    SoundEffect,
    VoiceChat,
}

/// How explicit strong-pan bits combine with the ones computed from pan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrongPanPolicy {
    #[default]
    Override,
    Ignore,
    Or,
    Xor,
}

impl StrongPanPolicy {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => StrongPanPolicy::Override,
            1 => StrongPanPolicy::Ignore,
            2 => StrongPanPolicy::Or,
            _ => StrongPanPolicy::Xor,
        }
    }

    fn combine(self, explicit: bool, computed: bool) -> bool {
        match self {
            StrongPanPolicy::Override => explicit,
            StrongPanPolicy::Ignore => computed,
            StrongPanPolicy::Or => explicit | computed,
            StrongPanPolicy::Xor => explicit ^ computed,
        }
    }
}

/// Stereo bits carried by a layer: strong left/right plus the combine policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StereoFlags {
    pub strong_left: bool,
    pub strong_right: bool,
    pub policy: StrongPanPolicy,
}

impl StereoFlags {
    /// Decode the packed score byte: bit 0 left, bit 1 right, bits 2-3 policy.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            strong_left: bits & 1 != 0,
            strong_right: bits & 2 != 0,
            policy: StrongPanPolicy::from_bits(bits >> 2),
        }
    }
}

/// Speaker azimuths in radians, already offset so 0 is straight ahead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeakerLayout {
    pub front_left: f32,
    pub front_right: f32,
    pub rear_left: f32,
    pub rear_right: f32,
}

impl SpeakerLayout {
    pub fn from_degrees(front_left: i32, front_right: i32, rear_left: i32, rear_right: i32) -> Self {
        let to_rad = |deg: i32| (deg - 90) as f32 * (PI / 180.0);
        Self {
            front_left: to_rad(front_left),
            front_right: to_rad(front_right),
            rear_left: to_rad(rear_left),
            rear_right: to_rad(rear_right),
        }
    }
}

/// Pan laws and the Haas delay table, built once at startup.
#[derive(Debug, Clone)]
pub struct PanTables {
    default: [f32; PAN_STEPS],
    stereo: [f32; PAN_STEPS],
    headset: [f32; PAN_STEPS],
    haas_delays: [u16; HAAS_STEPS],
}

impl PanTables {
    pub fn new() -> Self {
        let mut default = [0.0; PAN_STEPS];
        let mut stereo = [0.0; PAN_STEPS];
        let mut headset = [0.0; PAN_STEPS];
        let last = (PAN_STEPS - 1) as f32;

        for i in 0..PAN_STEPS {
            let x = i as f32 / last;
            default[i] = (x * PI * 0.5).cos().max(0.0);
            stereo[i] = (1.0 - x).max(0.0).sqrt();
            headset[i] = 1.0 - x;
        }

        let mut haas_delays = [0; HAAS_STEPS];
        let steps = (HAAS_STEPS - 1) as u32;
        for (i, delay) in haas_delays.iter_mut().enumerate() {
            // Decreasing: pan hard left delays the right ear the most
            *delay = ((steps - i as u32) * u32::from(HAAS_MAX_DELAY) / steps) as u16;
        }

        Self {
            default,
            stereo,
            headset,
            haas_delays,
        }
    }

    pub fn stereo_pair(&self, pan: u8) -> (f32, f32) {
        pair(&self.stereo, pan)
    }

    pub fn default_pair(&self, pan: u8) -> (f32, f32) {
        pair(&self.default, pan)
    }

    pub fn headset_pair(&self, pan: u8) -> (f32, f32) {
        pair(&self.headset, pan)
    }

    /// (left, right) delay sizes in samples.
    pub fn haas_pair(&self, pan: u8) -> (u16, u16) {
        let index = usize::from(pan >> 1).min(HAAS_STEPS - 1);
        (
            self.haas_delays[HAAS_STEPS - 1 - index],
            self.haas_delays[index],
        )
    }
}

impl Default for PanTables {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn pair(table: &[f32; PAN_STEPS], pan: u8) -> (f32, f32) {
    let pan = usize::from(pan) % PAN_STEPS;
    (table[pan], table[PAN_STEPS - 1 - pan])
}

/// Everything the spatializer needs to know about one voice this tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanInput {
    pub pan: u8,
    pub velocity: f32,
    pub stereo: StereoFlags,
    pub role: VoiceRole,
    /// Channel opted into headset/stereo effects.
    pub headset_effects: bool,
}

/// Fixed-point gains and routing bits handed to the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelGains {
    pub left: u16,
    pub right: u16,
    pub rear_left: u16,
    pub rear_right: u16,
    pub center: u16,
    pub lfe: u16,
    /// Crossover below which the mixer routes this voice to LFE. Zero outside surround.
    pub lfe_cutoff_hz: u16,
    pub strong_left: bool,
    pub strong_right: bool,
    pub uses_headset_effects: bool,
    pub left_delay: u16,
    pub right_delay: u16,
}

#[derive(Debug, Clone, Copy, Default)]
struct Gains {
    left: f32,
    right: f32,
    rear_left: f32,
    rear_right: f32,
    center: f32,
}

/// Compute the six channel gains for one voice.
pub fn spatialize(tables: &PanTables, input: &PanInput, mix: &MixSettings) -> ChannelGains {
    let mut out = ChannelGains::default();
    let mut gains = Gains::default();

    if mix.sound_mode.output_channels() == 2 {
        let pan = input.pan % PAN_STEPS as u8;

        if input.headset_effects && mix.sound_mode == SoundMode::Headset {
            let (left_delay, right_delay) = tables.haas_pair(pan);
            out.left_delay = left_delay;
            out.right_delay = right_delay;
            out.uses_headset_effects = true;
            (gains.left, gains.right) = tables.headset_pair(pan);
        } else if input.headset_effects && mix.sound_mode == SoundMode::Stereo {
            (gains.left, gains.right) = tables.stereo_pair(pan);

            let computed_left = pan < 32;
            let computed_right = pan > 96;
            let policy = input.stereo.policy;
            out.strong_left = policy.combine(input.stereo.strong_left, computed_left);
            out.strong_right = policy.combine(input.stereo.strong_right, computed_right);
        } else if mix.sound_mode == SoundMode::Mono {
            gains.left = MONO_GAIN;
            gains.right = MONO_GAIN;
        } else {
            (gains.left, gains.right) = tables.default_pair(pan);
        }
    } else {
        out.lfe_cutoff_hz = mix.subwoofer_threshold_hz.clamp(10, 1000) as u16;
        match input.role {
            VoiceRole::VoiceChat => gains.center = 1.0,
            VoiceRole::SoundEffect => {
                let angle = f32::from(input.pan) / 128.0 * 2.0 * PI;
                let speakers = &mix.speakers;
                let cosine = |speaker: f32| (angle - speaker).cos().max(0.0);
                gains.left = cosine(speakers.front_left);
                gains.right = cosine(speakers.front_right);
                gains.rear_left = cosine(speakers.rear_left);
                gains.rear_right = cosine(speakers.rear_right);
            }
            VoiceRole::Music => {
                let (left, right) = tables.stereo_pair(input.pan);
                gains.left = left;
                gains.right = right;
                gains.rear_left = left * mix.rear_music_volume;
                gains.rear_right = right * mix.rear_music_volume;
            }
        }
    }

    let velocity = input.velocity.clamp(0.0, 1.0);
    let master = mix.master_volume;
    out.left = to_fixed(velocity, gains.left, master);
    out.right = to_fixed(velocity, gains.right, master);
    out.rear_left = to_fixed(velocity, gains.rear_left, master);
    out.rear_right = to_fixed(velocity, gains.rear_right, master);
    out.center = to_fixed(velocity, gains.center, master);
    out.lfe = to_fixed(velocity, 1.0, master);
    out
}

#[inline]
fn to_fixed(velocity: f32, gain: f32, master: f32) -> u16 {
    let scaled = (velocity * gain * GAIN_SCALE) as i32;
    (scaled as f32 * master).clamp(0.0, 4095.0) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mix(mode: SoundMode) -> MixSettings {
        MixSettings {
            sound_mode: mode,
            ..MixSettings::default()
        }
    }

    fn input(pan: u8) -> PanInput {
        PanInput {
            pan,
            velocity: 1.0,
            ..PanInput::default()
        }
    }

    #[test]
    fn mono_ignores_pan() {
        let tables = PanTables::new();
        let hard_left = spatialize(&tables, &input(0), &mix(SoundMode::Mono));
        let hard_right = spatialize(&tables, &input(127), &mix(SoundMode::Mono));

        let expected = (MONO_GAIN * GAIN_SCALE) as u16;
        assert_eq!(hard_left.left, expected);
        assert_eq!(hard_left.right, expected);
        assert_eq!(hard_left, hard_right);
    }

    #[test]
    fn stereo_laws_are_mirror_symmetric() {
        let tables = PanTables::new();
        for pan in 0..PAN_STEPS as u8 {
            let mirror = 127 - pan;
            assert_eq!(tables.stereo_pair(pan).0, tables.stereo_pair(mirror).1);
            assert_eq!(tables.default_pair(pan).0, tables.default_pair(mirror).1);
            assert_eq!(tables.headset_pair(pan).0, tables.headset_pair(mirror).1);
        }
    }

    #[test]
    fn strong_pan_policy_truth_table() {
        let tables = PanTables::new();
        let stereo = mix(SoundMode::Stereo);
        let case = |pan: u8, bits: u8| {
            let voice = PanInput {
                stereo: StereoFlags::from_bits(bits),
                headset_effects: true,
                ..input(pan)
            };
            let out = spatialize(&tables, &voice, &stereo);
            (out.strong_left, out.strong_right)
        };

        // pan 10 computes strong-left; explicit bits set strong-right
        assert_eq!(case(10, 0b00_10), (false, true), "override takes explicit");
        assert_eq!(case(10, 0b01_10), (true, false), "ignore keeps computed");
        assert_eq!(case(10, 0b10_10), (true, true), "or merges");
        assert_eq!(case(10, 0b11_11), (false, true), "xor toggles");
        assert_eq!(case(64, 0b01_11), (false, false), "center computes nothing");
    }

    #[test]
    fn headset_sets_haas_delays_and_clears_strong_bits() {
        let tables = PanTables::new();
        let voice = PanInput {
            stereo: StereoFlags::from_bits(0b11),
            headset_effects: true,
            ..input(0)
        };
        let out = spatialize(&tables, &voice, &mix(SoundMode::Headset));
        assert!(out.uses_headset_effects);
        assert!(!out.strong_left && !out.strong_right);
        assert_eq!(out.left_delay, 0);
        assert_eq!(out.right_delay, HAAS_MAX_DELAY);
        assert!(out.left > out.right);
    }

    #[test]
    fn surround_routes_by_role() {
        let tables = PanTables::new();
        let surround = mix(SoundMode::Surround);

        let dialogue = PanInput {
            role: VoiceRole::VoiceChat,
            ..input(20)
        };
        let out = spatialize(&tables, &dialogue, &surround);
        assert_eq!(out.center, 4095);
        assert_eq!((out.left, out.right, out.rear_left, out.rear_right), (0, 0, 0, 0));

        let music = spatialize(&tables, &input(0), &surround);
        assert_eq!(music.left, music.rear_left);
        assert_eq!(music.center, 0);

        // Pan 75 sits at ~211°, on top of the default front-right speaker
        // (300° - 90° = 210°).
        let effect = PanInput {
            role: VoiceRole::SoundEffect,
            ..input(75)
        };
        let out = spatialize(&tables, &effect, &surround);
        assert!(out.right > out.left);
        assert!(out.right > 3000);
    }

    #[test]
    fn subwoofer_crossover_only_in_surround() {
        let tables = PanTables::new();
        let stereo = spatialize(&tables, &input(64), &mix(SoundMode::Stereo));
        assert_eq!(stereo.lfe_cutoff_hz, 0);

        let surround = spatialize(&tables, &input(64), &mix(SoundMode::Surround));
        assert_eq!(surround.lfe_cutoff_hz, 80);

        let wild = MixSettings {
            subwoofer_threshold_hz: 5000,
            ..mix(SoundMode::Surround)
        };
        assert_eq!(spatialize(&tables, &input(64), &wild).lfe_cutoff_hz, 1000);
    }

    #[test]
    fn velocity_and_master_scale_gains() {
        let tables = PanTables::new();
        let loud = PanInput {
            velocity: 3.0,
            ..input(64)
        };
        let clamped = spatialize(&tables, &loud, &mix(SoundMode::Stereo));
        assert_eq!(clamped.lfe, 4095);

        let half = MixSettings {
            master_volume: 0.5,
            ..mix(SoundMode::Stereo)
        };
        let out = spatialize(&tables, &input(64), &half);
        assert_eq!(out.lfe, 2047);
    }
}
