//! Settings consumed by the engine.
//!
//! The engine does not own its configuration. It reads knobs from a
//! [`SettingsSource`] (an external key/value store in the host) at the start of
//! every tick, so a change made by a settings menu is heard on the next tick.
//! [`Settings`] is a ready-made source that can be loaded from TOML.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::pan::{SoundMode, SpeakerLayout, VoiceRole};
use crate::error::ConfigError;

/// Keys understood by the engine.
pub mod keys {
    pub const MASTER_VOLUME: &str = "master_volume";
    pub const MUSIC_VOLUME: &str = "music_volume";
    pub const VOICE_VOLUME: &str = "voice_volume";
    pub const SFX_VOLUME: &str = "sfx_volume";
    pub const SOUND_MODE: &str = "sound_mode";
    pub const REAR_MUSIC_VOLUME: &str = "rear_music_volume";
    pub const SPEAKER_FRONT_LEFT: &str = "speaker_front_left";
    pub const SPEAKER_FRONT_RIGHT: &str = "speaker_front_right";
    pub const SPEAKER_REAR_LEFT: &str = "speaker_rear_left";
    pub const SPEAKER_REAR_RIGHT: &str = "speaker_rear_right";
    pub const SUBWOOFER_THRESHOLD_HZ: &str = "subwoofer_threshold_hz";
}

/// External key/value store the engine reads its knobs from.
///
/// Lookups must not allocate or block; they run inside the audio callback.
pub trait SettingsSource {
    fn get_float(&self, key: &str, default: f32) -> f32;
    fn get_int(&self, key: &str, default: i32) -> i32;
}

/// A flat settings record that doubles as a [`SettingsSource`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub master_volume: f32,
    pub music_volume: f32,
    pub voice_volume: f32,
    pub sfx_volume: f32,
    pub sound_mode: SoundMode,
    pub rear_music_volume: f32,
    /// Speaker placement in degrees, clockwise.
    pub speaker_front_left: i32,
    pub speaker_front_right: i32,
    pub speaker_rear_left: i32,
    pub speaker_rear_right: i32,
    pub subwoofer_threshold_hz: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            music_volume: 1.0,
            voice_volume: 1.0,
            sfx_volume: 1.0,
            sound_mode: SoundMode::Stereo,
            rear_music_volume: 1.0,
            speaker_front_left: 240,
            speaker_front_right: 300,
            speaker_rear_left: 160,
            speaker_rear_right: 20,
            subwoofer_threshold_hz: 80,
        }
    }
}

impl Settings {
    /// Parse settings from a TOML document. Missing keys keep their defaults.
    #[cfg(feature = "serde")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file.
    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Set the sound mode from its menu name (`stereo`, `headset`, `surround`, `mono`).
    pub fn set_sound_mode_by_name(&mut self, name: &str) -> Result<(), ConfigError> {
        self.sound_mode = name
            .parse()
            .map_err(|_| ConfigError::InvalidSoundMode(name.to_string()))?;
        Ok(())
    }
}

impl SettingsSource for Settings {
    fn get_float(&self, key: &str, default: f32) -> f32 {
        match key {
            keys::MASTER_VOLUME => self.master_volume,
            keys::MUSIC_VOLUME => self.music_volume,
            keys::VOICE_VOLUME => self.voice_volume,
            keys::SFX_VOLUME => self.sfx_volume,
            keys::REAR_MUSIC_VOLUME => self.rear_music_volume,
            _ => default,
        }
    }

    fn get_int(&self, key: &str, default: i32) -> i32 {
        match key {
            keys::SOUND_MODE => self.sound_mode.index(),
            keys::SPEAKER_FRONT_LEFT => self.speaker_front_left,
            keys::SPEAKER_FRONT_RIGHT => self.speaker_front_right,
            keys::SPEAKER_REAR_LEFT => self.speaker_rear_left,
            keys::SPEAKER_REAR_RIGHT => self.speaker_rear_right,
            keys::SUBWOOFER_THRESHOLD_HZ => self.subwoofer_threshold_hz,
            _ => default,
        }
    }
}

/// Typed view of the knobs one tick needs, read fresh from a [`SettingsSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixSettings {
    pub master_volume: f32,
    pub music_volume: f32,
    pub voice_volume: f32,
    pub sfx_volume: f32,
    pub sound_mode: SoundMode,
    pub rear_music_volume: f32,
    pub speakers: SpeakerLayout,
    pub subwoofer_threshold_hz: i32,
}

impl MixSettings {
    pub fn read(source: &dyn SettingsSource) -> Self {
        let defaults = Settings::default();
        let mode = source.get_int(keys::SOUND_MODE, defaults.sound_mode.index());

        Self {
            master_volume: source.get_float(keys::MASTER_VOLUME, defaults.master_volume),
            music_volume: source.get_float(keys::MUSIC_VOLUME, defaults.music_volume),
            voice_volume: source.get_float(keys::VOICE_VOLUME, defaults.voice_volume),
            sfx_volume: source.get_float(keys::SFX_VOLUME, defaults.sfx_volume),
            sound_mode: SoundMode::from_index(mode),
            rear_music_volume: source
                .get_float(keys::REAR_MUSIC_VOLUME, defaults.rear_music_volume),
            speakers: SpeakerLayout::from_degrees(
                source.get_int(keys::SPEAKER_FRONT_LEFT, defaults.speaker_front_left),
                source.get_int(keys::SPEAKER_FRONT_RIGHT, defaults.speaker_front_right),
                source.get_int(keys::SPEAKER_REAR_LEFT, defaults.speaker_rear_left),
                source.get_int(keys::SPEAKER_REAR_RIGHT, defaults.speaker_rear_right),
            ),
            subwoofer_threshold_hz: source
                .get_int(keys::SUBWOOFER_THRESHOLD_HZ, defaults.subwoofer_threshold_hz),
        }
    }

    /// Volume scalar for the category a voice belongs to.
    pub fn category_volume(&self, role: VoiceRole) -> f32 {
        match role {
            VoiceRole::Music => self.music_volume,
            VoiceRole::SoundEffect => self.sfx_volume,
            VoiceRole::VoiceChat => self.voice_volume,
        }
    }
}

impl Default for MixSettings {
    fn default() -> Self {
        Self::read(&Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;

    impl SettingsSource for Empty {
        fn get_float(&self, _key: &str, default: f32) -> f32 {
            default
        }
        fn get_int(&self, _key: &str, default: i32) -> i32 {
            default
        }
    }

    #[test]
    fn empty_store_yields_defaults() {
        let view = MixSettings::read(&Empty);
        assert_eq!(view, MixSettings::default());
        assert_eq!(view.sound_mode, SoundMode::Stereo);
        assert_eq!(view.subwoofer_threshold_hz, 80);
    }

    #[test]
    fn store_values_flow_into_view() {
        let settings = Settings {
            master_volume: 0.5,
            sound_mode: SoundMode::Surround,
            speaker_rear_right: 45,
            ..Settings::default()
        };
        let view = MixSettings::read(&settings);
        assert_eq!(view.master_volume, 0.5);
        assert_eq!(view.sound_mode, SoundMode::Surround);
        assert_eq!(view.speakers, SpeakerLayout::from_degrees(240, 300, 160, 45));
    }

    #[test]
    fn unknown_sound_mode_name_is_rejected() {
        let mut settings = Settings::default();
        assert!(settings.set_sound_mode_by_name("quadraphonic").is_err());
        settings.set_sound_mode_by_name("headset").unwrap();
        assert_eq!(settings.sound_mode, SoundMode::Headset);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn toml_overrides_only_named_keys() {
        let settings = Settings::from_toml_str(
            "master_volume = 0.25\nsound_mode = \"mono\"\nspeaker_front_left = 200\n",
        )
        .unwrap();
        assert_eq!(settings.master_volume, 0.25);
        assert_eq!(settings.sound_mode, SoundMode::Mono);
        assert_eq!(settings.speaker_front_left, 200);
        assert_eq!(settings.rear_music_volume, 1.0);
    }
}
