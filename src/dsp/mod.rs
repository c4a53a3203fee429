//! Per-voice signal math evaluated by the tick scheduler.
//!
//! These components are allocation-free and realtime-safe: tables are built
//! once at startup and every per-tick function works on `Copy` state embedded
//! directly in the voice.

/// Tick-driven ADSR envelope.
pub mod envelope;
/// Vibrato, portamento and fixed-point resampling rate.
pub mod modulate;
/// Stereo, headset, mono and surround channel gains.
pub mod pan;
/// Synthetic waveform tables and harmonic band selection.
pub mod wave;

pub use envelope::{Envelope, EnvelopeShape, EnvelopeState};
pub use pan::{ChannelGains, PanTables, SoundMode, StereoFlags, VoiceRole};
pub use wave::{WaveRef, WaveTables};
