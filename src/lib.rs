pub mod config; // Knobs read from the host's settings store
pub mod dsp; // Envelope, panning, modulation and wave tables
pub mod engine; // Voice pools, allocation and the tick scheduler
pub mod error;
pub mod io; // Sample bank lookup
pub mod sequencing; // Players, channels and layers the engine serves
pub mod synth; // Voice records and the command queue

pub use config::{MixSettings, Settings, SettingsSource};
pub use engine::{AudioEngine, BufferParams, EngineConfig, NoteOn, NoteOnOutcome};
