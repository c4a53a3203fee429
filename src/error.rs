//! Error types for the edges of the engine.
//!
//! The realtime path never returns these: allocation and note-on report their
//! outcome through `Option`/outcome enums. Errors only surface from the sample
//! bank lookup (as a "not ready" sentinel the engine checks) and from loading
//! settings.

use thiserror::Error;

/// Why an instrument or drum could not be resolved from a sound bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("no sound bank registered for font {font}")]
    BankMissing { font: u8 },
    /// The font exists but is still loading (just-in-time loading).
    #[error("font {font} is not loaded yet")]
    NotLoaded { font: u8 },
    #[error("instrument {instrument} out of range for font {font}")]
    InstrumentOutOfRange { font: u8, instrument: u8 },
    #[error("drum {drum} out of range for font {font}")]
    DrumOutOfRange { font: u8, drum: u8 },
    /// The slot exists but holds nothing.
    #[error("font {font} slot {index} is empty")]
    Empty { font: u8, index: u8 },
}

impl AssetError {
    /// True when retrying later may succeed (the font is still arriving).
    pub fn is_transient(&self) -> bool {
        matches!(self, AssetError::NotLoaded { .. })
    }
}

/// A voice found in the wrong number of pool lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("voice {voice} is linked into {lists} lists")]
pub struct MembershipError {
    pub voice: u16,
    pub lists: usize,
}

/// Errors raised while loading [`crate::config::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error("failed to parse settings")]
    Parse(#[from] toml::de::Error),
    #[error("unknown sound mode `{0}`")]
    InvalidSoundMode(String),
}
