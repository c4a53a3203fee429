// Purpose: the physical voice record and the command queue feeding the engine

pub mod message;
pub mod voice;

pub use message::{EngineCommand, MessageReceiver};
pub use voice::{NoteAttributes, ReleasePhase, Voice, VoiceId, VoiceOutput};
