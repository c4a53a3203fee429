#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::{
    engine::pool::PoolId,
    sequencing::{ChannelId, LayerId, PlayerId},
};

/// Requests a control thread can queue for the audio thread.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum EngineCommand {
    NoteOn {
        layer: LayerId,
        semitone: u8,
        velocity: f32,
        pan: u8,
    },
    NoteOff {
        layer: LayerId,
    },
    SetMuted {
        player: PlayerId,
        muted: bool,
    },
    ResetPool {
        pool: PoolId,
        count: u16,
    },
    DisableChannel {
        channel: ChannelId,
    },
    AllNotesOff,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<EngineCommand>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<EngineCommand> {
    fn pop(&mut self) -> Option<EngineCommand> {
        Consumer::pop(self).ok()
    }
}
