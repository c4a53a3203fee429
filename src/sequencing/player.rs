use crate::engine::pool::PoolId;

/// Index of a sequence player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u8);

impl PlayerId {
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// A sequence player: owns channels and a voice pool shared between them.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqPlayer {
    pub(crate) alive: bool,
    pub enabled: bool,
    /// Channels react according to their own mute behavior.
    pub muted: bool,
    pub(crate) pool: PoolId,
}

impl SeqPlayer {
    pub(crate) fn vacant(pool: PoolId) -> Self {
        Self {
            alive: false,
            enabled: false,
            muted: false,
            pool,
        }
    }

    pub fn pool(&self) -> PoolId {
        self.pool
    }
}
