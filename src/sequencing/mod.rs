//! Sequence-side collaborators the voice engine serves.
//!
//! Players own channels, channels own layers, and a layer is one logical note
//! source. All three live in a fixed [`Sequences`] arena and are addressed by
//! index so voices can keep weak references to them without borrowing.
//!
//! The teardown functions here drop sequence-side state only and never touch
//! voices. A voice still pointing at a freed layer notices on the next engine
//! tick and fades itself out. Use the engine's note-off/disable calls when
//! voices should be released right away.

pub mod channel;
pub mod layer;
pub mod player;

pub use channel::{Channel, ChannelId, MuteBehavior};
pub use layer::{Layer, LayerId, NoteStatus};
pub use player::{PlayerId, SeqPlayer};

use crate::engine::pool::PoolId;
use tracing::trace;

/// How many of each object the arena can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCapacity {
    pub players: usize,
    pub channels: usize,
    pub layers: usize,
}

impl Default for SequenceCapacity {
    fn default() -> Self {
        Self {
            players: 4,
            channels: 64,
            layers: 256,
        }
    }
}

impl SequenceCapacity {
    /// Global pool plus one per player and one per channel.
    pub fn pool_count(&self) -> usize {
        1 + self.players + self.channels
    }

    pub fn player_pool(&self, player: PlayerId) -> PoolId {
        PoolId((1 + player.index()) as u16)
    }

    pub fn channel_pool(&self, channel: ChannelId) -> PoolId {
        PoolId((1 + self.players + channel.index()) as u16)
    }
}

#[derive(Debug, Clone)]
pub struct Sequences {
    capacity: SequenceCapacity,
    players: Vec<SeqPlayer>,
    channels: Vec<Channel>,
    layers: Vec<Layer>,
}

impl Sequences {
    pub fn new(capacity: SequenceCapacity) -> Self {
        let players = (0..capacity.players)
            .map(|i| SeqPlayer::vacant(capacity.player_pool(PlayerId(i as u8))))
            .collect();
        let channels = (0..capacity.channels)
            .map(|i| Channel::vacant(capacity.channel_pool(ChannelId(i as u16))))
            .collect();
        let layers = (0..capacity.layers).map(|_| Layer::vacant()).collect();

        Self {
            capacity,
            players,
            channels,
            layers,
        }
    }

    pub fn capacity(&self) -> SequenceCapacity {
        self.capacity
    }

    /// Claim a free player slot.
    pub fn add_player(&mut self) -> Option<PlayerId> {
        let index = self.players.iter().position(|p| !p.alive)?;
        let player = &mut self.players[index];
        *player = SeqPlayer::vacant(player.pool);
        player.alive = true;
        player.enabled = true;
        Some(PlayerId(index as u8))
    }

    /// Claim a free channel slot under `player`.
    pub fn add_channel(&mut self, player: PlayerId) -> Option<ChannelId> {
        self.player(player)?;
        let index = self.channels.iter().position(|c| !c.alive)?;
        let channel = &mut self.channels[index];
        *channel = Channel::vacant(channel.pool);
        channel.alive = true;
        channel.enabled = true;
        channel.player = Some(player);
        Some(ChannelId(index as u16))
    }

    /// Claim a free layer slot under `channel`.
    pub fn add_layer(&mut self, channel: ChannelId) -> Option<LayerId> {
        self.channel(channel)?;
        let index = self.layers.iter().position(|l| !l.alive)?;
        let layer = &mut self.layers[index];
        *layer = Layer::vacant();
        layer.alive = true;
        layer.enabled = true;
        layer.channel = Some(channel);
        Some(LayerId(index as u16))
    }

    pub fn player(&self, id: PlayerId) -> Option<&SeqPlayer> {
        self.players.get(id.index()).filter(|p| p.alive)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut SeqPlayer> {
        self.players.get_mut(id.index()).filter(|p| p.alive)
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id.index()).filter(|c| c.alive)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(id.index()).filter(|c| c.alive)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.index()).filter(|l| l.alive)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id.index()).filter(|l| l.alive)
    }

    /// The slot behind `id` even after it was freed.
    pub(crate) fn layer_slot(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.index())
    }

    pub(crate) fn layer_slot_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id.index())
    }

    /// Channel and player of a live layer, if both are still attached.
    pub(crate) fn attachment(&self, id: LayerId) -> Option<(&Layer, &Channel, &SeqPlayer)> {
        let layer = self.layer(id)?;
        let channel = self.channel(layer.channel?)?;
        let player = self.player(channel.player?)?;
        Some((layer, channel, player))
    }

    pub fn layers_of(&self, channel: ChannelId) -> impl Iterator<Item = LayerId> + '_ {
        self.layers
            .iter()
            .enumerate()
            .filter(move |(_, l)| l.alive && l.channel == Some(channel))
            .map(|(i, _)| LayerId(i as u16))
    }

    pub fn live_layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.alive)
            .map(|(i, _)| LayerId(i as u16))
    }

    /// Free a layer without notifying its voice.
    pub fn free_layer(&mut self, id: LayerId) {
        if let Some(layer) = self.layers.get_mut(id.index()) {
            layer.alive = false;
            layer.enabled = false;
            layer.channel = None;
            layer.voice = None;
            trace!(layer = id.0, "layer freed");
        }
    }

    /// Free a channel and its layers without notifying voices.
    pub fn free_channel(&mut self, id: ChannelId) {
        for index in 0..self.layers.len() {
            if self.layers[index].alive && self.layers[index].channel == Some(id) {
                self.free_layer(LayerId(index as u16));
            }
        }
        if let Some(channel) = self.channels.get_mut(id.index()) {
            channel.alive = false;
            channel.enabled = false;
            channel.player = None;
            trace!(channel = id.0, "channel freed");
        }
    }

    /// Detach a player from its channels without notifying voices.
    ///
    /// The channels stay allocated but orphaned; voices they feed fade out on
    /// the next tick.
    pub fn detach_player(&mut self, id: PlayerId) {
        for channel in self.channels.iter_mut() {
            if channel.player == Some(id) {
                channel.player = None;
            }
        }
        if let Some(player) = self.players.get_mut(id.index()) {
            player.alive = false;
            player.enabled = false;
            trace!(player = id.0, "player detached");
        }
    }
}
