//! Fixed voice arena and the per-scope pools that partition it.

/*
Voice Pools
===========

Every voice lives in exactly one list at a time. Lists are intrusive and
doubly linked by voice index, so moving a voice between lists is O(1) and the
arena never allocates after startup.

Vocabulary
----------

  pool        Four lists (disabled, decaying, releasing, active) belonging to
              one scope. Pool 0 is the global pool; every player and every
              channel also owns one.

  disabled    Idle voices, free to hand out.
  decaying    Voices fading after a natural note-off. Cheap to reclaim.
  releasing   Voices doing a fast fade so a pending layer can take them over.
  active      Voices bound to a layer and audible.

  home pool   The pool a voice was last linked into. When the tick scheduler
              moves a voice between states it stays inside its home pool.

Sizing a pool moves voices out of the global pool (disabled first) and
clearing it hands them all back, so the sum over pools always equals the
arena size.
*/

use crate::{
    error::MembershipError,
    synth::voice::{Voice, VoiceId},
};
use tracing::{trace, warn};

/// Index into the pool table. `PoolId::GLOBAL` is the global pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(pub u16);

impl PoolId {
    pub const GLOBAL: PoolId = PoolId(0);

    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Which list of its pool a voice is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceState {
    Disabled,
    Decaying,
    Releasing,
    Active,
}

impl VoiceState {
    pub const ALL: [VoiceState; 4] = [
        VoiceState::Disabled,
        VoiceState::Decaying,
        VoiceState::Releasing,
        VoiceState::Active,
    ];

    #[inline]
    fn slot(self) -> usize {
        match self {
            VoiceState::Disabled => 0,
            VoiceState::Decaying => 1,
            VoiceState::Releasing => 2,
            VoiceState::Active => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VoiceState::Disabled => "disabled",
            VoiceState::Decaying => "decaying",
            VoiceState::Releasing => "releasing",
            VoiceState::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    prev: Option<VoiceId>,
    next: Option<VoiceId>,
    list: Option<VoiceState>,
    home: PoolId,
}

impl Default for PoolId {
    fn default() -> Self {
        PoolId::GLOBAL
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ListHead {
    head: Option<VoiceId>,
    tail: Option<VoiceId>,
    len: u16,
}

#[derive(Debug, Clone, Copy, Default)]
struct NotePool {
    lists: [ListHead; 4],
}

/// The voice arena plus every pool's lists.
#[derive(Debug, Clone)]
pub struct VoicePool {
    voices: Vec<Voice>,
    links: Vec<Link>,
    pools: Vec<NotePool>,
}

impl VoicePool {
    /// Build `voices` idle voices, all in the global disabled list.
    pub fn new(voices: usize, pools: usize) -> Self {
        let mut pool = Self {
            voices: vec![Voice::default(); voices],
            links: vec![Link::default(); voices],
            pools: vec![NotePool::default(); pools.max(1)],
        };
        for index in 0..voices {
            pool.push_back(PoolId::GLOBAL, VoiceState::Disabled, VoiceId(index as u16));
        }
        pool
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn voice(&self, id: VoiceId) -> &Voice {
        &self.voices[id.index()]
    }

    pub(crate) fn voice_mut(&mut self, id: VoiceId) -> &mut Voice {
        &mut self.voices[id.index()]
    }

    pub fn voices(&self) -> impl Iterator<Item = (VoiceId, &Voice)> {
        self.voices
            .iter()
            .enumerate()
            .map(|(i, v)| (VoiceId(i as u16), v))
    }

    /// Current list of `id`, `None` only while it is being moved.
    pub fn state(&self, id: VoiceId) -> Option<VoiceState> {
        self.links[id.index()].list
    }

    pub fn home(&self, id: VoiceId) -> PoolId {
        self.links[id.index()].home
    }

    pub fn len(&self, pool: PoolId, state: VoiceState) -> usize {
        self.pools
            .get(pool.index())
            .map_or(0, |p| usize::from(p.lists[state.slot()].len))
    }

    /// Voices of one list, head to tail.
    pub fn iter(&self, pool: PoolId, state: VoiceState) -> ListIter<'_> {
        let next = self
            .pools
            .get(pool.index())
            .and_then(|p| p.lists[state.slot()].head);
        ListIter { pool: self, next }
    }

    pub fn push_back(&mut self, pool: PoolId, state: VoiceState, id: VoiceId) {
        self.insert(pool, state, id, false);
    }

    pub fn push_front(&mut self, pool: PoolId, state: VoiceState, id: VoiceId) {
        self.insert(pool, state, id, true);
    }

    fn insert(&mut self, pool: PoolId, state: VoiceState, id: VoiceId, front: bool) {
        if pool.index() >= self.pools.len() {
            warn!(pool = pool.0, voice = id.0, "push into unknown pool ignored");
            return;
        }
        if let Some(list) = self.links[id.index()].list {
            debug_assert!(false, "voice {} already in {} list", id.0, list.label());
            warn!(voice = id.0, list = list.label(), "voice already linked");
            return;
        }

        let head = &mut self.pools[pool.index()].lists[state.slot()];
        let (prev, next) = if front {
            (None, head.head)
        } else {
            (head.tail, None)
        };
        head.len += 1;
        if front {
            head.head = Some(id);
            if head.tail.is_none() {
                head.tail = Some(id);
            }
        } else {
            head.tail = Some(id);
            if head.head.is_none() {
                head.head = Some(id);
            }
        }

        if let Some(p) = prev {
            self.links[p.index()].next = Some(id);
        }
        if let Some(n) = next {
            self.links[n.index()].prev = Some(id);
        }
        self.links[id.index()] = Link {
            prev,
            next,
            list: Some(state),
            home: pool,
        };
    }

    /// Unlink `id` from whatever list holds it. No-op when unlinked.
    pub fn remove(&mut self, id: VoiceId) {
        let link = self.links[id.index()];
        let Some(state) = link.list else {
            return;
        };

        let head = &mut self.pools[link.home.index()].lists[state.slot()];
        head.len -= 1;
        if head.head == Some(id) {
            head.head = link.next;
        }
        if head.tail == Some(id) {
            head.tail = link.prev;
        }
        if let Some(p) = link.prev {
            self.links[p.index()].next = link.next;
        }
        if let Some(n) = link.next {
            self.links[n.index()].prev = link.prev;
        }

        let entry = &mut self.links[id.index()];
        entry.prev = None;
        entry.next = None;
        entry.list = None;
    }

    pub fn pop_back(&mut self, pool: PoolId, state: VoiceState) -> Option<VoiceId> {
        let tail = self.pools.get(pool.index())?.lists[state.slot()].tail?;
        self.remove(tail);
        Some(tail)
    }

    fn pop_front(&mut self, pool: PoolId, state: VoiceState) -> Option<VoiceId> {
        let head = self.pools.get(pool.index())?.lists[state.slot()].head?;
        self.remove(head);
        Some(head)
    }

    /// Move `id` to another list of its home pool.
    pub fn relink(&mut self, id: VoiceId, state: VoiceState, front: bool) {
        let home = self.home(id);
        self.remove(id);
        self.insert(home, state, id, front);
    }

    /// Hand every voice of `pool` back to the matching global list.
    pub fn clear_pool(&mut self, pool: PoolId) {
        if pool == PoolId::GLOBAL {
            return;
        }
        for state in VoiceState::ALL {
            while let Some(id) = self.pop_front(pool, state) {
                self.push_back(PoolId::GLOBAL, state, id);
            }
        }
    }

    /// Clear `pool`, then move up to `count` voices into it from the global pool.
    ///
    /// Disabled voices are taken first, then decaying, releasing and active.
    /// Each voice keeps its state. Returns how many voices were moved.
    pub fn fill_pool(&mut self, pool: PoolId, count: usize) -> usize {
        if pool == PoolId::GLOBAL || pool.index() >= self.pools.len() {
            return 0;
        }
        self.clear_pool(pool);

        let mut moved = 0;
        for state in VoiceState::ALL {
            while moved < count {
                let Some(id) = self.pop_back(PoolId::GLOBAL, state) else {
                    break;
                };
                self.push_back(pool, state, id);
                moved += 1;
            }
        }

        if moved < count {
            trace!(pool = pool.0, requested = count, moved, "pool filled short");
        }
        moved
    }

    /// Disable every voice and return it to the global disabled list.
    pub fn reset(&mut self) {
        for index in 0..self.voices.len() {
            let id = VoiceId(index as u16);
            self.remove(id);
            let voice = &mut self.voices[index];
            voice.disable();
            voice.wanted = None;
        }
        for index in 0..self.voices.len() {
            self.push_back(PoolId::GLOBAL, VoiceState::Disabled, VoiceId(index as u16));
        }
    }

    /// Verify every voice is in exactly one list and that list lengths agree.
    ///
    /// Runs inside the tick in debug builds, so it walks the lists without
    /// allocating: each visited voice must carry the tag of the list it was
    /// found in, and the walks together must cover the arena exactly once.
    pub fn check_membership(&self) -> Result<(), MembershipError> {
        let mut total = 0usize;
        for (pool_index, pool) in self.pools.iter().enumerate() {
            let pool_id = PoolId(pool_index as u16);
            for state in VoiceState::ALL {
                let mut walked = 0usize;
                for id in self.iter(pool_id, state) {
                    walked += 1;
                    let link = self.links[id.index()];
                    // Reachable from a list it is not tagged with, or a cycle
                    if link.list != Some(state) || link.home != pool_id || walked > self.voices.len() {
                        return Err(MembershipError { voice: id.0, lists: 2 });
                    }
                }
                if walked != usize::from(pool.lists[state.slot()].len) {
                    let voice = pool.lists[state.slot()].head.map_or(0, |v| v.0);
                    return Err(MembershipError { voice, lists: 0 });
                }
                total += walked;
            }
        }
        if total == self.voices.len() {
            return Ok(());
        }
        let voice = self.links.iter().position(|l| l.list.is_none()).unwrap_or(0);
        Err(MembershipError {
            voice: voice as u16,
            lists: 0,
        })
    }
}

pub struct ListIter<'a> {
    pool: &'a VoicePool,
    next: Option<VoiceId>,
}

impl Iterator for ListIter<'_> {
    type Item = VoiceId;

    fn next(&mut self) -> Option<VoiceId> {
        let current = self.next?;
        self.next = self.pool.links[current.index()].next;
        Some(current)
    }
}
