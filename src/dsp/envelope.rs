/*
Tick-Driven ADSR Envelope
=========================

This module implements the per-voice volume envelope. Unlike a sample-rate
envelope, it advances once per audio *tick* (one update of the voice pool),
and its result scales the voice's velocity before panning.

Vocabulary
----------

  current     The envelope's amplitude (0.0 to 1.0). Multiplies velocity.

  state       Which phase we're in: Initial, Attack, Decay, Sustain, Release
              or Disabled. Disabled is terminal: the voice can be recycled.

  shape       The per-instrument description: attack and decay lengths in
              ticks, the held sustain level, plus the two note-off numbers
              (`decay_index`, `sustain`).

  fade        The per-tick fade-out velocity used after a note-off. A natural
              note-off fades at `decay_index * ticks_per_update_inv_scaled`;
              a forced takeover fades at `ticks_per_update_inv`, ignoring the
              instrument entirely.

  action      A pending request (decay or release) raised from outside the
              tick. Actions are applied at the end of the next update, so a
              note-off can be issued at any point in the callback.


The Shape
---------

  current
    1.0 ┐   ╱╲
        │  ╱  ╲______            note-off: Decay to sustain * current / 256,
    S   │ ╱          ╲______     hold for 128 ticks, then Release at the same
        │╱                  ╲    fade velocity.
    0.0 └────────────────────╲──→ ticks
        Attack Decay Sustain   Decay Sustain Release
        (key held)             (after note-off)

Every phase is a linear ramp: each tick does `current += rate` where the rate
is negative while decaying or releasing.


The State Machine
-----------------

   Initial ──→ Attack ──→ Decay ──→ Sustain (held until note-off)
                                       │
                       note-off action │
                                       ↓
                                     Decay ──→ Sustain (128 ticks) ──→ Release
                                                                          │
   takeover action (from any live state) ─────────────────────────────→ Release
                                                                          │
                                                           current <= 0   ↓
                                                                      Disabled

Release reaching exactly 0.0 is the terminal condition the scheduler watches
to complete a pending reassignment or return the voice to its free list.
*/

/// Ticks the post-note-off sustain holds before releasing.
pub const SUSTAIN_HOLD_TICKS: u16 = 128;

/// Phase of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeState {
    #[default]
    Disabled,
    Initial,
    Attack,
    Decay,
    Sustain,
    Release,
}

impl EnvelopeState {
    pub fn label(self) -> &'static str {
        match self {
            EnvelopeState::Disabled => "off",
            EnvelopeState::Initial => "init",
            EnvelopeState::Attack => "atk",
            EnvelopeState::Decay => "dec",
            EnvelopeState::Sustain => "sus",
            EnvelopeState::Release => "rel",
        }
    }
}

/// Instrument envelope description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeShape {
    pub attack_ticks: u16,
    pub decay_ticks: u16,
    pub sustain_level: f32,
    /// Note-off fade speed. Zero on a layer means "use the channel's shape".
    pub decay_index: u8,
    /// Fraction (/256) of the current level held after a natural note-off.
    pub sustain: u8,
}

impl EnvelopeShape {
    pub const fn new(attack_ticks: u16, decay_ticks: u16, sustain_level: f32) -> Self {
        Self {
            attack_ticks,
            decay_ticks,
            sustain_level,
            decay_index: 0,
            sustain: 0,
        }
    }

    pub const fn with_note_off(mut self, decay_index: u8, sustain: u8) -> Self {
        self.decay_index = decay_index;
        self.sustain = sustain;
        self
    }
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        Self::new(4, 16, 0.8).with_note_off(16, 128)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Action {
    decay: bool,
    release: bool,
}

/// Per-voice envelope runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct Envelope {
    shape: Option<EnvelopeShape>,
    state: EnvelopeState,
    current: f32,
    velocity: f32,
    target: f32,
    remaining: u16,
    hold: Option<u16>,
    fade_out_velocity: f32,
    action: Action,
}

impl Envelope {
    /// Arm the envelope for a new note. It starts ramping on the next update.
    pub fn init(&mut self, shape: EnvelopeShape) {
        *self = Self {
            shape: Some(shape),
            state: EnvelopeState::Initial,
            ..Self::default()
        };
    }

    /// Drop straight to the terminal state.
    pub fn disable(&mut self) {
        self.state = EnvelopeState::Disabled;
        self.current = 0.0;
        self.action = Action::default();
    }

    /// Natural note-off: decay towards `sustain_target`, hold, then release.
    pub fn note_off(&mut self, fade_out_velocity: f32, sustain_target: f32) {
        self.fade_out_velocity = fade_out_velocity;
        self.target = sustain_target.max(0.0);
        self.action.decay = true;
    }

    /// Forced takeover: release at `fade_out_velocity` regardless of the shape.
    pub fn force_release(&mut self, fade_out_velocity: f32) {
        self.fade_out_velocity = fade_out_velocity;
        self.action.release = true;
    }

    /// Advance one tick and return the amplitude multiplier.
    pub fn update(&mut self) -> f32 {
        loop {
            match self.state {
                EnvelopeState::Disabled => return 0.0,

                EnvelopeState::Initial => {
                    let shape = self.shape.unwrap_or_default();
                    self.current = 0.0;
                    if shape.attack_ticks == 0 {
                        self.current = 1.0;
                        self.begin_shape_decay(shape);
                    } else {
                        self.velocity = 1.0 / f32::from(shape.attack_ticks);
                        self.remaining = shape.attack_ticks;
                        self.state = EnvelopeState::Attack;
                    }
                    // Initial never holds a tick of its own
                    continue;
                }

                EnvelopeState::Attack => {
                    self.current += self.velocity;
                    self.remaining = self.remaining.saturating_sub(1);
                    if self.remaining == 0 {
                        self.current = 1.0;
                        self.begin_shape_decay(self.shape.unwrap_or_default());
                    }
                }

                EnvelopeState::Decay => {
                    self.current += self.velocity;
                    if self.current <= self.target {
                        self.current = self.target;
                        self.state = EnvelopeState::Sustain;
                        self.remaining = self.hold.unwrap_or(0);
                    }
                }

                EnvelopeState::Sustain => {
                    if self.hold.is_some() {
                        self.remaining = self.remaining.saturating_sub(1);
                        if self.remaining == 0 {
                            self.state = EnvelopeState::Release;
                        }
                    }
                }

                EnvelopeState::Release => {
                    self.current -= self.fade_out_velocity;
                    if self.current <= 0.0 {
                        self.current = 0.0;
                        self.state = EnvelopeState::Disabled;
                    }
                }
            }
            break;
        }

        self.apply_actions();

        self.current = self.current.clamp(0.0, 1.0);
        self.current
    }

    fn begin_shape_decay(&mut self, shape: EnvelopeShape) {
        let sustain_level = shape.sustain_level.clamp(0.0, 1.0);
        self.hold = None;
        self.target = sustain_level;
        if shape.decay_ticks == 0 || sustain_level >= self.current {
            self.current = sustain_level;
            self.state = EnvelopeState::Sustain;
        } else {
            self.velocity = (sustain_level - self.current) / f32::from(shape.decay_ticks);
            self.state = EnvelopeState::Decay;
        }
    }

    fn apply_actions(&mut self) {
        if self.state == EnvelopeState::Disabled {
            self.action = Action::default();
            return;
        }
        if self.action.decay {
            self.action.decay = false;
            self.velocity = -self.fade_out_velocity;
            self.hold = Some(SUSTAIN_HOLD_TICKS);
            // Never decay upwards
            self.target = self.target.min(self.current);
            self.state = EnvelopeState::Decay;
        }
        if self.action.release {
            self.action.release = false;
            self.state = EnvelopeState::Release;
        }
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    pub fn level(&self) -> f32 {
        self.current
    }

    pub fn fade_out_velocity(&self) -> f32 {
        self.fade_out_velocity
    }

    /// True once the envelope has produced at least one tick of output.
    pub fn has_started(&self) -> bool {
        !matches!(self.state, EnvelopeState::Initial | EnvelopeState::Disabled)
    }

    /// True in the terminal state.
    pub fn is_finished(&self) -> bool {
        self.state == EnvelopeState::Disabled
    }
}
