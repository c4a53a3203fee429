//! Whole-engine scenario benchmarks.
//!
//! These drive the public engine API the way a sequencer would: a full voice
//! array ticking every update, and note-ons arriving while every voice is busy.

mod allocation;
mod tick;

pub use allocation::bench_allocation;
pub use tick::bench_tick;
