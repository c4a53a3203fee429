//! Benchmarks for per-voice primitives.

mod envelope;
mod pan;

pub use envelope::bench_envelope;
pub use pan::bench_pan;
