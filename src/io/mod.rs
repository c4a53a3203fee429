// Purpose - external interfaces: the asset lookup the engine consumes

pub mod bank;

pub use bank::{
    semitone_ratio, Drum, Font, Instrument, LoadStatus, MemoryBank, SampleId, SoundBank, TunedSample,
};
