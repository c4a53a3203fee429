//! Monitor - wires the engine thread to the terminal UI

use color_eyre::eyre::{eyre, Result as EyreResult};
use rtrb::{Consumer, Producer, RingBuffer};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};
use tracing::{info, warn};

use super::score::Score;
use super::ui::{Control, Snapshot, UiApp};

use polyvoice::{
    dsp::envelope::EnvelopeShape,
    io::{Drum, Font, MemoryBank, SampleId, TunedSample},
    synth::EngineCommand,
    AudioEngine, EngineConfig, Settings,
};

/// Output samples covered by one engine update.
const SAMPLES_PER_UPDATE: u32 = 160;

/// Main application builder
pub struct Monitor {
    settings: Settings,
    config: EngineConfig,
}

impl Monitor {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            config: EngineConfig::default(),
        }
    }

    /// Size of the voice array. Small arrays make stealing easy to watch.
    pub fn voices(mut self, voices: usize) -> Self {
        self.config.voices = voices;
        self
    }

    /// Run the engine thread and the UI until the user quits
    pub fn run(self) -> EyreResult<()> {
        let mut engine = AudioEngine::new(self.config, demo_bank());
        let score = Score::demo(&mut engine)?;

        let (commands_tx, commands_rx) = RingBuffer::<EngineCommand>::new(256);
        let (control_tx, control_rx) = RingBuffer::<Control>::new(16);
        let (snapshot_tx, snapshot_rx) = RingBuffer::<Snapshot>::new(8);
        let initial = Snapshot::capture(&engine, &self.settings);

        let running = Arc::new(AtomicBool::new(true));
        let engine_running = running.clone();
        let settings = self.settings;
        let handle = thread::Builder::new()
            .name("engine".into())
            .spawn(move || {
                run_engine(
                    engine,
                    settings,
                    commands_rx,
                    control_rx,
                    snapshot_tx,
                    &engine_running,
                )
            })?;

        let mut terminal = ratatui::init();
        let result = UiApp::new(score, commands_tx, control_tx, snapshot_rx, initial).run(&mut terminal);
        ratatui::restore();

        running.store(false, Ordering::Relaxed);
        handle
            .join()
            .map_err(|_| eyre!("engine thread panicked"))?;
        result
    }
}

/// The engine side: drain requests, tick, publish what the voices are doing.
fn run_engine(
    mut engine: AudioEngine<MemoryBank>,
    mut settings: Settings,
    mut commands: Consumer<EngineCommand>,
    mut control: Consumer<Control>,
    mut snapshots: Producer<Snapshot>,
    running: &AtomicBool,
) {
    let rate = engine.params().output_frequency.max(1);
    let interval = Duration::from_secs_f64(f64::from(SAMPLES_PER_UPDATE) / f64::from(rate));
    info!(?interval, "engine thread started");

    while running.load(Ordering::Relaxed) {
        while let Ok(message) = control.pop() {
            match message {
                Control::SoundMode(mode) => settings.sound_mode = mode,
                Control::MasterVolume(volume) => settings.master_volume = volume,
            }
        }
        engine.drain_commands(&mut commands);
        engine.tick(&settings);

        // Drop the snapshot when the UI falls behind
        if snapshots.push(Snapshot::capture(&engine, &settings)).is_err() {
            warn!(ticks = engine.ticks(), "snapshot queue full");
        }
        thread::sleep(interval);
    }

    engine.shutdown();
}

/// One font holding a kick and a hat for the drum part.
fn demo_bank() -> MemoryBank {
    let kick = Drum {
        tuned_sample: TunedSample::new(SampleId(1), 1.0),
        pan: 64,
        envelope: EnvelopeShape::new(0, 24, 0.0).with_note_off(64, 0),
    };
    let hat = Drum {
        tuned_sample: TunedSample::new(SampleId(2), 1.5),
        pan: 88,
        envelope: EnvelopeShape::new(0, 6, 0.0).with_note_off(128, 0),
    };

    let mut bank = MemoryBank::new();
    bank.add_font(Font::loaded(Vec::new(), vec![Some(kick), Some(hat)]));
    bank
}
