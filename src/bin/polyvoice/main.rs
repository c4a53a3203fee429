//! polyvoice - terminal monitor for the voice engine
//!
//! Run with: cargo run -- [settings.toml]
//!
//! Set POLYVOICE_LOG to a file path to capture engine logs; the terminal
//! itself belongs to the UI. RUST_LOG filters what gets written.

mod app;
mod score;
mod ui;

use color_eyre::eyre::{Result as EyreResult, WrapErr};
use std::{fs::File, sync::Mutex};
use tracing_subscriber::EnvFilter;

use app::Monitor;
use polyvoice::Settings;

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    init_logging()?;

    let settings = match std::env::args().nth(1) {
        Some(path) => {
            Settings::load(&path).wrap_err_with(|| format!("failed to load settings from {path}"))?
        }
        None => Settings::default(),
    };

    Monitor::new(settings).voices(8).run()
}

fn init_logging() -> EyreResult<()> {
    let Ok(path) = std::env::var("POLYVOICE_LOG") else {
        return Ok(());
    };
    let file = File::create(&path).wrap_err_with(|| format!("failed to create log file {path}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
