//! TUI module for polyvoice
//!
//! Shows every voice's list, owner and envelope while the demo score plays.

mod state;
mod transport;
mod voices;

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    DefaultTerminal, Frame,
};
use rtrb::{Consumer, Producer};
use std::time::{Duration, Instant};
use tracing::warn;

pub use state::{Control, Snapshot};

use super::score::Score;
use polyvoice::synth::EngineCommand;
use transport::render_transport;
use voices::render_voices;

/// UI application state
pub struct UiApp {
    score: Score,
    commands: Producer<EngineCommand>,
    control: Producer<Control>,
    snapshots: Consumer<Snapshot>,
    /// Latest engine snapshot
    current: Snapshot,
    started: Instant,
    next_step: u32,
    paused: bool,
    muted: bool,
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        score: Score,
        commands: Producer<EngineCommand>,
        control: Producer<Control>,
        snapshots: Consumer<Snapshot>,
        initial: Snapshot,
    ) -> Self {
        Self {
            score,
            commands,
            control,
            snapshots,
            current: initial,
            started: Instant::now(),
            next_step: 0,
            paused: false,
            muted: false,
            should_quit: false,
        }
    }

    /// Run the UI event loop
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.play_score();
            self.poll_snapshots();

            terminal.draw(|frame| self.render(frame))?;

            // Non-blocking, ~60fps
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }

        Ok(())
    }

    /// Send every score event that is due.
    fn play_score(&mut self) {
        if self.paused {
            return;
        }
        let step_ms = self.score.step_duration.as_millis().max(1);
        let due = (self.started.elapsed().as_millis() / step_ms) as u32;
        while self.next_step <= due {
            let commands = &mut self.commands;
            self.score.advance(self.next_step, &mut |command: EngineCommand| {
                if commands.push(command).is_err() {
                    warn!(?command, "command queue full");
                }
            });
            self.next_step += 1;
        }
    }

    /// Keep only the latest snapshot
    fn poll_snapshots(&mut self) {
        while let Ok(snapshot) = self.snapshots.pop() {
            self.current = snapshot;
        }
    }

    fn send(&mut self, command: EngineCommand) {
        if self.commands.push(command).is_err() {
            warn!(?command, "command queue full");
        }
    }

    fn send_control(&mut self, control: Control) {
        if self.control.push(control).is_err() {
            warn!(?control, "control queue full");
        }
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('m') => {
                self.muted = !self.muted;
                self.send(EngineCommand::SetMuted {
                    player: self.score.player,
                    muted: self.muted,
                });
            }
            KeyCode::Char('s') => {
                let mode = self.current.sound_mode.next();
                self.send_control(Control::SoundMode(mode));
            }
            KeyCode::Char('+') => {
                let volume = (self.current.master_volume + 0.1).min(1.0);
                self.send_control(Control::MasterVolume(volume));
            }
            KeyCode::Char('-') => {
                let volume = (self.current.master_volume - 0.1).max(0.0);
                self.send_control(Control::MasterVolume(volume));
            }
            KeyCode::Char(' ') => {
                self.paused = !self.paused;
                if self.paused {
                    self.score.clear();
                    self.send(EngineCommand::AllNotesOff);
                } else {
                    // Pick the loop up from the top
                    self.started = Instant::now();
                    self.next_step = 0;
                }
            }
            _ => {}
        }
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Transport bar
                Constraint::Min(6),    // Voices
                Constraint::Length(1), // Help bar
            ])
            .split(area);

        render_transport(frame, chunks[0], &self.current, self.muted, self.paused);

        let parts: Vec<&str> = self.score.part_names().collect();
        let title = format!(" Voices ({}) ", parts.join(", "));
        let voices_block = Block::default().title(title).borders(Borders::ALL);
        let voices_inner = voices_block.inner(chunks[1]);
        frame.render_widget(voices_block, chunks[1]);
        render_voices(frame, voices_inner, &self.current);

        let help = Paragraph::new(" [Q] Quit  [Space] Pause  [M] Mute  [S] Sound mode  [+/-] Volume")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[2]);
    }
}
