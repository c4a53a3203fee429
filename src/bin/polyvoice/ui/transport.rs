//! Transport bar widget - tick count, sound mode and global list sizes

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use polyvoice::engine::VoiceState;

use super::Snapshot;

pub fn render_transport(frame: &mut Frame, area: Rect, snapshot: &Snapshot, muted: bool, paused: bool) {
    let block = Block::default().title(" polyvoice ").borders(Borders::ALL);

    let (symbol, label, color) = match (paused, muted) {
        (true, _) => ("⏸", "Paused", Color::Yellow),
        (false, true) => ("▶", "Muted", Color::Red),
        (false, false) => ("▶", "Playing", Color::Green),
    };

    let mut spans = vec![
        Span::styled(format!(" {symbol} {label}  "), Style::default().fg(color)),
        Span::styled(
            format!("tick {}  ", snapshot.ticks),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("{}  vol {:.1}  ", snapshot.sound_mode.label(), snapshot.master_volume),
            Style::default().fg(Color::Cyan),
        ),
    ];
    for (state, count) in VoiceState::ALL.iter().zip(snapshot.global_lists) {
        spans.push(Span::styled(
            format!("{} {}  ", state.label(), count),
            Style::default().fg(state_color(*state)),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

pub fn state_color(state: VoiceState) -> Color {
    match state {
        VoiceState::Disabled => Color::DarkGray,
        VoiceState::Decaying => Color::Blue,
        VoiceState::Releasing => Color::Magenta,
        VoiceState::Active => Color::Green,
    }
}
