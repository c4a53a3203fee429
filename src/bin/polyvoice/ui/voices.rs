//! Voice table widget - one row per voice with a level meter

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use super::{state::VoiceRow, transport::state_color, Snapshot};

const METER_WIDTH: usize = 16;

fn layer_label(layer: Option<u16>) -> String {
    match layer {
        Some(id) => format!("L{id:<3}"),
        None => " -  ".to_string(),
    }
}

fn meter(level: f32) -> String {
    let filled = ((level.clamp(0.0, 1.0) * METER_WIDTH as f32).round() as usize).min(METER_WIDTH);
    format!("{}{}", "▓".repeat(filled), "░".repeat(METER_WIDTH - filled))
}

fn row(index: usize, voice: &VoiceRow) -> Line<'static> {
    let Some(state) = voice.state else {
        return Line::from(format!("#{index:02} unlinked"));
    };
    let color = state_color(state);

    Line::from(vec![
        Span::styled(format!("#{index:02} "), Style::default().fg(Color::DarkGray)),
        Span::styled(format!("{:<10}", state.label()), Style::default().fg(color)),
        Span::raw(format!("pool {:<3} prio {:<3} ", voice.pool, voice.priority)),
        Span::styled(layer_label(voice.layer), Style::default().fg(Color::White)),
        Span::styled(
            format!(" → {} ", layer_label(voice.pending)),
            Style::default().fg(Color::Magenta),
        ),
        Span::styled(format!("{:<5}", voice.envelope), Style::default().fg(Color::Cyan)),
        Span::styled(meter(voice.level), Style::default().fg(color)),
        Span::styled(
            format!("  L {:>4} R {:>4}", voice.left, voice.right),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

/// Render one line per voice, cut to the available height
pub fn render_voices(frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
    if area.height == 0 || area.width < 20 {
        return;
    }

    let lines: Vec<Line> = snapshot
        .rows()
        .iter()
        .enumerate()
        .take(usize::from(area.height))
        .map(|(index, voice)| row(index, voice))
        .collect();

    frame.render_widget(Paragraph::new(lines), area);
}
