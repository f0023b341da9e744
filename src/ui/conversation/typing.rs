use ratatui::{
    style::{Color, Style},
    text::{Line, Span},
};

/// Redraw ticks each dot frame stays on screen
const TICKS_PER_FRAME: u64 = 2;

/// "Agent is typing..." line with animated dots
pub struct TypingIndicator;

impl TypingIndicator {
    pub fn line(tick: u64) -> Line<'static> {
        Line::from(vec![
            Span::styled("🤖 ", Style::default().fg(Color::Green)),
            Span::styled("Agent is typing", Style::default().fg(Color::Green)),
            Span::styled(Self::dots(tick), Style::default().fg(Color::Yellow)),
        ])
    }

    fn dots(tick: u64) -> &'static str {
        match (tick / TICKS_PER_FRAME) % 4 {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        }
    }
}
