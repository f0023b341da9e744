//! Modal popups drawn over the conversation

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

/// Rectangle of `width` x `height` centred in `area`, clamped to it
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Yes/no gate in front of destructive actions
pub struct ConfirmDialog<'a> {
    pub question: &'a str,
}

impl Widget for ConfirmDialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let popup = centered_rect(area.width.min(60), 7, area);
        Clear.render(popup, buf);

        let text = vec![
            Line::from(self.question.to_string()),
            Line::from(""),
            Line::from(vec![
                Span::styled("[y]", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                Span::raw(" yes    "),
                Span::styled("[n]", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                Span::raw(" no"),
            ]),
        ];

        Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Confirm")
                    .style(Style::default().fg(Color::Yellow)),
            )
            .render(popup, buf);
    }
}

/// Blocking overlay shown while the agent session restarts
pub struct LoadingOverlay<'a> {
    pub label: &'a str,
    pub tick: u64,
}

impl Widget for LoadingOverlay<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        const FRAMES: [&str; 4] = ["◐", "◓", "◑", "◒"];

        let popup = centered_rect(area.width.min(44), 5, area);
        Clear.render(popup, buf);

        let spinner = FRAMES[(self.tick % FRAMES.len() as u64) as usize];
        Paragraph::new(Line::from(vec![
            Span::styled(spinner, Style::default().fg(Color::Cyan)),
            Span::raw(format!(" {}...", self.label)),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
        .render(popup, buf);
    }
}

/// Command reference, dismissed by any key
pub struct HelpPopup<'a> {
    pub text: &'a str,
}

impl Widget for HelpPopup<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let height = self.text.lines().count() as u16 + 4;
        let popup = centered_rect(area.width.min(76), height, area);
        Clear.render(popup, buf);

        let mut lines: Vec<Line> = self.text.lines().map(Line::from).collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "press any key to close",
            Style::default().fg(Color::DarkGray),
        )));

        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help")
                    .style(Style::default().fg(Color::Blue)),
            )
            .render(popup, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_rect_is_clamped_and_centred() {
        let area = Rect::new(0, 0, 80, 24);
        assert_eq!(centered_rect(40, 6, area), Rect::new(20, 9, 40, 6));
        assert_eq!(centered_rect(100, 30, area), area);
    }

    #[test]
    fn confirm_dialog_shows_question() {
        let area = Rect::new(0, 0, 60, 12);
        let mut buf = Buffer::empty(area);
        ConfirmDialog {
            question: "Clear all messages?",
        }
        .render(area, &mut buf);

        let rendered: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(rendered.contains("Clear all messages?"));
        assert!(rendered.contains("[y]"));
    }
}
