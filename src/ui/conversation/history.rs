//! Conversation transcript display component

use crate::events::{ButtonId, Message, QuickReply, Sender};
use crate::ui::conversation::typing::TypingIndicator;
use crate::ui::format::format_text;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Renders the transcript bottom-aligned, newest message last
pub struct ConversationHistory<'a> {
    messages: &'a [Message],
    selected: Option<ButtonId>,
    highlighted: Option<ButtonId>,
    typing: bool,
    tick: u64,
}

impl<'a> ConversationHistory<'a> {
    pub fn new(messages: &'a [Message]) -> Self {
        Self {
            messages,
            selected: None,
            highlighted: None,
            typing: false,
            tick: 0,
        }
    }

    /// Quick reply focused from the keyboard
    pub fn selected(mut self, selected: Option<ButtonId>) -> Self {
        self.selected = selected;
        self
    }

    /// Quick reply that was just pressed
    pub fn highlighted(mut self, highlighted: Option<ButtonId>) -> Self {
        self.highlighted = highlighted;
        self
    }

    pub fn typing(mut self, typing: bool) -> Self {
        self.typing = typing;
        self
    }

    /// Redraw tick driving the typing animation
    pub fn tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// All lines of the transcript for the given inner width
    pub fn lines(&self, width: u16) -> Vec<Line<'static>> {
        let mut all_lines = Vec::new();
        for message in self.messages {
            all_lines.extend(self.render_message(message, width));
            all_lines.push(Line::from(""));
        }
        if self.typing {
            all_lines.push(TypingIndicator::line(self.tick));
        }
        all_lines
    }

    fn render_message(&self, message: &Message, width: u16) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let (avatar, name, style) = match message.sender {
            Sender::User => ("👤", "You", Style::default().fg(Color::Blue)),
            Sender::Bot => ("🤖", "Agent", Style::default().fg(Color::Green)),
        };

        lines.push(Line::from(vec![
            Span::styled(format!("{avatar} {name}"), style.add_modifier(Modifier::BOLD)),
            Span::styled(format!("  {}", message.time), Style::default().fg(Color::DarkGray)),
        ]));

        for line in format_text(&message.text, width.saturating_sub(3) as usize, style) {
            let mut spans = vec![Span::styled("│ ", Style::default().fg(Color::DarkGray))];
            spans.extend(line.spans);
            lines.push(Line::from(spans));
        }

        if !message.buttons.is_empty() {
            lines.push(self.render_buttons(&message.buttons));
        }

        lines
    }

    fn render_buttons(&self, buttons: &[QuickReply]) -> Line<'static> {
        let mut spans = vec![Span::raw("  ")];
        for button in buttons {
            let style = if self.highlighted == Some(button.id) {
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else if self.selected == Some(button.id) {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };
            spans.push(Span::styled(format!("[ {} ]", button.title), style));
            spans.push(Span::raw(" "));
        }
        Line::from(spans)
    }
}

impl Widget for ConversationHistory<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("💬 Conversation");

        let inner_area = block.inner(area);
        block.render(area, buf);

        let all_lines = self.lines(inner_area.width);

        // Keep the newest lines visible
        let height = inner_area.height as usize;
        let start = all_lines.len().saturating_sub(height);

        for (i, line) in all_lines[start..].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn messages_render_header_body_and_buttons() {
        let mut bot = Message::new(Sender::Bot, "pick\nnow", "10:00");
        bot.buttons = vec![
            QuickReply {
                id: ButtonId(0),
                title: "Yes".into(),
                payload: "/affirm".into(),
            },
            QuickReply {
                id: ButtonId(1),
                title: "No".into(),
                payload: "/deny".into(),
            },
        ];
        let messages = vec![Message::new(Sender::User, "hi", "09:59"), bot];

        let view = ConversationHistory::new(&messages).highlighted(Some(ButtonId(1)));
        let lines: Vec<String> = view.lines(40).iter().map(text_of).collect();

        assert!(lines[0].contains("You") && lines[0].contains("09:59"));
        assert_eq!(lines[1], "│ hi");
        assert!(lines[3].contains("Agent"));
        assert_eq!(lines[4], "│ pick");
        assert_eq!(lines[5], "│ now");
        assert_eq!(lines[6], "  [ Yes ] [ No ] ");

        let button_line = &view.lines(40)[6];
        assert_eq!(button_line.spans[3].style.bg, Some(Color::Green));
        assert_eq!(button_line.spans[1].style.bg, None);
    }

    #[test]
    fn long_link_is_fully_visible_in_narrow_pane() {
        let url = "https://booking.example.com/confirm?ref=ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789&x=1";
        let messages = vec![Message::new(Sender::Bot, format!("link: {url}"), "10:00")];
        let area = Rect::new(0, 0, 40, 10);
        let mut buf = Buffer::empty(area);
        ConversationHistory::new(&messages).render(area, &mut buf);

        // Body text starts after the border and the "│ " gutter
        let body: String = (1..area.height - 1)
            .map(|y| {
                let row: String = (3..area.width - 1).map(|x| buf.get(x, y).symbol()).collect();
                row.trim_end().to_string()
            })
            .filter(|row| !row.contains("Agent"))
            .collect();
        assert!(body.contains(url), "{body}");
    }

    #[test]
    fn typing_adds_indicator_line() {
        let messages = vec![Message::new(Sender::User, "hi", "t")];
        let idle = ConversationHistory::new(&messages).lines(40).len();
        let typing = ConversationHistory::new(&messages).typing(true).lines(40).len();
        assert_eq!(typing, idle + 1);
    }
}
