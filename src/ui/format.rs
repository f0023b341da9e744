//! Turns raw message text into terminal lines.
//!
//! Always feed the original string; output is styled spans, never text
//! that could be formatted a second time.

use once_cell::sync::Lazy;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use regex::Regex;
use unicode_width::UnicodeWidthChar;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("valid URL pattern"));

/// A character with the style it is drawn in
type StyledChar = (char, Style);

/// Split on newlines, wrap to `width` terminal columns and style links.
/// Whitespace is kept as written; only the blanks at a wrap point are dropped.
pub fn format_text(text: &str, width: usize, base: Style) -> Vec<Line<'static>> {
    text.split('\n')
        .flat_map(|raw_line| {
            let chars = style_links(raw_line.trim_end_matches('\r'), base);
            wrap_chars(&chars, width).into_iter().map(into_line)
        })
        .collect()
}

fn style_links(line: &str, base: Style) -> Vec<StyledChar> {
    let link = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::UNDERLINED);

    let mut chars = Vec::with_capacity(line.len());
    let mut cursor = 0;
    for m in URL_RE.find_iter(line) {
        chars.extend(line[cursor..m.start()].chars().map(|c| (c, base)));
        chars.extend(m.as_str().chars().map(|c| (c, link)));
        cursor = m.end();
    }
    chars.extend(line[cursor..].chars().map(|c| (c, base)));
    chars
}

fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

/// Greedy wrap over runs of blanks and non-blanks, measured in display
/// columns. A word wider than the line is split at the column limit.
fn wrap_chars(chars: &[StyledChar], width: usize) -> Vec<Vec<StyledChar>> {
    if width == 0 {
        return vec![chars.to_vec()];
    }

    let mut lines = Vec::new();
    let mut current: Vec<StyledChar> = Vec::new();
    let mut current_width = 0;

    for run in chars.chunk_by(|a, b| a.0.is_whitespace() == b.0.is_whitespace()) {
        let blank = run[0].0.is_whitespace();
        let run_width: usize = run.iter().map(|&(c, _)| char_width(c)).sum();

        if current_width + run_width <= width {
            current.extend_from_slice(run);
            current_width += run_width;
        } else if blank && current_width > 0 {
            lines.push(take_trimmed(&mut current));
            current_width = 0;
        } else if !blank && run_width <= width {
            let line = take_trimmed(&mut current);
            if !line.is_empty() {
                lines.push(line);
            }
            current.extend_from_slice(run);
            current_width = run_width;
        } else {
            for &styled in run {
                let w = char_width(styled.0);
                if current_width > 0 && current_width + w > width {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0;
                }
                current.push(styled);
                current_width += w;
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn take_trimmed(line: &mut Vec<StyledChar>) -> Vec<StyledChar> {
    while line.last().is_some_and(|(c, _)| c.is_whitespace()) {
        line.pop();
    }
    std::mem::take(line)
}

/// Merge neighbouring characters of equal style into spans
fn into_line(chars: Vec<StyledChar>) -> Line<'static> {
    let mut spans = Vec::new();
    let mut text = String::new();
    let mut style = None;

    for (c, s) in chars {
        if style != Some(s) {
            if let Some(previous) = style {
                spans.push(Span::styled(std::mem::take(&mut text), previous));
            }
            style = Some(s);
        }
        text.push(c);
    }

    match style {
        Some(s) => spans.push(Span::styled(text, s)),
        None => spans.push(Span::raw(String::new())),
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn newlines_become_separate_lines() {
        let lines = format_text("first\nsecond\n\nfourth", 80, Style::default());
        assert_eq!(plain(&lines), vec!["first", "second", "", "fourth"]);
    }

    #[test]
    fn links_get_their_own_span() {
        let lines = format_text("see https://example.com/a?b=1 now", 80, Style::default());
        assert_eq!(lines.len(), 1);
        let spans = &lines[0].spans;
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[1].content, "https://example.com/a?b=1");
        assert!(spans[1].style.add_modifier.contains(Modifier::UNDERLINED));
        assert_eq!(spans[2].content, " now");
    }

    #[test]
    fn long_text_wraps_at_word_boundaries() {
        let lines = format_text("one two three four", 9, Style::default());
        assert_eq!(plain(&lines), vec!["one two", "three", "four"]);
    }

    #[test]
    fn indentation_and_inner_spacing_survive() {
        let lines = format_text("I can help:\n  ✈️  booking flights", 80, Style::default());
        assert_eq!(plain(&lines), vec!["I can help:", "  ✈️  booking flights"]);
    }

    #[test]
    fn link_wider_than_line_is_split_not_cut() {
        let url = "https://booking.example.com/confirm?ref=ABCDEFGHIJ0123456789";
        let lines = format_text(url, 20, Style::default());

        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.width() <= 20));
        assert_eq!(plain(&lines).concat(), url);
        assert!(
            lines
                .iter()
                .flat_map(|l| l.spans.iter())
                .all(|s| s.style.add_modifier.contains(Modifier::UNDERLINED))
        );
    }

    #[test]
    fn wrapping_counts_terminal_columns() {
        let lines = format_text("🌟🌟🌟🌟", 5, Style::default());
        assert_eq!(plain(&lines), vec!["🌟🌟", "🌟🌟"]);
    }

    #[test]
    fn formatting_raw_text_twice_is_stable() {
        let raw = "visit https://example.com\nbye";
        assert_eq!(
            format_text(raw, 40, Style::default()),
            format_text(raw, 40, Style::default())
        );
    }
}
