//! Script pane rendering with syntax highlighting
//!
//! This module renders the scenario script, one line per step, with the step
//! that produced the current snapshot highlighted. A failed step is shown on
//! an error background.
//!
//! # Rendering
//!
//! The pane uses a simple character-by-character tokenizer to apply syntax
//! highlighting styles without requiring a full lexer.

use super::pane_block;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Simple syntax highlighting for script lines
fn highlight_script_line(line: &str) -> Line<'_> {
    let mut spans = Vec::new();
    let mut current_word = String::new();

    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Handle comments
        if c == '/' && i + 1 < chars.len() && chars[i + 1] == '/' {
            if !current_word.is_empty() {
                spans.push(Span::raw(current_word.clone()));
                current_word.clear();
            }
            let rest: String = chars[i..].iter().collect();
            spans.push(Span::styled(rest, Style::default().fg(DEFAULT_THEME.comment)));
            break;
        }

        // Handle strings
        if c == '"' {
            if !current_word.is_empty() {
                spans.push(Span::raw(current_word.clone()));
                current_word.clear();
            }
            let mut end = i + 1;
            while end < chars.len() && chars[end] != '"' {
                end += 1;
            }
            if end < chars.len() {
                end += 1;
            }
            let literal: String = chars[i..end].iter().collect();
            spans.push(Span::styled(literal, Style::default().fg(DEFAULT_THEME.string)));
            i = end;
            continue;
        }

        // Handle non-alphanumeric (delimiters)
        if !c.is_alphanumeric() && c != '_' && c != '.' {
            if !current_word.is_empty() {
                let is_call = c == '(';
                let style = word_style(&current_word, is_call);
                spans.push(Span::styled(current_word.clone(), style));
                current_word.clear();
            }

            let style = match c {
                '{' | '}' | '(' | ')' | '[' | ']' | '<' | '>' => {
                    Style::default().fg(DEFAULT_THEME.primary)
                }
                _ => Style::default().fg(DEFAULT_THEME.fg),
            };
            spans.push(Span::styled(c.to_string(), style));
            i += 1;
            continue;
        }

        current_word.push(c);
        i += 1;
    }

    if !current_word.is_empty() {
        let style = word_style(&current_word, false);
        spans.push(Span::styled(current_word, style));
    }

    Line::from(spans)
}

fn word_style(word: &str, is_call: bool) -> Style {
    // Method calls arrive as `receiver.method`
    let last = word.rsplit('.').next().unwrap_or(word);
    match last {
        "let" | "class" | "if" | "else" | "pub" | "private" | "virtual" => Style::default()
            .fg(DEFAULT_THEME.keyword)
            .add_modifier(Modifier::BOLD),
        "shared" | "Shared" => Style::default().fg(DEFAULT_THEME.shared),
        "weak" => Style::default().fg(DEFAULT_THEME.weak),
        "exclusive" | "move" => Style::default().fg(DEFAULT_THEME.exclusive),
        "release" | "drop" => Style::default()
            .fg(DEFAULT_THEME.error)
            .add_modifier(Modifier::BOLD),
        _ if last.chars().all(|ch| ch.is_ascii_digit()) => {
            Style::default().fg(DEFAULT_THEME.number)
        }
        _ if last.starts_with(|ch: char| ch.is_ascii_uppercase()) => {
            Style::default().fg(DEFAULT_THEME.type_name)
        }
        _ if is_call => Style::default().fg(DEFAULT_THEME.function),
        _ => Style::default().fg(DEFAULT_THEME.fg),
    }
}

/// Render the script pane
///
/// `current_step` is the step the visible snapshot was taken after (`None`
/// before the first step).
#[allow(clippy::too_many_arguments)]
pub fn render_script_pane(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    lines: &[&str],
    current_step: Option<usize>,
    is_error: bool,
    is_focused: bool,
    target_line_row: &mut Option<usize>,
) {
    let block = pane_block(&format!(" {} ", title), is_focused);

    let total_lines = lines.len();
    let visible_height = area.height.saturating_sub(2).max(1) as usize;

    // Keep the current line at a fixed visual row
    let target_row = target_line_row
        .unwrap_or(visible_height / 2)
        .min(visible_height.saturating_sub(1));
    *target_line_row = Some(target_row);

    let mut offset = current_step.unwrap_or(0).saturating_sub(target_row);
    if total_lines > visible_height {
        offset = offset.min(total_lines - visible_height);
    } else {
        offset = 0;
    }

    let visible_lines: Vec<Line> = lines
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible_height)
        .map(|(idx, line)| {
            let is_current = current_step == Some(idx);
            let marker = if is_current { "▶" } else { " " };
            let line_num_str = format!("{}{:3} ", marker, idx + 1);

            let mut content = highlight_script_line(line);
            let num_style = if is_current && is_error {
                for span in &mut content.spans {
                    span.style = Style::default()
                        .bg(DEFAULT_THEME.error)
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD);
                }
                Style::default()
                    .fg(DEFAULT_THEME.error)
                    .add_modifier(Modifier::BOLD)
            } else if is_current {
                for span in &mut content.spans {
                    span.style = span.style.patch(Style::default().bg(DEFAULT_THEME.current_line_bg));
                }
                Style::default()
                    .fg(DEFAULT_THEME.secondary)
                    .add_modifier(Modifier::BOLD)
            } else if current_step.is_some_and(|step| idx < step) {
                Style::default().fg(DEFAULT_THEME.success)
            } else {
                Style::default().fg(DEFAULT_THEME.comment)
            };

            let mut spans = vec![Span::styled(line_num_str, num_style)];
            spans.extend(content.spans);
            Line::from(spans)
        })
        .collect();

    let paragraph = Paragraph::new(visible_lines).block(block);
    frame.render_widget(paragraph, area);
}
