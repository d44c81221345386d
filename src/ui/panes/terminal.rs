//! Terminal output pane rendering

use super::{clamp_scroll, pane_block};
use crate::snapshot::{LineKind, Terminal};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    widgets::{List, ListItem, Padding, Paragraph},
    Frame,
};

/// Render the terminal output pane
///
/// Lines produced by `current_step` are drawn bold.
pub fn render_terminal_pane(
    frame: &mut Frame,
    area: Rect,
    terminal: &Terminal,
    current_step: Option<usize>,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = pane_block(" Terminal Output ", is_focused);

    if terminal.is_empty() {
        let paragraph = Paragraph::new("(no output)")
            .block(block)
            .style(Style::default().fg(DEFAULT_THEME.comment));
        frame.render_widget(paragraph, area);
        return;
    }

    let block = block.padding(Padding::new(1, 0, 0, 0));
    let all_items: Vec<ListItem> = terminal
        .lines
        .iter()
        .map(|line| {
            let color = match line.kind {
                LineKind::Output => DEFAULT_THEME.fg,
                LineKind::Teardown => DEFAULT_THEME.secondary,
                LineKind::Error => DEFAULT_THEME.error,
            };
            let mut style = Style::default().fg(color);
            if Some(line.step) == current_step {
                style = style.add_modifier(Modifier::BOLD);
            }
            ListItem::new(line.text.as_str()).style(style)
        })
        .collect();

    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    clamp_scroll(scroll_offset, all_items.len(), visible_height);

    let visible_items: Vec<ListItem> = all_items
        .into_iter()
        .skip(*scroll_offset)
        .take(visible_height)
        .collect();

    let list = List::new(visible_items).block(block);
    frame.render_widget(list, area);
}
