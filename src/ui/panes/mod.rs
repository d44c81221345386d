//! TUI pane rendering modules
//!
//! # Pane Modules
//!
//! - [`script`]: Scenario script with the current step highlighted
//! - [`bindings`]: Named handles and the state of what they point at
//! - [`heap`]: Live nodes with counts, payloads and outgoing edges
//! - [`terminal`]: Captured output, teardown and error lines
//! - [`status`]: Status bar with keybindings and history position
//!
//! Each pane module exports a primary `render_*` function. Panes are stateless
//! apart from the scroll offsets the app passes in.

pub mod bindings;
pub mod heap;
pub mod script;
pub mod status;
pub mod terminal;

pub use bindings::render_bindings_pane;
pub use heap::{render_heap_pane, HeapRenderData};
pub use script::render_script_pane;
pub use status::{render_status_bar, StatusRenderData};
pub use terminal::render_terminal_pane;

use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    style::{Modifier, Style},
    widgets::{Block, Borders},
};

/// Bordered block with the focus highlight
fn pane_block(title: &str, is_focused: bool) -> Block<'static> {
    let border_style = if is_focused {
        Style::default()
            .fg(DEFAULT_THEME.border_focused)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DEFAULT_THEME.border_normal)
    };

    Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(border_style)
}

/// Clamp a scroll offset so the last page stays full
fn clamp_scroll(offset: &mut usize, total_items: usize, visible_height: usize) {
    if total_items > visible_height {
        *offset = (*offset).min(total_items - visible_height);
    } else {
        *offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_scroll() {
        let mut offset = usize::MAX;
        clamp_scroll(&mut offset, 10, 4);
        assert_eq!(offset, 6);

        clamp_scroll(&mut offset, 3, 4);
        assert_eq!(offset, 0);
    }
}
