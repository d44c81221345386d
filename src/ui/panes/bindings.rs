//! Bindings pane: the caller's named handles

use super::{clamp_scroll, pane_block};
use crate::memory::handle::HandleKind;
use crate::memory::heap::{HandleState, Heap};
use crate::memory::value::Value;
use crate::sandbox::bindings::{Binding, Bindings};
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
    Frame,
};

/// What a binding currently refers to
fn describe_target(heap: &Heap<Value>, binding: &Binding) -> (String, Style) {
    let state = heap.record(binding.id()).map(|record| record.state);
    match state {
        Some(HandleState::Moved) => ("moved".to_string(), Style::default().fg(DEFAULT_THEME.comment)),
        Some(HandleState::Released) => (
            "released".to_string(),
            Style::default().fg(DEFAULT_THEME.comment),
        ),
        Some(HandleState::Live) => match heap.node(binding.node()) {
            Some(node) => (
                format!("{} {}", node.label, binding.node()),
                Style::default().fg(DEFAULT_THEME.fg),
            ),
            None => (
                "expired".to_string(),
                Style::default()
                    .fg(DEFAULT_THEME.error)
                    .add_modifier(Modifier::BOLD),
            ),
        },
        None => ("unknown".to_string(), Style::default().fg(DEFAULT_THEME.error)),
    }
}

pub(crate) fn kind_style(kind: HandleKind) -> Style {
    let color = match kind {
        HandleKind::Shared => DEFAULT_THEME.shared,
        HandleKind::Weak => DEFAULT_THEME.weak,
        HandleKind::Exclusive => DEFAULT_THEME.exclusive,
    };
    Style::default().fg(color)
}

/// Render the bindings pane
pub fn render_bindings_pane(
    frame: &mut Frame,
    area: Rect,
    bindings: &Bindings,
    heap: &Heap<Value>,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let block = pane_block(" Bindings ", is_focused);

    let all_items: Vec<ListItem> = if bindings.is_empty() {
        vec![ListItem::new("(no bindings)").style(Style::default().fg(DEFAULT_THEME.comment))]
    } else {
        bindings
            .iter()
            .map(|(name, binding)| {
                let (target, target_style) = describe_target(heap, binding);
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<10}", name),
                        Style::default()
                            .fg(DEFAULT_THEME.fg)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("{:<10}", binding.kind().to_string()), kind_style(binding.kind())),
                    Span::styled(
                        format!("{:<5}", binding.id().to_string()),
                        Style::default().fg(DEFAULT_THEME.comment),
                    ),
                    Span::raw("→ "),
                    Span::styled(target, target_style),
                ]))
            })
            .collect()
    };

    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    clamp_scroll(scroll_offset, all_items.len(), visible_height);

    let visible_items: Vec<ListItem> = all_items
        .into_iter()
        .skip(*scroll_offset)
        .take(visible_height)
        .collect();

    frame.render_widget(List::new(visible_items).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_target_tracks_handle_state() {
        let mut heap: Heap<Value> = Heap::default();
        let a = heap.create_shared("a", Value::Int(1)).unwrap();
        let weak = heap.weak_from(&a).unwrap();
        let b = heap.create_exclusive("b", Value::Int(2)).unwrap();
        let moved_to = heap.move_exclusive(b).unwrap();

        assert!(describe_target(&heap, &Binding::from(a)).0.starts_with("a @0v0"));
        assert_eq!(describe_target(&heap, &Binding::from(b)).0, "moved");

        heap.release_shared(a).unwrap();
        assert_eq!(describe_target(&heap, &Binding::from(a)).0, "released");
        assert_eq!(describe_target(&heap, &Binding::from(weak)).0, "expired");
        assert!(describe_target(&heap, &Binding::from(moved_to)).0.starts_with("b"));
    }
}
