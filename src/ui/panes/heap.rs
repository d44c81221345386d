//! Heap pane rendering
//!
//! Shows every live node in slot order:
//!
//! ```text
//! @0v0 my_car  shared  strong 1  weak 0
//!      <Car>
//!      .engine ──exclusive──▶ engine @1v0
//! ```
//!
//! Object payloads list their fields per sub-object, qualified by the
//! sub-object's path. Nodes that nothing outside a cycle can reach are
//! flagged as leaked.

use super::bindings::kind_style;
use super::{clamp_scroll, pane_block};
use crate::dispatch::registry::TypeRegistry;
use crate::memory::handle::NodeId;
use crate::memory::heap::{Heap, HeapNode, Ownership};
use crate::memory::value::Value;
use crate::ui::theme::DEFAULT_THEME;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
    Frame,
};

/// Data needed to render the heap pane
pub struct HeapRenderData<'a> {
    pub heap: &'a Heap<Value>,
    pub registry: &'a TypeRegistry,
    pub leaked: &'a [NodeId],
}

fn payload_lines(node: &HeapNode<Value>, registry: &TypeRegistry) -> Vec<Line<'static>> {
    let value_style = Style::default().fg(DEFAULT_THEME.number);
    let Some(instance) = node.value.as_object() else {
        return vec![Line::from(vec![
            Span::raw("     = "),
            Span::styled(node.value.to_string(), value_style),
        ])];
    };

    let mut lines = vec![Line::from(Span::styled(
        format!("     <{}>", instance.class()),
        Style::default().fg(DEFAULT_THEME.type_name),
    ))];

    let Ok(layout) = registry.layout(instance.class()) else {
        return lines;
    };
    for (index, info) in layout.subobjects().iter().enumerate() {
        let Some(fields) = instance.fields_at(index) else {
            continue;
        };
        let mut names: Vec<&String> = fields.keys().collect();
        names.sort();
        for name in names {
            let value = fields.get(name).map(|v| v.to_string()).unwrap_or_default();
            lines.push(Line::from(vec![
                Span::styled(
                    format!("     {}::", info.path_string()),
                    Style::default().fg(DEFAULT_THEME.comment),
                ),
                Span::styled(name.clone(), Style::default().fg(DEFAULT_THEME.fg)),
                Span::raw(" = "),
                Span::styled(value, value_style),
            ]));
        }
    }
    lines
}

fn edge_lines(node: &HeapNode<Value>, heap: &Heap<Value>) -> Vec<Line<'static>> {
    node.fields
        .iter()
        .map(|(name, edge)| {
            let target = match heap.node(edge.target()) {
                Some(entry) => Span::styled(
                    format!("{} {}", entry.label, edge.target()),
                    Style::default().fg(DEFAULT_THEME.fg),
                ),
                None => Span::styled(
                    "(expired)".to_string(),
                    Style::default().fg(DEFAULT_THEME.error),
                ),
            };
            Line::from(vec![
                Span::styled(format!("     .{} ", name), Style::default().fg(DEFAULT_THEME.fg)),
                Span::styled(format!("──{}──▶ ", edge.kind()), kind_style(edge.kind())),
                target,
            ])
        })
        .collect()
}

/// Render the heap pane
pub fn render_heap_pane(
    frame: &mut Frame,
    area: Rect,
    data: HeapRenderData<'_>,
    is_focused: bool,
    scroll_offset: &mut usize,
) {
    let title = format!(
        " Heap ({} live / {} max) ",
        data.heap.live_count(),
        data.heap.max_nodes()
    );
    let block = pane_block(&title, is_focused);

    let mut all_items: Vec<ListItem> = Vec::new();
    for (id, node) in data.heap.nodes() {
        let (ownership, ownership_style) = match node.ownership {
            Ownership::Shared => ("shared", Style::default().fg(DEFAULT_THEME.shared)),
            Ownership::Exclusive => ("exclusive", Style::default().fg(DEFAULT_THEME.exclusive)),
        };

        let mut header = vec![
            Span::styled(format!("{:<5}", id.to_string()), Style::default().fg(DEFAULT_THEME.comment)),
            Span::raw(" "),
            Span::styled(
                node.label.clone(),
                Style::default()
                    .fg(DEFAULT_THEME.fg)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(ownership, ownership_style),
        ];
        if node.ownership == Ownership::Shared {
            header.push(Span::styled(
                format!("  strong {}  weak {}", node.strong, node.weak),
                Style::default().fg(DEFAULT_THEME.comment),
            ));
        }
        if data.leaked.contains(&id) {
            header.push(Span::styled(
                "  LEAKED",
                Style::default()
                    .fg(DEFAULT_THEME.error)
                    .add_modifier(Modifier::BOLD),
            ));
        }

        let mut lines = vec![Line::from(header)];
        lines.extend(payload_lines(node, data.registry));
        lines.extend(edge_lines(node, data.heap));
        all_items.push(ListItem::new(lines));
    }

    if all_items.is_empty() {
        all_items.push(
            ListItem::new("(no live nodes)").style(Style::default().fg(DEFAULT_THEME.comment)),
        );
    }

    // Items are multi-line; scroll by item
    let visible_height = area.height.saturating_sub(2).max(1) as usize;
    clamp_scroll(scroll_offset, all_items.len(), visible_height.min(all_items.len()).max(1));

    let visible_items: Vec<ListItem> = all_items.into_iter().skip(*scroll_offset).collect();
    frame.render_widget(List::new(visible_items).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::registry::ClassDef;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn test_payload_lines_qualify_fields() {
        let mut registry = TypeRegistry::new();
        registry
            .register(ClassDef::new("Animal").field("name", "Generic"))
            .unwrap();
        registry
            .register(ClassDef::new("Dog").extends("Animal"))
            .unwrap();

        let mut heap: Heap<Value> = Heap::default();
        let dog = heap
            .create_shared("rex", Value::Object(registry.instantiate("Dog").unwrap()))
            .unwrap();
        let node = heap.node(dog.node()).unwrap();

        let lines: Vec<String> = payload_lines(node, &registry).iter().map(text).collect();
        assert_eq!(lines, vec!["     <Dog>", "     Dog::Animal::name = \"Generic\""]);
    }

    #[test]
    fn test_edge_lines_show_kind_and_target() {
        let mut heap: Heap<Value> = Heap::default();
        let a = heap.create_shared("A", Value::Unit).unwrap();
        let b = heap.create_shared("B", Value::Unit).unwrap();
        heap.store_weak(&a, "b_ptr", &b).unwrap();

        let node = heap.node(a.node()).unwrap();
        let lines: Vec<String> = edge_lines(node, &heap).iter().map(text).collect();
        assert_eq!(lines, vec!["     .b_ptr ──weak──▶ B @1v0"]);
    }
}
