// Snapshot management for stepping through a scenario

use crate::memory::{handle::NodeId, heap::Heap, value::Value};
use crate::sandbox::bindings::Bindings;
use crate::sandbox::errors::SandboxError;

/// What produced a terminal line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Output,
    Teardown,
    Error,
}

/// A line of terminal output with the step that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalLine {
    pub text: String,
    pub step: usize,
    pub kind: LineKind,
}

/// Captured sandbox output
#[derive(Debug, Clone, Default)]
pub struct Terminal {
    pub lines: Vec<TerminalLine>,
}

impl Terminal {
    pub fn new() -> Self {
        Terminal { lines: Vec::new() }
    }

    /// Output printed by a method body or a scenario step
    pub fn print(&mut self, text: impl Into<String>, step: usize) {
        self.push(text.into(), step, LineKind::Output);
    }

    /// A node's teardown
    pub fn teardown(&mut self, text: impl Into<String>, step: usize) {
        self.push(text.into(), step, LineKind::Teardown);
    }

    /// A reported misuse
    pub fn error(&mut self, text: impl Into<String>, step: usize) {
        self.push(text.into(), step, LineKind::Error);
    }

    /// Get all lines as a vector of strings
    pub fn get_output(&self) -> Vec<String> {
        self.lines.iter().map(|line| line.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn push(&mut self, text: String, step: usize, kind: LineKind) {
        self.lines.push(TerminalLine { text, step, kind });
    }
}

/// Sandbox state after one scenario step
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub heap: Heap<Value>,
    pub bindings: Bindings,
    pub terminal: Terminal,
    /// Step just executed; `None` before the first step
    pub step: Option<usize>,
    /// Error the step failed with, if any
    pub error: Option<SandboxError>,
    /// Live nodes no caller can reach any more
    pub leaked: Vec<NodeId>,
}

impl Snapshot {
    /// Estimate the memory usage of this snapshot in bytes
    pub fn estimated_size(&self) -> usize {
        // Rough: nodes carry a label, a payload and a few fields
        let heap_size = self
            .heap
            .nodes()
            .map(|(_, node)| 96 + node.label.len() + node.fields.len() * 48)
            .sum::<usize>();

        // Every issued handle keeps a record, and the teardown log only grows
        let record_size = self.heap.record_count() * 48;
        let teardown_size = self
            .heap
            .teardown_log()
            .iter()
            .map(|event| 40 + event.label.len())
            .sum::<usize>();
        let bindings_size = self.bindings.len() * 48;

        let terminal_size = self
            .terminal
            .lines
            .iter()
            .map(|line| 32 + line.text.len())
            .sum::<usize>();

        heap_size
            + record_size
            + teardown_size
            + bindings_size
            + terminal_size
            + self.leaked.len() * 8
    }
}

/// Manages the snapshot history of a session
#[derive(Debug)]
pub struct SnapshotManager {
    snapshots: Vec<Snapshot>,
    max_memory: usize,
    current_memory: usize,
}

impl SnapshotManager {
    pub fn new(max_memory: usize) -> Self {
        SnapshotManager {
            snapshots: Vec::new(),
            max_memory,
            current_memory: 0,
        }
    }

    /// Add a snapshot to history
    pub fn push(&mut self, snapshot: Snapshot) -> Result<(), SandboxError> {
        let snapshot_size = snapshot.estimated_size();

        if self.current_memory + snapshot_size > self.max_memory {
            return Err(SandboxError::SnapshotLimitExceeded {
                current: self.current_memory + snapshot_size,
                limit: self.max_memory,
            });
        }

        self.current_memory += snapshot_size;
        self.snapshots.push(snapshot);
        Ok(())
    }

    /// Get a snapshot by index
    pub fn get(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    /// Get the number of snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Get current memory usage
    pub fn memory_usage(&self) -> usize {
        self.current_memory
    }

    /// Get max memory limit
    pub fn memory_limit(&self) -> usize {
        self.max_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(lines: usize) -> Snapshot {
        let mut terminal = Terminal::new();
        for i in 0..lines {
            terminal.print(format!("line {}", i), i);
        }
        Snapshot {
            heap: Heap::default(),
            bindings: Bindings::default(),
            terminal,
            step: None,
            error: None,
            leaked: Vec::new(),
        }
    }

    #[test]
    fn test_terminal_keeps_line_kinds() {
        let mut terminal = Terminal::new();
        terminal.print("Rex barks", 0);
        terminal.teardown("~Rex", 1);
        terminal.error("error: Double release of handle #1", 2);

        let kinds: Vec<LineKind> = terminal.lines.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![LineKind::Output, LineKind::Teardown, LineKind::Error]);
        assert_eq!(terminal.get_output()[1], "~Rex");
    }

    #[test]
    fn test_manager_enforces_memory_limit() {
        let first = snapshot(1);
        let size = first.estimated_size();
        let mut manager = SnapshotManager::new(size + size / 2);

        assert!(manager.push(first).is_ok());
        assert_eq!(manager.memory_usage(), size);

        let result = manager.push(snapshot(1));
        assert!(
            matches!(result, Err(SandboxError::SnapshotLimitExceeded { .. })),
            "second snapshot should not fit: {:?}",
            result
        );
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_estimate_counts_issued_handles_and_teardowns() {
        let mut snap = snapshot(0);
        let anchor = snap.heap.create_shared("anchor", Value::Int(0)).unwrap();
        let before = snap.estimated_size();

        for _ in 0..1000 {
            let copy = snap.heap.duplicate_shared(&anchor).unwrap();
            snap.heap.release_shared(copy).unwrap();
        }
        let after_handles = snap.estimated_size();
        assert!(
            after_handles >= before + 1000 * 48,
            "records not counted: {} -> {}",
            before,
            after_handles
        );

        // The node goes away but its Begin and End events stay
        let node_size = 96 + "anchor".len();
        let event_size = 40 + "anchor".len();
        snap.heap.release_shared(anchor).unwrap();
        assert_eq!(
            snap.estimated_size(),
            after_handles - node_size + 2 * event_size
        );
    }
}
