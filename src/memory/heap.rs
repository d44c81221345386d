//! Heap implementation for the sandbox
//!
//! This module provides a generational arena with three ownership relations:
//! - Shared handles with strong counts (destroyed when the count reaches zero)
//! - Weak handles that observe liveness without extending it
//! - Exclusive handles that can only be transferred, never duplicated
//!
//! Every issued handle keeps a [`HandleRecord`] for the lifetime of the heap.
//! Records are never removed, which is what makes double releases and
//! use-after-move detectable instead of silently corrupting counts.
//!
//! # Teardown
//!
//! Destroying a node appends [`TeardownPhase::Begin`], releases the node's
//! owning fields in reverse declaration order (recursively, depth-first), and
//! finally appends [`TeardownPhase::End`]. A node stops being observable
//! through weak handles the moment its teardown begins.
//!
//! A heap built with [`Heap::with_reclaimed_payloads`] keeps the payload of
//! every destroyed node, tagged with its `Begin` event, until the owner
//! collects it with [`Heap::take_reclaimed`]. The sandbox uses this to run
//! class destructors in teardown order.

use super::handle::{
    ExclusiveHandle, Handle, HandleId, HandleKind, NodeId, SharedHandle, WeakHandle,
};
use crate::config::DEFAULT_MAX_NODES;
use crate::sandbox::errors::SandboxError;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

/// How a node is owned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Shared,
    Exclusive,
}

/// Lifecycle of an issued handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Live,
    Released,
    Moved,
}

/// Who holds a handle: the caller, or a named field of another node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    Caller,
    Field(NodeId),
}

/// Bookkeeping for one issued handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRecord {
    pub kind: HandleKind,
    pub node: NodeId,
    pub state: HandleState,
    pub holder: Holder,
}

/// A relation stored in a node's field
pub enum Edge<T> {
    Shared(SharedHandle<T>),
    Weak(WeakHandle<T>),
    Exclusive(ExclusiveHandle<T>),
}

impl<T> Edge<T> {
    pub fn id(&self) -> HandleId {
        match self {
            Edge::Shared(h) => h.id(),
            Edge::Weak(h) => h.id(),
            Edge::Exclusive(h) => h.id(),
        }
    }

    pub fn kind(&self) -> HandleKind {
        match self {
            Edge::Shared(_) => HandleKind::Shared,
            Edge::Weak(_) => HandleKind::Weak,
            Edge::Exclusive(_) => HandleKind::Exclusive,
        }
    }

    pub fn target(&self) -> NodeId {
        match self {
            Edge::Shared(h) => h.node(),
            Edge::Weak(h) => h.node(),
            Edge::Exclusive(h) => h.node(),
        }
    }
}

impl<T> Clone for Edge<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Edge<T> {}

impl<T> PartialEq for Edge<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.target() == other.target()
    }
}

impl<T> std::fmt::Debug for Edge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Shared(h) => std::fmt::Debug::fmt(h, f),
            Edge::Weak(h) => std::fmt::Debug::fmt(h, f),
            Edge::Exclusive(h) => std::fmt::Debug::fmt(h, f),
        }
    }
}

/// A live heap node
#[derive(Debug, Clone)]
pub struct HeapNode<T> {
    pub label: String,
    pub value: T,
    pub ownership: Ownership,
    pub strong: usize,
    pub weak: usize,
    pub fields: Vec<(String, Edge<T>)>,
}

impl<T> HeapNode<T> {
    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<Edge<T>> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, edge)| *edge)
    }
}

/// State of a heap slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Vacant,
    Allocated,
    TearingDown, // Owning fields are being released
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    state: SlotState,
    node: Option<HeapNode<T>>,
}

/// Which half of a node's teardown an event marks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPhase {
    Begin,
    End,
}

/// One entry of the observable teardown order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownEvent {
    pub node: NodeId,
    pub label: String,
    pub phase: TeardownPhase,
    pub depth: usize,
}

/// Payload of a destroyed node
#[derive(Debug, Clone)]
pub struct Reclaimed<T> {
    /// Index of the node's `Begin` event in the teardown log
    pub event: usize,
    pub node: NodeId,
    pub value: T,
}

/// The heap
#[derive(Debug, Clone)]
pub struct Heap<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    records: FxHashMap<HandleId, HandleRecord>,
    next_handle: u64,
    live_count: usize,
    max_nodes: usize,
    teardown_log: Vec<TeardownEvent>,
    keep_reclaimed: bool,
    reclaimed: Vec<Reclaimed<T>>,
}

impl<T> Heap<T> {
    /// Create a new heap with a limit on simultaneously live nodes
    pub fn new(max_nodes: usize) -> Self {
        Heap {
            slots: Vec::new(),
            free_list: Vec::new(),
            records: FxHashMap::default(),
            next_handle: 1,
            live_count: 0,
            max_nodes,
            teardown_log: Vec::new(),
            keep_reclaimed: false,
            reclaimed: Vec::new(),
        }
    }

    /// Keep destroyed payloads until [`Heap::take_reclaimed`] collects them
    pub fn with_reclaimed_payloads(mut self) -> Self {
        self.keep_reclaimed = true;
        self
    }

    /// Collect the payloads of nodes destroyed since the last call
    pub fn take_reclaimed(&mut self) -> Vec<Reclaimed<T>> {
        std::mem::take(&mut self.reclaimed)
    }

    // ========== Shared ownership ==========

    /// Allocate a shared node; its strong count starts at one
    pub fn create_shared(
        &mut self,
        label: impl Into<String>,
        value: T,
    ) -> Result<SharedHandle<T>, SandboxError> {
        let node = self.allocate(label.into(), value, Ownership::Shared)?;
        if let Some(entry) = self.live_node_mut(node) {
            entry.strong = 1;
        }
        let id = self.issue(HandleKind::Shared, node, Holder::Caller);
        Ok(SharedHandle::new(id, node))
    }

    /// Issue another shared handle to the same node
    pub fn duplicate_shared(
        &mut self,
        handle: &SharedHandle<T>,
    ) -> Result<SharedHandle<T>, SandboxError> {
        self.live_record(handle)?;
        let entry = self
            .live_node_mut(handle.node())
            .ok_or(SandboxError::UnknownHandle { handle: handle.id() })?;
        entry.strong += 1;
        debug!(node = %handle.node(), strong = entry.strong, "duplicated shared handle");
        let id = self.issue(HandleKind::Shared, handle.node(), Holder::Caller);
        Ok(SharedHandle::new(id, handle.node()))
    }

    /// Release a caller-held shared handle, destroying the node at zero
    pub fn release_shared(&mut self, handle: SharedHandle<T>) -> Result<(), SandboxError> {
        self.retire(&handle, HandleState::Released)?;
        self.drop_strong(handle.node(), 0);
        Ok(())
    }

    // ========== Weak observation ==========

    /// Observe a shared node without extending its lifetime
    pub fn weak_from(&mut self, handle: &SharedHandle<T>) -> Result<WeakHandle<T>, SandboxError> {
        self.live_record(handle)?;
        let entry = self
            .live_node_mut(handle.node())
            .ok_or(SandboxError::UnknownHandle { handle: handle.id() })?;
        entry.weak += 1;
        let id = self.issue(HandleKind::Weak, handle.node(), Holder::Caller);
        Ok(WeakHandle::new(id, handle.node()))
    }

    /// Upgrade a weak handle; `None` once the target is gone
    pub fn resolve_weak(
        &mut self,
        handle: &WeakHandle<T>,
    ) -> Result<Option<SharedHandle<T>>, SandboxError> {
        self.live_record(handle)?;
        match self.live_node_mut(handle.node()) {
            Some(entry) => {
                entry.strong += 1;
                let id = self.issue(HandleKind::Shared, handle.node(), Holder::Caller);
                Ok(Some(SharedHandle::new(id, handle.node())))
            }
            None => Ok(None),
        }
    }

    /// Release a caller-held weak handle
    pub fn release_weak(&mut self, handle: WeakHandle<T>) -> Result<(), SandboxError> {
        self.retire(&handle, HandleState::Released)?;
        self.drop_weak(handle.node());
        Ok(())
    }

    // ========== Exclusive ownership ==========

    /// Allocate a node with a single owner
    pub fn create_exclusive(
        &mut self,
        label: impl Into<String>,
        value: T,
    ) -> Result<ExclusiveHandle<T>, SandboxError> {
        let node = self.allocate(label.into(), value, Ownership::Exclusive)?;
        let id = self.issue(HandleKind::Exclusive, node, Holder::Caller);
        Ok(ExclusiveHandle::new(id, node))
    }

    /// Transfer ownership; the source handle becomes unusable
    pub fn move_exclusive(
        &mut self,
        handle: ExclusiveHandle<T>,
    ) -> Result<ExclusiveHandle<T>, SandboxError> {
        self.retire(&handle, HandleState::Moved)?;
        let id = self.issue(HandleKind::Exclusive, handle.node(), Holder::Caller);
        debug!(from = %handle.id(), to = %id, "moved exclusive handle");
        Ok(ExclusiveHandle::new(id, handle.node()))
    }

    /// Destroy an exclusively owned node
    pub fn drop_exclusive(&mut self, handle: ExclusiveHandle<T>) -> Result<(), SandboxError> {
        self.retire(&handle, HandleState::Released)?;
        self.destroy(handle.node(), 0);
        Ok(())
    }

    // ========== Access ==========

    /// Borrow the payload behind any live handle
    ///
    /// Weak handles fail with [`SandboxError::ExpiredReference`] once the
    /// target has been destroyed.
    pub fn get<H: Handle<Target = T>>(&self, handle: &H) -> Result<&T, SandboxError> {
        let node = self.target_node(handle)?;
        self.slot_node(node)
            .map(|entry| &entry.value)
            .ok_or(SandboxError::ExpiredReference { handle: handle.id() })
    }

    /// Mutably borrow the payload behind any live handle
    pub fn get_mut<H: Handle<Target = T>>(&mut self, handle: &H) -> Result<&mut T, SandboxError> {
        let node = self.target_node(handle)?;
        self.live_node_mut(node)
            .map(|entry| &mut entry.value)
            .ok_or(SandboxError::ExpiredReference { handle: handle.id() })
    }

    /// Label given to the node at creation
    pub fn label<H: Handle<Target = T>>(&self, handle: &H) -> Result<&str, SandboxError> {
        let node = self.target_node(handle)?;
        self.slot_node(node)
            .map(|entry| entry.label.as_str())
            .ok_or(SandboxError::ExpiredReference { handle: handle.id() })
    }

    /// Whether the handle's target is still alive
    pub fn is_alive<H: Handle<Target = T>>(&self, handle: &H) -> Result<bool, SandboxError> {
        self.live_record(handle)?;
        Ok(self.is_live(handle.node()))
    }

    /// Strong count of the target (zero once destroyed)
    pub fn strong_count<H: Handle<Target = T>>(&self, handle: &H) -> Result<usize, SandboxError> {
        self.live_record(handle)?;
        Ok(self.node(handle.node()).map_or(0, |entry| entry.strong))
    }

    /// Weak count of the target (zero once destroyed)
    pub fn weak_count<H: Handle<Target = T>>(&self, handle: &H) -> Result<usize, SandboxError> {
        self.live_record(handle)?;
        Ok(self.node(handle.node()).map_or(0, |entry| entry.weak))
    }

    // ========== Relations ==========

    /// Store a new shared handle to `target` in `owner`'s field
    pub fn store_shared<H: Handle<Target = T>>(
        &mut self,
        owner: &H,
        field: &str,
        target: &SharedHandle<T>,
    ) -> Result<(), SandboxError> {
        let owner_node = self.target_node(owner)?;
        self.live_record(target)?;
        let entry = self
            .live_node_mut(target.node())
            .ok_or(SandboxError::UnknownHandle { handle: target.id() })?;
        entry.strong += 1;
        let id = self.issue(HandleKind::Shared, target.node(), Holder::Field(owner_node));
        self.put_field(
            owner_node,
            field,
            Edge::Shared(SharedHandle::new(id, target.node())),
        )
    }

    /// Store a new weak handle to `target` in `owner`'s field
    pub fn store_weak<H: Handle<Target = T>>(
        &mut self,
        owner: &H,
        field: &str,
        target: &SharedHandle<T>,
    ) -> Result<(), SandboxError> {
        let owner_node = self.target_node(owner)?;
        self.live_record(target)?;
        let entry = self
            .live_node_mut(target.node())
            .ok_or(SandboxError::UnknownHandle { handle: target.id() })?;
        entry.weak += 1;
        let id = self.issue(HandleKind::Weak, target.node(), Holder::Field(owner_node));
        self.put_field(
            owner_node,
            field,
            Edge::Weak(WeakHandle::new(id, target.node())),
        )
    }

    /// Move an exclusive handle into `owner`'s field
    pub fn store_exclusive<H: Handle<Target = T>>(
        &mut self,
        owner: &H,
        field: &str,
        target: ExclusiveHandle<T>,
    ) -> Result<(), SandboxError> {
        let owner_node = self.target_node(owner)?;
        self.retire(&target, HandleState::Moved)?;
        let id = self.issue(HandleKind::Exclusive, target.node(), Holder::Field(owner_node));
        self.put_field(
            owner_node,
            field,
            Edge::Exclusive(ExclusiveHandle::new(id, target.node())),
        )
    }

    /// Remove a field, releasing what it held. Returns whether it existed.
    pub fn clear_field<H: Handle<Target = T>>(
        &mut self,
        owner: &H,
        field: &str,
    ) -> Result<bool, SandboxError> {
        let owner_node = self.target_node(owner)?;
        let entry = self
            .live_node_mut(owner_node)
            .ok_or(SandboxError::ExpiredReference { handle: owner.id() })?;
        let Some(position) = entry.fields.iter().position(|(name, _)| name == field) else {
            return Ok(false);
        };
        let (_, edge) = entry.fields.remove(position);
        self.release_edge(edge, 0);
        Ok(true)
    }

    /// Read a field of the owner
    pub fn field<H: Handle<Target = T>>(
        &self,
        owner: &H,
        field: &str,
    ) -> Result<Option<Edge<T>>, SandboxError> {
        let owner_node = self.target_node(owner)?;
        let entry = self
            .slot_node(owner_node)
            .ok_or(SandboxError::ExpiredReference { handle: owner.id() })?;
        Ok(entry.field(field))
    }

    // ========== Introspection ==========

    /// Whether a node id refers to a live (not tearing down) node
    pub fn is_live(&self, node: NodeId) -> bool {
        self.slots.get(node.index as usize).is_some_and(|slot| {
            slot.generation == node.generation && slot.state == SlotState::Allocated
        })
    }

    /// Look up a live node by id
    pub fn node(&self, node: NodeId) -> Option<&HeapNode<T>> {
        if self.is_live(node) {
            self.slot_node(node)
        } else {
            None
        }
    }

    /// All live nodes in slot order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &HeapNode<T>)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            if slot.state != SlotState::Allocated {
                return None;
            }
            slot.node.as_ref().map(|entry| {
                (
                    NodeId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    entry,
                )
            })
        })
    }

    /// Payload of a live node, bypassing handle checks
    pub(crate) fn value_mut(&mut self, node: NodeId) -> Option<&mut T> {
        self.live_node_mut(node).map(|entry| &mut entry.value)
    }

    /// Get a handle's record, if it was issued by this heap
    pub fn record(&self, handle: HandleId) -> Option<&HandleRecord> {
        self.records.get(&handle)
    }

    /// Number of handles ever issued; records are kept for the heap's lifetime
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of live nodes
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Node limit
    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    /// Every teardown event so far, in order
    pub fn teardown_log(&self) -> &[TeardownEvent] {
        &self.teardown_log
    }

    /// Number of nodes whose teardown has completed
    pub fn destroyed_count(&self) -> usize {
        self.teardown_log
            .iter()
            .filter(|event| event.phase == TeardownPhase::End)
            .count()
    }

    /// Live nodes that no caller-held owning handle can reach
    ///
    /// These are the members of strong cycles: they keep each other alive
    /// but nothing outside the cycle refers to them.
    pub fn leaked_nodes(&self) -> Vec<NodeId> {
        let mut reachable = FxHashSet::default();
        let mut pending: Vec<NodeId> = self
            .records
            .values()
            .filter(|record| {
                record.state == HandleState::Live
                    && record.holder == Holder::Caller
                    && record.kind.is_owning()
            })
            .map(|record| record.node)
            .collect();

        while let Some(node) = pending.pop() {
            let Some(entry) = self.node(node) else {
                continue;
            };
            if !reachable.insert(node) {
                continue;
            }
            for (_, edge) in &entry.fields {
                if edge.kind().is_owning() {
                    pending.push(edge.target());
                }
            }
        }

        self.nodes()
            .map(|(node, _)| node)
            .filter(|node| !reachable.contains(node))
            .collect()
    }

    // ========== Internals ==========

    fn allocate(
        &mut self,
        label: String,
        value: T,
        ownership: Ownership,
    ) -> Result<NodeId, SandboxError> {
        if self.live_count >= self.max_nodes {
            return Err(SandboxError::CapacityExceeded {
                limit: self.max_nodes,
            });
        }

        debug!(label = %label, ?ownership, "allocating node");
        let entry = HeapNode {
            label,
            value,
            ownership,
            strong: 0,
            weak: 0,
            fields: Vec::new(),
        };

        let node = if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.state = SlotState::Allocated;
            slot.node = Some(entry);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                state: SlotState::Allocated,
                node: Some(entry),
            });
            NodeId {
                index,
                generation: 0,
            }
        };

        self.live_count += 1;
        Ok(node)
    }

    fn issue(&mut self, kind: HandleKind, node: NodeId, holder: Holder) -> HandleId {
        let id = HandleId(self.next_handle);
        self.next_handle += 1;
        self.records.insert(
            id,
            HandleRecord {
                kind,
                node,
                state: HandleState::Live,
                holder,
            },
        );
        id
    }

    /// Check that a handle was issued here, matches its record, and is live
    fn live_record<H: Handle>(&self, handle: &H) -> Result<&HandleRecord, SandboxError> {
        let id = handle.id();
        let record = self
            .records
            .get(&id)
            .ok_or(SandboxError::UnknownHandle { handle: id })?;
        if record.node != handle.node() {
            return Err(SandboxError::UnknownHandle { handle: id });
        }
        if record.kind != H::KIND {
            return Err(SandboxError::KindMismatch {
                handle: id,
                expected: H::KIND,
                found: record.kind,
            });
        }
        match record.state {
            HandleState::Live => Ok(record),
            HandleState::Released => Err(SandboxError::UseAfterRelease { handle: id }),
            HandleState::Moved => Err(SandboxError::UseAfterMove { handle: id }),
        }
    }

    /// Move a caller-held handle out of the `Live` state
    fn retire<H: Handle>(&mut self, handle: &H, next: HandleState) -> Result<(), SandboxError> {
        let id = handle.id();
        let record = self.live_record(handle).map_err(|err| match err {
            SandboxError::UseAfterRelease { handle } if next == HandleState::Released => {
                SandboxError::DoubleRelease { handle }
            }
            other => other,
        })?;
        if let Holder::Field(owner) = record.holder {
            return Err(SandboxError::HeldByField { handle: id, owner });
        }
        if let Some(record) = self.records.get_mut(&id) {
            record.state = next;
        }
        Ok(())
    }

    /// Resolve the node a handle may be used to access
    fn target_node<H: Handle>(&self, handle: &H) -> Result<NodeId, SandboxError> {
        self.live_record(handle)?;
        if self.is_live(handle.node()) {
            Ok(handle.node())
        } else {
            Err(SandboxError::ExpiredReference {
                handle: handle.id(),
            })
        }
    }

    fn slot_node(&self, node: NodeId) -> Option<&HeapNode<T>> {
        let slot = self.slots.get(node.index as usize)?;
        if slot.generation != node.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn live_node_mut(&mut self, node: NodeId) -> Option<&mut HeapNode<T>> {
        let slot = self.slots.get_mut(node.index as usize)?;
        if slot.generation != node.generation || slot.state != SlotState::Allocated {
            return None;
        }
        slot.node.as_mut()
    }

    fn put_field(&mut self, owner: NodeId, field: &str, edge: Edge<T>) -> Result<(), SandboxError> {
        let entry = self
            .live_node_mut(owner)
            .ok_or(SandboxError::ExpiredReference { handle: edge.id() })?;
        let previous = match entry.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, slot)) => Some(std::mem::replace(slot, edge)),
            None => {
                entry.fields.push((field.to_string(), edge));
                None
            }
        };
        if let Some(old) = previous {
            self.release_edge(old, 0);
        }
        Ok(())
    }

    fn drop_strong(&mut self, node: NodeId, depth: usize) {
        let Some(entry) = self.live_node_mut(node) else {
            warn!(%node, "strong release on a node that is not live");
            return;
        };
        if entry.strong == 0 {
            warn!(%node, "strong count already zero");
            return;
        }
        entry.strong -= 1;
        debug!(%node, strong = entry.strong, "released shared handle");
        if entry.strong == 0 {
            self.destroy(node, depth);
        }
    }

    fn drop_weak(&mut self, node: NodeId) {
        let Some(slot) = self.slots.get_mut(node.index as usize) else {
            return;
        };
        if slot.generation != node.generation {
            return;
        }
        if let Some(entry) = slot.node.as_mut() {
            entry.weak = entry.weak.saturating_sub(1);
        }
    }

    /// Release a handle that lived in a field
    fn release_edge(&mut self, edge: Edge<T>, depth: usize) {
        let id = edge.id();
        match self.records.get_mut(&id) {
            Some(record) if record.state == HandleState::Live => {
                record.state = HandleState::Released;
            }
            _ => {
                warn!(handle = %id, "field handle is no longer live");
                return;
            }
        }
        match edge {
            Edge::Shared(handle) => self.drop_strong(handle.node(), depth),
            Edge::Weak(handle) => self.drop_weak(handle.node()),
            Edge::Exclusive(handle) => self.destroy(handle.node(), depth),
        }
    }

    fn destroy(&mut self, node: NodeId, depth: usize) {
        let index = node.index as usize;
        let (label, fields) = {
            let Some(slot) = self.slots.get_mut(index) else {
                return;
            };
            if slot.generation != node.generation || slot.state != SlotState::Allocated {
                warn!(%node, "destroy requested for a node that is not live");
                return;
            }
            let Some(entry) = slot.node.as_mut() else {
                return;
            };
            slot.state = SlotState::TearingDown;
            (entry.label.clone(), std::mem::take(&mut entry.fields))
        };

        debug!(%node, label = %label, depth, "teardown begin");
        let begin = self.teardown_log.len();
        self.teardown_log.push(TeardownEvent {
            node,
            label: label.clone(),
            phase: TeardownPhase::Begin,
            depth,
        });

        for (_, edge) in fields.into_iter().rev() {
            self.release_edge(edge, depth + 1);
        }

        let payload = self.slots.get_mut(index).and_then(|slot| {
            slot.state = SlotState::Vacant;
            slot.generation = slot.generation.wrapping_add(1);
            slot.node.take().map(|entry| entry.value)
        });
        if let Some(value) = payload.filter(|_| self.keep_reclaimed) {
            self.reclaimed.push(Reclaimed {
                event: begin,
                node,
                value,
            });
        }
        self.free_list.push(node.index);
        self.live_count -= 1;

        debug!(%node, label = %label, "teardown end");
        self.teardown_log.push(TeardownEvent {
            node,
            label,
            phase: TeardownPhase::End,
            depth,
        });
    }
}

impl<T> Default for Heap<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NODES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begins(heap: &Heap<i32>) -> Vec<String> {
        heap.teardown_log()
            .iter()
            .filter(|e| e.phase == TeardownPhase::Begin)
            .map(|e| e.label.clone())
            .collect()
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let mut heap = Heap::new(8);
        let first = heap.create_shared("first", 1).unwrap();
        let weak = heap.weak_from(&first).unwrap();
        heap.release_shared(first).unwrap();

        let second = heap.create_shared("second", 2).unwrap();
        assert_eq!(second.node().index, first.node().index);
        assert_ne!(second.node().generation, first.node().generation);

        // The stale weak handle must not see the new occupant
        assert!(!heap.is_alive(&weak).unwrap());
        assert_eq!(heap.resolve_weak(&weak).unwrap(), None);
        assert_eq!(
            heap.get(&weak),
            Err(SandboxError::ExpiredReference { handle: weak.id() })
        );
    }

    #[test]
    fn test_teardown_is_depth_first_in_reverse_field_order() {
        let mut heap = Heap::new(8);
        let root = heap.create_shared("root", 0).unwrap();
        let left = heap.create_exclusive("left", 1).unwrap();
        let right = heap.create_shared("right", 2).unwrap();
        let leaf = heap.create_exclusive("leaf", 3).unwrap();

        heap.store_exclusive(&right, "leaf", leaf).unwrap();
        heap.store_exclusive(&root, "left", left).unwrap();
        heap.store_shared(&root, "right", &right).unwrap();
        heap.release_shared(right).unwrap();

        heap.release_shared(root).unwrap();

        let events: Vec<(String, TeardownPhase, usize)> = heap
            .teardown_log()
            .iter()
            .map(|e| (e.label.clone(), e.phase, e.depth))
            .collect();
        assert_eq!(
            events,
            vec![
                ("root".to_string(), TeardownPhase::Begin, 0),
                ("right".to_string(), TeardownPhase::Begin, 1),
                ("leaf".to_string(), TeardownPhase::Begin, 2),
                ("leaf".to_string(), TeardownPhase::End, 2),
                ("right".to_string(), TeardownPhase::End, 1),
                ("left".to_string(), TeardownPhase::Begin, 1),
                ("left".to_string(), TeardownPhase::End, 1),
                ("root".to_string(), TeardownPhase::End, 0),
            ]
        );
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_overwriting_a_field_releases_the_old_target() {
        let mut heap = Heap::new(8);
        let owner = heap.create_shared("owner", 0).unwrap();
        let a = heap.create_exclusive("a", 1).unwrap();
        let b = heap.create_exclusive("b", 2).unwrap();

        heap.store_exclusive(&owner, "slot", a).unwrap();
        heap.store_exclusive(&owner, "slot", b).unwrap();

        assert_eq!(begins(&heap), vec!["a".to_string()]);
        let edge = heap.field(&owner, "slot").unwrap().unwrap();
        assert_eq!(edge.kind(), HandleKind::Exclusive);
        assert_eq!(heap.node(edge.target()).unwrap().label, "b");
    }

    #[test]
    fn test_field_handles_cannot_be_released_by_the_caller() {
        let mut heap = Heap::new(8);
        let owner = heap.create_shared("owner", 0).unwrap();
        let target = heap.create_shared("target", 1).unwrap();
        heap.store_shared(&owner, "t", &target).unwrap();

        let Some(Edge::Shared(held)) = heap.field(&owner, "t").unwrap() else {
            panic!("expected a shared edge");
        };
        assert!(matches!(
            heap.release_shared(held),
            Err(SandboxError::HeldByField { .. })
        ));
        assert_eq!(heap.strong_count(&target).unwrap(), 2);
    }

    #[test]
    fn test_capacity_limit() {
        let mut heap = Heap::new(2);
        let _a = heap.create_shared("a", 1).unwrap();
        let b = heap.create_exclusive("b", 2).unwrap();
        assert_eq!(
            heap.create_shared("c", 3),
            Err(SandboxError::CapacityExceeded { limit: 2 })
        );
        heap.drop_exclusive(b).unwrap();
        assert!(heap.create_shared("c", 3).is_ok());
    }

    #[test]
    fn test_weak_observers_see_teardown_start() {
        let mut heap = Heap::new(8);
        let a = heap.create_shared("a", 1).unwrap();
        let watcher = heap.weak_from(&a).unwrap();
        assert_eq!(heap.weak_count(&a).unwrap(), 1);
        assert_eq!(heap.strong_count(&watcher).unwrap(), 1);

        heap.release_shared(a).unwrap();
        assert_eq!(heap.strong_count(&watcher).unwrap(), 0);
        heap.release_weak(watcher).unwrap();
        assert_eq!(
            heap.release_weak(watcher),
            Err(SandboxError::DoubleRelease {
                handle: watcher.id()
            })
        );
    }

    #[test]
    fn test_reclaimed_payloads_follow_begin_events() {
        let mut heap = Heap::new(8).with_reclaimed_payloads();
        let outer = heap.create_shared("outer", 1).unwrap();
        let inner = heap.create_exclusive("inner", 2).unwrap();
        heap.store_exclusive(&outer, "inner", inner).unwrap();
        heap.release_shared(outer).unwrap();

        let reclaimed: Vec<(usize, i32)> = heap
            .take_reclaimed()
            .into_iter()
            .map(|r| (r.event, r.value))
            .collect();
        // inner finishes first but began second
        assert_eq!(reclaimed, vec![(1, 2), (0, 1)]);
        assert!(heap.take_reclaimed().is_empty());
        assert_eq!(heap.record_count(), 3);
    }

    #[test]
    fn test_payloads_are_dropped_by_default() {
        let mut heap = Heap::new(8);
        let only = heap.create_shared("only", 1).unwrap();
        heap.release_shared(only).unwrap();
        assert!(heap.take_reclaimed().is_empty());
    }
}
